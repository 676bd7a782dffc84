//! Owned buffers with an explicit allocation lifetime.
//!
//! Large buffers in a shape live for one of two spans:
//!
//! - [`Lifetime::Persistent`] - held for the life of the shape, a deform or a
//!   cache entry (reference mesh, triangle deltas, cached weight tables).
//! - [`Lifetime::Transient`] - scoped to a single call (ad hoc deltas,
//!   uncached weight tables).
//!
//! Both are created through a [`Buffers`] handle, one factory per lifetime,
//! and released exactly once when the owning [`Buffer`] is dropped. The handle
//! keeps a live count per lifetime, so a caller can check that disposing a
//! shape really released everything.
//!
//! ```
//! use trimorph::buffer::{Buffers, Lifetime};
//!
//! let buffers = Buffers::new();
//! let persistent = buffers.persistent(vec![1.0_f64; 16]);
//! {
//!     let scratch = buffers.transient(vec![0u32; 3]);
//!     assert_eq!(scratch.len(), 3);
//!     assert_eq!(buffers.live(Lifetime::Transient), 1);
//! }
//! assert_eq!(buffers.live(Lifetime::Transient), 0);
//! assert_eq!(buffers.live(Lifetime::Persistent), 1);
//! drop(persistent);
//! assert_eq!(buffers.live_total(), 0);
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Allocation lifetime of a [`Buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Held until its owner (shape, deform, cache entry) lets go of it.
    Persistent,
    /// Scoped to a single call.
    Transient,
}

#[derive(Debug, Default)]
struct Counters {
    persistent: AtomicUsize,
    transient: AtomicUsize,
}

impl Counters {
    #[inline]
    fn slot(&self, lifetime: Lifetime) -> &AtomicUsize {
        match lifetime {
            Lifetime::Persistent => &self.persistent,
            Lifetime::Transient => &self.transient,
        }
    }
}

/// Factory for [`Buffer`]s that tracks how many are alive.
///
/// Cloning the handle shares the counters.
#[derive(Debug, Clone, Default)]
pub struct Buffers {
    counters: Arc<Counters>,
}

impl Buffers {
    /// Create a new handle with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `value` in a persistent buffer.
    pub fn persistent<T>(&self, value: T) -> Buffer<T> {
        self.allocate(value, Lifetime::Persistent)
    }

    /// Wrap `value` in a transient buffer.
    pub fn transient<T>(&self, value: T) -> Buffer<T> {
        self.allocate(value, Lifetime::Transient)
    }

    fn allocate<T>(&self, value: T, lifetime: Lifetime) -> Buffer<T> {
        self.counters.slot(lifetime).fetch_add(1, Ordering::Relaxed);
        Buffer {
            value,
            lifetime,
            counters: Arc::clone(&self.counters),
        }
    }

    /// Number of live buffers with the given lifetime.
    pub fn live(&self, lifetime: Lifetime) -> usize {
        self.counters.slot(lifetime).load(Ordering::Relaxed)
    }

    /// Number of live buffers of either lifetime.
    pub fn live_total(&self) -> usize {
        self.live(Lifetime::Persistent) + self.live(Lifetime::Transient)
    }
}

/// An owned value tagged with its allocation lifetime.
///
/// Dereferences to the wrapped value. Dropping the buffer releases it.
pub struct Buffer<T> {
    value: T,
    lifetime: Lifetime,
    counters: Arc<Counters>,
}

impl<T> Buffer<T> {
    /// The lifetime this buffer was allocated with.
    #[inline]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }
}

impl<T> Deref for Buffer<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Buffer<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Drop for Buffer<T> {
    fn drop(&mut self) {
        self.counters.slot(self.lifetime).fetch_sub(1, Ordering::Relaxed);
        log::trace!("released {:?} buffer", self.lifetime);
    }
}

impl<T: fmt::Debug> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("lifetime", &self.lifetime)
            .field("value", &self.value)
            .finish()
    }
}
