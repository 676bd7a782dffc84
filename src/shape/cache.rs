//! Target-keyed weight table cache.

use std::collections::HashMap;
use std::ops::Deref;

use nalgebra::Point3;

use crate::buffer::{Buffer, Buffers};
use crate::error::Result;
use crate::mesh::TriangleAccessor;
use crate::parallel::Executor;
use crate::weights::{SolveWeights, WeightTable, WeightsSolver};

/// Counters describing how weight tables were obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShapeStats {
    /// Number of times a solver ran.
    pub weight_solves: usize,
    /// Number of transfers served from the cache.
    pub cache_hits: usize,
    /// Number of cached tables dropped because the point count changed.
    pub cache_evictions: usize,
}

/// A weight table resolved for one transfer.
pub(crate) enum Weights<'a> {
    Cached(&'a WeightTable),
    Transient(Buffer<WeightTable>),
}

impl Deref for Weights<'_> {
    type Target = WeightTable;

    fn deref(&self) -> &WeightTable {
        match self {
            Weights::Cached(table) => *table,
            Weights::Transient(buffer) => &**buffer,
        }
    }
}

#[derive(Debug)]
pub(crate) struct WeightsCache {
    enabled: bool,
    tables: HashMap<String, Buffer<WeightTable>>,
    stats: ShapeStats,
}

impl WeightsCache {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            tables: HashMap::new(),
            stats: ShapeStats::default(),
        }
    }

    #[inline]
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.clear();
        }
        self.enabled = enabled;
    }

    pub(crate) fn clear(&mut self) {
        if !self.tables.is_empty() {
            log::debug!("clearing {} cached weight tables", self.tables.len());
        }
        self.tables.clear();
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.tables.len()
    }

    #[inline]
    pub(crate) fn stats(&self) -> ShapeStats {
        self.stats
    }

    pub(crate) fn get(&self, target_id: &str) -> Option<&WeightTable> {
        self.tables.get(target_id).map(|buffer| &**buffer)
    }

    /// Replace a cached table by its packed copy.
    pub(crate) fn pack(&mut self, target_id: &str, buffers: &Buffers) -> bool {
        match self.tables.get_mut(target_id) {
            Some(table) => {
                if !table.is_packed() {
                    *table = buffers.persistent(table.packed_copy());
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn pack_all(&mut self, buffers: &Buffers) {
        for table in self.tables.values_mut() {
            if !table.is_packed() {
                *table = buffers.persistent(table.packed_copy());
            }
        }
    }

    /// Get the weights for `points`, from the cache when possible.
    ///
    /// Without a target id, or with caching disabled, the table is solved for
    /// this call only.
    pub(crate) fn resolve<'a>(
        &'a mut self,
        target_id: Option<&str>,
        points: &[Point3<f64>],
        solver: &WeightsSolver,
        accessor: &TriangleAccessor<'_>,
        exec: &Executor,
        buffers: &Buffers,
    ) -> Result<Weights<'a>> {
        let id = match target_id {
            Some(id) if self.enabled => id,
            _ => {
                let table = solver.solve(accessor, points, exec)?;
                self.stats.weight_solves += 1;
                return Ok(Weights::Transient(buffers.transient(table)));
            }
        };

        if let Some(cached) = self.tables.get(id) {
            if cached.point_count() != points.len() {
                log::debug!(
                    "evicting weights for '{}': point count changed from {} to {}",
                    id,
                    cached.point_count(),
                    points.len()
                );
                self.tables.remove(id);
                self.stats.cache_evictions += 1;
            }
        }

        let table: &'a Buffer<WeightTable> = if self.tables.contains_key(id) {
            log::trace!("reusing cached weights for '{}'", id);
            self.stats.cache_hits += 1;
            &self.tables[id]
        } else {
            let table = solver.solve(accessor, points, exec)?;
            self.stats.weight_solves += 1;
            self.tables
                .entry(id.to_owned())
                .or_insert(buffers.persistent(table))
        };
        Ok(Weights::Cached(&**table))
    }
}
