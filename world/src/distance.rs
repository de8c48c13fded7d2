//! Incremental per-usage distance field maintained by the world crate.

use std::collections::VecDeque;

use cityflow_core::LandUse;

use crate::{GridSpec, UNREACHABLE};

/// Dense Manhattan-distance grids, one per land use.
///
/// Each grid stores, for every tile, the exact 4-connected distance to the
/// nearest tile currently deriving that usage. The field is seeded once at
/// world construction and afterwards re-converged incrementally: a usage
/// change invalidates only the region whose nearest source was the changed
/// tile, never the whole grid.
#[derive(Clone, Debug)]
pub(crate) struct DistanceField {
    grids: Vec<Vec<u16>>,
}

impl DistanceField {
    /// Creates a field with every distance unreachable.
    pub(crate) fn new(spec: &GridSpec) -> Self {
        Self {
            grids: vec![vec![UNREACHABLE; spec.len()]; LandUse::ALL.len()],
        }
    }

    /// Distance stored for the provided tile index and usage.
    pub(crate) fn distance(&self, usage: LandUse, index: usize) -> u16 {
        self.grids[usage.index()][index]
    }

    /// Seeds the grid for `usage` from every tile currently of that usage.
    ///
    /// Equivalent to a plain multi-source breadth-first search with no
    /// invalidation; used once per usage during world construction.
    pub(crate) fn seed(&mut self, spec: &GridSpec, usage: LandUse, sources: &[usize]) {
        let seeded: Vec<(usize, u16)> = sources.iter().map(|&index| (index, 0)).collect();
        self.propagate(spec, usage, seeded);
    }

    /// Re-converges the `old` and `new` grids after the tile at `index`
    /// changed its derived usage from `old` to `new`.
    pub(crate) fn usage_changed(
        &mut self,
        spec: &GridSpec,
        index: usize,
        old: LandUse,
        new: LandUse,
    ) {
        if old == new {
            return;
        }
        self.retract(spec, old, index);
        self.propagate(spec, new, vec![(index, 0)]);
    }

    /// Reclaims every tile whose nearest `usage` source was the changed tile.
    ///
    /// Breadth-first traversal outward from `changed`: a visited tile whose
    /// stored distance is smaller than the traversal-implied distance still
    /// has a closer surviving source, so it becomes an edge tile and the
    /// traversal stops there. Every other visited tile is reset to
    /// [`UNREACHABLE`] and the edge tiles then re-propagate into the
    /// reclaimed region.
    fn retract(&mut self, spec: &GridSpec, usage: LandUse, changed: usize) {
        let grid = &mut self.grids[usage.index()];
        let mut edges: Vec<(usize, u16)> = Vec::new();
        let mut queue: VecDeque<(usize, u16)> = VecDeque::new();
        queue.push_back((changed, 0));

        while let Some((index, implied)) = queue.pop_front() {
            let stored = grid[index];
            if stored == UNREACHABLE {
                // Already reclaimed on another path, or genuinely unreachable.
                continue;
            }
            if stored < implied {
                edges.push((index, stored));
                continue;
            }
            grid[index] = UNREACHABLE;
            let next = implied.saturating_add(1);
            for neighbor in spec.neighbor_indices(index) {
                queue.push_back((neighbor, next));
            }
        }

        edges.sort_unstable();
        edges.dedup_by_key(|entry| entry.0);
        self.propagate(spec, usage, edges);
    }

    /// Multi-source propagation that writes only strictly improving
    /// distances, stopping expansion once a tile can no longer improve.
    ///
    /// Sources are processed in ascending distance order so the frontier
    /// stays monotone and every tile settles once.
    fn propagate(&mut self, spec: &GridSpec, usage: LandUse, mut sources: Vec<(usize, u16)>) {
        let grid = &mut self.grids[usage.index()];
        sources.sort_unstable_by_key(|&(_, distance)| distance);

        let mut queue: VecDeque<usize> = VecDeque::new();
        for (index, distance) in sources {
            if grid[index] > distance {
                grid[index] = distance;
            }
            queue.push_back(index);
        }

        while let Some(index) = queue.pop_front() {
            let current = grid[index];
            if current >= UNREACHABLE.saturating_sub(1) {
                continue;
            }
            let next = current + 1;
            for neighbor in spec.neighbor_indices(index) {
                if grid[neighbor] > next {
                    grid[neighbor] = next;
                    queue.push_back(neighbor);
                }
            }
        }
    }
}
