//! Read-only query surface consumed by agents and presentation adapters.
//!
//! Nothing in this module mutates the world; presentation collaborators and
//! agent systems observe state exclusively through these functions and react
//! with command batches.

use std::collections::VecDeque;

use cityflow_core::{LandUse, SiteId, Tick, TilePosition};

use crate::{GridSpec, SiteRef, SiteState, Tile, World};

/// Epsilon applied to circle membership so boundary tiles are excluded
/// consistently across platforms.
const CIRCLE_EPSILON: f32 = 0.1;

/// Current value of the world's tick counter.
#[must_use]
pub fn tick(world: &World) -> Tick {
    world.tick
}

/// Provides read-only access to the world's grid description.
#[must_use]
pub fn grid(world: &World) -> &GridSpec {
    &world.spec
}

/// Bounds-checked tile lookup; out-of-range positions are a soft miss.
#[must_use]
pub fn tile_at(world: &World, position: TilePosition) -> Option<&Tile> {
    world.spec.index_of(position).map(|index| &world.tiles[index])
}

/// Derived usage of the tile at the provided position, if in bounds.
#[must_use]
pub fn land_use(world: &World, position: TilePosition) -> Option<LandUse> {
    world
        .spec
        .index_of(position)
        .map(|index| world.land_use_at(index))
}

/// Cached grid distance from the provided position to the nearest tile of
/// `usage`; [`crate::UNREACHABLE`] when no such tile exists.
#[must_use]
pub fn distance_to(world: &World, position: TilePosition, usage: LandUse) -> Option<u16> {
    world
        .spec
        .index_of(position)
        .map(|index| world.cached_distance(index, usage))
}

/// Land value of the tile at `position` scored for `usage`.
///
/// Out-of-bounds positions score zero.
#[must_use]
pub fn value_for(world: &World, position: TilePosition, usage: LandUse) -> f32 {
    world
        .spec
        .index_of(position)
        .map_or(0.0, |index| crate::value::value_for(world, index, usage))
}

/// Registered site state for the provided identifier.
#[must_use]
pub fn site(world: &World, id: SiteId) -> Option<&SiteState> {
    world.sites.get(&id)
}

/// Iterator over every registered multi-tile site in identifier order.
pub fn sites(world: &World) -> impl Iterator<Item = &SiteState> {
    world.sites.values()
}

/// Site reference covering the provided position: the registered site, or the
/// bare tile itself when unclaimed.
#[must_use]
pub fn site_at(world: &World, position: TilePosition) -> Option<SiteRef> {
    let index = world.spec.index_of(position)?;
    Some(match world.tiles[index].site {
        Some(id) => SiteRef::Multi(id),
        None => SiteRef::Lot(position),
    })
}

/// Usage derived by the referenced site.
#[must_use]
pub fn site_land_use(world: &World, site_ref: &SiteRef) -> Option<LandUse> {
    match site_ref {
        SiteRef::Lot(position) => land_use(world, *position),
        SiteRef::Multi(id) => world.sites.get(id).map(SiteState::land_use),
    }
}

/// Anchor tile representing the referenced site in distance comparisons.
#[must_use]
pub fn site_anchor(world: &World, site_ref: &SiteRef) -> Option<TilePosition> {
    match site_ref {
        SiteRef::Lot(position) => Some(*position),
        SiteRef::Multi(id) => world.sites.get(id).map(SiteState::anchor),
    }
}

/// Value of the referenced site scored for the provided usage: the arithmetic
/// mean of its tiles' per-tile value.
#[must_use]
pub fn site_value_for(world: &World, site_ref: &SiteRef, usage: LandUse) -> f32 {
    match site_ref {
        SiteRef::Lot(position) => value_for(world, *position, usage),
        SiteRef::Multi(id) => world.sites.get(id).map_or(0.0, |state| {
            let total: f32 = state
                .tiles()
                .iter()
                .map(|&position| value_for(world, position, usage))
                .sum();
            total / state.area() as f32
        }),
    }
}

/// Value of the referenced site scored for its own current usage.
#[must_use]
pub fn site_value(world: &World, site_ref: &SiteRef) -> f32 {
    match site_land_use(world, site_ref) {
        Some(usage) => site_value_for(world, site_ref, usage),
        None => 0.0,
    }
}

/// Distinct sites whose corresponding tile lies strictly within the Euclidean
/// `radius` of `center`; multi-tile sites are deduplicated, bare tiles are
/// returned as [`SiteRef::Lot`]s. Scan order is deterministic.
#[must_use]
pub fn sites_in_circle(world: &World, center: TilePosition, radius: i32) -> Vec<SiteRef> {
    let mut found = Vec::new();
    let mut seen: Vec<SiteId> = Vec::new();
    for_each_tile_in_circle(&world.spec, center, radius, |position, index| {
        match world.tiles[index].site {
            None => found.push(SiteRef::Lot(position)),
            Some(id) => {
                if !seen.contains(&id) {
                    seen.push(id);
                    found.push(SiteRef::Multi(id));
                }
            }
        }
    });
    found
}

/// Every tile position strictly within the Euclidean `radius` of `center`.
#[must_use]
pub fn tiles_in_circle(world: &World, center: TilePosition, radius: i32) -> Vec<TilePosition> {
    let mut found = Vec::new();
    for_each_tile_in_circle(&world.spec, center, radius, |position, _| {
        found.push(position);
    });
    found
}

fn for_each_tile_in_circle<F>(spec: &GridSpec, center: TilePosition, radius: i32, mut visit: F)
where
    F: FnMut(TilePosition, usize),
{
    for dx in -radius..=radius {
        for dy in -radius..=radius {
            let position = center.offset(dx, dy);
            let Some(index) = spec.index_of(position) else {
                continue;
            };
            if center.euclidean_distance(position) + CIRCLE_EPSILON >= radius as f32 {
                continue;
            }
            visit(position, index);
        }
    }
}

/// Fraction of tiles within the `radius` disc around `position` that belong
/// to the road network.
#[must_use]
pub fn road_density(world: &World, position: TilePosition, radius: i32) -> f32 {
    let tiles = tiles_in_circle(world, position, radius);
    if tiles.is_empty() {
        return 0.0;
    }
    let roads = tiles
        .iter()
        .filter(|&&p| land_use(world, p) == Some(LandUse::Road))
        .count();
    roads as f32 / tiles.len() as f32
}

/// Every tile currently deriving the provided usage, in row-major order.
#[must_use]
pub fn tiles_of_use(world: &World, usage: LandUse) -> Vec<TilePosition> {
    (0..world.spec.len())
        .filter(|&index| world.land_use_at(index) == usage)
        .map(|index| world.spec.position_of(index))
        .collect()
}

/// Reports whether any 4-connected neighbor of the position is a road tile.
#[must_use]
pub fn is_road_adjacent(world: &World, position: TilePosition) -> bool {
    neighbors4(world, position).any(|neighbor| land_use(world, neighbor) == Some(LandUse::Road))
}

/// Reports whether the position sits on a site boundary: at least one
/// 4-connected neighbor belongs to a different site (or one side is bare
/// while the other is claimed).
#[must_use]
pub fn is_parcel_boundary(world: &World, position: TilePosition) -> bool {
    let Some(own) = tile_at(world, position).map(Tile::site) else {
        return false;
    };
    neighbors4(world, position).any(|neighbor| {
        let other = tile_at(world, neighbor).map(Tile::site);
        match other {
            Some(other) => other != own && (other.is_some() || own.is_some()),
            None => false,
        }
    })
}

/// 4-connected in-bounds neighbors of the position, in a fixed scan order.
#[must_use]
pub fn neighbors4(world: &World, position: TilePosition) -> Neighbors {
    let mut neighbors = Neighbors::default();
    for (dx, dy) in [(0, -1), (-1, 0), (1, 0), (0, 1)] {
        let candidate = position.offset(dx, dy);
        if world.spec.contains(candidate) {
            neighbors.push(candidate);
        }
    }
    neighbors
}

/// 8-connected in-bounds neighbors of the position, in a fixed scan order.
#[must_use]
pub fn neighbors8(world: &World, position: TilePosition) -> Neighbors {
    let mut neighbors = Neighbors::default();
    for dx in -1..=1 {
        for dy in -1..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let candidate = position.offset(dx, dy);
            if world.spec.contains(candidate) {
                neighbors.push(candidate);
            }
        }
    }
    neighbors
}

/// Length of the shortest path between two road tiles travelling only along
/// 4-connected road tiles; `None` when the endpoints are not connected (or
/// are not road tiles at all).
#[must_use]
pub fn shortest_road_path(world: &World, from: TilePosition, to: TilePosition) -> Option<u32> {
    let start = world.spec.index_of(from)?;
    let goal = world.spec.index_of(to)?;
    debug_assert_eq!(world.land_use_at(start), LandUse::Road);
    debug_assert_eq!(world.land_use_at(goal), LandUse::Road);
    if world.land_use_at(start) != LandUse::Road || world.land_use_at(goal) != LandUse::Road {
        return None;
    }
    if start == goal {
        return Some(0);
    }

    let mut distances = vec![u32::MAX; world.spec.len()];
    distances[start] = 0;
    let mut queue = VecDeque::new();
    queue.push_back(start);

    while let Some(index) = queue.pop_front() {
        let next = distances[index].saturating_add(1);
        for neighbor in world.spec.neighbor_indices(index) {
            if world.land_use_at(neighbor) != LandUse::Road {
                continue;
            }
            if distances[neighbor] != u32::MAX {
                continue;
            }
            distances[neighbor] = next;
            if neighbor == goal {
                return Some(next);
            }
            queue.push_back(neighbor);
        }
    }
    None
}

/// Fixed-capacity neighborhood iterator; never allocates.
#[derive(Clone, Debug, Default)]
pub struct Neighbors {
    buffer: [Option<TilePosition>; 8],
    len: usize,
    cursor: usize,
}

impl Neighbors {
    fn push(&mut self, position: TilePosition) {
        if self.len < self.buffer.len() {
            self.buffer[self.len] = Some(position);
            self.len += 1;
        }
    }
}

impl Iterator for Neighbors {
    type Item = TilePosition;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.len {
            return None;
        }
        let value = self.buffer[self.cursor];
        self.cursor += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apply, GridSpec, TileSeed};
    use cityflow_core::{Command, RoadClass};

    fn dry_world(width: i32, height: i32) -> World {
        World::new(GridSpec::new(width, height), |_| TileSeed {
            is_water: false,
            elevation: 0.0,
        })
    }

    fn place_road(world: &mut World, tiles: Vec<TilePosition>) {
        apply(
            world,
            Command::PlaceRoad {
                tiles,
                class: RoadClass::Tertiary,
            },
            &mut Vec::new(),
        );
    }

    #[test]
    fn circle_on_an_empty_grid_matches_the_lattice_count() {
        let world = dry_world(21, 21);
        let center = TilePosition::new(10, 10);
        // Lattice points with distance + 0.1 < 5, i.e. dx^2 + dy^2 <= 24.
        assert_eq!(sites_in_circle(&world, center, 5).len(), 69);
        assert_eq!(tiles_in_circle(&world, center, 5).len(), 69);
    }

    #[test]
    fn multi_tile_sites_are_deduplicated_in_circles() {
        let mut world = dry_world(21, 21);
        let center = TilePosition::new(10, 10);
        place_road(
            &mut world,
            vec![TilePosition::new(10, 10), TilePosition::new(11, 10)],
        );

        let sites = sites_in_circle(&world, center, 5);
        // Two covered tiles collapse into one site reference.
        assert_eq!(sites.len(), 68);
        let multi_count = sites
            .iter()
            .filter(|site| matches!(site, SiteRef::Multi(_)))
            .count();
        assert_eq!(multi_count, 1);
    }

    #[test]
    fn road_adjacency_uses_the_cardinal_neighborhood() {
        let mut world = dry_world(5, 5);
        place_road(&mut world, vec![TilePosition::new(2, 2)]);

        assert!(is_road_adjacent(&world, TilePosition::new(2, 1)));
        assert!(is_road_adjacent(&world, TilePosition::new(1, 2)));
        assert!(!is_road_adjacent(&world, TilePosition::new(1, 1)));
    }

    #[test]
    fn shortest_road_path_walks_the_network_only() {
        let mut world = dry_world(5, 5);
        place_road(
            &mut world,
            vec![
                TilePosition::new(0, 0),
                TilePosition::new(1, 0),
                TilePosition::new(2, 0),
                TilePosition::new(2, 1),
            ],
        );
        place_road(&mut world, vec![TilePosition::new(4, 4)]);

        assert_eq!(
            shortest_road_path(&world, TilePosition::new(0, 0), TilePosition::new(2, 1)),
            Some(3)
        );
        assert_eq!(
            shortest_road_path(&world, TilePosition::new(0, 0), TilePosition::new(0, 0)),
            Some(0)
        );
        assert_eq!(
            shortest_road_path(&world, TilePosition::new(0, 0), TilePosition::new(4, 4)),
            None
        );
    }

    #[test]
    fn parcel_boundaries_separate_claimed_and_bare_land() {
        let mut world = dry_world(5, 5);
        apply(
            &mut world,
            Command::FoundParcel {
                origin: TilePosition::new(2, 2),
                land_use: LandUse::Residential,
            },
            &mut Vec::new(),
        );

        assert!(is_parcel_boundary(&world, TilePosition::new(2, 1)));
        assert!(is_parcel_boundary(&world, TilePosition::new(2, 2)));
        assert!(!is_parcel_boundary(&world, TilePosition::new(0, 0)));
    }
}
