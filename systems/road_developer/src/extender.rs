//! Tertiary road extender: pushes the network into underserved land.
//!
//! The extender climbs the distance-to-road gradient until it stands far
//! enough from the network, then walks back down the gradient laying a new
//! segment that reconnects its position to the nearest existing road.

use cityflow_core::{LandUse, TilePosition};
use cityflow_world::{query, Tile, World, UNREACHABLE};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::{DensityRule, RoadBehavior};

/// Tuning knobs for the extender variant.
#[derive(Clone, Copy, Debug)]
pub struct ExtenderConfig {
    /// Minimum distance from the network before a segment is worth building.
    pub d_min: u16,
    /// Maximum reach of the exploratory gradient climb.
    pub d_max: u16,
    /// Spacing of the regular grid lines that attract new roads.
    pub grid_spacing: i32,
    /// Tolerance around a grid line within which a tile is considered
    /// aligned. A tolerance of at least half the spacing disables the
    /// constraint entirely, yielding an organic, ungridded layout.
    pub grid_tolerance: i32,
    /// Density ceiling applied to planned segments.
    pub density: DensityRule,
}

impl Default for ExtenderConfig {
    fn default() -> Self {
        Self {
            d_min: 5,
            d_max: 10,
            grid_spacing: 10,
            grid_tolerance: 5,
            density: DensityRule::default(),
        }
    }
}

/// Road developer variant that extends the tertiary network outward.
#[derive(Clone, Debug)]
pub struct TertiaryRoadExtender {
    config: ExtenderConfig,
    current: TilePosition,
    rng: ChaCha8Rng,
}

impl TertiaryRoadExtender {
    /// Creates an extender standing on `start`.
    #[must_use]
    pub fn new(start: TilePosition, config: ExtenderConfig, rng: ChaCha8Rng) -> Self {
        Self {
            config,
            current: start,
            rng,
        }
    }

    /// Tile the extender currently occupies.
    #[must_use]
    pub const fn current_tile(&self) -> TilePosition {
        self.current
    }

    fn grid_aligned(&self, position: TilePosition) -> bool {
        near_grid_line(position.x(), self.config.grid_spacing, self.config.grid_tolerance)
            || near_grid_line(position.y(), self.config.grid_spacing, self.config.grid_tolerance)
    }

    /// Tie-break policy for the descent walk: prefer site boundaries, then
    /// the smallest elevation change from the previous tile, then chance.
    fn break_ties(&mut self, world: &World, ties: &[TilePosition], prev: TilePosition) -> TilePosition {
        debug_assert!(!ties.is_empty(), "tie-break requires at least one candidate");
        let boundary: Vec<TilePosition> = ties
            .iter()
            .copied()
            .filter(|&tile| query::is_parcel_boundary(world, tile))
            .collect();
        let pool = if boundary.is_empty() {
            ties.to_vec()
        } else {
            boundary
        };

        let prev_elevation = query::tile_at(world, prev).map_or(0.0, Tile::elevation);
        let climb = |tile: TilePosition| {
            (query::tile_at(world, tile).map_or(0.0, Tile::elevation) - prev_elevation).abs()
        };
        let flattest = pool
            .iter()
            .map(|&tile| climb(tile))
            .fold(f32::INFINITY, f32::min);
        let finalists: Vec<TilePosition> = pool
            .into_iter()
            .filter(|&tile| climb(tile) <= flattest + f32::EPSILON)
            .collect();
        finalists[self.rng.gen_range(0..finalists.len())]
    }
}

impl RoadBehavior for TertiaryRoadExtender {
    fn label(&self) -> &str {
        "tertiary-road-extender"
    }

    /// Gradient ascent on distance-to-road, capped at `d_max`, over the
    /// 8-connected neighborhood; equally-far candidates are chosen at random.
    /// With no eligible neighbor the extender relocates to a random road tile
    /// satisfying the grid constraint.
    fn move_step(&mut self, world: &World) {
        let current_distance =
            query::distance_to(world, self.current, LandUse::Road).unwrap_or(0);

        let mut eligible: Vec<(u16, TilePosition)> = Vec::new();
        for neighbor in query::neighbors8(world, self.current) {
            if query::land_use(world, neighbor) == Some(LandUse::Road) {
                continue;
            }
            let Some(distance) = query::distance_to(world, neighbor, LandUse::Road) else {
                continue;
            };
            if distance > current_distance
                && distance <= self.config.d_max
                && self.grid_aligned(neighbor)
            {
                eligible.push((distance, neighbor));
            }
        }

        if let Some(&(farthest, _)) = eligible.iter().max_by_key(|&&(distance, _)| distance) {
            let ties: Vec<TilePosition> = eligible
                .iter()
                .filter(|&&(distance, _)| distance == farthest)
                .map(|&(_, tile)| tile)
                .collect();
            self.current = ties[self.rng.gen_range(0..ties.len())];
            return;
        }

        let roads: Vec<TilePosition> = query::tiles_of_use(world, LandUse::Road)
            .into_iter()
            .filter(|&tile| self.grid_aligned(tile))
            .collect();
        if roads.is_empty() {
            return;
        }
        self.current = roads[self.rng.gen_range(0..roads.len())];
        log::debug!("{}: relocated to {:?}", self.label(), self.current);
    }

    fn needs_road(&self, world: &World) -> bool {
        query::distance_to(world, self.current, LandUse::Road)
            .is_some_and(|distance| distance >= self.config.d_min)
    }

    /// Greedy 4-connected descent toward the nearest road. Every step must
    /// strictly decrease the distance; water can block the only descending
    /// neighbor, in which case the plan is abandoned.
    fn plan_road(&mut self, world: &World) -> Option<Vec<TilePosition>> {
        if query::land_use(world, self.current) == Some(LandUse::Road) {
            return None;
        }

        let mut plan = vec![self.current];
        let mut last = self.current;
        loop {
            let here = query::distance_to(world, last, LandUse::Road)?;
            if here == UNREACHABLE {
                return None;
            }

            let candidates: Vec<TilePosition> = query::neighbors4(world, last)
                .filter(|&tile| query::tile_at(world, tile).is_some_and(Tile::is_buildable))
                .collect();
            let nearest = candidates
                .iter()
                .filter_map(|&tile| query::distance_to(world, tile, LandUse::Road))
                .min()?;
            if nearest >= here {
                return None;
            }
            if nearest == 0 {
                // Reached the network; the road tile itself already belongs
                // to another segment and stays out of the plan.
                return Some(plan);
            }

            let ties: Vec<TilePosition> = candidates
                .into_iter()
                .filter(|&tile| {
                    query::distance_to(world, tile, LandUse::Road) == Some(nearest)
                })
                .collect();
            let next = self.break_ties(world, &ties, last);
            plan.push(next);
            last = next;
        }
    }

    fn density_rule(&self) -> DensityRule {
        self.config.density
    }
}

fn near_grid_line(coordinate: i32, spacing: i32, tolerance: i32) -> bool {
    if spacing <= 0 {
        return true;
    }
    let remainder = coordinate.rem_euclid(spacing);
    remainder.min(spacing - remainder) <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoadDeveloper;
    use cityflow_core::{Command, Event, RoadClass};
    use cityflow_scheduler::Agent;
    use cityflow_world::{apply, GridSpec, TileSeed};
    use rand::SeedableRng;

    fn world_with_seed_road(center: TilePosition) -> World {
        let mut world = World::new(GridSpec::new(10, 10), |_| TileSeed {
            is_water: false,
            elevation: 0.0,
        });
        apply(
            &mut world,
            Command::PlaceRoad {
                tiles: vec![center],
                class: RoadClass::Tertiary,
            },
            &mut Vec::new(),
        );
        world
    }

    #[test]
    fn grid_alignment_is_vacuous_at_half_spacing_tolerance() {
        for coordinate in -20..20 {
            assert!(near_grid_line(coordinate, 10, 5));
        }
        assert!(near_grid_line(10, 10, 0));
        assert!(!near_grid_line(4, 10, 3));
        assert!(near_grid_line(8, 10, 2));
    }

    #[test]
    fn one_tick_extends_the_seed_road() {
        let center = TilePosition::new(5, 5);
        let mut world = world_with_seed_road(center);
        let config = ExtenderConfig {
            d_min: 0,
            ..ExtenderConfig::default()
        };
        let mut agent = RoadDeveloper::new(TertiaryRoadExtender::new(
            center,
            config,
            ChaCha8Rng::seed_from_u64(11),
        ));

        let mut commands = Vec::new();
        agent.update(&world, &mut commands);
        let mut events = Vec::new();
        for command in commands {
            apply(&mut world, command, &mut events);
        }

        let placed = events
            .iter()
            .find_map(|event| match event {
                Event::RoadPlaced { site, length, .. } => Some((*site, *length)),
                _ => None,
            })
            .expect("the extender must commit a segment on its first tick");
        assert!(placed.1 >= 1);

        let segment = cityflow_world::query::site(&world, placed.0)
            .expect("the committed segment is registered");
        assert!(
            segment
                .tiles()
                .iter()
                .any(|tile| tile.manhattan_distance(center) == 1),
            "the new segment must touch the seed road"
        );
        for &tile in segment.tiles() {
            assert_eq!(query::land_use(&world, tile), Some(LandUse::Road));
            assert_eq!(query::distance_to(&world, tile, LandUse::Road), Some(0));
        }
    }

    #[test]
    fn descent_aborts_when_water_blocks_every_step() {
        // The only road sits across a moat; no buildable path descends.
        let mut world = World::new(GridSpec::new(7, 1), |position| TileSeed {
            is_water: position.x() == 2,
            elevation: 0.0,
        });
        apply(
            &mut world,
            Command::PlaceRoad {
                tiles: vec![TilePosition::new(0, 0)],
                class: RoadClass::Tertiary,
            },
            &mut Vec::new(),
        );
        let mut extender = TertiaryRoadExtender::new(
            TilePosition::new(5, 0),
            ExtenderConfig::default(),
            ChaCha8Rng::seed_from_u64(3),
        );

        assert_eq!(extender.plan_road(&world), None);
    }
}
