//! Tertiary road connector: shortens detours in the existing network.
//!
//! The connector wanders the road network, periodically comparing the
//! on-network distance to a nearby road tile against the straight-line
//! distance. When the detour is disproportionate it searches for a new
//! connection over unclaimed land, backtracking through an explicit stack of
//! alternatives, and commits only when the combined route is a clear
//! improvement.

use cityflow_core::{LandUse, TilePosition};
use cityflow_world::{query, Tile, World};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::{DensityRule, RoadBehavior};

/// Tuning knobs for the connector variant.
#[derive(Clone, Copy, Debug)]
pub struct ConnectorConfig {
    /// Radius inside which connection destinations are sampled.
    pub search_radius: i32,
    /// Detour factor a route must exceed before a connection is attempted,
    /// and which the improved route must clear to be committed.
    pub cost_ratio: u32,
    /// Density ceiling applied to planned segments and walk candidates.
    pub density: DensityRule,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            search_radius: 7,
            cost_ratio: 2,
            density: DensityRule::default(),
        }
    }
}

/// Road developer variant that adds shortcuts between detached or poorly
/// connected parts of the network.
#[derive(Clone, Debug)]
pub struct TertiaryRoadConnector {
    config: ConnectorConfig,
    current: TilePosition,
    previous: TilePosition,
    rng: ChaCha8Rng,
}

impl TertiaryRoadConnector {
    /// Creates a connector standing on the road tile `start`.
    #[must_use]
    pub fn new(start: TilePosition, config: ConnectorConfig, rng: ChaCha8Rng) -> Self {
        Self {
            config,
            current: start,
            previous: start,
            rng,
        }
    }

    /// Tile the connector currently occupies.
    #[must_use]
    pub const fn current_tile(&self) -> TilePosition {
        self.current
    }

    /// Candidate continuation tiles from `from`, nearest-to-destination
    /// first. Road tiles are legal continuations: reaching one terminates
    /// the walk.
    fn ordered_candidates(
        &self,
        world: &World,
        from: TilePosition,
        dest: TilePosition,
        path: &[TilePosition],
    ) -> Vec<TilePosition> {
        let mut candidates: Vec<TilePosition> = query::neighbors4(world, from)
            .filter(|&tile| {
                query::tile_at(world, tile).is_some_and(Tile::is_buildable)
                    && !path.contains(&tile)
                    && self.config.density.admits(world, tile)
            })
            .collect();
        candidates.sort_by_key(|tile| tile.manhattan_distance(dest));
        candidates
    }

    /// Depth-first greedy walk toward `dest` with an explicit backtracking
    /// stack; returns the committed segment tiles and the road tile reached.
    fn speculate(
        &mut self,
        world: &World,
        dest: TilePosition,
        on_network: Option<u32>,
    ) -> Option<(Vec<TilePosition>, TilePosition)> {
        let ratio = self.config.cost_ratio;
        let mut path = vec![self.current];
        let mut frames: Vec<Vec<TilePosition>> = Vec::new();

        loop {
            // Extend greedily until a road tile is reached or the branch
            // dead-ends.
            let reached = loop {
                let last = *path.last().expect("the walk always contains its start");
                if path.len() > 1 && query::land_use(world, last) == Some(LandUse::Road) {
                    break Some(last);
                }
                let mut candidates = self.ordered_candidates(world, last, dest, &path);
                if candidates.is_empty() {
                    break None;
                }
                let next = candidates.remove(0);
                frames.push(candidates);
                path.push(next);
            };

            let Some(reached) = reached else {
                // A dead end abandons the whole attempt.
                return None;
            };

            let new_edges = (path.len() - 1) as u32;
            if let Some(existing) = on_network {
                if existing <= ratio * new_edges {
                    // Even ignoring the on-network tail, the new road is
                    // already too long to beat the detour threshold.
                    return None;
                }
                let improved = query::shortest_road_path(world, reached, dest)
                    .is_some_and(|tail| existing > ratio * (new_edges + tail));
                if !improved {
                    if backtrack(&mut path, &mut frames) {
                        continue;
                    }
                    return None;
                }
            }

            // The walked tiles between the start and the reached road tile
            // form the new segment.
            let segment: Vec<TilePosition> = path[1..path.len() - 1].to_vec();
            if segment.is_empty() {
                if backtrack(&mut path, &mut frames) {
                    continue;
                }
                return None;
            }
            return Some((segment, reached));
        }
    }
}

/// Undoes the deepest step of a speculative walk and queues the next-best
/// alternative; reports whether a live branch remains.
fn backtrack(path: &mut Vec<TilePosition>, frames: &mut Vec<Vec<TilePosition>>) -> bool {
    loop {
        let Some(alternatives) = frames.last_mut() else {
            return false;
        };
        let _ = path.pop();
        if alternatives.is_empty() {
            let _ = frames.pop();
            continue;
        }
        let next = alternatives.remove(0);
        path.push(next);
        return true;
    }
}

impl RoadBehavior for TertiaryRoadConnector {
    fn label(&self) -> &str {
        "tertiary-road-connector"
    }

    /// Walks along road tiles, never returning to the previous tile; a dead
    /// end swaps current and previous, stepping backwards.
    fn move_step(&mut self, world: &World) {
        let onward: Vec<TilePosition> = query::neighbors4(world, self.current)
            .filter(|&tile| {
                query::land_use(world, tile) == Some(LandUse::Road) && tile != self.previous
            })
            .collect();

        if onward.is_empty() {
            std::mem::swap(&mut self.current, &mut self.previous);
            return;
        }
        let next = onward[self.rng.gen_range(0..onward.len())];
        self.previous = self.current;
        self.current = next;
    }

    /// The decision whether a road is needed depends on the sampled
    /// destination, so it lives inside the planning step.
    fn needs_road(&self, _world: &World) -> bool {
        true
    }

    fn plan_road(&mut self, world: &World) -> Option<Vec<TilePosition>> {
        let destinations: Vec<TilePosition> =
            query::tiles_in_circle(world, self.current, self.config.search_radius)
                .into_iter()
                .filter(|&tile| {
                    tile != self.current && query::land_use(world, tile) == Some(LandUse::Road)
                })
                .collect();
        if destinations.is_empty() {
            return None;
        }
        let dest = destinations[self.rng.gen_range(0..destinations.len())];

        let direct = self.current.manhattan_distance(dest);
        let on_network = query::shortest_road_path(world, self.current, dest);
        let needs_connection = match on_network {
            None => true,
            Some(existing) => existing >= self.config.cost_ratio * direct,
        };
        if !needs_connection {
            return None;
        }

        let (segment, reached) = self.speculate(world, dest, on_network)?;
        log::debug!(
            "{}: connecting {:?} toward {:?} with {} tiles",
            self.label(),
            self.current,
            dest,
            segment.len()
        );
        self.previous = self.current;
        self.current = reached;
        Some(segment)
    }

    fn density_rule(&self) -> DensityRule {
        self.config.density
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoadDeveloper;
    use cityflow_core::{Command, RoadClass};
    use cityflow_scheduler::Agent;
    use cityflow_world::{apply, GridSpec, TileSeed};
    use rand::SeedableRng;

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

    fn relaxed_config() -> ConnectorConfig {
        ConnectorConfig {
            density: DensityRule::new(5, 1.0),
            ..ConnectorConfig::default()
        }
    }

    #[test]
    fn detached_components_are_connected() {
        let mut world = dry_world(9, 9);
        // An isolated road tile and a detached column the connector can
        // only reach by building new road.
        place_road(&mut world, vec![TilePosition::new(0, 0)]);
        let column: Vec<TilePosition> = (0..6).map(|y| TilePosition::new(4, y)).collect();
        place_road(&mut world, column);

        let mut agent = RoadDeveloper::new(TertiaryRoadConnector::new(
            TilePosition::new(0, 0),
            relaxed_config(),
            ChaCha8Rng::seed_from_u64(5),
        ));
        let mut commands = Vec::new();
        agent.update(&world, &mut commands);

        let tiles = match commands.as_slice() {
            [Command::PlaceRoad { tiles, .. }] => tiles.clone(),
            other => panic!("expected one road placement, found {other:?}"),
        };
        assert!(!tiles.is_empty());
        apply(
            &mut world,
            Command::PlaceRoad {
                tiles,
                class: RoadClass::Tertiary,
            },
            &mut Vec::new(),
        );

        // The two components are now one.
        assert!(query::shortest_road_path(
            &world,
            TilePosition::new(0, 0),
            TilePosition::new(4, 5)
        )
        .is_some());
        // The connector relocated onto the reached road tile.
        assert_eq!(
            query::land_use(&world, agent.behavior().current_tile()),
            Some(LandUse::Road)
        );
    }

    #[test]
    fn short_detours_trigger_no_connection() {
        let mut world = dry_world(9, 9);
        // A straight road: every on-network distance equals the direct one.
        place_road(
            &mut world,
            (0..7).map(|x| TilePosition::new(x, 4)).collect(),
        );

        let mut connector = TertiaryRoadConnector::new(
            TilePosition::new(3, 4),
            relaxed_config(),
            ChaCha8Rng::seed_from_u64(9),
        );

        for _ in 0..8 {
            assert_eq!(connector.plan_road(&world), None);
        }
    }

    #[test]
    fn dead_end_walks_step_backwards() {
        let mut world = dry_world(5, 5);
        place_road(
            &mut world,
            vec![TilePosition::new(1, 1), TilePosition::new(2, 1)],
        );
        let mut connector = TertiaryRoadConnector::new(
            TilePosition::new(1, 1),
            relaxed_config(),
            ChaCha8Rng::seed_from_u64(2),
        );

        connector.move_step(&world);
        assert_eq!(connector.current_tile(), TilePosition::new(2, 1));
        connector.move_step(&world);
        assert_eq!(connector.current_tile(), TilePosition::new(1, 1));
    }
}
