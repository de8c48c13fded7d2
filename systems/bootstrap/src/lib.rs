#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Bootstrap system that prepares a Cityflow run.
//!
//! Generates the deterministic terrain, commits the seed road, and builds the
//! default agent roster. Every random stream is derived from the single
//! global seed with labelled SHA-256 hashing, so inserting or reordering one
//! consumer never perturbs another's stream.

use cityflow_core::{Command, LandUse, RoadClass, TilePosition};
use cityflow_scheduler::{Agent, Scheduler};
use cityflow_system_property_developer::{
    Config as DeveloperConfig, PropertyDeveloper, SizeRange,
};
use cityflow_system_road_developer::{
    ConnectorConfig, ExtenderConfig, RoadDeveloper, TertiaryRoadConnector, TertiaryRoadExtender,
};
use cityflow_world::{apply, query, GridSpec, Tile, TileSeed, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Configuration of the generated map and the global random seed.
#[derive(Clone, Copy, Debug)]
pub struct MapConfig {
    /// Number of tile columns.
    pub width: i32,
    /// Number of tile rows.
    pub height: i32,
    /// Global seed every random stream is derived from.
    pub seed: u64,
    /// Width of the water band along the low-coordinate corner.
    pub river_width: i32,
    /// Width of the water channel along the main diagonal.
    pub channel_width: i32,
    /// Upper bound of the sampled terrain elevation.
    pub elevation_range: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            seed: 1337,
            river_width: 6,
            channel_width: 2,
            elevation_range: 5.0,
        }
    }
}

/// Derives an independent `u64` seed from the global seed, a stream label and
/// a stream index.
#[must_use]
pub fn derive_seed(global: u64, label: &str, index: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(global.to_le_bytes());
    hasher.update(label.as_bytes());
    hasher.update(index.to_le_bytes());
    let digest = hasher.finalize();
    let bytes: [u8; 8] = digest[0..8].try_into().expect("sha256 digest slice length");
    u64::from_le_bytes(bytes)
}

/// Builds the world and the default agent roster for the provided map.
///
/// The roster mirrors a small founding expedition: one property developer per
/// developable usage, two road extenders and one road connector, all starting
/// on the seed road near the grid center.
#[must_use]
pub fn bootstrap(config: &MapConfig) -> (World, Scheduler) {
    let mut terrain_rng = ChaCha8Rng::seed_from_u64(derive_seed(config.seed, "terrain", 0));
    let river_width = config.river_width;
    let channel_width = config.channel_width;
    let elevation_range = config.elevation_range.max(f32::MIN_POSITIVE);

    let mut world = World::new(GridSpec::new(config.width, config.height), |position| {
        TileSeed {
            is_water: position.x() + position.y() < river_width
                || (position.x() - position.y()).abs() < channel_width,
            elevation: terrain_rng.gen_range(0.0..elevation_range),
        }
    });

    let Some(seed_tile) = seed_road_site(&world) else {
        log::warn!("map is all water, starting without a seed road");
        return (world, Scheduler::new(Vec::new()));
    };
    apply(
        &mut world,
        Command::PlaceRoad {
            tiles: vec![seed_tile],
            class: RoadClass::Tertiary,
        },
        &mut Vec::new(),
    );
    log::info!("seed road committed at {seed_tile:?}");

    let developer = |index: u32, land_use: LandUse, size_range: SizeRange| {
        Box::new(PropertyDeveloper::new(
            land_use,
            size_range,
            seed_tile,
            DeveloperConfig::default(),
            ChaCha8Rng::seed_from_u64(derive_seed(config.seed, "agent", index)),
        )) as Box<dyn Agent>
    };
    let extender = |index: u32| {
        Box::new(RoadDeveloper::new(TertiaryRoadExtender::new(
            seed_tile,
            ExtenderConfig::default(),
            ChaCha8Rng::seed_from_u64(derive_seed(config.seed, "agent", index)),
        ))) as Box<dyn Agent>
    };
    let connector = |index: u32| {
        Box::new(RoadDeveloper::new(TertiaryRoadConnector::new(
            seed_tile,
            ConnectorConfig::default(),
            ChaCha8Rng::seed_from_u64(derive_seed(config.seed, "agent", index)),
        ))) as Box<dyn Agent>
    };

    let agents: Vec<Box<dyn Agent>> = vec![
        developer(0, LandUse::Residential, SizeRange::new(1, 4)),
        developer(1, LandUse::Commercial, SizeRange::new(1, 6)),
        developer(2, LandUse::Industrial, SizeRange::new(1, 6)),
        extender(3),
        extender(4),
        connector(5),
    ];

    (world, Scheduler::new(agents))
}

/// First buildable tile by Manhattan distance from the grid center, with a
/// deterministic position tie-break.
fn seed_road_site(world: &World) -> Option<TilePosition> {
    let spec = query::grid(world);
    let center = TilePosition::new(spec.width() / 2, spec.height() / 2);
    let mut best: Option<(u32, TilePosition)> = None;
    for y in 0..spec.height() {
        for x in 0..spec.width() {
            let position = TilePosition::new(x, y);
            let buildable = query::tile_at(world, position)
                .is_some_and(Tile::is_buildable);
            if !buildable {
                continue;
            }
            let candidate = (center.manhattan_distance(position), position);
            if best.map_or(true, |current| candidate < current) {
                best = Some(candidate);
            }
        }
    }
    best.map(|(_, position)| position)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> MapConfig {
        MapConfig {
            width: 24,
            height: 24,
            seed,
            ..MapConfig::default()
        }
    }

    fn land_use_map(world: &World) -> Vec<Option<LandUse>> {
        let spec = *query::grid(world);
        (0..spec.height())
            .flat_map(|y| (0..spec.width()).map(move |x| TilePosition::new(x, y)))
            .map(|position| query::land_use(world, position))
            .collect()
    }

    #[test]
    fn bootstrap_commits_one_seed_road_on_land() {
        let (world, scheduler) = bootstrap(&small_config(42));

        let roads = query::tiles_of_use(&world, LandUse::Road);
        assert_eq!(roads.len(), 1);
        assert!(query::tile_at(&world, roads[0])
            .is_some_and(Tile::is_buildable));
        assert_eq!(scheduler.agent_count(), 6);
    }

    #[test]
    fn terrain_carries_the_corner_river_and_diagonal_channel() {
        let (world, _) = bootstrap(&small_config(42));

        assert_eq!(
            query::land_use(&world, TilePosition::new(0, 0)),
            Some(LandUse::Water)
        );
        assert_eq!(
            query::land_use(&world, TilePosition::new(12, 12)),
            Some(LandUse::Water)
        );
        assert_eq!(
            query::land_use(&world, TilePosition::new(20, 4)),
            Some(LandUse::None)
        );
    }

    #[test]
    fn identical_seeds_replay_identical_worlds() {
        let (mut world_a, mut scheduler_a) = bootstrap(&small_config(7));
        let (mut world_b, mut scheduler_b) = bootstrap(&small_config(7));

        for _ in 0..10 {
            scheduler_a.run_tick(&mut world_a, &mut Vec::new());
            scheduler_b.run_tick(&mut world_b, &mut Vec::new());
        }

        assert_eq!(land_use_map(&world_a), land_use_map(&world_b));
        assert_eq!(query::tick(&world_a), 10);
    }

    #[test]
    fn different_seeds_generate_different_terrain() {
        let (world_a, _) = bootstrap(&small_config(7));
        let (world_b, _) = bootstrap(&small_config(8));

        let elevations = |world: &World| -> Vec<f32> {
            let spec = *query::grid(world);
            (0..spec.height())
                .flat_map(|y| (0..spec.width()).map(move |x| TilePosition::new(x, y)))
                .filter_map(|position| query::tile_at(world, position).map(Tile::elevation))
                .collect()
        };

        assert_ne!(elevations(&world_a), elevations(&world_b));
    }

    #[test]
    fn seed_derivation_separates_streams() {
        assert_ne!(derive_seed(1, "terrain", 0), derive_seed(1, "agent", 0));
        assert_ne!(derive_seed(1, "agent", 0), derive_seed(1, "agent", 1));
        assert_eq!(derive_seed(1, "agent", 3), derive_seed(1, "agent", 3));
    }
}
