//! Cross-module properties of the incrementally maintained distance field.

use cityflow_core::{Command, LandUse, RoadClass, SiteId, TilePosition};
use cityflow_world::{apply, query, GridSpec, SiteRef, TileSeed, World, UNREACHABLE};

fn world_with_river(width: i32, height: i32) -> World {
    World::new(GridSpec::new(width, height), |position| TileSeed {
        is_water: position.x() + position.y() < 3,
        elevation: (position.x() as f32 * 0.7) + (position.y() as f32 * 0.3),
    })
}

fn run(world: &mut World, command: Command) {
    apply(world, command, &mut Vec::new());
}

/// Exact distances recomputed from scratch: the minimum Manhattan distance to
/// any tile currently deriving the usage (the grid graph has no obstacles, so
/// breadth-first distance equals Manhattan distance to the nearest source).
fn brute_force_distance(world: &World, position: TilePosition, usage: LandUse) -> u16 {
    query::tiles_of_use(world, usage)
        .iter()
        .map(|source| position.manhattan_distance(*source))
        .min()
        .map_or(UNREACHABLE, |distance| distance as u16)
}

fn assert_field_converged(world: &World) {
    let spec = *query::grid(world);
    for y in 0..spec.height() {
        for x in 0..spec.width() {
            let position = TilePosition::new(x, y);
            let derived = query::land_use(world, position).expect("position is in bounds");
            for usage in LandUse::ALL {
                let cached = query::distance_to(world, position, usage)
                    .expect("position is in bounds");
                let expected = brute_force_distance(world, position, usage);
                assert_eq!(
                    cached, expected,
                    "distance to {usage:?} at {position:?} diverged from recompute"
                );
                assert_eq!(
                    cached == 0,
                    derived == usage,
                    "zero distance must coincide with matching usage at {position:?}"
                );
            }
        }
    }
}

fn parcel_at(world: &World, position: TilePosition) -> SiteId {
    match query::site_at(world, position) {
        Some(SiteRef::Multi(id)) => id,
        other => panic!("expected a registered site at {position:?}, found {other:?}"),
    }
}

#[test]
fn initial_seeding_matches_recompute() {
    let world = world_with_river(12, 9);
    assert_field_converged(&world);
}

#[test]
fn incremental_maintenance_matches_recompute_after_change_sequence() {
    let mut world = world_with_river(12, 9);

    run(
        &mut world,
        Command::PlaceRoad {
            tiles: vec![
                TilePosition::new(6, 4),
                TilePosition::new(7, 4),
                TilePosition::new(8, 4),
                TilePosition::new(8, 5),
            ],
            class: RoadClass::Primary,
        },
    );
    assert_field_converged(&world);

    run(
        &mut world,
        Command::FoundParcel {
            origin: TilePosition::new(6, 5),
            land_use: LandUse::Residential,
        },
    );
    run(
        &mut world,
        Command::FoundParcel {
            origin: TilePosition::new(9, 4),
            land_use: LandUse::Commercial,
        },
    );
    assert_field_converged(&world);

    let residential = parcel_at(&world, TilePosition::new(6, 5));
    run(
        &mut world,
        Command::ConvertParcel {
            site: residential,
            to: LandUse::Industrial,
        },
    );
    assert_field_converged(&world);

    // Paving over the commercial parcel retracts its usage entirely.
    run(
        &mut world,
        Command::PlaceRoad {
            tiles: vec![TilePosition::new(9, 4), TilePosition::new(10, 4)],
            class: RoadClass::Tertiary,
        },
    );
    assert_field_converged(&world);
    assert_eq!(
        query::distance_to(&world, TilePosition::new(9, 4), LandUse::Commercial),
        Some(UNREACHABLE)
    );
}

fn snapshot_distances(world: &World) -> Vec<u16> {
    let spec = *query::grid(world);
    let mut distances = Vec::with_capacity(spec.len() * LandUse::ALL.len());
    for y in 0..spec.height() {
        for x in 0..spec.width() {
            let position = TilePosition::new(x, y);
            for usage in LandUse::ALL {
                distances.push(
                    query::distance_to(world, position, usage).expect("position is in bounds"),
                );
            }
        }
    }
    distances
}

#[test]
fn converged_field_is_stable_across_quiet_ticks() {
    let mut world = world_with_river(10, 10);
    run(
        &mut world,
        Command::PlaceRoad {
            tiles: vec![TilePosition::new(5, 5)],
            class: RoadClass::Tertiary,
        },
    );

    let before = snapshot_distances(&world);
    run(&mut world, Command::BeginTick);
    run(&mut world, Command::CompleteTick);
    let after = snapshot_distances(&world);

    assert_eq!(before, after);
}
