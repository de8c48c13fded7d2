#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless Cityflow simulation.

use anyhow::Context;
use clap::Parser;

use cityflow_core::{Event, LandUse, TilePosition};
use cityflow_system_bootstrap::{bootstrap, MapConfig};
use cityflow_world::{query, SiteKind, World};

mod snapshot;

use snapshot::CitySnapshot;

/// Grows a city on a tile grid and reports the result.
#[derive(Debug, Parser)]
#[command(name = "cityflow", version, about)]
enum Cli {
    /// Runs a simulation and prints the final census.
    Run(RunArgs),
    /// Decodes a city snapshot string and prints its summary.
    Decode {
        /// Snapshot produced by `cityflow run --export`.
        snapshot: String,
    },
}

/// Parameters of a simulation run.
#[derive(Debug, clap::Args)]
struct RunArgs {
    /// Number of tile columns.
    #[arg(long, default_value_t = 100)]
    width: i32,
    /// Number of tile rows.
    #[arg(long, default_value_t = 100)]
    height: i32,
    /// Global random seed; identical seeds replay identical runs.
    #[arg(long, default_value_t = 1337)]
    seed: u64,
    /// Number of simulation steps to run.
    #[arg(long, default_value_t = 200)]
    ticks: u64,
    /// Prints an ASCII land-use map after the run.
    #[arg(long)]
    map: bool,
    /// Prints a shareable layout snapshot after the run.
    #[arg(long)]
    export: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    match Cli::parse() {
        Cli::Run(args) => run(&args),
        Cli::Decode { snapshot } => decode(&snapshot),
    }
}

fn run(args: &RunArgs) -> anyhow::Result<()> {
    let config = MapConfig {
        width: args.width,
        height: args.height,
        seed: args.seed,
        ..MapConfig::default()
    };
    let (mut world, mut scheduler) = bootstrap(&config);

    let mut events = Vec::new();
    for _ in 0..args.ticks {
        events.clear();
        scheduler.run_tick(&mut world, &mut events);
        log_tick(&events);
    }

    print_census(&world);
    if args.map {
        println!("{}", ascii_map(&world));
    }
    if args.export {
        println!("{}", CitySnapshot::capture(&world).encode());
    }
    Ok(())
}

fn decode(snapshot: &str) -> anyhow::Result<()> {
    let decoded = CitySnapshot::decode(snapshot).context("failed to decode city snapshot")?;
    println!(
        "{}x{} layout, {} site(s), {} road tile(s), {} covered tile(s)",
        decoded.width,
        decoded.height,
        decoded.sites.len(),
        decoded.road_tile_count(),
        decoded.covered_positions().count()
    );
    Ok(())
}

fn log_tick(events: &[Event]) {
    let mut founded = 0usize;
    let mut converted = 0usize;
    let mut roads = 0usize;
    let mut tick = 0;
    for event in events {
        match event {
            Event::BeforeTick { tick: index } => tick = *index,
            Event::ParcelFounded { .. } => founded += 1,
            Event::ParcelConverted { .. } => converted += 1,
            Event::RoadPlaced { .. } => roads += 1,
            _ => {}
        }
    }
    if founded + converted + roads > 0 {
        log::debug!(
            "tick {tick}: {founded} parcel(s) founded, {converted} converted, {roads} road segment(s)"
        );
    }
}

fn print_census(world: &World) {
    let mut parcels = 0usize;
    let mut population = 0.0f32;
    let mut segments = 0usize;
    let mut road_tiles = 0usize;
    for state in query::sites(world) {
        match state.kind() {
            SiteKind::Parcel {
                population: inhabitants,
            } => {
                parcels += 1;
                population += inhabitants;
            }
            SiteKind::Road { .. } => {
                segments += 1;
                road_tiles += state.area();
            }
        }
    }
    println!(
        "tick {}: {parcels} parcel(s) housing {population:.0}, {segments} road segment(s) over {road_tiles} tile(s)",
        query::tick(world)
    );
}

fn ascii_map(world: &World) -> String {
    let spec = query::grid(world);
    let width = spec.width() as usize;
    let mut map = String::with_capacity((width + 1) * spec.height() as usize);
    for y in 0..spec.height() {
        for x in 0..spec.width() {
            let glyph = match query::land_use(world, TilePosition::new(x, y)) {
                Some(LandUse::Residential) => 'r',
                Some(LandUse::Commercial) => 'c',
                Some(LandUse::Industrial) => 'i',
                Some(LandUse::Park) => 'p',
                Some(LandUse::Road) => '#',
                Some(LandUse::Water) => '~',
                Some(LandUse::None) | None => '.',
            };
            map.push(glyph);
        }
        map.push('\n');
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use cityflow_world::{GridSpec, TileSeed};

    #[test]
    fn ascii_map_draws_water_and_land() {
        let world = World::new(GridSpec::new(3, 2), |position| TileSeed {
            is_water: position.y() == 0,
            elevation: 0.0,
        });

        assert_eq!(ascii_map(&world), "~~~\n...\n");
    }
}
