#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Property developer agent: the prospect → build → evaluate → commit loop.
//!
//! Each tick the developer moves toward cheap developable land, refreshes its
//! candidate set, and proposes a hypothetical development for every candidate.
//! Profitable proposals become commands; everything else is dropped without
//! touching the world.

use cityflow_core::{Command, LandUse, TilePosition};
use cityflow_scheduler::Agent;
use cityflow_world::{query, SiteKind, SiteRef, World};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Tuning knobs shared by every property developer.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Prospecting radius around the current tile.
    pub radius: i32,
    /// Minimum value ratio a redevelopment must clear to be committed.
    pub profitability_threshold: f32,
    /// Ticks without a commit before the developer relocates globally.
    pub relocation_timeout: u64,
}

impl Config {
    /// Creates a configuration with explicit field values.
    #[must_use]
    pub const fn new(radius: i32, profitability_threshold: f32, relocation_timeout: u64) -> Self {
        Self {
            radius,
            profitability_threshold,
            relocation_timeout,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            radius: 5,
            profitability_threshold: 0.1,
            relocation_timeout: 10,
        }
    }
}

/// Parcel-size bounds supplied by the bootstrap roster.
///
/// Reserved for multi-tile parcel growth; foundations are single-tile, so the
/// bounds currently only describe the roster entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeRange {
    min: u32,
    max: u32,
}

impl SizeRange {
    /// Creates a new size range.
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Smallest parcel area the roster entry may develop.
    #[must_use]
    pub const fn min(&self) -> u32 {
        self.min
    }

    /// Largest parcel area the roster entry may develop.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }
}

/// Agent that grows parcels of a single target usage.
#[derive(Clone, Debug)]
pub struct PropertyDeveloper {
    land_use: LandUse,
    size_range: SizeRange,
    config: Config,
    current: TilePosition,
    candidates: Vec<SiteRef>,
    ticks_since_commit: u64,
    rng: ChaCha8Rng,
}

impl PropertyDeveloper {
    /// Creates a developer targeting `land_use`, starting on `start`.
    #[must_use]
    pub fn new(
        land_use: LandUse,
        size_range: SizeRange,
        start: TilePosition,
        config: Config,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            land_use,
            size_range,
            config,
            current: start,
            candidates: Vec::new(),
            ticks_since_commit: 0,
            rng,
        }
    }

    /// Usage this developer builds.
    #[must_use]
    pub const fn land_use(&self) -> LandUse {
        self.land_use
    }

    /// Parcel-size bounds supplied by the roster.
    #[must_use]
    pub const fn size_range(&self) -> SizeRange {
        self.size_range
    }

    /// Tile the developer currently prospects from.
    #[must_use]
    pub const fn current_tile(&self) -> TilePosition {
        self.current
    }

    /// A site the developer may act on: a convertible parcel, or a bare
    /// road-adjacent tile.
    fn is_developable(&self, world: &World, site_ref: &SiteRef) -> bool {
        match site_ref {
            SiteRef::Lot(position) => {
                query::land_use(world, *position) == Some(LandUse::None)
                    && query::is_road_adjacent(world, *position)
            }
            SiteRef::Multi(id) => query::site(world, *id).is_some_and(|state| {
                matches!(state.kind(), SiteKind::Parcel { .. })
                    && self
                        .land_use
                        .convertible_sources()
                        .contains(&state.land_use())
            }),
        }
    }

    fn prospect(&mut self, world: &World) {
        let relocate = self.candidates.is_empty()
            || self.ticks_since_commit >= self.config.relocation_timeout;

        if relocate {
            self.relocate(world);
        } else if let Some(best) = self.cheapest_candidate(world) {
            self.current = best;
        }

        self.candidates = query::sites_in_circle(world, self.current, self.config.radius)
            .into_iter()
            .filter(|site_ref| self.is_developable(world, site_ref))
            .collect();
    }

    fn cheapest_candidate(&self, world: &World) -> Option<TilePosition> {
        let mut ranked: Vec<(f32, TilePosition)> = self
            .candidates
            .iter()
            .filter_map(|site_ref| {
                let anchor = query::site_anchor(world, site_ref)?;
                Some((query::site_value(world, site_ref), anchor))
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        ranked.first().map(|&(_, anchor)| anchor)
    }

    /// Global relocation: all developable tiles ordered by ascending value,
    /// then a uniform random pick across the whole sorted set.
    fn relocate(&mut self, world: &World) {
        let mut ranked: Vec<(f32, TilePosition)> = Vec::new();
        let spec = query::grid(world);
        for y in 0..spec.height() {
            for x in 0..spec.width() {
                let position = TilePosition::new(x, y);
                let Some(site_ref) = query::site_at(world, position) else {
                    continue;
                };
                if !self.is_developable(world, &site_ref) {
                    continue;
                }
                ranked.push((query::site_value(world, &site_ref), position));
            }
        }
        if ranked.is_empty() {
            log::debug!(
                "{}: no developable tiles anywhere, staying at {:?}",
                self.label(),
                self.current
            );
            return;
        }
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let pick = self.rng.gen_range(0..ranked.len());
        self.current = ranked[pick].1;
        self.candidates.clear();
        self.ticks_since_commit = 0;
        log::debug!("{}: relocated to {:?}", self.label(), self.current);
    }

    /// Build + evaluate: returns the command for a profitable development of
    /// the candidate, if any.
    fn develop(&self, world: &World, site_ref: &SiteRef) -> Option<Command> {
        match site_ref {
            SiteRef::Lot(position) => {
                // A brand-new parcel is always worth founding.
                Some(Command::FoundParcel {
                    origin: *position,
                    land_use: self.land_use,
                })
            }
            SiteRef::Multi(id) => {
                let state = query::site(world, *id)?;
                let old_value = query::site_value_for(world, site_ref, state.land_use());
                if state.land_use() == self.land_use {
                    // Densification: population does not feed the value
                    // model, so the ratio is evaluated on unchanged values.
                    self.profitable(old_value, old_value)
                        .then_some(Command::DensifyParcel { site: *id })
                } else {
                    let new_value = query::site_value_for(world, site_ref, self.land_use);
                    self.profitable(new_value, old_value)
                        .then_some(Command::ConvertParcel {
                            site: *id,
                            to: self.land_use,
                        })
                }
            }
        }
    }

    /// Ratio rule: `new / old >= 1 + threshold`, expressed without division
    /// so zero-valued parcels cannot produce NaN comparisons.
    fn profitable(&self, new_value: f32, old_value: f32) -> bool {
        if old_value <= 0.0 {
            new_value > 0.0
        } else {
            new_value >= old_value * (1.0 + self.config.profitability_threshold)
        }
    }
}

impl Agent for PropertyDeveloper {
    fn label(&self) -> &str {
        match self.land_use {
            LandUse::Residential => "residential-developer",
            LandUse::Commercial => "commercial-developer",
            LandUse::Industrial => "industrial-developer",
            LandUse::Park => "park-developer",
            LandUse::Road | LandUse::Water | LandUse::None => "idle-developer",
        }
    }

    fn update(&mut self, world: &World, out: &mut Vec<Command>) {
        self.prospect(world);

        let before = out.len();
        for site_ref in &self.candidates {
            if let Some(command) = self.develop(world, site_ref) {
                out.push(command);
            }
        }

        if out.len() > before {
            self.ticks_since_commit = 0;
        } else {
            self.ticks_since_commit = self.ticks_since_commit.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cityflow_core::RoadClass;
    use cityflow_world::{apply, GridSpec, TileSeed};
    use rand::SeedableRng;

    fn developer(land_use: LandUse, start: TilePosition) -> PropertyDeveloper {
        PropertyDeveloper::new(
            land_use,
            SizeRange::new(1, 4),
            start,
            Config::default(),
            ChaCha8Rng::seed_from_u64(7),
        )
    }

    fn world_with_road(width: i32, height: i32, road: TilePosition) -> World {
        let mut world = World::new(GridSpec::new(width, height), |_| TileSeed {
            is_water: false,
            elevation: 0.0,
        });
        apply(
            &mut world,
            Command::PlaceRoad {
                tiles: vec![road],
                class: RoadClass::Tertiary,
            },
            &mut Vec::new(),
        );
        world
    }

    #[test]
    fn bare_tiles_need_road_access_to_be_developable() {
        let world = world_with_road(7, 7, TilePosition::new(3, 3));
        let agent = developer(LandUse::Residential, TilePosition::new(3, 3));

        assert!(agent.is_developable(&world, &SiteRef::Lot(TilePosition::new(3, 2))));
        assert!(!agent.is_developable(&world, &SiteRef::Lot(TilePosition::new(0, 0))));
    }

    #[test]
    fn update_founds_parcels_on_road_adjacent_lots() {
        let world = world_with_road(7, 7, TilePosition::new(3, 3));
        let mut agent = developer(LandUse::Residential, TilePosition::new(3, 3));
        let mut commands = Vec::new();

        agent.update(&world, &mut commands);

        assert!(commands.iter().any(|command| matches!(
            command,
            Command::FoundParcel {
                land_use: LandUse::Residential,
                ..
            }
        )));
        assert_eq!(agent.ticks_since_commit, 0);
    }

    #[test]
    fn profitability_accepts_the_exact_threshold_ratio() {
        let agent = developer(LandUse::Commercial, TilePosition::new(0, 0));

        assert!(agent.profitable(1.1, 1.0));
        assert!(agent.profitable(2.2, 2.0));
        assert!(!agent.profitable(1.09, 1.0));
        // Zero-valued parcels convert only when the new usage has any value.
        assert!(agent.profitable(0.5, 0.0));
        assert!(!agent.profitable(0.0, 0.0));
    }

    #[test]
    fn starved_developer_relocates_after_the_timeout() {
        // No road network beyond one tile on a water-locked map: nothing is
        // developable, so the candidate list stays empty and the agent keeps
        // counting idle ticks instead of committing.
        let world = World::new(GridSpec::new(4, 4), |_| TileSeed {
            is_water: true,
            elevation: 0.0,
        });
        let mut agent = developer(LandUse::Industrial, TilePosition::new(1, 1));

        for _ in 0..3 {
            agent.update(&world, &mut Vec::new());
        }

        assert!(agent.candidates.is_empty());
        assert_eq!(agent.ticks_since_commit, 3);
        assert_eq!(agent.current_tile(), TilePosition::new(1, 1));
    }
}
