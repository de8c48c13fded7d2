#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Cityflow.
//!
//! The world owns the tile grid, the multi-tile site registry and the cached
//! per-usage distance field. Every mutation flows through [`apply`] so that
//! the tile/site back-references and the distance caches are restored before
//! any notification is emitted.

use std::collections::BTreeMap;

use cityflow_core::{
    Command, Event, LandUse, ParcelRejection, RoadClass, RoadRejection, SiteId,
    SiteUpdateRejection, Tick, TilePosition,
};

mod distance;
pub mod query;
mod value;

use distance::DistanceField;

/// Sentinel distance meaning "no tile of that usage exists or is reachable".
pub const UNREACHABLE: u16 = u16::MAX;

/// Describes the discrete tile layout of the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridSpec {
    width: i32,
    height: i32,
}

impl GridSpec {
    /// Creates a new grid description; non-positive dimensions collapse to an
    /// empty grid rather than wrapping.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(0),
            height: height.max(0),
        }
    }

    /// Number of tile columns in the grid.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Number of tile rows in the grid.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Total number of tiles in the grid.
    #[must_use]
    pub fn len(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Reports whether the grid holds no tiles at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reports whether the provided position lies inside the grid.
    #[must_use]
    pub const fn contains(&self, position: TilePosition) -> bool {
        position.x() >= 0
            && position.x() < self.width
            && position.y() >= 0
            && position.y() < self.height
    }

    /// Row-major storage index of the provided position, if in bounds.
    #[must_use]
    pub fn index_of(&self, position: TilePosition) -> Option<usize> {
        if self.contains(position) {
            Some((position.y() as usize) * (self.width as usize) + (position.x() as usize))
        } else {
            None
        }
    }

    /// Position stored at the provided row-major index.
    #[must_use]
    pub fn position_of(&self, index: usize) -> TilePosition {
        let width = self.width.max(1) as usize;
        TilePosition::new((index % width) as i32, (index / width) as i32)
    }

    /// 4-connected neighbor indices of the provided storage index.
    pub(crate) fn neighbor_indices(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let position = self.position_of(index);
        [(0, -1), (-1, 0), (1, 0), (0, 1)]
            .into_iter()
            .filter_map(move |(dx, dy)| self.index_of(position.offset(dx, dy)))
    }
}

/// Static per-tile inputs supplied by the bootstrap collaborator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileSeed {
    /// Marks the tile as permanent water.
    pub is_water: bool,
    /// Terrain elevation of the tile.
    pub elevation: f32,
}

/// One grid cell. Position, elevation and the water flag are fixed for the
/// lifetime of the world; only the occupying-site reference mutates, and only
/// through [`apply`].
#[derive(Clone, Debug)]
pub struct Tile {
    position: TilePosition,
    elevation: f32,
    is_water: bool,
    site: Option<SiteId>,
}

impl Tile {
    /// Grid position of the tile.
    #[must_use]
    pub const fn position(&self) -> TilePosition {
        self.position
    }

    /// Terrain elevation of the tile.
    #[must_use]
    pub const fn elevation(&self) -> f32 {
        self.elevation
    }

    /// Reports whether the tile is permanent water.
    #[must_use]
    pub const fn is_water(&self) -> bool {
        self.is_water
    }

    /// Reports whether development may ever claim the tile.
    #[must_use]
    pub const fn is_buildable(&self) -> bool {
        !self.is_water
    }

    /// Identifier of the occupying multi-tile site, if any.
    #[must_use]
    pub const fn site(&self) -> Option<SiteId> {
        self.site
    }
}

/// Tagged payload distinguishing the multi-tile site variants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SiteKind {
    /// Developed land carrying population.
    Parcel {
        /// Number of inhabitants across the parcel.
        population: f32,
    },
    /// Part of the road network.
    Road {
        /// Network classification of the segment.
        class: RoadClass,
    },
}

/// A multi-tile site: several tiles aggregated under one usage type.
///
/// The tile list is never empty while the site is stored; removing the last
/// tile destroys the site.
#[derive(Clone, Debug)]
pub struct SiteState {
    id: SiteId,
    land_use: LandUse,
    tiles: Vec<TilePosition>,
    created: Tick,
    kind: SiteKind,
}

impl SiteState {
    /// Identifier allocated to the site by the world.
    #[must_use]
    pub const fn id(&self) -> SiteId {
        self.id
    }

    /// Usage currently derived by every covered tile.
    #[must_use]
    pub const fn land_use(&self) -> LandUse {
        self.land_use
    }

    /// Ordered tiles covered by the site; the first is the anchor.
    #[must_use]
    pub fn tiles(&self) -> &[TilePosition] {
        &self.tiles
    }

    /// Anchor position representing the site in circle queries.
    #[must_use]
    pub fn anchor(&self) -> TilePosition {
        self.tiles[0]
    }

    /// Number of tiles covered by the site.
    #[must_use]
    pub fn area(&self) -> usize {
        self.tiles.len()
    }

    /// Tick at which the site was committed.
    #[must_use]
    pub const fn created(&self) -> Tick {
        self.created
    }

    /// Number of ticks the site has existed.
    #[must_use]
    pub fn age(&self, now: Tick) -> Tick {
        now.saturating_sub(self.created)
    }

    /// Variant payload of the site.
    #[must_use]
    pub const fn kind(&self) -> &SiteKind {
        &self.kind
    }

    /// Population of the site, if it is a parcel.
    #[must_use]
    pub const fn population(&self) -> Option<f32> {
        match self.kind {
            SiteKind::Parcel { population } => Some(population),
            SiteKind::Road { .. } => None,
        }
    }

    /// Inhabitants per tile, if the site is a parcel.
    ///
    /// The registry never stores an empty site, so the area is always
    /// positive.
    #[must_use]
    pub fn density(&self) -> Option<f32> {
        self.population()
            .map(|population| population / self.area() as f32)
    }

    /// Network classification, if the site is a road segment.
    #[must_use]
    pub const fn road_class(&self) -> Option<RoadClass> {
        match self.kind {
            SiteKind::Parcel { .. } => None,
            SiteKind::Road { class } => Some(class),
        }
    }
}

/// Polymorphic reference to a developable unit: a bare tile acting as its own
/// site, or a registered multi-tile site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SiteRef {
    /// A single unclaimed (or water) tile.
    Lot(TilePosition),
    /// A registered multi-tile site.
    Multi(SiteId),
}

/// Represents the authoritative Cityflow world state.
#[derive(Clone, Debug)]
pub struct World {
    pub(crate) spec: GridSpec,
    pub(crate) tiles: Vec<Tile>,
    pub(crate) sites: BTreeMap<SiteId, SiteState>,
    next_site_id: u32,
    pub(crate) distance: DistanceField,
    pub(crate) tick: Tick,
}

impl World {
    /// Creates a new world, generating every tile through the provided seed
    /// function and converging the distance field once for every usage.
    pub fn new<F>(spec: GridSpec, mut seed: F) -> Self
    where
        F: FnMut(TilePosition) -> TileSeed,
    {
        let mut tiles = Vec::with_capacity(spec.len());
        for index in 0..spec.len() {
            let position = spec.position_of(index);
            let generated = seed(position);
            tiles.push(Tile {
                position,
                elevation: generated.elevation,
                is_water: generated.is_water,
                site: None,
            });
        }

        let mut world = Self {
            spec,
            tiles,
            sites: BTreeMap::new(),
            next_site_id: 0,
            distance: DistanceField::new(&spec),
            tick: 0,
        };
        world.converge_distances();
        world
    }

    fn converge_distances(&mut self) {
        for usage in LandUse::ALL {
            let sources: Vec<usize> = (0..self.spec.len())
                .filter(|&index| self.land_use_at(index) == usage)
                .collect();
            self.distance.seed(&self.spec, usage, &sources);
        }
    }

    /// Derived usage of the tile at the provided storage index.
    pub(crate) fn land_use_at(&self, index: usize) -> LandUse {
        let tile = &self.tiles[index];
        if tile.is_water {
            return LandUse::Water;
        }
        match tile.site {
            Some(id) => self
                .sites
                .get(&id)
                .map_or(LandUse::None, SiteState::land_use),
            None => LandUse::None,
        }
    }

    /// Cached distance from the tile at `index` to the nearest `usage` tile.
    pub(crate) fn cached_distance(&self, index: usize, usage: LandUse) -> u16 {
        self.distance.distance(usage, index)
    }

    fn allocate_site_id(&mut self) -> SiteId {
        let id = SiteId::new(self.next_site_id);
        self.next_site_id = self.next_site_id.wrapping_add(1);
        id
    }

    fn found_parcel(
        &mut self,
        origin: TilePosition,
        land_use: LandUse,
        out_events: &mut Vec<Event>,
    ) {
        let validated = if !is_parcel_use(land_use) {
            Err(ParcelRejection::UnsupportedUse)
        } else {
            match self.spec.index_of(origin) {
                None => Err(ParcelRejection::OutOfBounds),
                Some(index) if self.tiles[index].is_water => Err(ParcelRejection::Water),
                Some(index) if self.tiles[index].site.is_some() => Err(ParcelRejection::Occupied),
                Some(index) => Ok(index),
            }
        };

        let index = match validated {
            Ok(index) => index,
            Err(reason) => {
                log::debug!("parcel foundation at {origin:?} rejected: {reason:?}");
                out_events.push(Event::ParcelRejected {
                    origin,
                    land_use,
                    reason,
                });
                return;
            }
        };
        let site = self.allocate_site_id();
        let state = SiteState {
            id: site,
            land_use,
            tiles: vec![origin],
            created: self.tick,
            kind: SiteKind::Parcel { population: 0.0 },
        };
        let _ = self.sites.insert(site, state);
        self.tiles[index].site = Some(site);
        self.distance
            .usage_changed(&self.spec, index, LandUse::None, land_use);

        out_events.push(Event::ParcelFounded {
            site,
            origin,
            land_use,
        });
        out_events.push(Event::TileUsageChanged {
            position: origin,
            old: LandUse::None,
            new: land_use,
        });
    }

    fn densify_parcel(&mut self, site: SiteId, out_events: &mut Vec<Event>) {
        let updated = match self.sites.get_mut(&site) {
            None => Err(SiteUpdateRejection::MissingSite),
            Some(state) => match &mut state.kind {
                SiteKind::Road { .. } => Err(SiteUpdateRejection::NotAParcel),
                SiteKind::Parcel { population } => {
                    *population += 1.0;
                    Ok(*population)
                }
            },
        };

        match updated {
            Ok(population) => out_events.push(Event::ParcelDensified { site, population }),
            Err(reason) => {
                log::debug!("densify of site {site:?} rejected: {reason:?}");
                out_events.push(Event::SiteUpdateRejected { site, reason });
            }
        }
    }

    fn convert_parcel(&mut self, site: SiteId, to: LandUse, out_events: &mut Vec<Event>) {
        let converted = if !is_parcel_use(to) {
            Err(SiteUpdateRejection::UnsupportedUse)
        } else {
            match self.sites.get_mut(&site) {
                None => Err(SiteUpdateRejection::MissingSite),
                Some(state) => match state.kind {
                    SiteKind::Road { .. } => Err(SiteUpdateRejection::NotAParcel),
                    SiteKind::Parcel { .. } => {
                        let from = state.land_use;
                        if from == to {
                            return;
                        }
                        state.land_use = to;
                        Ok((from, state.tiles.clone()))
                    }
                },
            }
        };

        match converted {
            Ok((from, positions)) => {
                for index in positions.iter().filter_map(|p| self.spec.index_of(*p)) {
                    self.distance.usage_changed(&self.spec, index, from, to);
                }
                out_events.push(Event::SiteUsageChanged {
                    site,
                    old: from,
                    new: to,
                });
                for position in positions {
                    out_events.push(Event::TileUsageChanged {
                        position,
                        old: from,
                        new: to,
                    });
                }
                out_events.push(Event::ParcelConverted { site, from, to });
            }
            Err(reason) => {
                log::debug!("conversion of site {site:?} rejected: {reason:?}");
                out_events.push(Event::SiteUpdateRejected { site, reason });
            }
        }
    }

    fn place_road(
        &mut self,
        tiles: Vec<TilePosition>,
        class: RoadClass,
        out_events: &mut Vec<Event>,
    ) {
        let mut indices = Vec::with_capacity(tiles.len());
        let reason = if tiles.is_empty() {
            Some(RoadRejection::Empty)
        } else {
            let mut failure = None;
            for &position in &tiles {
                let Some(index) = self.spec.index_of(position) else {
                    failure = Some(RoadRejection::OutOfBounds);
                    break;
                };
                if self.tiles[index].is_water {
                    failure = Some(RoadRejection::Water);
                    break;
                }
                if self.land_use_at(index) == LandUse::Road {
                    failure = Some(RoadRejection::AlreadyRoad);
                    break;
                }
                if indices.contains(&index) {
                    failure = Some(RoadRejection::Duplicate);
                    break;
                }
                indices.push(index);
            }
            failure
        };

        if let Some(reason) = reason {
            log::debug!("road placement of {} tiles rejected: {reason:?}", tiles.len());
            out_events.push(Event::RoadRejected { reason });
            return;
        }

        // Pave over any parcels covering the tiles; a parcel losing its last
        // tile is destroyed, never left empty in the registry.
        let mut destroyed: Vec<(SiteId, LandUse)> = Vec::new();
        let mut old_uses = Vec::with_capacity(indices.len());
        for (&position, &index) in tiles.iter().zip(indices.iter()) {
            old_uses.push(self.land_use_at(index));
            if let Some(previous) = self.tiles[index].site {
                if let Some(state) = self.sites.get_mut(&previous) {
                    state.tiles.retain(|&p| p != position);
                    if state.tiles.is_empty() {
                        let removed = self.sites.remove(&previous);
                        if let Some(removed) = removed {
                            destroyed.push((removed.id, removed.land_use));
                        }
                    }
                }
                self.tiles[index].site = None;
            }
        }

        let site = self.allocate_site_id();
        let state = SiteState {
            id: site,
            land_use: LandUse::Road,
            tiles: tiles.clone(),
            created: self.tick,
            kind: SiteKind::Road { class },
        };
        let _ = self.sites.insert(site, state);
        for (&index, &old) in indices.iter().zip(old_uses.iter()) {
            self.tiles[index].site = Some(site);
            self.distance
                .usage_changed(&self.spec, index, old, LandUse::Road);
        }

        for (id, land_use) in destroyed {
            log::info!("site {id:?} ({land_use:?}) paved over and destroyed");
            out_events.push(Event::SiteDestroyed { site: id, land_use });
        }
        out_events.push(Event::RoadPlaced {
            site,
            class,
            length: tiles.len(),
        });
        for (position, old) in tiles.into_iter().zip(old_uses) {
            out_events.push(Event::TileUsageChanged {
                position,
                old,
                new: LandUse::Road,
            });
        }
    }
}

const fn is_parcel_use(usage: LandUse) -> bool {
    matches!(
        usage,
        LandUse::Residential | LandUse::Commercial | LandUse::Industrial | LandUse::Park
    )
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Notifications are pushed to `out_events` only after every invariant,
/// including distance-field convergence, has been restored.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::BeginTick => {
            out_events.push(Event::BeforeTick { tick: world.tick });
        }
        Command::CompleteTick => {
            out_events.push(Event::AfterTick { tick: world.tick });
            world.tick = world.tick.saturating_add(1);
        }
        Command::FoundParcel { origin, land_use } => {
            world.found_parcel(origin, land_use, out_events);
        }
        Command::DensifyParcel { site } => {
            world.densify_parcel(site, out_events);
        }
        Command::ConvertParcel { site, to } => {
            world.convert_parcel(site, to, out_events);
        }
        Command::PlaceRoad { tiles, class } => {
            world.place_road(tiles, class, out_events);
        }
    }
}
