#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Cityflow engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure agent systems. Agents submit [`Command`]
//! values describing desired mutations, the world executes those commands via
//! its `apply` entry point, and then broadcasts [`Event`] values describing
//! what actually happened. Agents consume read-only queries and respond
//! exclusively with new command batches, so every grid mutation flows through
//! one deterministic code path.

use serde::{Deserialize, Serialize};

/// Simulation step counter. One tick runs every agent exactly once.
pub type Tick = u64;

/// Land-use classification of a tile or site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LandUse {
    /// Housing development carrying population.
    Residential,
    /// Shops, markets and offices.
    Commercial,
    /// Factories and workshops.
    Industrial,
    /// Public green space.
    Park,
    /// Part of the road network.
    Road,
    /// Permanent water; never buildable.
    Water,
    /// Unclaimed land.
    None,
}

impl LandUse {
    /// Every land use, in a fixed order suitable for dense per-usage tables.
    pub const ALL: [LandUse; 7] = [
        LandUse::Residential,
        LandUse::Commercial,
        LandUse::Industrial,
        LandUse::Park,
        LandUse::Road,
        LandUse::Water,
        LandUse::None,
    ];

    /// Dense index of the usage inside [`LandUse::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            LandUse::Residential => 0,
            LandUse::Commercial => 1,
            LandUse::Industrial => 2,
            LandUse::Park => 3,
            LandUse::Road => 4,
            LandUse::Water => 5,
            LandUse::None => 6,
        }
    }

    /// Parcel usages that a developer targeting `self` may redevelop.
    ///
    /// Road, water and unclaimed land are never redeveloped through the
    /// parcel conversion path, so they convert only from themselves.
    #[must_use]
    pub const fn convertible_sources(self) -> &'static [LandUse] {
        match self {
            LandUse::Residential => &[LandUse::Residential, LandUse::Commercial],
            LandUse::Commercial => &[
                LandUse::Commercial,
                LandUse::Residential,
                LandUse::Industrial,
            ],
            LandUse::Industrial => &[LandUse::Industrial, LandUse::Commercial],
            LandUse::Park => &[LandUse::Park],
            LandUse::Road => &[LandUse::Road],
            LandUse::Water => &[LandUse::Water],
            LandUse::None => &[LandUse::None],
        }
    }
}

/// Classification of a road segment within the network hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoadClass {
    /// Arterial trunk road at the top of the hierarchy.
    Primary,
    /// Local road grown by road developer agents.
    Tertiary,
}

/// Location of a single tile expressed as signed grid coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePosition {
    x: i32,
    y: i32,
}

impl TilePosition {
    /// Creates a new tile position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal grid coordinate.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical grid coordinate.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Position translated by the provided offsets, saturating at the i32
    /// range so adapters can probe beyond the grid and receive a soft miss.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Manhattan distance between two positions.
    #[must_use]
    pub const fn manhattan_distance(self, other: TilePosition) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Euclidean distance between two positions.
    #[must_use]
    pub fn euclidean_distance(self, other: TilePosition) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Unique identifier assigned to a multi-tile site by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteId(u32);

impl SiteId {
    /// Creates a new site identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Opens a simulation step before any agent runs.
    BeginTick,
    /// Closes the current simulation step and advances the tick counter.
    CompleteTick,
    /// Requests a brand-new single-tile parcel on unclaimed land.
    FoundParcel {
        /// Tile the parcel should occupy.
        origin: TilePosition,
        /// Usage assigned to the new parcel.
        land_use: LandUse,
    },
    /// Requests a population increase on an existing parcel.
    DensifyParcel {
        /// Identifier of the parcel to densify.
        site: SiteId,
    },
    /// Requests a usage change on an existing parcel, population preserved.
    ConvertParcel {
        /// Identifier of the parcel to convert.
        site: SiteId,
        /// Usage the parcel should adopt.
        to: LandUse,
    },
    /// Requests a new road segment covering the provided tiles.
    PlaceRoad {
        /// Ordered tiles forming the segment, first tile nearest the agent.
        tiles: Vec<TilePosition>,
        /// Network classification of the segment.
        class: RoadClass,
    },
}

/// Events broadcast by the world after processing commands.
///
/// Notifications are emitted only after every invariant, including the
/// distance-field convergence, has been restored.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Announces that a simulation step is about to run.
    BeforeTick {
        /// Index of the step that is starting.
        tick: Tick,
    },
    /// Announces that a simulation step finished running every agent.
    AfterTick {
        /// Index of the step that completed.
        tick: Tick,
    },
    /// Reports that a single tile's derived usage changed.
    TileUsageChanged {
        /// Tile whose usage changed.
        position: TilePosition,
        /// Usage before the change.
        old: LandUse,
        /// Usage after the change.
        new: LandUse,
    },
    /// Reports that a whole multi-tile site changed usage.
    SiteUsageChanged {
        /// Site whose usage changed.
        site: SiteId,
        /// Usage before the change.
        old: LandUse,
        /// Usage after the change.
        new: LandUse,
    },
    /// Confirms that a new parcel was created.
    ParcelFounded {
        /// Identifier allocated to the parcel.
        site: SiteId,
        /// Tile the parcel occupies.
        origin: TilePosition,
        /// Usage assigned to the parcel.
        land_use: LandUse,
    },
    /// Confirms that a parcel's population grew.
    ParcelDensified {
        /// Identifier of the densified parcel.
        site: SiteId,
        /// Population after the increase.
        population: f32,
    },
    /// Confirms that a parcel changed usage.
    ParcelConverted {
        /// Identifier of the converted parcel.
        site: SiteId,
        /// Usage before the conversion.
        from: LandUse,
        /// Usage after the conversion.
        to: LandUse,
    },
    /// Confirms that a road segment was committed to the grid.
    RoadPlaced {
        /// Identifier allocated to the segment.
        site: SiteId,
        /// Network classification of the segment.
        class: RoadClass,
        /// Number of tiles the segment covers.
        length: usize,
    },
    /// Reports that a site lost its last tile and was removed.
    SiteDestroyed {
        /// Identifier of the removed site.
        site: SiteId,
        /// Usage the site carried when it was destroyed.
        land_use: LandUse,
    },
    /// Reports that a parcel foundation request was rejected.
    ParcelRejected {
        /// Tile provided in the foundation request.
        origin: TilePosition,
        /// Usage provided in the foundation request.
        land_use: LandUse,
        /// Specific reason the foundation failed.
        reason: ParcelRejection,
    },
    /// Reports that a densify or convert request was rejected.
    SiteUpdateRejected {
        /// Identifier provided in the update request.
        site: SiteId,
        /// Specific reason the update failed.
        reason: SiteUpdateRejection,
    },
    /// Reports that a road placement request was rejected.
    RoadRejected {
        /// Specific reason the placement failed.
        reason: RoadRejection,
    },
}

/// Reasons a parcel foundation request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParcelRejection {
    /// The requested tile lies beyond the configured grid bounds.
    OutOfBounds,
    /// The requested tile is water.
    Water,
    /// The requested tile already belongs to a site.
    Occupied,
    /// The requested usage is not a developable parcel usage.
    UnsupportedUse,
}

/// Reasons a parcel update request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteUpdateRejection {
    /// No site with the provided identifier exists.
    MissingSite,
    /// The site exists but is not a parcel.
    NotAParcel,
    /// The requested usage is not a developable parcel usage.
    UnsupportedUse,
}

/// Reasons a road placement request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoadRejection {
    /// The proposed segment contains no tiles.
    Empty,
    /// A proposed tile lies beyond the configured grid bounds.
    OutOfBounds,
    /// A proposed tile is water.
    Water,
    /// A proposed tile already belongs to the road network.
    AlreadyRoad,
    /// The same tile appears twice in the proposed segment.
    Duplicate,
}
