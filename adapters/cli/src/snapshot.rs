//! Single-line city-layout snapshot codec.
//!
//! Captures the grown city (roads and parcels, not terrain) as a compact
//! `city:v1:<w>x<h>:<base64 json>` string so layouts can be shared between
//! runs and inspected offline.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use cityflow_core::{LandUse, RoadClass, TilePosition};
use cityflow_world::{query, SiteKind, World};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SNAPSHOT_DOMAIN: &str = "city";
const SNAPSHOT_VERSION: &str = "v1";
const FIELD_DELIMITER: char = ':';

/// Snapshot of every registered site together with the grid dimensions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct CitySnapshot {
    /// Number of tile columns in the grid.
    pub(crate) width: i32,
    /// Number of tile rows in the grid.
    pub(crate) height: i32,
    /// Sites composing the captured layout.
    pub(crate) sites: Vec<SnapshotSite>,
}

/// One captured site: usage, variant payload and covered tiles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct SnapshotSite {
    pub(crate) land_use: LandUse,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub(crate) road_class: Option<RoadClass>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub(crate) population: Option<f32>,
    pub(crate) tiles: Vec<(i32, i32)>,
}

impl CitySnapshot {
    /// Captures the current layout of the provided world.
    pub(crate) fn capture(world: &World) -> Self {
        let spec = query::grid(world);
        let sites = query::sites(world)
            .map(|state| SnapshotSite {
                land_use: state.land_use(),
                road_class: state.road_class(),
                population: match state.kind() {
                    SiteKind::Parcel { population } => Some(*population),
                    SiteKind::Road { .. } => None,
                },
                tiles: state
                    .tiles()
                    .iter()
                    .map(|position| (position.x(), position.y()))
                    .collect(),
            })
            .collect();
        Self {
            width: spec.width(),
            height: spec.height(),
            sites,
        }
    }

    /// Total number of tiles covered by captured road segments.
    pub(crate) fn road_tile_count(&self) -> usize {
        self.sites
            .iter()
            .filter(|site| site.land_use == LandUse::Road)
            .map(|site| site.tiles.len())
            .sum()
    }

    /// Positions covered by the captured sites, for map reconstruction.
    pub(crate) fn covered_positions(&self) -> impl Iterator<Item = TilePosition> + '_ {
        self.sites
            .iter()
            .flat_map(|site| site.tiles.iter().map(|&(x, y)| TilePosition::new(x, y)))
    }

    /// Encodes the snapshot into a single-line string.
    pub(crate) fn encode(&self) -> String {
        let payload = SerializableSites {
            sites: self.sites.clone(),
        };
        let json =
            serde_json::to_vec(&payload).expect("city snapshot serialization never fails");
        let encoded = STANDARD_NO_PAD.encode(json);
        format!(
            "{SNAPSHOT_DOMAIN}{FIELD_DELIMITER}{SNAPSHOT_VERSION}{FIELD_DELIMITER}{}x{}{FIELD_DELIMITER}{encoded}",
            self.width, self.height
        )
    }

    /// Decodes a snapshot from its single-line string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, SnapshotError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(SnapshotError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(SnapshotError::MissingPrefix)?;
        let version = parts.next().ok_or(SnapshotError::MissingVersion)?;
        let dimensions = parts.next().ok_or(SnapshotError::MissingDimensions)?;
        let payload = parts.next().ok_or(SnapshotError::MissingPayload)?;

        if domain != SNAPSHOT_DOMAIN {
            return Err(SnapshotError::InvalidPrefix(domain.to_owned()));
        }
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version.to_owned()));
        }

        let (width, height) = dimensions
            .split_once('x')
            .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)))
            .ok_or_else(|| SnapshotError::MalformedDimensions(dimensions.to_owned()))?;

        let json = STANDARD_NO_PAD
            .decode(payload)
            .map_err(|error| SnapshotError::MalformedPayload(error.to_string()))?;
        let payload: SerializableSites = serde_json::from_slice(&json)
            .map_err(|error| SnapshotError::MalformedPayload(error.to_string()))?;

        Ok(Self {
            width,
            height,
            sites: payload.sites,
        })
    }
}

/// Wire payload: only the sites travel base64-encoded; the dimensions stay
/// readable in the prefix.
#[derive(Serialize, Deserialize)]
struct SerializableSites {
    sites: Vec<SnapshotSite>,
}

/// Failures decoding a city snapshot string.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub(crate) enum SnapshotError {
    #[error("snapshot payload is empty")]
    EmptyPayload,
    #[error("snapshot prefix is missing")]
    MissingPrefix,
    #[error("snapshot version is missing")]
    MissingVersion,
    #[error("snapshot dimensions are missing")]
    MissingDimensions,
    #[error("snapshot payload is missing")]
    MissingPayload,
    #[error("unrecognized snapshot prefix `{0}`")]
    InvalidPrefix(String),
    #[error("unsupported snapshot version `{0}`")]
    UnsupportedVersion(String),
    #[error("malformed snapshot dimensions `{0}`")]
    MalformedDimensions(String),
    #[error("malformed snapshot payload: {0}")]
    MalformedPayload(String),
}
