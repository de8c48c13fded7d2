//! Deterministic land-value scoring.
//!
//! A fixed-length attribute vector is derived from a tile's surroundings and
//! dotted with a hand-tuned, usage-specific weight vector. Most attributes
//! are placeholders held at zero until the corresponding subsystem feeds
//! them; proximity to water and the raw distance attributes are live.

use cityflow_core::LandUse;

use crate::World;

const ATTRIBUTE_COUNT: usize = 12;

const RESIDENTIAL_WEIGHTS: [f32; ATTRIBUTE_COUNT] =
    [0.3, 0.0, 0.0, 0.0, 0.3, 0.4, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
const COMMERCIAL_WEIGHTS: [f32; ATTRIBUTE_COUNT] =
    [0.0, 0.2, 0.0, 0.0, 0.15, 0.15, 0.0, 0.0, 0.0, 0.4, 0.1, 0.0];
const INDUSTRIAL_WEIGHTS: [f32; ATTRIBUTE_COUNT] =
    [0.0, 0.5, 0.0, 0.0, 0.3, 0.0, 0.1, 0.0, 0.1, 0.0, 0.0, 0.0];

/// Land value of the tile at `index` if it were used for `usage`.
///
/// Road, water and unclaimed land carry no value.
pub(crate) fn value_for(world: &World, index: usize, usage: LandUse) -> f32 {
    let Some(weights) = weights(usage) else {
        return 0.0;
    };
    let attributes = attributes(world, index);
    weights
        .iter()
        .zip(attributes.iter())
        .map(|(weight, attribute)| weight * attribute)
        .sum()
}

fn weights(usage: LandUse) -> Option<&'static [f32; ATTRIBUTE_COUNT]> {
    match usage {
        LandUse::Residential => Some(&RESIDENTIAL_WEIGHTS),
        LandUse::Commercial => Some(&COMMERCIAL_WEIGHTS),
        LandUse::Industrial => Some(&INDUSTRIAL_WEIGHTS),
        LandUse::Park | LandUse::Road | LandUse::Water | LandUse::None => None,
    }
}

fn attributes(world: &World, index: usize) -> [f32; ATTRIBUTE_COUNT] {
    // Placeholder attributes stay at zero; the live ones read the cached
    // distance field.
    let elevation_advantage = 0.0;
    let variation_elevation_negative = 0.0;
    let variation_elevation_positive = 0.0;
    let flood_plain_elevation = 0.0;
    let proximity_to_water = proximity(world.cached_distance(index, LandUse::Water));
    let residential_density = 0.0;
    let industrial_density = 0.0;
    let distance_to_park = f32::from(world.cached_distance(index, LandUse::Park));
    let proximity_to_primary_roads = 0.0;
    let proximity_to_market = 0.0;
    let distance_to_commercial = f32::from(world.cached_distance(index, LandUse::Commercial));
    let anti_worth = 0.0;

    [
        elevation_advantage,
        variation_elevation_negative,
        variation_elevation_positive,
        flood_plain_elevation,
        proximity_to_water,
        residential_density,
        industrial_density,
        distance_to_park,
        proximity_to_primary_roads,
        proximity_to_market,
        distance_to_commercial,
        anti_worth,
    ]
}

/// Inverse-square falloff: adjacent water scores 1/4, touching water 1.
fn proximity(distance: u16) -> f32 {
    (1.0 + f32::from(distance)).powi(-2)
}
