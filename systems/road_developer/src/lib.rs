#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Road developer agents: tertiary network extension and connection.
//!
//! Both variants implement the [`RoadBehavior`] capability interface; the
//! shared [`RoadDeveloper`] driver owns the common tick loop — move, decide
//! whether the location needs a road, plan a segment, validate it against the
//! local density ceiling, and commit all-or-nothing.

use cityflow_core::{Command, LandUse, RoadClass, TilePosition};
use cityflow_scheduler::Agent;
use cityflow_world::{query, World};

mod connector;
mod extender;

pub use connector::{ConnectorConfig, TertiaryRoadConnector};
pub use extender::{ExtenderConfig, TertiaryRoadExtender};

/// Local road-density ceiling applied to every tile of a proposed segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DensityRule {
    /// Radius of the neighborhood disc inspected around each tile.
    pub radius: i32,
    /// Maximum fraction of road tiles tolerated inside the disc.
    pub ceiling: f32,
}

impl DensityRule {
    /// Creates a density rule with explicit field values.
    #[must_use]
    pub const fn new(radius: i32, ceiling: f32) -> Self {
        Self { radius, ceiling }
    }

    /// Reports whether the tile's current neighborhood stays under the
    /// ceiling; used as a precheck while planning.
    #[must_use]
    pub fn admits(&self, world: &World, position: TilePosition) -> bool {
        query::road_density(world, position, self.radius) <= self.ceiling
    }
}

impl Default for DensityRule {
    fn default() -> Self {
        Self {
            radius: 5,
            ceiling: 0.5,
        }
    }
}

/// Capability interface shared by the road developer variants.
pub trait RoadBehavior {
    /// Short label identifying the variant in logs.
    fn label(&self) -> &str;

    /// Moves the agent to the tile it will evaluate this tick.
    fn move_step(&mut self, world: &World);

    /// Reports whether the current location warrants building a road.
    fn needs_road(&self, world: &World) -> bool;

    /// Plans the tiles of a new segment; `None` is a normal negative result.
    fn plan_road(&mut self, world: &World) -> Option<Vec<TilePosition>>;

    /// Density ceiling the variant's segments must respect.
    fn density_rule(&self) -> DensityRule;

    /// Validates a planned segment before commit. The default counts both
    /// existing road tiles and the planned tiles inside each disc, so a
    /// committed segment can never push a covered tile past the ceiling.
    fn validate(&self, world: &World, plan: &[TilePosition]) -> bool {
        let rule = self.density_rule();
        plan.iter().all(|&tile| {
            let disc = query::tiles_in_circle(world, tile, rule.radius);
            if disc.is_empty() {
                return false;
            }
            let committed = disc
                .iter()
                .filter(|&&p| {
                    query::land_use(world, p) == Some(LandUse::Road) || plan.contains(&p)
                })
                .count();
            committed as f32 / disc.len() as f32 <= rule.ceiling
        })
    }
}

/// Driver owning the common per-tick loop for one [`RoadBehavior`] variant.
#[derive(Clone, Debug)]
pub struct RoadDeveloper<B> {
    behavior: B,
}

impl<B: RoadBehavior> RoadDeveloper<B> {
    /// Wraps a behavior variant into a schedulable agent.
    #[must_use]
    pub const fn new(behavior: B) -> Self {
        Self { behavior }
    }

    /// Read access to the wrapped variant.
    #[must_use]
    pub const fn behavior(&self) -> &B {
        &self.behavior
    }
}

impl<B: RoadBehavior> Agent for RoadDeveloper<B> {
    fn label(&self) -> &str {
        self.behavior.label()
    }

    fn update(&mut self, world: &World, out: &mut Vec<Command>) {
        self.behavior.move_step(world);
        if !self.behavior.needs_road(world) {
            return;
        }
        let Some(plan) = self.behavior.plan_road(world) else {
            return;
        };
        if plan.is_empty() {
            return;
        }
        if !self.behavior.validate(world, &plan) {
            log::debug!(
                "{}: discarded a {}-tile segment over the density ceiling",
                self.behavior.label(),
                plan.len()
            );
            return;
        }
        out.push(Command::PlaceRoad {
            tiles: plan,
            class: RoadClass::Tertiary,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cityflow_core::Command;
    use cityflow_world::{apply, GridSpec, TileSeed};

    struct FixedPlan {
        plan: Vec<TilePosition>,
        rule: DensityRule,
    }

    impl RoadBehavior for FixedPlan {
        fn label(&self) -> &str {
            "fixed-plan"
        }

        fn move_step(&mut self, _world: &World) {}

        fn needs_road(&self, _world: &World) -> bool {
            true
        }

        fn plan_road(&mut self, _world: &World) -> Option<Vec<TilePosition>> {
            Some(self.plan.clone())
        }

        fn density_rule(&self) -> DensityRule {
            self.rule
        }
    }

    fn dry_world(width: i32, height: i32) -> World {
        World::new(GridSpec::new(width, height), |_| TileSeed {
            is_water: false,
            elevation: 0.0,
        })
    }

    #[test]
    fn segments_over_the_ceiling_are_rejected_whole() {
        let mut world = dry_world(9, 9);
        apply(
            &mut world,
            Command::PlaceRoad {
                tiles: vec![TilePosition::new(4, 4)],
                class: RoadClass::Tertiary,
            },
            &mut Vec::new(),
        );

        // A ceiling of zero admits no segment at all near existing roads.
        let mut rejected = RoadDeveloper::new(FixedPlan {
            plan: vec![TilePosition::new(4, 5)],
            rule: DensityRule::new(5, 0.0),
        });
        let mut commands = Vec::new();
        rejected.update(&world, &mut commands);
        assert!(commands.is_empty());

        let mut accepted = RoadDeveloper::new(FixedPlan {
            plan: vec![TilePosition::new(4, 5)],
            rule: DensityRule::default(),
        });
        accepted.update(&world, &mut commands);
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn validation_counts_the_planned_tiles_themselves() {
        let world = dry_world(9, 9);
        // 13 of the 69 disc tiles planned as road: density ~0.188.
        let plan: Vec<TilePosition> = (0..13).map(|i| TilePosition::new(i % 9, i / 9)).collect();
        let tight = FixedPlan {
            plan: plan.clone(),
            rule: DensityRule::new(5, 0.1),
        };
        let loose = FixedPlan {
            plan: plan.clone(),
            rule: DensityRule::new(5, 0.5),
        };

        assert!(!tight.validate(&world, &plan));
        assert!(loose.validate(&world, &plan));
    }
}
