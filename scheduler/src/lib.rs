#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic turn-based scheduling for Cityflow agents.
//!
//! One tick runs every agent exactly once, in fixed roster order. Each
//! agent reads the world, emits a command batch, and that batch is applied
//! before the next agent runs, so every agent observes a fully converged
//! world that already contains its predecessors' commits.

use cityflow_core::{Command, Event};
use cityflow_world::{apply, World};

/// Per-tick update contract shared by every agent variant.
pub trait Agent {
    /// Short label identifying the agent in logs.
    fn label(&self) -> &str;

    /// Reads the world and pushes the commands the agent wants committed.
    fn update(&mut self, world: &World, out: &mut Vec<Command>);
}

/// Advances the simulation one tick at a time over a fixed agent roster.
pub struct Scheduler {
    agents: Vec<Box<dyn Agent>>,
    command_buffer: Vec<Command>,
}

impl Scheduler {
    /// Creates a scheduler owning the provided roster; roster order is the
    /// execution order for the lifetime of the run.
    #[must_use]
    pub fn new(agents: Vec<Box<dyn Agent>>) -> Self {
        Self {
            agents,
            command_buffer: Vec::new(),
        }
    }

    /// Number of agents in the roster.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Runs a single simulation step.
    ///
    /// Emits `BeforeTick`, then every agent's update and command batch in
    /// roster order, then `AfterTick`; the world's tick counter advances as
    /// the step completes.
    pub fn run_tick(&mut self, world: &mut World, out_events: &mut Vec<Event>) {
        apply(world, Command::BeginTick, out_events);

        for index in 0..self.agents.len() {
            self.command_buffer.clear();
            self.agents[index].update(world, &mut self.command_buffer);
            if !self.command_buffer.is_empty() {
                log::debug!(
                    "agent {} committing {} command(s)",
                    self.agents[index].label(),
                    self.command_buffer.len()
                );
            }
            for command in self.command_buffer.drain(..) {
                apply(world, command, out_events);
            }
        }

        apply(world, Command::CompleteTick, out_events);
    }
}
