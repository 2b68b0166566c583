//! Discrete events produced by one simulation tick.
//!
//! Each family is emitted by exactly one phase of the tick pipeline and
//! bundled, in emission order, into a [`StepResult`]. Renderers, audio and
//! the session driver read these; nothing here feeds back into the world.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::api::types::{PlayerId, PuckId};

/// What a puck touched when a contact started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ContactTarget {
    Pin(u32),
    Wall(u32),
    Divider(u32),
    Puck(PuckId),
}

/// A contact that began during the step. Puck–puck contacts are reported once,
/// with the lower puck id in `puck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEvent {
    pub puck: PuckId,
    pub target: ContactTarget,
}

/// A same-owner contact awaiting growth processing. Consumed once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthEvent {
    pub puck_a: PuckId,
    pub puck_b: PuckId,
    pub player_id: PlayerId,
    pub chain_depth: u32,
}

/// Result of a growth event that actually changed at least one radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthOutcome {
    pub event: GrowthEvent,
    /// Pucks that grew, with their new radius.
    pub grown: Vec<(PuckId, f32)>,
}

/// Emitted when a puck is judged stuck above the bucket zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoShoveEvent {
    pub puck_id: PuckId,
    pub attempt_index: u32,
    /// Unit direction (Y-down coordinates).
    pub direction: Vec2,
}

/// Emitted when a previously settled, scored puck is knocked loose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRevocationEvent {
    pub puck_id: PuckId,
    pub player_id: PlayerId,
    pub revoked_score: u32,
    pub from_bucket: usize,
    pub position: Vec2,
}

/// Emitted once per excursion above the top boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutOfBoundsEvent {
    pub puck_id: PuckId,
    pub player_id: PlayerId,
    pub position: Vec2,
}

/// Why a puck settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleReason {
    /// The physics engine put the body to sleep.
    Sleep,
    /// Held still inside the bucket-floor margin long enough.
    Rest,
    /// Still stuck after every auto-shove attempt was used.
    AutoShoveExhausted,
    /// The fallback stall timeout elapsed.
    Timeout,
}

impl SettleReason {
    pub fn is_forced(self) -> bool {
        matches!(self, SettleReason::AutoShoveExhausted | SettleReason::Timeout)
    }
}

/// A puck that settled this tick, with its stamped score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettledPuck {
    pub puck_id: PuckId,
    pub player_id: PlayerId,
    pub bucket: usize,
    pub bounce_count: u32,
    pub bounce_multiplier: f64,
    pub score: u32,
    pub reason: SettleReason,
}

/// Everything one call to `PhysicsSimulation::step` produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Tick number after this step (first step returns 1).
    pub tick: u64,
    pub contacts: Vec<ContactEvent>,
    pub settled: Vec<SettledPuck>,
    pub auto_shoves: Vec<AutoShoveEvent>,
    pub out_of_bounds: Vec<OutOfBoundsEvent>,
    pub revocations: Vec<ScoreRevocationEvent>,
    pub growths: Vec<GrowthOutcome>,
}

impl StepResult {
    /// Settlement record for `id`, if it settled this tick.
    pub fn settlement_of(&self, id: PuckId) -> Option<&SettledPuck> {
        self.settled.iter().find(|s| s.puck_id == id)
    }
}
