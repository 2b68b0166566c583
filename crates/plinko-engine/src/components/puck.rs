use crate::api::types::{PlayerId, PuckId};
use crate::core::physics::PhysicsBody;

/// A live puck: identity, its physics handles and the settlement/score
/// bookkeeping the simulation stamps on it.
///
/// Detector timers are deliberately not stored here; they live in the
/// bucket detector keyed by id so they survive shape swaps and rebuilds.
#[derive(Debug, Clone)]
pub struct PuckBody {
    pub id: PuckId,
    pub player_id: PlayerId,
    /// Turn that dropped this puck.
    pub turn_index: u32,
    pub body: PhysicsBody,
    pub current_radius: f32,
    pub growth_count: u32,
    /// Pin contacts accumulated before settlement.
    pub bounce_count: u32,
    pub is_settled: bool,
    pub settled_in_bucket: Option<usize>,
    /// Bucket whose score was last awarded. Survives displacement as history.
    pub last_scored_bucket: Option<usize>,
    pub score_awarded: u32,
    /// Stamped at settlement, persists across rounds.
    pub bounce_multiplier: f64,
}

impl PuckBody {
    pub fn new(id: PuckId, player_id: PlayerId, body: PhysicsBody, radius: f32) -> Self {
        Self {
            id,
            player_id,
            turn_index: 0,
            body,
            current_radius: radius,
            growth_count: 0,
            bounce_count: 0,
            is_settled: false,
            settled_in_bucket: None,
            last_scored_bucket: None,
            score_awarded: 0,
            bounce_multiplier: 1.0,
        }
    }

    // -- Builder pattern --

    pub fn with_turn_index(mut self, turn_index: u32) -> Self {
        self.turn_index = turn_index;
        self
    }

    /// Mark settled in `bucket` with the given multiplier and score.
    pub fn settle(&mut self, bucket: usize, bounce_multiplier: f64, score: u32) {
        self.is_settled = true;
        self.settled_in_bucket = Some(bucket);
        self.last_scored_bucket = Some(bucket);
        self.bounce_multiplier = bounce_multiplier;
        self.score_awarded = score;
    }

    /// Clear settlement so the puck can settle again. Returns the score to claw back.
    pub fn unsettle(&mut self) -> u32 {
        let revoked = self.score_awarded;
        self.is_settled = false;
        self.settled_in_bucket = None;
        self.score_awarded = 0;
        revoked
    }

    /// Settled, with a score on record.
    pub fn is_scored(&self) -> bool {
        self.is_settled && self.last_scored_bucket.is_some()
    }
}
