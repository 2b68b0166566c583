//! Error types. Soft rejections (a shove on a settled puck, an out-of-range
//! drop position) are not errors and never appear here.

use crate::api::types::PlayerId;
use crate::game::session::GamePhase;

/// Invalid board or physics configuration. Checked once, at world creation or rebuild.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("board needs at least 2 buckets, got {0}")]
    TooFewBuckets(usize),

    #[error("bucket score count mismatch: expected {expected}, got {actual}")]
    BucketScoreMismatch { expected: usize, actual: usize },

    #[error("bucket fraction count mismatch: expected {expected}, got {actual}")]
    BucketFractionMismatch { expected: usize, actual: usize },

    #[error("bucket fractions must be positive and finite")]
    InvalidBucketFraction,

    #[error("invalid board dimension `{field}`: {value}")]
    InvalidDimension { field: &'static str, value: f32 },

    #[error("pin grid needs at least one row and one pin per row")]
    EmptyPinGrid,

    #[error("top and bottom margins ({top} + {bottom}) leave no room on a board {height} tall")]
    MarginsExceedHeight { top: f32, bottom: f32, height: f32 },

    #[error("fixed timestep must be positive, got {0} ms")]
    InvalidTimestep(f32),

    #[error("growth factor must be at least 1.0, got {0}")]
    InvalidGrowthFactor(f32),

    #[error("bounce multiplier rate and cap must be at least 1.0")]
    InvalidBounceMultiplier,
}

/// Scoring lookups against the configured bucket table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    #[error("bucket index {index} out of range (bucket count: {count})")]
    BucketOutOfRange { index: usize, count: usize },
}

/// Session-level validation and precondition failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("player name must be 1-{max} characters after trimming, got {name:?}")]
    InvalidPlayerName { name: String, max: usize },

    #[error("at least one player must register")]
    NoPlayers,

    #[error("too many players: {count} (max {max})")]
    TooManyPlayers { count: usize, max: usize },

    #[error("session not started")]
    NotStarted,

    #[error("no turn manager: start the session or a tie-breaker first")]
    NoTurnManager,

    #[error("operation not allowed in phase {actual:?}")]
    WrongPhase { actual: GamePhase },

    #[error("all rounds are complete; evaluate the round end")]
    RoundsComplete,

    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("a tie-breaker needs at least two players, got {0}")]
    NotEnoughTiedPlayers(usize),
}
