pub mod api;
pub mod board;
pub mod components;
pub mod config;
pub mod core;
pub mod error;
pub mod game;
pub mod systems;

// Re-export key types at crate root for convenience
pub use api::events::{
    AutoShoveEvent, ContactEvent, ContactTarget, GrowthEvent, GrowthOutcome, OutOfBoundsEvent,
    ScoreRevocationEvent, SettleReason, SettledPuck, StepResult,
};
pub use api::types::{PlayerId, PuckId};
pub use board::{Bucket, Segment};
pub use components::puck::PuckBody;
pub use config::{
    BoardLayout, GameConfig, GrowthConfig, PhysicsConfig, ScoringConfig, SessionConfig,
    SurfaceMaterial,
};
pub use core::scene::PuckArena;
pub use core::simulation::{BoardGeometry, BoardSnapshot, PhysicsSimulation, PuckState};
pub use core::time::FixedTimestep;
pub use error::{ConfigError, ScoringError, SessionError};
pub use game::{
    GamePhase, GameStateMachine, Player, PlayerRegistration, PuckStyle, RoundOutcome,
    StylePattern, TurnContext, TurnManager, TurnRecord, TurnResult,
};
pub use systems::bucket::{BucketDetector, PuckObservation, Verdict};
