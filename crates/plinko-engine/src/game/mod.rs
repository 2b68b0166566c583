pub mod session;
pub mod turns;

pub use session::{
    GamePhase, GameStateMachine, Player, PlayerRegistration, PuckStyle, RoundOutcome,
    StylePattern, TurnContext, TurnRecord, TurnResult,
};
pub use turns::TurnManager;
