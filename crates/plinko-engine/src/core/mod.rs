pub mod physics;
pub mod scene;
pub mod simulation;
pub mod time;
