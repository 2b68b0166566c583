pub mod types;
pub mod events;

pub use types::{PuckId, PlayerId};
