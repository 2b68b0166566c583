pub mod geometry;

pub use geometry::{Bucket, Segment};
