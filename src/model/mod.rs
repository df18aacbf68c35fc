pub mod asset;
pub mod graph;
pub mod relationship;

pub use asset::*;
pub use graph::*;
pub use relationship::*;
