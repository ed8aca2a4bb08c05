pub mod plot;
pub mod stats;

pub use plot::*;
pub use stats::*;
