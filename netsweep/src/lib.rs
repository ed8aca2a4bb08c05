//! Shared plumbing of the `netsweep` and `ping-analyze` binaries.

pub mod cli;
pub mod logging;
pub mod settings;
pub mod signals;

pub use cli::SweepArgs;
pub use settings::Settings;
