//! # iperf3-sweep
//!
//! Finds the highest bandwidth a network path sustains without meaningful
//! packet loss, by driving the iperf3 client through a descending series of
//! target rates.
//!
//! ## Features
//!
//! - One iperf3 client run per target, with a deadline and clean termination
//! - Tolerant parsing of the iperf3 JSON output across releases
//! - Failed attempts recorded alongside successful ones
//! - Stability verdict against a configurable loss threshold
//! - Table report, JSON artifact and SVG charts per run
//! - Cooperative cancellation through a shutdown handle
//!
//! ## Example
//!
//! ```no_run
//! use iperf3_sweep::{Iperf3Invoker, StabilityAnalyzer, SweepConfig, SweepController};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SweepConfig {
//!         server: "iperf.example.net".to_string(),
//!         ..Default::default()
//!     };
//!     config.validate().unwrap();
//!
//!     let invoker = Iperf3Invoker::from_config(&config);
//!     let controller = SweepController::new(config, invoker);
//!     let result = controller.run().await;
//!
//!     let verdict = StabilityAnalyzer::default().analyze(&result);
//!     println!("{:?}", verdict.best_bandwidth);
//! }
//! ```

pub mod artifact;
pub mod chart;
pub mod config;
pub mod error;
pub mod invoker;
pub mod model;
pub mod parser;
pub mod protocol;
pub mod report;
pub mod stability;
pub mod sweep;

pub use artifact::{ArtifactStore, SweepArtifact};
pub use chart::ChartGenerator;
pub use config::SweepConfig;
pub use error::{
    ArtifactError, ChartRenderError, ConfigurationError, MeasurementError, ParseError, SweepError,
};
pub use invoker::{Iperf3Invoker, MeasurementTool};
pub use model::{
    AttemptRequest, BandwidthTarget, Jitter, MeasurementRecord, Protocol, SweepConfiguration,
    SweepResult,
};
pub use report::ReportGenerator;
pub use stability::{StabilityAnalyzer, StabilityVerdict, VerdictStatus};
pub use sweep::{ShutdownHandle, SweepController};
