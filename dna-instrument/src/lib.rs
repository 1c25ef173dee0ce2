#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Core data model for the DNA pipeline: bars, timeframes, trading sessions
//! and the quality metadata attached to every ingested bar.

pub mod bar;
pub mod indicator;
pub mod label;
pub mod quality;
pub mod session;
pub mod symbol;
pub mod timeframe;

pub use bar::{Bar, BarKey, BarSource};
pub use indicator::{IndicatorFamily, IndicatorValue, ParamSet};
pub use label::{ExitReason, Outcome, SimulationLabel};
pub use quality::{IssueCode, QualityIssue, QualityReport, Severity};
pub use session::Session;
pub use symbol::Symbol;
pub use timeframe::Timeframe;
