#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Indicator Engine (§4.7): streaming technical-analysis state machines
//! for the ten recognized indicator families.

pub mod engine;
pub mod families;
pub mod state;

pub use engine::IndicatorEngine;
pub use state::IndicatorState;
