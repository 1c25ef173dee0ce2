#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Trade Simulator (§4.8): forward simulation of a fixed LONG entry into
//! a deterministic TAKE_PROFIT / STOP_LOSS / FORCED_CLOSE / OPEN_AT_SESSION_END
//! label.

pub mod config;
pub mod offset;
pub mod simulator;
pub mod tie_break;

pub use config::SimulationConfig;
pub use offset::PriceOffset;
pub use simulator::TradeSimulator;
pub use tie_break::TieBreakPolicy;
