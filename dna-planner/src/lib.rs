#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Batch Planner (§4.3): turns a set of (symbol, timeframe, range)
//! targets into an ordered, prioritized request sequence under a chosen
//! strategy, sharding any range too large for one broker request.

pub mod plan;
pub mod shard;
pub mod strategy;
pub mod target;

pub use plan::{BatchPlanner, PlannedRequest};
pub use shard::shard_range;
pub use strategy::PlanStrategy;
pub use target::FetchTarget;
