#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Storage Engine (§4.6): a single-writer, indexed bar store with
//! bulk upsert, missing-minute detection and quality reporting.

pub mod engine;
pub mod error;
pub mod filters;
pub mod missing;
pub mod report;
pub mod row;

pub use engine::{BarStore, CURRENT_SCHEMA_VERSION};
pub use error::StoreError;
pub use filters::QueryFilters;
pub use missing::MissingReport;
pub use report::StorageQualityReport;
pub use row::StoredRow;
