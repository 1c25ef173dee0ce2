/// Sequencing strategy for a batch of [`crate::target::FetchTarget`]s
/// (§4.3).
#[derive(Debug, Clone, Copy, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStrategy {
    /// One request at a time, symbol-major then timeframe-minor.
    Sequential,
    /// For each timeframe slot, up to `max_concurrent` symbol requests
    /// enqueued at equal priority.
    ParallelBySymbol { max_concurrent: usize },
    /// For each symbol, all timeframes enqueued together.
    ParallelByTimeframe,
    /// Round-robin across the (symbol x timeframe) matrix, weighted by
    /// the broker's historical-bars-per-request allowance, preferring
    /// finer timeframes first.
    Mixed,
}
