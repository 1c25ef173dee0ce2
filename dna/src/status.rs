use serde::{Deserialize, Serialize};

use crate::run::{RunId, RunState};

/// Snapshot returned by `pipeline_status` (§6): the run's current state,
/// or `None` if `run_id` is unknown to this process.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PipelineStatus {
    pub run_id: RunId,
    pub state: RunState,
}
