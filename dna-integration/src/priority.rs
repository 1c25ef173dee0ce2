use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request priority, highest first. Spec §3 defines the range as `0..4`
/// inclusive (five levels); `4` is highest.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct Priority(u8);

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("priority {0} out of range 0..=4")]
pub struct PriorityOutOfRange(pub u8);

impl Priority {
    pub const LOWEST: Priority = Priority(0);
    pub const HIGHEST: Priority = Priority(4);

    pub fn new(value: u8) -> Result<Self, PriorityOutOfRange> {
        if value > 4 {
            Err(PriorityOutOfRange(value))
        } else {
            Ok(Self(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority(2)
    }
}
