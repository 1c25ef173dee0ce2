use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Diagnostic};

/// Serializable projection of [`CoreError`] for callers outside this
/// process boundary (§6, §7): the variant tag plus whatever detail it
/// carries, with nested transport/storage errors flattened to their
/// display message since [`dna_broker::SessionError`] and
/// [`dna_store::StoreError`] are not themselves serializable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum ErrorKind {
    ConfigInvalid(String),
    SessionUnavailable(String),
    Throttled(String),
    BarRejected {
        bar_ref: dna_instrument::BarKey,
        score: u8,
        threshold: u8,
    },
    StoreConflict(dna_instrument::BarKey),
    StoreIOError(String),
    MissingRange {
        symbol: dna_instrument::Symbol,
        timeframe: dna_instrument::Timeframe,
        count: usize,
    },
    IndicatorWarmup {
        bar_ref: dna_instrument::BarKey,
        family: dna_instrument::IndicatorFamily,
    },
    SimulationIndeterminate(dna_instrument::BarKey),
    Cancelled(crate::run::RunId),
    UnknownRun(crate::run::RunId),
    InternalInvariant(String),
}

impl From<&CoreError> for ErrorKind {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::ConfigInvalid(msg) => ErrorKind::ConfigInvalid(msg.clone()),
            CoreError::SessionUnavailable(inner) => ErrorKind::SessionUnavailable(inner.to_string()),
            CoreError::Throttled(msg) => ErrorKind::Throttled(msg.clone()),
            CoreError::BarRejected {
                bar_ref,
                score,
                threshold,
            } => ErrorKind::BarRejected {
                bar_ref: bar_ref.clone(),
                score: *score,
                threshold: *threshold,
            },
            CoreError::StoreConflict(bar_ref) => ErrorKind::StoreConflict(bar_ref.clone()),
            CoreError::StoreIOError(inner) => ErrorKind::StoreIOError(inner.to_string()),
            CoreError::MissingRange {
                symbol,
                timeframe,
                count,
            } => ErrorKind::MissingRange {
                symbol: symbol.clone(),
                timeframe: *timeframe,
                count: *count,
            },
            CoreError::IndicatorWarmup { bar_ref, family } => ErrorKind::IndicatorWarmup {
                bar_ref: bar_ref.clone(),
                family: *family,
            },
            CoreError::SimulationIndeterminate(bar_ref) => {
                ErrorKind::SimulationIndeterminate(bar_ref.clone())
            }
            CoreError::Cancelled(run_id) => ErrorKind::Cancelled(*run_id),
            CoreError::UnknownRun(run_id) => ErrorKind::UnknownRun(*run_id),
            CoreError::InternalInvariant(msg) => ErrorKind::InternalInvariant(msg.clone()),
        }
    }
}

/// Result envelope every Core API operation returns (§6): either `data` or
/// an [`ErrorKind`], plus whatever non-fatal [`Diagnostic`]s the operation
/// accumulated along the way.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    pub error: Option<ErrorKind>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn ok_with_diagnostics(data: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            data: Some(data),
            error: None,
            diagnostics,
        }
    }

    pub fn err(error: &CoreError) -> Self {
        Self {
            data: None,
            error: Some(ErrorKind::from(error)),
            diagnostics: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_carries_data_and_no_error() {
        let envelope = Envelope::ok(42);
        assert_eq!(envelope.data, Some(42));
        assert!(envelope.error.is_none());
        assert!(envelope.is_ok());
    }

    #[test]
    fn err_envelope_carries_no_data() {
        let envelope: Envelope<()> = Envelope::err(&CoreError::Throttled("retries exhausted".into()));
        assert!(envelope.data.is_none());
        assert!(!envelope.is_ok());
        assert!(matches!(envelope.error, Some(ErrorKind::Throttled(_))));
    }
}
