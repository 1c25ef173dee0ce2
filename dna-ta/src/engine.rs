use std::collections::HashMap;

use chrono::Utc;
use dna_instrument::{Bar, IndicatorValue, ParamSet, Symbol, Timeframe};
use tracing::debug;

use crate::state::IndicatorState;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct TrackKey {
    symbol: Symbol,
    timeframe: Timeframe,
    fingerprint: u64,
}

struct Tracked {
    params: ParamSet,
    state: IndicatorState,
}

/// The Indicator Engine from §4.7: one streaming state per (symbol,
/// timeframe, family, parameter-set), advanced bar by bar.
#[derive(Default)]
pub struct IndicatorEngine {
    tracked: HashMap<TrackKey, Tracked>,
}

impl std::fmt::Debug for IndicatorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorEngine")
            .field("tracked_count", &self.tracked.len())
            .finish()
    }
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `params` for `(symbol, timeframe)` if not already tracked.
    /// Idempotent: registering the same fingerprint twice is a no-op.
    pub fn register(&mut self, symbol: Symbol, timeframe: Timeframe, params: ParamSet) {
        let key = TrackKey {
            symbol,
            timeframe,
            fingerprint: params.fingerprint(),
        };
        self.tracked.entry(key).or_insert_with(|| Tracked {
            state: IndicatorState::new(&params),
            params,
        });
    }

    /// Advances every parameter set registered for `bar`'s (symbol,
    /// timeframe), returning one [`IndicatorValue`] per tracked family.
    pub fn advance(&mut self, bar: &Bar) -> Vec<IndicatorValue> {
        let mut values = Vec::new();
        for (key, tracked) in self.tracked.iter_mut() {
            if key.symbol != bar.symbol || key.timeframe != bar.timeframe {
                continue;
            }
            let (value, valid) = tracked.state.advance(bar);
            values.push(IndicatorValue {
                bar_ref: bar.key(),
                family: tracked.params.family(),
                parameters_fingerprint: key.fingerprint,
                value,
                valid,
                computed_at: Utc::now(),
            });
        }
        values
    }

    /// Reconfigures the parameter set matching `params.fingerprint()` for
    /// `(symbol, timeframe)`: drops the cached streaming state and replays
    /// `history` from scratch, per §4.7's "reconfiguring a parameter set
    /// invalidates cached values ... and triggers recomputation over the
    /// stored range". `history` must already be in chronological order.
    pub fn reconfigure(
        &mut self,
        symbol: Symbol,
        timeframe: Timeframe,
        params: ParamSet,
        history: &[Bar],
    ) -> Vec<IndicatorValue> {
        let fingerprint = params.fingerprint();
        let key = TrackKey {
            symbol,
            timeframe,
            fingerprint,
        };
        self.tracked.remove(&key);

        let mut state = IndicatorState::new(&params);
        let mut values = Vec::with_capacity(history.len());
        for bar in history {
            let (value, valid) = state.advance(bar);
            values.push(IndicatorValue {
                bar_ref: bar.key(),
                family: params.family(),
                parameters_fingerprint: fingerprint,
                value,
                valid,
                computed_at: Utc::now(),
            });
        }

        debug!(fingerprint, replayed = history.len(), "indicator reconfigured");
        self.tracked.insert(key, Tracked { params, state });
        values
    }
}
