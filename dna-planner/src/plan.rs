use std::collections::{BTreeMap, VecDeque};
use std::ops::Range;

use chrono::{DateTime, Utc};
use dna_broker::{BrokerRequest, WhatToShow};
use dna_instrument::{Symbol, Timeframe};
use dna_integration::Priority;
use tracing::debug;

use crate::shard::shard_range;
use crate::strategy::PlanStrategy;
use crate::target::FetchTarget;

/// One scheduled request in the planner's output order, with the
/// priority it should be submitted to the Rate Governor at (§4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRequest {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub range: Range<DateTime<Utc>>,
    pub priority: Priority,
}

impl PlannedRequest {
    pub fn into_broker_request(self, what_to_show: WhatToShow) -> BrokerRequest {
        BrokerRequest::HistoricalBars {
            symbol: self.symbol,
            timeframe: self.timeframe,
            from: self.range.start,
            to: self.range.end,
            what_to_show,
        }
    }
}

#[derive(Debug, Clone)]
struct Shard {
    symbol: Symbol,
    timeframe: Timeframe,
    range: Range<DateTime<Utc>>,
}

/// The Batch Planner from §4.3: turns a set of fetch targets into an
/// ordered, prioritized request sequence under a chosen strategy.
#[derive(Debug, Default)]
pub struct BatchPlanner {
    max_bars_per_request: u32,
}

impl BatchPlanner {
    pub fn new(max_bars_per_request: u32) -> Self {
        Self {
            max_bars_per_request: max_bars_per_request.max(1),
        }
    }

    pub fn plan(&self, targets: &[FetchTarget], strategy: PlanStrategy) -> Vec<PlannedRequest> {
        let shards = self.shard_all(targets);
        let planned = match strategy {
            PlanStrategy::Sequential => self.plan_sequential(shards),
            PlanStrategy::ParallelBySymbol { max_concurrent } => {
                self.plan_parallel_by_symbol(shards, max_concurrent.max(1))
            }
            PlanStrategy::ParallelByTimeframe => self.plan_parallel_by_timeframe(shards),
            PlanStrategy::Mixed => self.plan_mixed(shards),
        };
        debug!(requests = planned.len(), "batch planned");
        planned
    }

    fn shard_all(&self, targets: &[FetchTarget]) -> Vec<Shard> {
        let mut shards = Vec::new();
        for target in targets {
            for range in shard_range(target.timeframe, target.from, target.to, self.max_bars_per_request) {
                shards.push(Shard {
                    symbol: target.symbol.clone(),
                    timeframe: target.timeframe,
                    range,
                });
            }
        }
        shards
    }

    fn plan_sequential(&self, mut shards: Vec<Shard>) -> Vec<PlannedRequest> {
        shards.sort_by(|a, b| (a.symbol.clone(), a.timeframe, a.range.start).cmp(&(
            b.symbol.clone(),
            b.timeframe,
            b.range.start,
        )));
        shards
            .into_iter()
            .map(|s| planned(s, Priority::default()))
            .collect()
    }

    fn plan_parallel_by_symbol(&self, shards: Vec<Shard>, max_concurrent: usize) -> Vec<PlannedRequest> {
        let mut by_timeframe: BTreeMap<Timeframe, Vec<Shard>> = BTreeMap::new();
        for shard in shards {
            by_timeframe.entry(shard.timeframe).or_default().push(shard);
        }

        let mut out = Vec::new();
        for (_, mut group) in by_timeframe {
            group.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.range.start.cmp(&b.range.start)));
            for chunk in group.chunks(max_concurrent) {
                for shard in chunk {
                    out.push(planned(shard.clone(), Priority::default()));
                }
            }
        }
        out
    }

    fn plan_parallel_by_timeframe(&self, shards: Vec<Shard>) -> Vec<PlannedRequest> {
        let mut by_symbol: BTreeMap<Symbol, Vec<Shard>> = BTreeMap::new();
        for shard in shards {
            by_symbol.entry(shard.symbol.clone()).or_default().push(shard);
        }

        let mut out = Vec::new();
        for (_, mut group) in by_symbol {
            group.sort_by(|a, b| a.timeframe.cmp(&b.timeframe).then(a.range.start.cmp(&b.range.start)));
            for shard in group {
                out.push(planned(shard, Priority::default()));
            }
        }
        out
    }

    /// Round-robins across the (symbol x timeframe) matrix: timeframe
    /// groups are visited finest-first each round, and a finer group
    /// drains more of its items per round (weighted by how many bars it
    /// is expected to need per regular session relative to coarser
    /// groups), per §4.3.
    fn plan_mixed(&self, shards: Vec<Shard>) -> Vec<PlannedRequest> {
        let mut grouped: BTreeMap<Timeframe, Vec<Shard>> = BTreeMap::new();
        for shard in shards {
            grouped.entry(shard.timeframe).or_default().push(shard);
        }

        let mut by_timeframe: BTreeMap<Timeframe, VecDeque<Shard>> = BTreeMap::new();
        for (timeframe, mut items) in grouped {
            items.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.range.start.cmp(&b.range.start)));
            by_timeframe.insert(timeframe, items.into());
        }

        let timeframes: Vec<Timeframe> = by_timeframe.keys().copied().collect();
        let priorities: BTreeMap<Timeframe, Priority> = timeframes
            .iter()
            .enumerate()
            .map(|(rank, tf)| {
                let value = 4u8.saturating_sub(rank as u8).min(4);
                (*tf, Priority::new(value).expect("clamped to 0..=4"))
            })
            .collect();
        let weights: BTreeMap<Timeframe, usize> = timeframes
            .iter()
            .map(|tf| (*tf, mixed_weight(*tf)))
            .collect();

        let mut out = Vec::new();
        loop {
            let mut emitted_this_round = false;
            for tf in &timeframes {
                let weight = weights[tf];
                let group = by_timeframe.get_mut(tf).unwrap();
                for _ in 0..weight {
                    if let Some(shard) = group.pop_front() {
                        out.push(planned(shard, priorities[tf]));
                        emitted_this_round = true;
                    } else {
                        break;
                    }
                }
            }
            if !emitted_this_round {
                break;
            }
        }
        out
    }
}

fn mixed_weight(timeframe: Timeframe) -> usize {
    let expected = timeframe.expected_bars_per_regular_session().max(1);
    1 + (expected as f64).log10().floor() as usize
}

fn planned(shard: Shard, priority: Priority) -> PlannedRequest {
    PlannedRequest {
        symbol: shard.symbol,
        timeframe: shard.timeframe,
        range: shard.range,
        priority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn targets() -> Vec<FetchTarget> {
        let from = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 4, 9, 35, 0).unwrap();
        vec![
            FetchTarget::new(Symbol::from("AAPL"), Timeframe::M1, from..to),
            FetchTarget::new(Symbol::from("AAPL"), Timeframe::M15, from..to),
            FetchTarget::new(Symbol::from("MSFT"), Timeframe::M1, from..to),
        ]
    }

    #[test]
    fn sequential_orders_symbol_major_then_timeframe_minor() {
        let planner = BatchPlanner::new(1000);
        let planned = planner.plan(&targets(), PlanStrategy::Sequential);
        let order: Vec<_> = planned
            .iter()
            .map(|p| (p.symbol.as_str().to_string(), p.timeframe))
            .collect();
        assert_eq!(
            order,
            vec![
                ("AAPL".to_string(), Timeframe::M1),
                ("AAPL".to_string(), Timeframe::M15),
                ("MSFT".to_string(), Timeframe::M1),
            ]
        );
    }

    #[test]
    fn parallel_by_symbol_groups_by_timeframe_first() {
        let planner = BatchPlanner::new(1000);
        let planned = planner.plan(
            &targets(),
            PlanStrategy::ParallelBySymbol { max_concurrent: 2 },
        );
        assert_eq!(planned[0].timeframe, planned[1].timeframe);
    }

    #[test]
    fn mixed_strategy_prefers_finer_timeframes_first() {
        let planner = BatchPlanner::new(1000);
        let planned = planner.plan(&targets(), PlanStrategy::Mixed);
        assert_eq!(planned[0].timeframe, Timeframe::M1);
    }

    #[test]
    fn mixed_strategy_covers_every_shard_exactly_once() {
        let planner = BatchPlanner::new(1000);
        let planned = planner.plan(&targets(), PlanStrategy::Mixed);
        assert_eq!(planned.len(), 3);
    }
}
