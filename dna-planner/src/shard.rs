use std::ops::Range;

use chrono::{DateTime, Utc};
use dna_instrument::Timeframe;

/// Splits `[from, to)` into stitched subranges, each covering at most
/// `max_bars` grid points of `timeframe`. Adjacency (`out[i].end ==
/// out[i+1].start`) and no-overlap are invariants of the output (§4.3).
pub fn shard_range(
    timeframe: Timeframe,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    max_bars: u32,
) -> Vec<Range<DateTime<Utc>>> {
    if from >= to {
        return Vec::new();
    }

    let step = timeframe.duration();
    let chunk_span = step * max_bars.max(1) as i32;
    let mut out = Vec::new();
    let mut cursor = from;

    while cursor < to {
        let chunk_end = (cursor + chunk_span).min(to);
        out.push(cursor..chunk_end);
        cursor = chunk_end;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn shards_are_adjacent_and_non_overlapping() {
        let from = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let shards = shard_range(Timeframe::M1, from, to, 10);

        assert_eq!(shards.len(), 3);
        for window in shards.windows(2) {
            assert_eq!(window[0].end, window[1].start);
        }
        assert_eq!(shards.first().unwrap().start, from);
        assert_eq!(shards.last().unwrap().end, to);
    }

    #[test]
    fn range_within_a_single_shard_is_not_split() {
        let from = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 4, 9, 35, 0).unwrap();
        let shards = shard_range(Timeframe::M1, from, to, 100);
        assert_eq!(shards.len(), 1);
    }
}
