use std::future;

use futures::{Stream, stream};

use crate::utils::time::DayKey;

/// Totals of one day, as shown by range summaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayTotal {
    pub day: DayKey,
    pub total_ms: u64,
    pub tasks: usize,
}

/// Returns a stream of days between start (inclusive) and end (inclusive).
pub fn day_range(start: DayKey, end: DayKey) -> impl Stream<Item = DayKey> {
    stream::unfold(Some(start), move |current| {
        future::ready(match current {
            Some(day) if day <= end => Some((day, day.succ())),
            _ => None,
        })
    })
}
