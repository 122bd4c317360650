//! Progress counters and remaining-time estimation.

use chrono::{DateTime, Utc};

use crate::classify::ClassificationPolicy;
use crate::model::ProviderRow;

/// Processed/validated/flagged counts derived from a job's rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub processed: usize,
    pub validated: usize,
    pub flagged: usize,
}

pub fn count_rows(rows: &[ProviderRow], policy: &ClassificationPolicy) -> RowCounts {
    rows.iter()
        .filter_map(|row| row.report.as_ref())
        .fold(RowCounts::default(), |mut counts, report| {
            counts.processed += 1;
            if policy.is_validated(report) {
                counts.validated += 1;
            } else {
                counts.flagged += 1;
            }
            counts
        })
}

/// Seconds left at the observed completion rate.
///
/// `None` while no time has elapsed or nothing has been processed yet.
pub fn estimate_eta(
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
    processed: usize,
    total: usize,
) -> Option<u64> {
    let elapsed = (now - started_at).num_milliseconds() as f64 / 1000.0;
    if elapsed <= 0.0 {
        return None;
    }

    let rate = processed as f64 / elapsed;
    if rate <= 0.0 {
        return None;
    }

    let remaining = total.saturating_sub(processed) as f64;
    Some((remaining / rate).ceil().max(0.0) as u64)
}
