//! Confidence aggregation for rows and jobs.

use crate::model::{ProviderReport, ProviderRow};

/// Mean of the five output-field confidences. Absent fields count as 0.
pub fn row_confidence(report: &ProviderReport) -> f64 {
    let confidences = report.provider_output.confidences();
    confidences.iter().sum::<f64>() / confidences.len() as f64
}

/// Mean confidence over rows with a confidence above zero.
///
/// Rows without a report, or whose report scored 0, are left out so an
/// in-flight job is not dragged toward a false low. Returns `None` when no
/// row qualifies.
pub fn job_avg_confidence(rows: &[ProviderRow]) -> Option<f64> {
    let (sum, count) = rows
        .iter()
        .filter_map(|row| row.confidence)
        .filter(|c| *c > 0.0)
        .fold((0.0, 0usize), |(sum, count), c| (sum + c, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
