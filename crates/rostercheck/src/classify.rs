//! Validated/flagged classification of oracle reports.
//!
//! Every processed row is exactly one of validated or flagged: `is_flagged`
//! is defined as the negation of `is_validated`, so the job counters always
//! partition `processed_count`.

use serde::{Deserialize, Serialize};

use crate::model::{PriorityLevel, ProviderReport};

/// Predicate deciding whether a report needs no manual review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationPolicy {
    /// Validated iff the report status is one of the "no issues" values.
    Status {
        #[serde(default = "default_statuses")]
        statuses: Vec<String>,
    },
    /// Validated iff the priority bucket is one of `levels`.
    PriorityLevel {
        #[serde(default = "default_levels")]
        levels: Vec<PriorityLevel>,
    },
    /// Validated iff the priority score does not exceed `max_score`.
    ScoreThreshold { max_score: f64 },
}

fn default_statuses() -> Vec<String> {
    vec!["confirmed".to_string(), "updated".to_string()]
}

fn default_levels() -> Vec<PriorityLevel> {
    vec![PriorityLevel::Low]
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        ClassificationPolicy::Status {
            statuses: default_statuses(),
        }
    }
}

impl ClassificationPolicy {
    pub fn is_validated(&self, report: &ProviderReport) -> bool {
        match self {
            ClassificationPolicy::Status { statuses } => {
                statuses.iter().any(|s| *s == report.status)
            }
            ClassificationPolicy::PriorityLevel { levels } => {
                levels.contains(&report.priority_level)
            }
            ClassificationPolicy::ScoreThreshold { max_score } => {
                report.priority_score <= *max_score
            }
        }
    }

    pub fn is_flagged(&self, report: &ProviderReport) -> bool {
        !self.is_validated(report)
    }

    /// Checks the policy can classify anything at all.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ClassificationPolicy::Status { statuses } if statuses.is_empty() => {
                Err("classification.statuses must not be empty".to_string())
            }
            ClassificationPolicy::PriorityLevel { levels } if levels.is_empty() => {
                Err("classification.levels must not be empty".to_string())
            }
            ClassificationPolicy::ScoreThreshold { max_score } if !max_score.is_finite() => {
                Err("classification.max_score must be a finite number".to_string())
            }
            _ => Ok(()),
        }
    }
}
