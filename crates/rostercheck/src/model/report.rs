//! Wire types exchanged with the validation oracle.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Original field name to value, as supplied by the source.
pub type RawFields = BTreeMap<String, String>;

/// Member impact used when a source row carries none.
pub const DEFAULT_MEMBER_IMPACT: u32 = 3;

/// The canonical provider record submitted for validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInput {
    pub name: String,
    pub npi: String,
    #[serde(rename = "mobile_no")]
    pub phone: String,
    pub address: String,
    #[serde(rename = "speciality")]
    pub specialty: String,
    #[serde(default = "default_member_impact")]
    pub member_impact: u32,
}

fn default_member_impact() -> u32 {
    DEFAULT_MEMBER_IMPACT
}

impl ProviderInput {
    /// Field map stored as a row's `raw_fields` when the row did not come
    /// from a tabular source.
    pub fn to_raw_fields(&self) -> RawFields {
        [
            ("name".to_string(), self.name.clone()),
            ("npi".to_string(), self.npi.clone()),
            ("mobile_no".to_string(), self.phone.clone()),
            ("address".to_string(), self.address.clone()),
            ("speciality".to_string(), self.specialty.clone()),
            ("member_impact".to_string(), self.member_impact.to_string()),
        ]
        .into_iter()
        .collect()
    }
}

/// A corrected or confirmed value together with the oracle's confidence in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWithConfidence {
    pub value: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl FieldWithConfidence {
    pub fn new(value: impl Into<String>, confidence: f64) -> Self {
        Self {
            value: value.into(),
            confidence,
            note: None,
        }
    }
}

/// Per-field oracle output. Absent fields are tolerated and score 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutput {
    #[serde(default)]
    pub name: Option<FieldWithConfidence>,
    #[serde(default)]
    pub npi: Option<FieldWithConfidence>,
    #[serde(default, rename = "mobile_no")]
    pub phone: Option<FieldWithConfidence>,
    #[serde(default)]
    pub address: Option<FieldWithConfidence>,
    #[serde(default, rename = "speciality")]
    pub specialty: Option<FieldWithConfidence>,
}

impl ProviderOutput {
    /// The five field confidences in canonical order, 0 for absent fields.
    pub fn confidences(&self) -> [f64; 5] {
        [
            &self.name,
            &self.npi,
            &self.phone,
            &self.address,
            &self.specialty,
        ]
        .map(|field| field.as_ref().map_or(0.0, |f| f.confidence))
    }
}

/// Coarse urgency bucket assigned by the oracle.
///
/// Known levels match case-insensitively and are written back in upper case,
/// so `"high"` round-trips as `"HIGH"`. Unknown values keep their spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PriorityLevel {
    High,
    Medium,
    Low,
    Other(String),
}

impl PriorityLevel {
    pub fn as_str(&self) -> &str {
        match self {
            PriorityLevel::High => "HIGH",
            PriorityLevel::Medium => "MEDIUM",
            PriorityLevel::Low => "LOW",
            PriorityLevel::Other(s) => s,
        }
    }
}

impl From<String> for PriorityLevel {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "HIGH" => PriorityLevel::High,
            "MEDIUM" => PriorityLevel::Medium,
            "LOW" => PriorityLevel::Low,
            _ => PriorityLevel::Other(s),
        }
    }
}

impl From<&str> for PriorityLevel {
    fn from(s: &str) -> Self {
        PriorityLevel::from(s.to_string())
    }
}

impl From<PriorityLevel> for String {
    fn from(level: PriorityLevel) -> Self {
        level.as_str().to_string()
    }
}

impl Default for PriorityLevel {
    fn default() -> Self {
        PriorityLevel::Medium
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The oracle's validation result for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReport {
    pub provider_input: ProviderInput,
    #[serde(default)]
    pub provider_output: ProviderOutput,
    pub status: String,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub priority_score: f64,
    #[serde(default)]
    pub priority_level: PriorityLevel,
}
