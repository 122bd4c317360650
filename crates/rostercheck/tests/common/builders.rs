//! Builders for test data.

#![allow(dead_code)]

use rostercheck::model::{FieldWithConfidence, PriorityLevel, ProviderOutput, RawFields};
use rostercheck::{ProviderInput, ProviderReport};

pub fn provider(name: &str) -> ProviderInput {
    ProviderInput {
        name: name.to_string(),
        npi: format!("{:010}", name.len()),
        phone: "555-0100".to_string(),
        address: "1 Main St".to_string(),
        specialty: "Cardiology".to_string(),
        member_impact: 3,
    }
}

pub fn providers(n: usize) -> Vec<ProviderInput> {
    (0..n).map(|i| provider(&format!("Provider {}", i))).collect()
}

/// Parsed tabular rows carrying only a name column.
pub fn raw_rows(n: usize) -> Vec<RawFields> {
    (0..n)
        .map(|i| {
            let mut row = RawFields::new();
            row.insert("name".to_string(), format!("Provider {}", i));
            row
        })
        .collect()
}

/// CSV upload with one line per provider.
pub fn roster_csv(n: usize) -> Vec<u8> {
    let mut csv = String::from("Name,NPI,phone,Address,specialty,member_impact\n");
    for i in 0..n {
        csv.push_str(&format!(
            "Provider {i},{i:010},555-01{i:02},{i} Main St,Cardiology,{}\n",
            1 + i % 5
        ));
    }
    csv.into_bytes()
}

/// Builder for oracle reports.
pub struct ReportBuilder {
    input: ProviderInput,
    status: String,
    confidences: [f64; 5],
    reasons: Vec<String>,
    priority_score: f64,
    priority_level: PriorityLevel,
}

impl ReportBuilder {
    pub fn new(input: ProviderInput) -> Self {
        Self {
            input,
            status: "confirmed".to_string(),
            confidences: [0.9; 5],
            reasons: vec![],
            priority_score: 1.0,
            priority_level: PriorityLevel::Low,
        }
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn confidences(mut self, confidences: [f64; 5]) -> Self {
        self.confidences = confidences;
        self
    }

    pub fn confidence(self, confidence: f64) -> Self {
        self.confidences([confidence; 5])
    }

    pub fn reason(mut self, reason: &str) -> Self {
        self.reasons.push(reason.to_string());
        self
    }

    pub fn priority(mut self, score: f64, level: PriorityLevel) -> Self {
        self.priority_score = score;
        self.priority_level = level;
        self
    }

    pub fn build(self) -> ProviderReport {
        let [name, npi, phone, address, specialty] = self.confidences;
        ProviderReport {
            provider_output: ProviderOutput {
                name: Some(FieldWithConfidence::new(self.input.name.clone(), name)),
                npi: Some(FieldWithConfidence::new(self.input.npi.clone(), npi)),
                phone: Some(FieldWithConfidence::new(self.input.phone.clone(), phone)),
                address: Some(FieldWithConfidence::new(self.input.address.clone(), address)),
                specialty: Some(FieldWithConfidence::new(self.input.specialty.clone(), specialty)),
            },
            provider_input: self.input,
            status: self.status,
            reasons: self.reasons,
            priority_score: self.priority_score,
            priority_level: self.priority_level,
        }
    }
}

pub fn confirmed(input: &ProviderInput) -> ProviderReport {
    ReportBuilder::new(input.clone()).build()
}

pub fn needs_review(input: &ProviderInput, score: f64) -> ProviderReport {
    ReportBuilder::new(input.clone())
        .status("needs_review")
        .priority(score, PriorityLevel::High)
        .confidence(0.5)
        .build()
}
