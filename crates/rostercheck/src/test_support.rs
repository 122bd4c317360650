//! Shared fixtures for unit tests.

use crate::model::{
    FieldWithConfidence, PriorityLevel, ProviderInput, ProviderOutput, ProviderReport, RawFields,
};

pub fn input(name: &str) -> ProviderInput {
    ProviderInput {
        name: name.to_string(),
        npi: format!("npi-{}", name),
        phone: "555-0100".to_string(),
        address: "1 Main St".to_string(),
        specialty: "Family Medicine".to_string(),
        member_impact: 3,
    }
}

pub fn raw_rows(n: usize) -> Vec<RawFields> {
    (0..n)
        .map(|i| {
            let mut raw = RawFields::new();
            raw.insert("name".to_string(), format!("Provider {}", i));
            raw
        })
        .collect()
}

pub fn report(status: &str, priority_score: f64, confidences: [f64; 5]) -> ProviderReport {
    let field = |c: f64| Some(FieldWithConfidence::new("value", c));
    ProviderReport {
        provider_input: input("p"),
        provider_output: ProviderOutput {
            name: field(confidences[0]),
            npi: field(confidences[1]),
            phone: field(confidences[2]),
            address: field(confidences[3]),
            specialty: field(confidences[4]),
        },
        status: status.to_string(),
        reasons: vec![],
        priority_score,
        priority_level: PriorityLevel::Medium,
    }
}
