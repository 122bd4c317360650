//! Delimited-text uploads: header row plus one provider per line.

use csv::{ReaderBuilder, Trim};

use crate::error::IngestError;
use crate::model::{ProviderInput, RawFields};

const NAME_COLUMNS: &[&str] = &["name", "Name"];
const NPI_COLUMNS: &[&str] = &["npi", "NPI"];
const PHONE_COLUMNS: &[&str] = &["mobile_no", "phone", "mobile"];
const ADDRESS_COLUMNS: &[&str] = &["address", "Address"];
const SPECIALTY_COLUMNS: &[&str] = &["speciality", "specialty"];
const IMPACT_COLUMNS: &[&str] = &["member_impact", "Member_Impact"];

/// Parses a comma-separated upload into one field map per data row.
///
/// Blank lines are skipped. Short rows are padded with empty values and
/// cells beyond the header are dropped.
pub fn parse_tabular(content: &[u8]) -> Result<Vec<RawFields>, IngestError> {
    let text = std::str::from_utf8(content).map_err(|_| IngestError::InvalidUtf8)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row: RawFields = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

fn first_of(row: &RawFields, columns: &[&str]) -> String {
    columns
        .iter()
        .find_map(|column| row.get(*column))
        .cloned()
        .unwrap_or_default()
}

/// Maps a tabular row to the canonical input, accepting common column aliases.
///
/// A missing, unparsable or zero member impact falls back to `default_impact`.
pub fn to_provider_input(row: &RawFields, default_impact: u32) -> ProviderInput {
    let member_impact = IMPACT_COLUMNS
        .iter()
        .find_map(|column| row.get(*column))
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default_impact);

    ProviderInput {
        name: first_of(row, NAME_COLUMNS),
        npi: first_of(row, NPI_COLUMNS),
        phone: first_of(row, PHONE_COLUMNS),
        address: first_of(row, ADDRESS_COLUMNS),
        specialty: first_of(row, SPECIALTY_COLUMNS),
        member_impact,
    }
}
