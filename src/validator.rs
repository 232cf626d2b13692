use std::collections::HashMap;

use crate::models::{Field, FieldValue, InvalidRow, PartialRecord, ValidationReport, VoterContactRecord};

pub const DEFAULT_TEAM: &str = "Team Tony";

/// Fills metric defaults and the default team in place.
pub fn enhance(record: &mut PartialRecord) {
    for field in Field::METRICS {
        record.entry(field).or_insert(FieldValue::Count(0));
    }

    let team_missing = record
        .get(&Field::Team)
        .and_then(FieldValue::as_text)
        .map(|team| team.trim().is_empty())
        .unwrap_or(true);
    if team_missing {
        record.insert(Field::Team, FieldValue::Text(DEFAULT_TEAM.to_string()));
    }
}

pub fn missing_required(record: &PartialRecord) -> Vec<Field> {
    Field::REQUIRED
        .iter()
        .copied()
        .filter(|field| {
            record
                .get(field)
                .and_then(FieldValue::as_text)
                .map(|value| value.trim().is_empty())
                .unwrap_or(true)
        })
        .collect()
}

fn text(record: &PartialRecord, field: Field) -> String {
    record
        .get(&field)
        .and_then(FieldValue::as_text)
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

fn count(record: &PartialRecord, field: Field) -> i64 {
    record
        .get(&field)
        .and_then(FieldValue::as_count)
        .unwrap_or(0)
        .max(0)
}

pub fn to_record(record: &PartialRecord) -> VoterContactRecord {
    VoterContactRecord {
        first_name: text(record, Field::FirstName),
        last_name: text(record, Field::LastName),
        team: text(record, Field::Team),
        date: text(record, Field::Date),
        tactic: text(record, Field::Tactic),
        attempts: count(record, Field::Attempts),
        contacts: count(record, Field::Contacts),
        not_home: count(record, Field::NotHome),
        refusal: count(record, Field::Refusal),
        bad_data: count(record, Field::BadData),
        support: count(record, Field::Support),
        oppose: count(record, Field::Oppose),
        undecided: count(record, Field::Undecided),
        user_id: None,
        user_email: None,
        label: None,
    }
}

/// Partitions rows into complete records and rejected rows. Every input row
/// lands in exactly one partition.
///
/// A row that repeats the (name, date, tactic) of an earlier valid row is
/// rejected as a duplicate.
pub fn validate(rows: Vec<PartialRecord>) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen: HashMap<(String, String, String, String), usize> = HashMap::new();

    for (index, mut row) in rows.into_iter().enumerate() {
        let position = index + 1;
        enhance(&mut row);

        let missing = missing_required(&row);
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|field| field.as_str()).collect();
            report.invalid_data.push(InvalidRow {
                row: position,
                reason: format!("Missing required fields: {}", names.join(", ")),
                record: row,
            });
            continue;
        }

        let record = to_record(&row);
        if let Some(first) = seen.get(&record.identity_key()) {
            report.invalid_data.push(InvalidRow {
                row: position,
                reason: format!("Duplicate of row {first}"),
                record: row,
            });
            continue;
        }

        seen.insert(record.identity_key(), position);
        report.valid_data.push(record);
    }

    tracing::debug!(
        valid = report.valid_data.len(),
        invalid = report.invalid_data.len(),
        "validated rows"
    );
    report
}
