use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::header_mapper::HeaderMapping;
use crate::models::{Field, FieldValue, PartialRecord};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%m/%d/%y",
    "%m-%d-%y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Coerces a metric cell to a non-negative integer. Never fails: anything
/// that does not start with a number becomes 0.
pub fn parse_count(raw: &str) -> i64 {
    let value = raw.trim();
    if value.is_empty() {
        return 0;
    }

    if let Ok(parsed) = value.parse::<i64>() {
        return parsed.max(0);
    }

    // Leading integer prefix: "12 calls" -> 12, "3.9" -> 3, "1e5" -> 1
    let unsigned = value.strip_prefix('+').unwrap_or(value);
    if unsigned.starts_with('-') {
        return 0;
    }
    let digits: String = unsigned.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().unwrap_or(0)
}

pub fn normalize_team(raw: &str) -> String {
    let value = raw.trim();
    let lowered = value.to_lowercase();

    if lowered.contains("tony") {
        "Team Tony".to_string()
    } else if lowered.contains("party") || lowered.contains("local") {
        "Local Party".to_string()
    } else if lowered.contains("candidate") {
        "Candidate".to_string()
    } else {
        value.to_string()
    }
}

/// Best-effort date recognition over the spellings seen in campaign exports.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            if plausible(parsed.date()) {
                return Some(parsed.date());
            }
        }
    }

    // chrono reads "24" as year 24 under %Y; the year floor sends such
    // values on to the two-digit formats.
    DATE_FORMATS
        .iter()
        .filter_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .find(|date| plausible(*date))
}

fn plausible(date: NaiveDate) -> bool {
    date.year() >= 1000
}

/// Reformats recognized dates as `YYYY-MM-DD`; anything else is kept as given.
pub fn normalize_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => raw.to_string(),
    }
}

pub fn transform_value(field: Field, raw: &str) -> FieldValue {
    if field.is_metric() {
        return FieldValue::Count(parse_count(raw));
    }

    match field {
        Field::Team => FieldValue::Text(normalize_team(raw)),
        Field::Date => FieldValue::Text(normalize_date(raw)),
        _ => FieldValue::Text(raw.trim().to_string()),
    }
}

pub fn transform_rows(data: &[Vec<String>], mapping: &HeaderMapping) -> Vec<PartialRecord> {
    data.iter()
        .map(|row| {
            mapping
                .columns
                .iter()
                .filter_map(|(index, field)| {
                    row.get(*index)
                        .map(|raw| (*field, transform_value(*field, raw)))
                })
                .collect()
        })
        .collect()
}
