use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical field a CSV column can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    FirstName,
    LastName,
    Team,
    Date,
    Tactic,
    Attempts,
    Contacts,
    NotHome,
    Refusal,
    BadData,
    Support,
    Oppose,
    Undecided,
}

impl Field {
    pub const METRICS: [Field; 8] = [
        Field::Attempts,
        Field::Contacts,
        Field::NotHome,
        Field::Refusal,
        Field::BadData,
        Field::Support,
        Field::Oppose,
        Field::Undecided,
    ];

    pub const REQUIRED: [Field; 4] = [Field::FirstName, Field::LastName, Field::Date, Field::Tactic];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::Team => "team",
            Field::Date => "date",
            Field::Tactic => "tactic",
            Field::Attempts => "attempts",
            Field::Contacts => "contacts",
            Field::NotHome => "not_home",
            Field::Refusal => "refusal",
            Field::BadData => "bad_data",
            Field::Support => "support",
            Field::Oppose => "oppose",
            Field::Undecided => "undecided",
        }
    }

    pub fn is_metric(self) -> bool {
        Self::METRICS.contains(&self)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Count(i64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value.as_str()),
            FieldValue::Count(_) => None,
        }
    }

    pub fn as_count(&self) -> Option<i64> {
        match self {
            FieldValue::Count(value) => Some(*value),
            FieldValue::Text(_) => None,
        }
    }
}

/// A transformed CSV row before defaults and validation are applied.
pub type PartialRecord = BTreeMap<Field, FieldValue>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoterContactRecord {
    pub first_name: String,
    pub last_name: String,
    pub team: String,
    pub date: String,
    pub tactic: String,
    pub attempts: i64,
    pub contacts: i64,
    pub not_home: i64,
    pub refusal: i64,
    pub bad_data: i64,
    pub support: i64,
    pub oppose: i64,
    pub undecided: i64,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    /// Stamped from the owner at upload time.
    pub label: Option<String>,
}

impl VoterContactRecord {
    /// Not-reached outcomes, reported as "issues" on the timeline.
    pub fn issues(&self) -> i64 {
        self.not_home + self.refusal + self.bad_data
    }

    pub fn metric(&self, field: Field) -> i64 {
        match field {
            Field::Attempts => self.attempts,
            Field::Contacts => self.contacts,
            Field::NotHome => self.not_home,
            Field::Refusal => self.refusal,
            Field::BadData => self.bad_data,
            Field::Support => self.support,
            Field::Oppose => self.oppose,
            Field::Undecided => self.undecided,
            _ => 0,
        }
    }

    /// Uniqueness key enforced at ingestion time.
    pub fn identity_key(&self) -> (String, String, String, String) {
        (
            self.first_name.to_lowercase(),
            self.last_name.to_lowercase(),
            self.date.clone(),
            self.tactic.to_lowercase(),
        )
    }
}

/// The user an upload belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub user_id: String,
    pub email: String,
}

impl Owner {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }

    pub fn label(&self) -> String {
        format!("voter contact - {}", self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidRow {
    /// 1-based position among the data rows (the header is row 0).
    pub row: usize,
    pub reason: String,
    pub record: PartialRecord,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid_data: Vec<VoterContactRecord>,
    pub invalid_data: Vec<InvalidRow>,
}

/// Sparse filter shared by aggregation queries and the natural-language front end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryParams {
    pub tactic: Option<String>,
    pub person: Option<String>,
    pub date: Option<String>,
    #[serde(alias = "result_type")]
    pub result_type: Option<String>,
    pub team: Option<String>,
    #[serde(alias = "search_query")]
    pub search_query: Option<String>,
}

impl QueryParams {
    /// Drops fields that are blank after trimming.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            tactic: clean(self.tactic),
            person: clean(self.person),
            date: clean(self.date),
            result_type: clean(self.result_type),
            team: clean(self.team),
            search_query: clean(self.search_query),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tactic.is_none()
            && self.person.is_none()
            && self.date.is_none()
            && self.result_type.is_none()
            && self.team.is_none()
            && self.search_query.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TacticTotals {
    pub sms: i64,
    pub phone: i64,
    pub canvas: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContactTotals {
    pub support: i64,
    pub oppose: i64,
    pub undecided: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotReachedTotals {
    pub not_home: i64,
    pub refusal: i64,
    pub bad_data: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateTotals {
    pub date: String,
    pub attempts: i64,
    pub contacts: i64,
    pub issues: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterMetrics {
    pub tactics: TacticTotals,
    pub contacts: ContactTotals,
    pub not_reached: NotReachedTotals,
    pub by_date: Vec<DateTotals>,
    pub record_count: usize,
}

impl VoterMetrics {
    pub fn total_attempts(&self) -> i64 {
        self.tactics.sms + self.tactics.phone + self.tactics.canvas
    }

    pub fn total_contacts(&self) -> i64 {
        self.contacts.support + self.contacts.oppose + self.contacts.undecided
    }

    pub fn total_issues(&self) -> i64 {
        self.not_reached.not_home + self.not_reached.refusal + self.not_reached.bad_data
    }

    pub fn has_data(&self) -> bool {
        self.total_attempts() > 0 || self.total_contacts() > 0 || self.total_issues() > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub team: String,
    pub attempts: i64,
    pub contacts: i64,
    pub support: i64,
    pub contact_rate: f64,
}
