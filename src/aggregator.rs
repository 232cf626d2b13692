use std::collections::BTreeMap;

use serde::Serialize;

use crate::diagnostics::ErrorReporter;
use crate::error::StoreError;
use crate::generation::RequestGate;
use crate::models::{DateTotals, Field, QueryParams, VoterContactRecord, VoterMetrics};
use crate::store::{ContactStore, PersonFilter, RecordFilter};
use crate::transformer::normalize_date;

pub const EMPTY_QUERY_ERROR: &str = "Please select at least one field to query.";

/// Which total a query reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Attempts,
    Contacts,
    Support,
    Oppose,
    Undecided,
    NotHome,
    Refusal,
    BadData,
    NotReached,
}

impl ResultType {
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match key.as_str() {
            "attempts" | "attempt" => Some(ResultType::Attempts),
            "contacts" | "contact" | "contacted" => Some(ResultType::Contacts),
            "support" | "supports" | "supporters" => Some(ResultType::Support),
            "oppose" | "opposed" | "opposition" => Some(ResultType::Oppose),
            "undecided" | "undecideds" => Some(ResultType::Undecided),
            "nothome" => Some(ResultType::NotHome),
            "refusal" | "refusals" | "refused" => Some(ResultType::Refusal),
            "baddata" => Some(ResultType::BadData),
            "notreached" | "issues" => Some(ResultType::NotReached),
            _ => None,
        }
    }

    pub fn total(self, records: &[VoterContactRecord]) -> i64 {
        let field = match self {
            ResultType::Attempts => Field::Attempts,
            ResultType::Contacts => Field::Contacts,
            ResultType::Support => Field::Support,
            ResultType::Oppose => Field::Oppose,
            ResultType::Undecided => Field::Undecided,
            ResultType::NotHome => Field::NotHome,
            ResultType::Refusal => Field::Refusal,
            ResultType::BadData => Field::BadData,
            ResultType::NotReached => {
                return records.iter().map(VoterContactRecord::issues).sum();
            }
        };
        records.iter().map(|record| record.metric(field)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TacticBucket {
    Sms,
    Phone,
    Canvas,
}

pub fn tactic_bucket(tactic: &str) -> Option<TacticBucket> {
    let lowered = tactic.trim().to_lowercase();
    if lowered.contains("sms") || lowered.contains("text") {
        Some(TacticBucket::Sms)
    } else if lowered.contains("phone") || lowered.contains("call") {
        Some(TacticBucket::Phone)
    } else if lowered.contains("canvas") || lowered.contains("door") || lowered.contains("knock") {
        Some(TacticBucket::Canvas)
    } else {
        None
    }
}

pub fn aggregate(records: &[VoterContactRecord]) -> VoterMetrics {
    let mut metrics = VoterMetrics {
        record_count: records.len(),
        ..Default::default()
    };
    let mut by_date: BTreeMap<&str, DateTotals> = BTreeMap::new();

    for record in records {
        match tactic_bucket(&record.tactic) {
            Some(TacticBucket::Sms) => metrics.tactics.sms += record.attempts,
            Some(TacticBucket::Phone) => metrics.tactics.phone += record.attempts,
            Some(TacticBucket::Canvas) => metrics.tactics.canvas += record.attempts,
            None => {}
        }

        metrics.contacts.support += record.support;
        metrics.contacts.oppose += record.oppose;
        metrics.contacts.undecided += record.undecided;

        metrics.not_reached.not_home += record.not_home;
        metrics.not_reached.refusal += record.refusal;
        metrics.not_reached.bad_data += record.bad_data;

        let entry = by_date
            .entry(record.date.as_str())
            .or_insert_with(|| DateTotals {
                date: record.date.clone(),
                attempts: 0,
                contacts: 0,
                issues: 0,
            });
        entry.attempts += record.attempts;
        entry.contacts += record.contacts;
        entry.issues += record.issues();
    }

    metrics.by_date = by_date.into_values().collect();
    metrics
}

pub fn record_filter(user_id: Option<&str>, params: &QueryParams) -> RecordFilter {
    RecordFilter {
        user_id: user_id.map(str::to_string),
        tactic: params.tactic.clone(),
        date: params.date.as_deref().map(normalize_date),
        team: params.team.clone(),
        person: params.person.as_deref().and_then(PersonFilter::parse),
    }
}

pub fn matches_search(record: &VoterContactRecord, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    let full_name = format!("{} {}", record.first_name, record.last_name);
    [
        full_name.as_str(),
        record.team.as_str(),
        record.tactic.as_str(),
        record.date.as_str(),
        record.label.as_deref().unwrap_or(""),
    ]
    .iter()
    .any(|haystack| haystack.to_lowercase().contains(&needle))
}

/// Aggregation query result: either a total or an error, never both.
/// `no_data` marks a successful query that matched nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    pub result: Option<i64>,
    pub error: Option<String>,
    pub no_data: bool,
}

impl QueryOutcome {
    pub fn total(result: i64) -> Self {
        Self {
            result: Some(result),
            error: None,
            no_data: false,
        }
    }

    pub fn no_data() -> Self {
        Self {
            result: Some(0),
            error: None,
            no_data: true,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
            no_data: false,
        }
    }
}

pub struct Aggregator<'a> {
    store: &'a dyn ContactStore,
    reporter: &'a ErrorReporter,
    gate: RequestGate,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a dyn ContactStore, reporter: &'a ErrorReporter) -> Self {
        Self {
            store,
            reporter,
            gate: RequestGate::new(),
        }
    }

    /// Fetches records for `user_id` (all users when `None`), narrowed by
    /// `params` when given. Equality filters run in the store; the free-text
    /// search runs here.
    pub async fn fetch_records(
        &self,
        user_id: Option<&str>,
        params: Option<&QueryParams>,
    ) -> Result<Vec<VoterContactRecord>, StoreError> {
        let params = params.cloned().map(QueryParams::normalized);
        let filter = match &params {
            Some(params) => record_filter(user_id, params),
            None => RecordFilter::for_user(user_id),
        };

        let mut records = self.store.fetch_records(&filter).await?;
        if let Some(search) = params.as_ref().and_then(|p| p.search_query.as_deref()) {
            records.retain(|record| matches_search(record, search));
        }
        Ok(records)
    }

    pub async fn fetch_metrics(
        &self,
        user_id: Option<&str>,
        params: Option<&QueryParams>,
    ) -> Result<VoterMetrics, StoreError> {
        match self.fetch_records(user_id, params).await {
            Ok(records) => Ok(aggregate(&records)),
            Err(err) => {
                self.reporter.report("metrics", &err);
                Err(err)
            }
        }
    }

    pub async fn query(&self, user_id: Option<&str>, params: &QueryParams) -> QueryOutcome {
        let params = params.clone().normalized();
        if params.is_empty() {
            return QueryOutcome::failed(EMPTY_QUERY_ERROR);
        }

        let result_type = match params.result_type.as_deref() {
            None => ResultType::Attempts,
            Some(raw) => match ResultType::parse(raw) {
                Some(result_type) => result_type,
                None => return QueryOutcome::failed(format!("Unknown result type: {raw}")),
            },
        };

        match self.fetch_records(user_id, Some(&params)).await {
            Ok(records) if records.is_empty() => {
                tracing::info!(?params, "query matched no records");
                QueryOutcome::no_data()
            }
            Ok(records) => QueryOutcome::total(result_type.total(&records)),
            Err(err) => {
                self.reporter.report("query", &err);
                QueryOutcome::failed(err.to_string())
            }
        }
    }

    /// Like `query`, but returns `None` if a newer request was issued on this
    /// aggregator while this one was in flight.
    pub async fn query_latest(
        &self,
        user_id: Option<&str>,
        params: &QueryParams,
    ) -> Option<QueryOutcome> {
        let ticket = self.gate.issue();
        let outcome = self.query(user_id, params).await;
        self.gate.admit(ticket, outcome)
    }

    pub async fn metrics_latest(
        &self,
        user_id: Option<&str>,
        params: Option<&QueryParams>,
    ) -> Option<Result<VoterMetrics, StoreError>> {
        let ticket = self.gate.issue();
        let metrics = self.fetch_metrics(user_id, params).await;
        self.gate.admit(ticket, metrics)
    }
}
