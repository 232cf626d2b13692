use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Owner, VoterContactRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Committed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Committed => "committed",
            UploadStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonFilter {
    Full { first: String, last: String },
    /// A single token, matched against either name column.
    Either(String),
}

impl PersonFilter {
    /// Splits a display name on the first run of whitespace.
    pub fn parse(display: &str) -> Option<Self> {
        let mut tokens = display.split_whitespace();
        let first = tokens.next()?.to_string();
        let rest: Vec<&str> = tokens.collect();

        if rest.is_empty() {
            Some(PersonFilter::Either(first))
        } else {
            Some(PersonFilter::Full {
                first,
                last: rest.join(" "),
            })
        }
    }
}

/// Equality filters a store applies before returning rows. String
/// comparisons ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub user_id: Option<String>,
    pub tactic: Option<String>,
    pub date: Option<String>,
    pub team: Option<String>,
    pub person: Option<PersonFilter>,
}

impl RecordFilter {
    pub fn for_user(user_id: Option<&str>) -> Self {
        Self {
            user_id: user_id.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &VoterContactRecord) -> bool {
        fn eq(expected: &Option<String>, actual: &str) -> bool {
            expected
                .as_deref()
                .map(|value| value.eq_ignore_ascii_case(actual))
                .unwrap_or(true)
        }

        let owner_matches = match &self.user_id {
            Some(user_id) => record.user_id.as_deref() == Some(user_id.as_str()),
            None => true,
        };

        let person_matches = match &self.person {
            Some(PersonFilter::Full { first, last }) => {
                first.eq_ignore_ascii_case(&record.first_name)
                    && last.eq_ignore_ascii_case(&record.last_name)
            }
            Some(PersonFilter::Either(name)) => {
                name.eq_ignore_ascii_case(&record.first_name)
                    || name.eq_ignore_ascii_case(&record.last_name)
            }
            None => true,
        };

        owner_matches
            && person_matches
            && eq(&self.tactic, &record.tactic)
            && eq(&self.date, &record.date)
            && eq(&self.team, &record.team)
    }
}

/// Persistence for voter-contact rows.
///
/// Uploads are generations: rows are written under a pending generation and
/// only become visible to `fetch_records` once `commit_upload` has replaced
/// the owner's previous generation.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn start_upload(&self, owner: &Owner) -> Result<Uuid, StoreError>;

    async fn insert_batch(
        &self,
        upload_id: Uuid,
        records: &[VoterContactRecord],
    ) -> Result<(), StoreError>;

    async fn commit_upload(
        &self,
        owner: &Owner,
        upload_id: Uuid,
        record_count: usize,
    ) -> Result<(), StoreError>;

    async fn discard_upload(&self, upload_id: Uuid) -> Result<(), StoreError>;

    /// Deletes every generation the user owns; returns the number of rows removed.
    async fn clear_user(&self, user_id: &str) -> Result<u64, StoreError>;

    async fn fetch_records(&self, filter: &RecordFilter)
        -> Result<Vec<VoterContactRecord>, StoreError>;
}

#[derive(Debug)]
struct UploadEntry {
    user_id: String,
    status: UploadStatus,
}

#[derive(Debug, Default)]
struct MemoryState {
    uploads: HashMap<Uuid, UploadEntry>,
    rows: Vec<(Uuid, VoterContactRecord)>,
    batches_written: usize,
}

/// Process-local store used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_on_batch: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `n`th `insert_batch` call (1-based) fails.
    pub fn failing_on_batch(n: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            fail_on_batch: Some(n),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    pub fn row_count(&self) -> usize {
        self.lock().map(|state| state.rows.len()).unwrap_or(0)
    }

    pub fn upload_status(&self, upload_id: Uuid) -> Option<UploadStatus> {
        self.lock()
            .ok()
            .and_then(|state| state.uploads.get(&upload_id).map(|entry| entry.status))
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn start_upload(&self, owner: &Owner) -> Result<Uuid, StoreError> {
        let upload_id = Uuid::new_v4();
        self.lock()?.uploads.insert(
            upload_id,
            UploadEntry {
                user_id: owner.user_id.clone(),
                status: UploadStatus::Pending,
            },
        );
        Ok(upload_id)
    }

    async fn insert_batch(
        &self,
        upload_id: Uuid,
        records: &[VoterContactRecord],
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.batches_written += 1;
        if self.fail_on_batch == Some(state.batches_written) {
            return Err(StoreError::Backend("simulated write failure".to_string()));
        }
        if !state.uploads.contains_key(&upload_id) {
            return Err(StoreError::Backend(format!("unknown upload {upload_id}")));
        }

        state
            .rows
            .extend(records.iter().cloned().map(|record| (upload_id, record)));
        Ok(())
    }

    async fn commit_upload(
        &self,
        owner: &Owner,
        upload_id: Uuid,
        _record_count: usize,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let superseded: Vec<Uuid> = state
            .uploads
            .iter()
            .filter(|(id, entry)| **id != upload_id && entry.user_id == owner.user_id)
            .map(|(id, _)| *id)
            .collect();

        for id in &superseded {
            state.uploads.remove(id);
        }
        state.rows.retain(|(id, _)| !superseded.contains(id));

        match state.uploads.get_mut(&upload_id) {
            Some(entry) => {
                entry.status = UploadStatus::Committed;
                Ok(())
            }
            None => Err(StoreError::Backend(format!("unknown upload {upload_id}"))),
        }
    }

    async fn discard_upload(&self, upload_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.rows.retain(|(id, _)| *id != upload_id);
        if let Some(entry) = state.uploads.get_mut(&upload_id) {
            entry.status = UploadStatus::Failed;
        }
        Ok(())
    }

    async fn clear_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut state = self.lock()?;
        let owned: Vec<Uuid> = state
            .uploads
            .iter()
            .filter(|(_, entry)| entry.user_id == user_id)
            .map(|(id, _)| *id)
            .collect();

        state.uploads.retain(|id, _| !owned.contains(id));
        let before = state.rows.len();
        state.rows.retain(|(id, _)| !owned.contains(id));
        Ok((before - state.rows.len()) as u64)
    }

    async fn fetch_records(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<VoterContactRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .rows
            .iter()
            .filter(|(id, _)| {
                state
                    .uploads
                    .get(id)
                    .map(|entry| entry.status == UploadStatus::Committed)
                    .unwrap_or(false)
            })
            .map(|(_, record)| record)
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(first: &str, last: &str, tactic: &str) -> VoterContactRecord {
        VoterContactRecord {
            first_name: first.to_string(),
            last_name: last.to_string(),
            team: "Team Tony".to_string(),
            date: "2024-04-01".to_string(),
            tactic: tactic.to_string(),
            user_id: Some("u-1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn person_names_split_on_first_whitespace() {
        assert_eq!(
            PersonFilter::parse("Mary Ann  De Luca"),
            Some(PersonFilter::Full {
                first: "Mary".into(),
                last: "Ann De Luca".into()
            })
        );
        assert_eq!(PersonFilter::parse(" Lee "), Some(PersonFilter::Either("Lee".into())));
        assert_eq!(PersonFilter::parse("   "), None);
    }

    #[test]
    fn filters_compare_without_case() {
        let filter = RecordFilter {
            tactic: Some("phone".into()),
            person: PersonFilter::parse("ann lee"),
            ..Default::default()
        };
        assert!(filter.matches(&record("Ann", "Lee", "Phone")));
        assert!(!filter.matches(&record("Ann", "Lee", "SMS")));
        assert!(!filter.matches(&record("Bo", "Lee", "Phone")));
    }

    #[tokio::test]
    async fn pending_uploads_are_invisible() {
        let store = MemoryStore::new();
        let owner = Owner::new("u-1", "ann@example.com");
        let upload = store.start_upload(&owner).await.unwrap();
        store
            .insert_batch(upload, &[record("Ann", "Lee", "Phone")])
            .await
            .unwrap();

        let all = RecordFilter::default();
        assert!(store.fetch_records(&all).await.unwrap().is_empty());

        store.commit_upload(&owner, upload, 1).await.unwrap();
        assert_eq!(store.fetch_records(&all).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commit_replaces_previous_generation() {
        let store = MemoryStore::new();
        let owner = Owner::new("u-1", "ann@example.com");

        let first = store.start_upload(&owner).await.unwrap();
        store
            .insert_batch(first, &[record("Ann", "Lee", "Phone"), record("Bo", "Kim", "SMS")])
            .await
            .unwrap();
        store.commit_upload(&owner, first, 2).await.unwrap();

        let second = store.start_upload(&owner).await.unwrap();
        store
            .insert_batch(second, &[record("Cy", "Diaz", "Canvas")])
            .await
            .unwrap();
        store.commit_upload(&owner, second, 1).await.unwrap();

        let rows = store.fetch_records(&RecordFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].first_name, "Cy");
        assert_eq!(store.upload_status(first), None);
    }

    #[tokio::test]
    async fn clear_user_removes_only_that_user() {
        let store = MemoryStore::new();
        for (user, name) in [("u-1", "Ann"), ("u-2", "Bo")] {
            let owner = Owner::new(user, format!("{user}@example.com"));
            let upload = store.start_upload(&owner).await.unwrap();
            let mut row = record(name, "Lee", "Phone");
            row.user_id = Some(user.to_string());
            store.insert_batch(upload, &[row]).await.unwrap();
            store.commit_upload(&owner, upload, 1).await.unwrap();
        }

        assert_eq!(store.clear_user("u-1").await.unwrap(), 1);
        let rows = store.fetch_records(&RecordFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].first_name, "Bo");
    }
}
