use serde::Serialize;
use uuid::Uuid;

use crate::error::UploadError;
use crate::models::{Owner, VoterContactRecord};
use crate::store::ContactStore;

pub const BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub upload_id: Uuid,
    pub records: usize,
    pub batches: usize,
}

pub fn stamp_owner(records: &mut [VoterContactRecord], owner: &Owner) {
    let label = owner.label();
    for record in records.iter_mut() {
        record.user_id = Some(owner.user_id.clone());
        record.user_email = Some(owner.email.clone());
        record.label = Some(label.clone());
    }
}

pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let ratio = completed.min(total) as f64 / total as f64;
    (ratio * 100.0).round() as u8
}

/// Writes validated records in fixed-size batches, one batch at a time.
pub struct BatchUploader<'a> {
    store: &'a dyn ContactStore,
    batch_size: usize,
}

impl<'a> BatchUploader<'a> {
    pub fn new(store: &'a dyn ContactStore) -> Self {
        Self {
            store,
            batch_size: BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Uploads `records` as a new generation for `owner` and commits it,
    /// replacing the owner's previous records.
    ///
    /// `progress` receives the rounded completion percentage after each
    /// batch. The first failing batch aborts the upload and its partial
    /// generation is discarded, so earlier batches never become visible.
    pub async fn upload<F>(
        &self,
        mut records: Vec<VoterContactRecord>,
        owner: &Owner,
        mut progress: F,
    ) -> Result<UploadSummary, UploadError>
    where
        F: FnMut(u8),
    {
        stamp_owner(&mut records, owner);
        let total = records.len().div_ceil(self.batch_size);
        let upload_id = self.store.start_upload(owner).await?;
        tracing::info!(%upload_id, user_id = %owner.user_id, records = records.len(), batches = total, "upload started");

        for (index, batch) in records.chunks(self.batch_size).enumerate() {
            if let Err(source) = self.store.insert_batch(upload_id, batch).await {
                tracing::warn!(%upload_id, batch = index + 1, total, error = %source, "batch failed, discarding upload");
                self.discard(upload_id).await;
                return Err(UploadError::Batch {
                    batch: index + 1,
                    total,
                    source,
                });
            }
            progress(progress_percent(index + 1, total));
        }

        if total == 0 {
            progress(100);
        }

        if let Err(err) = self
            .store
            .commit_upload(owner, upload_id, records.len())
            .await
        {
            self.discard(upload_id).await;
            return Err(err.into());
        }

        tracing::info!(%upload_id, records = records.len(), "upload committed");
        Ok(UploadSummary {
            upload_id,
            records: records.len(),
            batches: total,
        })
    }

    async fn discard(&self, upload_id: Uuid) {
        if let Err(err) = self.store.discard_upload(upload_id).await {
            tracing::error!(%upload_id, error = %err, "failed to discard partial upload");
        }
    }
}
