use thiserror::Error;

/// Failures raised before or during an import. Validation problems are not
/// errors; they end up in `ValidationReport::invalid_data`.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Malformed file: {0}")]
    MalformedFile(String),

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("Unsupported file type: {0} (expected a .csv file)")]
    WrongType(String),

    #[error("No valid rows to upload ({invalid} rows rejected)")]
    NoValidRows { invalid: usize },

    #[error(transparent)]
    Upload(#[from] UploadError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("voter contact tables are missing; run `init-db` first")]
    SchemaMissing,

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        // 42P01 undefined_table, 3F000 invalid_schema_name
        let missing = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code == "42P01" || code == "3F000")
            .unwrap_or(false);

        if missing {
            StoreError::SchemaMissing
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("batch {batch} of {total} failed: {source}")]
    Batch {
        batch: usize,
        total: usize,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl UploadError {
    pub fn is_schema_missing(&self) -> bool {
        matches!(
            self,
            UploadError::Store(StoreError::SchemaMissing)
                | UploadError::Batch {
                    source: StoreError::SchemaMissing,
                    ..
                }
        )
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("LLM endpoint is not configured (set VOTER_LLM_ENDPOINT)")]
    NotConfigured,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_missing_is_detected_through_batch_errors() {
        let err = UploadError::Batch {
            batch: 2,
            total: 3,
            source: StoreError::SchemaMissing,
        };
        assert!(err.is_schema_missing());
        assert!(err.to_string().starts_with("batch 2 of 3 failed"));

        let generic = UploadError::Store(StoreError::Backend("timeout".into()));
        assert!(!generic.is_schema_missing());
    }
}
