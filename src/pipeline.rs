use serde::Serialize;

use crate::csv_parser::{self, check_upload};
use crate::diagnostics::ErrorReporter;
use crate::error::IngestError;
use crate::header_mapper::map_headers;
use crate::models::{InvalidRow, Owner, ValidationReport};
use crate::store::ContactStore;
use crate::transformer::transform_rows;
use crate::uploader::{BatchUploader, UploadSummary};
use crate::validator::validate;

#[derive(Debug, Clone, Copy)]
pub struct CsvUpload<'a> {
    pub file_name: &'a str,
    pub mime: Option<&'a str>,
    pub bytes: &'a [u8],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedImport {
    pub total_rows: usize,
    pub unmapped_headers: Vec<String>,
    pub report: ValidationReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: Vec<InvalidRow>,
    pub unmapped_headers: Vec<String>,
    pub upload: UploadSummary,
}

/// Everything up to persistence: file checks, parsing, header mapping,
/// row transformation and validation.
pub fn prepare(upload: &CsvUpload<'_>) -> Result<PreparedImport, IngestError> {
    check_upload(upload.file_name, upload.mime, upload.bytes.len() as u64)?;

    let parsed = csv_parser::parse(upload.bytes)?;
    let mapping = map_headers(&parsed.headers);
    if !mapping.unmapped.is_empty() {
        tracing::info!(headers = ?mapping.unmapped, "ignoring unrecognized columns");
    }

    let rows = transform_rows(&parsed.data, &mapping);
    let report = validate(rows);
    for invalid in &report.invalid_data {
        tracing::debug!(row = invalid.row, reason = %invalid.reason, "row rejected");
    }

    Ok(PreparedImport {
        total_rows: parsed.data.len(),
        unmapped_headers: mapping.unmapped,
        report,
    })
}

/// Runs the whole import and replaces `owner`'s records with the valid rows.
pub async fn import<F>(
    store: &dyn ContactStore,
    reporter: &ErrorReporter,
    upload: &CsvUpload<'_>,
    owner: &Owner,
    progress: F,
) -> Result<ImportReport, IngestError>
where
    F: FnMut(u8),
{
    let prepared = prepare(upload)?;
    let ValidationReport {
        valid_data,
        invalid_data,
    } = prepared.report;

    if valid_data.is_empty() {
        return Err(IngestError::NoValidRows {
            invalid: invalid_data.len(),
        });
    }

    let valid_rows = valid_data.len();
    let summary = match BatchUploader::new(store)
        .upload(valid_data, owner, progress)
        .await
    {
        Ok(summary) => summary,
        Err(err) => {
            reporter.report("upload", &err);
            return Err(err.into());
        }
    };

    tracing::info!(
        file = upload.file_name,
        valid = valid_rows,
        invalid = invalid_data.len(),
        "import finished"
    );

    Ok(ImportReport {
        total_rows: prepared.total_rows,
        valid_rows,
        invalid_rows: invalid_data,
        unmapped_headers: prepared.unmapped_headers,
        upload: summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Aggregator;
    use crate::error::UploadError;
    use crate::models::QueryParams;
    use crate::store::{MemoryStore, RecordFilter};

    fn csv(content: &str) -> CsvUpload<'_> {
        CsvUpload {
            file_name: "contacts.csv",
            mime: Some("text/csv"),
            bytes: content.as_bytes(),
        }
    }

    #[tokio::test]
    async fn import_then_query_end_to_end() {
        let content = "First Name,Last,Date,Tactic,Attempts\n\
                       Ann,Lee,4/1/2024,Phone,10\n\
                       ,Lee,4/2/2024,SMS,5\n";
        let store = MemoryStore::new();
        let reporter = ErrorReporter::default();
        let owner = Owner::new("u-1", "ann@example.com");
        let mut progress = Vec::new();

        let report = import(&store, &reporter, &csv(content), &owner, |p| progress.push(p))
            .await
            .unwrap();

        assert_eq!(report.total_rows, 2);
        assert_eq!(report.valid_rows, 1);
        assert_eq!(report.invalid_rows.len(), 1);
        assert_eq!(report.invalid_rows[0].row, 2);
        assert_eq!(report.invalid_rows[0].reason, "Missing required fields: first_name");
        assert_eq!(progress, vec![100]);

        let rows = store.fetch_records(&RecordFilter::default()).await.unwrap();
        assert_eq!(rows[0].first_name, "Ann");
        assert_eq!(rows[0].date, "2024-04-01");
        assert_eq!(rows[0].team, "Team Tony");

        let aggregator = Aggregator::new(&store, &reporter);
        let outcome = aggregator
            .query(
                Some("u-1"),
                &QueryParams {
                    tactic: Some("Phone".into()),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(outcome.result, Some(10));
        assert_eq!(outcome.error, None);
    }

    #[tokio::test]
    async fn reimport_replaces_previous_records() {
        let store = MemoryStore::new();
        let reporter = ErrorReporter::default();
        let owner = Owner::new("u-1", "ann@example.com");

        let first = "first,last,date,tactic,attempts\nAnn,Lee,2024-04-01,Phone,10\nBo,Kim,2024-04-01,SMS,3\n";
        let second = "first,last,date,tactic,attempts\nCy,Diaz,2024-04-02,Canvas,7\n";
        import(&store, &reporter, &csv(first), &owner, |_| {}).await.unwrap();
        import(&store, &reporter, &csv(second), &owner, |_| {}).await.unwrap();

        let rows = store.fetch_records(&RecordFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].first_name, "Cy");
    }

    #[tokio::test]
    async fn format_errors_stop_before_persistence() {
        let store = MemoryStore::new();
        let reporter = ErrorReporter::default();
        let owner = Owner::new("u-1", "ann@example.com");

        let header_only = import(&store, &reporter, &csv("first,last\n"), &owner, |_| {}).await;
        assert!(matches!(header_only, Err(IngestError::MalformedFile(_))));

        let wrong_type = CsvUpload {
            file_name: "contacts.pdf",
            mime: Some("application/pdf"),
            bytes: b"first,last\nAnn,Lee\n",
        };
        let result = import(&store, &reporter, &wrong_type, &owner, |_| {}).await;
        assert!(matches!(result, Err(IngestError::WrongType(_))));

        let no_valid = import(&store, &reporter, &csv("first,last\nAnn,Lee\n"), &owner, |_| {}).await;
        assert!(matches!(no_valid, Err(IngestError::NoValidRows { invalid: 1 })));
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn upload_failures_surface_as_ingest_errors() {
        let store = MemoryStore::failing_on_batch(1);
        let reporter = ErrorReporter::default();
        let owner = Owner::new("u-1", "ann@example.com");
        let content = "first,last,date,tactic\nAnn,Lee,2024-04-01,Phone\n";

        let result = import(&store, &reporter, &csv(content), &owner, |_| {}).await;
        assert!(matches!(
            result,
            Err(IngestError::Upload(UploadError::Batch { batch: 1, total: 1, .. }))
        ));
    }
}
