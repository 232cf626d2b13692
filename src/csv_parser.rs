use std::io;
use std::path::Path;

use crate::error::IngestError;
use crate::models::{Field, FieldValue, InvalidRow};

pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

const ACCEPTED_MIME_TYPES: &[&str] = &["text/csv", "application/csv", "application/vnd.ms-excel"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub data: Vec<Vec<String>>,
}

/// Rejects uploads by size and type before any bytes are parsed.
pub fn check_upload(file_name: &str, mime: Option<&str>, size: u64) -> Result<(), IngestError> {
    if size > MAX_FILE_BYTES {
        return Err(IngestError::TooLarge {
            size,
            limit: MAX_FILE_BYTES,
        });
    }

    let has_csv_extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    let has_csv_mime = mime
        .map(|m| {
            let essence = m.split(';').next().unwrap_or(m).trim();
            ACCEPTED_MIME_TYPES
                .iter()
                .any(|accepted| essence.eq_ignore_ascii_case(accepted))
        })
        .unwrap_or(false);

    if has_csv_extension || has_csv_mime {
        Ok(())
    } else {
        Err(IngestError::WrongType(
            mime.map(str::to_string)
                .unwrap_or_else(|| file_name.to_string()),
        ))
    }
}

/// Splits one line on commas outside double quotes. A quote only toggles
/// the quoted state and is never copied; `""` is not an escape.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for ch in line.chars() {
        match ch {
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Splits raw file content into a header row and a string matrix.
///
/// Parsing is line based: a quote never carries over to the next line, so
/// a stray quote can only damage its own row. Blank lines are skipped, and
/// a file needs a header line plus at least one data line.
pub fn parse(content: &[u8]) -> Result<ParsedCsv, IngestError> {
    let text = std::str::from_utf8(content)
        .map_err(|err| IngestError::MalformedFile(format!("file is not UTF-8 text ({err})")))?;

    if text.contains('\0') {
        return Err(IngestError::MalformedFile(
            "file contains binary data".to_string(),
        ));
    }

    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines: Vec<Vec<String>> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(split_line)
        .collect();

    if lines.len() < 2 {
        return Err(IngestError::MalformedFile(
            "expected a header row and at least one data row".to_string(),
        ));
    }

    let headers = lines.remove(0);
    Ok(ParsedCsv {
        headers,
        data: lines,
    })
}

/// Writes rejected rows as CSV: row number, reason, then the identity
/// fields that were recognized.
pub fn write_rejected<W: io::Write>(rows: &[InvalidRow], writer: W) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["row", "reason", "first_name", "last_name", "date", "tactic"])?;

    for invalid in rows {
        let text = move |field: Field| {
            invalid
                .record
                .get(&field)
                .and_then(FieldValue::as_text)
                .unwrap_or_default()
        };
        out.write_record([
            invalid.row.to_string().as_str(),
            invalid.reason.as_str(),
            text(Field::FirstName),
            text(Field::LastName),
            text(Field::Date),
            text(Field::Tactic),
        ])?;
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_fields_with_commas() {
        let csv = "first,last,team\nAnn,Lee,\"Local Party, North\"\n";
        let parsed = parse(csv.as_bytes()).unwrap();
        assert_eq!(parsed.headers, vec!["first", "last", "team"]);
        assert_eq!(parsed.data, vec![vec!["Ann", "Lee", "Local Party, North"]]);
    }

    #[test]
    fn stray_quote_stays_on_its_own_line() {
        let csv = "first,last,date,tactic\nAnn,\"O'Neil,2024-04-01,Phone\nBo,Kim,2024-04-01,SMS\nCy,Diaz,2024-04-02,Canvas\n";
        let parsed = parse(csv.as_bytes()).unwrap();
        assert_eq!(parsed.data.len(), 3);
        assert_eq!(parsed.data[0], vec!["Ann", "O'Neil,2024-04-01,Phone"]);
        assert_eq!(parsed.data[1], vec!["Bo", "Kim", "2024-04-01", "SMS"]);
        assert_eq!(parsed.data[2][0], "Cy");
    }

    #[test]
    fn doubled_quotes_are_not_escapes() {
        assert_eq!(split_line("\"x\"\"y\",z"), vec!["xy", "z"]);
        assert_eq!(split_line("a,,b"), vec!["a", "", "b"]);
        assert_eq!(split_line(""), vec![""]);
    }

    #[test]
    fn rejected_rows_are_written_as_csv() {
        let mut record = crate::models::PartialRecord::new();
        record.insert(Field::LastName, FieldValue::Text("Lee, Jr".into()));
        record.insert(Field::Attempts, FieldValue::Count(5));
        let rows = vec![InvalidRow {
            row: 2,
            reason: "Missing required fields: first_name".into(),
            record,
        }];

        let mut out = Vec::new();
        write_rejected(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("row,reason,first_name,last_name,date,tactic"));
        assert_eq!(
            lines.next(),
            Some("2,Missing required fields: first_name,,\"Lee, Jr\",,")
        );
    }

    #[test]
    fn skips_blank_lines() {
        let csv = "first,last\n\n   \nAnn,Lee\r\n\r\nBo,Kim\n";
        let parsed = parse(csv.as_bytes()).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[1], vec!["Bo", "Kim"]);
    }

    #[test]
    fn header_only_file_is_malformed() {
        let err = parse(b"first,last\n\n").unwrap_err();
        assert!(matches!(err, IngestError::MalformedFile(_)));
    }

    #[test]
    fn binary_content_is_malformed() {
        let err = parse(&[0xff, 0xfe, 0x00, 0x41]).unwrap_err();
        assert!(matches!(err, IngestError::MalformedFile(_)));

        let err = parse(b"a,b\n1,\0\n").unwrap_err();
        assert!(matches!(err, IngestError::MalformedFile(_)));
    }

    #[test]
    fn strips_byte_order_mark() {
        let parsed = parse("\u{feff}first,last\nAnn,Lee\n".as_bytes()).unwrap();
        assert_eq!(parsed.headers[0], "first");
    }

    #[test]
    fn upload_gate_checks_size_and_type() {
        assert!(check_upload("contacts.csv", None, 1024).is_ok());
        assert!(check_upload("export", Some("text/csv; charset=utf-8"), 1024).is_ok());
        assert!(matches!(
            check_upload("contacts.csv", Some("text/csv"), MAX_FILE_BYTES + 1),
            Err(IngestError::TooLarge { .. })
        ));
        assert!(matches!(
            check_upload("contacts.xlsx", Some("application/octet-stream"), 10),
            Err(IngestError::WrongType(_))
        ));
    }
}
