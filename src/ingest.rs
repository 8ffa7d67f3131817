use crate::aggregate::token_total;
use crate::error::AppError;
use crate::models::UsageRecord;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::path::Path;

const NAIVE_FORMATS: [&str; 6] = [
    "%m/%d/%Y, %I:%M:%S%.f %p",
    "%m/%d/%Y %I:%M:%S%.f %p",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
];

/// Result of reading a usage export: the rows that survived validation and
/// how many were rejected.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub records: Vec<UsageRecord>,
    pub total_rows: usize,
    pub dropped_rows: usize,
}

struct ColumnIndex {
    timestamp: usize,
    input_tokens: usize,
    output_tokens: usize,
}

fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .to_ascii_lowercase()
        .replace("[utc]", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect()
}

fn resolve_columns(header: &[String]) -> Result<ColumnIndex, AppError> {
    let normalized: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
    let find = |key: &str, label: &str| {
        normalized.iter().position(|h| h == key).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "missing required column '{label}'. Expected timestamp, input tokens, output tokens."
            ))
        })
    };

    Ok(ColumnIndex {
        timestamp: find("timestamp", "timestamp")?,
        input_tokens: find("inputtokens", "input tokens")?,
        output_tokens: find("outputtokens", "output tokens")?,
    })
}

/// Splits one CSV line, honouring double-quoted fields and `""` escapes.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Parses a token count. Integral decimals and thousands separators are
/// accepted; negatives, fractions and garbage are not.
pub fn parse_token_count(raw: &str) -> Option<u64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(value) = cleaned.parse::<u64>() {
        return Some(value);
    }
    let value = cleaned.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

fn parse_row(fields: &[String], cols: &ColumnIndex) -> Result<UsageRecord, String> {
    let get = |idx: usize| fields.get(idx).map(String::as_str).unwrap_or("");

    let timestamp = parse_timestamp(get(cols.timestamp))
        .ok_or_else(|| format!("unparseable timestamp '{}'", get(cols.timestamp)))?;
    let input_tokens = parse_token_count(get(cols.input_tokens))
        .ok_or_else(|| format!("invalid input token count '{}'", get(cols.input_tokens)))?;
    let output_tokens = parse_token_count(get(cols.output_tokens))
        .ok_or_else(|| format!("invalid output token count '{}'", get(cols.output_tokens)))?;

    Ok(UsageRecord {
        timestamp,
        input_tokens,
        output_tokens,
    })
}

pub fn parse_usage_csv(raw: &str) -> Result<IngestReport, AppError> {
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| AppError::InvalidInput("CSV file is empty".into()))?;
    let cols = resolve_columns(&split_csv_line(header))?;

    let mut records = Vec::new();
    let mut total_rows = 0;
    let mut dropped_rows = 0;

    for (line_no, line) in lines.enumerate() {
        total_rows += 1;
        match parse_row(&split_csv_line(line), &cols) {
            Ok(record) => records.push(record),
            Err(reason) => {
                dropped_rows += 1;
                tracing::warn!(row = line_no + 2, %reason, "dropping usage row");
            }
        }
    }

    if total_rows == 0 {
        return Err(AppError::EmptyDataset);
    }
    if records.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "all {total_rows} rows were invalid; check the timestamp and token columns"
        )));
    }
    token_total(&records)?;
    if dropped_rows > 0 {
        tracing::warn!(dropped_rows, total_rows, "dropped invalid usage rows");
    }

    Ok(IngestReport {
        records,
        total_rows,
        dropped_rows,
    })
}

pub fn read_usage_csv(path: &Path) -> Result<IngestReport, AppError> {
    let raw = fs::read_to_string(path)?;
    parse_usage_csv(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn split_csv_line_handles_quotes() {
        assert_eq!(split_csv_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(
            split_csv_line("\"8/18/2025, 12:00:38.941 AM\",10,\"1,200\""),
            vec!["8/18/2025, 12:00:38.941 AM", "10", "1,200"]
        );
        assert_eq!(split_csv_line("\"a\"\"b\",x"), vec!["a\"b", "x"]);
        assert_eq!(split_csv_line("a,,"), vec!["a", "", ""]);
    }

    #[test]
    fn parse_timestamp_accepts_portal_and_iso_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 8, 18, 0, 0, 38).unwrap();
        let portal = parse_timestamp("8/18/2025, 12:00:38.941 AM").expect("portal format");
        assert_eq!(portal.timestamp(), expected.timestamp());
        assert_eq!(portal.timestamp_subsec_millis(), 941);

        let pm = parse_timestamp("8/18/2025, 1:05:00 PM").expect("pm format");
        assert_eq!(pm, Utc.with_ymd_and_hms(2025, 8, 18, 13, 5, 0).unwrap());

        assert_eq!(parse_timestamp("2025-08-18T00:00:38Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-08-18 00:00:38"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn parse_token_count_rejects_negative_and_fractional() {
        assert_eq!(parse_token_count("42"), Some(42));
        assert_eq!(parse_token_count(" 1,200 "), Some(1200));
        assert_eq!(parse_token_count("12.0"), Some(12));
        assert_eq!(parse_token_count("-5"), None);
        assert_eq!(parse_token_count("1.5"), None);
        assert_eq!(parse_token_count("abc"), None);
        assert_eq!(parse_token_count(""), None);
    }

    #[test]
    fn parse_usage_csv_drops_bad_rows_and_counts_them() {
        let raw = "Timestamp [UTC],Input Tokens,Output Tokens,Total Tokens\n\
                   2025-08-18T00:00:01Z,100,20,120\n\
                   not-a-date,100,20,120\n\
                   2025-08-18T00:00:05Z,-3,20,17\n\
                   2025-08-18T00:01:00Z,50,abc,50\n\
                   2025-08-18T00:02:00Z,10,5,15\n";
        let report = parse_usage_csv(raw).expect("parse csv");
        assert_eq!(report.total_rows, 5);
        assert_eq!(report.dropped_rows, 3);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].input_tokens, 100);
        assert_eq!(report.records[1].output_tokens, 5);
    }

    #[test]
    fn parse_usage_csv_matches_snake_case_headers() {
        let raw = "timestamp,input_tokens,output_tokens\n2025-08-18T00:00:01Z,1,2\n";
        let report = parse_usage_csv(raw).expect("parse csv");
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.dropped_rows, 0);
    }

    #[test]
    fn parse_usage_csv_fails_when_every_row_is_invalid() {
        let raw = "timestamp,input tokens,output tokens\nbad,1,2\n2025-08-18T00:00:01Z,x,2\n";
        let err = parse_usage_csv(raw).expect_err("all rows invalid");
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(err.to_string().contains("all 2 rows were invalid"));
    }

    #[test]
    fn parse_usage_csv_rejects_token_totals_beyond_u64() {
        let raw = "timestamp,input tokens,output tokens\n\
                   2025-08-18T00:00:01Z,18446744073709551615,0\n\
                   2025-08-18T00:00:02Z,5,0\n";
        let err = parse_usage_csv(raw).expect_err("overflowing totals");
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(err.to_string().contains("token counts overflow"));
    }

    #[test]
    fn parse_usage_csv_requires_columns() {
        let err = parse_usage_csv("timestamp,tokens\n2025-08-18T00:00:01Z,3\n")
            .expect_err("missing columns");
        assert!(err.to_string().contains("missing required column 'input tokens'"));
    }

    #[test]
    fn parse_usage_csv_without_rows_is_empty_dataset() {
        let err = parse_usage_csv("timestamp,input tokens,output tokens\n").expect_err("empty");
        assert!(matches!(err, AppError::EmptyDataset));
    }
}
