//! Labeled dataset loading.
//!
//! Expects a CSV with a header containing `Time`, `V1`..`V28`, `Amount` and
//! `Class` (1 = fraud). Column order is free; extra columns are ignored.

use crate::error::{PipelineError, Result};
use crate::types::features::COMPONENT_COUNT;
use crate::types::transaction::LabeledTransaction;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Raw columns in the order [`LabeledTransaction::from_row`] expects.
fn raw_columns() -> Vec<String> {
    let mut columns = Vec::with_capacity(COMPONENT_COUNT + 2);
    columns.push("Time".to_string());
    columns.extend((1..=COMPONENT_COUNT).map(|i| format!("V{}", i)));
    columns.push("Amount".to_string());
    columns
}

/// Load the labeled corpus from a CSV file.
///
/// A missing file is `DatasetNotFound`; anything unreadable or malformed is
/// `TrainingData` with the offending row and column.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<LabeledTransaction>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PipelineError::DatasetNotFound {
            path: path.to_path_buf(),
        });
    }

    let reader = csv::Reader::from_path(path)
        .map_err(|e| PipelineError::TrainingData(format!("cannot open {}: {}", path.display(), e)))?;
    let records = read_records(reader)?;

    info!(
        path = %path.display(),
        records = records.len(),
        fraud = records.iter().filter(|r| r.is_fraud).count(),
        "Dataset loaded"
    );
    Ok(records)
}

/// Parse a labeled corpus from any CSV reader.
pub fn read_records<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<LabeledTransaction>> {
    let headers = reader
        .headers()
        .map_err(|e| PipelineError::TrainingData(format!("cannot read CSV header: {}", e)))?
        .clone();

    let locate = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| PipelineError::TrainingData(format!("dataset is missing column `{}`", name)))
    };
    let columns = raw_columns();
    let indices = columns.iter().map(|c| locate(c)).collect::<Result<Vec<usize>>>()?;
    let class_idx = locate("Class")?;

    let mut records = Vec::new();
    let mut row = vec![0.0; indices.len()];
    for (line, result) in reader.records().enumerate() {
        let record = result
            .map_err(|e| PipelineError::TrainingData(format!("row {}: {}", line + 1, e)))?;

        for (slot, (&idx, name)) in row.iter_mut().zip(indices.iter().zip(&columns)) {
            *slot = parse_field(&record, idx, name, line)?;
        }
        let is_fraud = match record.get(class_idx).map(str::trim) {
            Some("1") | Some("1.0") => true,
            Some("0") | Some("0.0") => false,
            other => {
                return Err(PipelineError::TrainingData(format!(
                    "row {}: Class must be 0 or 1, got {:?}",
                    line + 1,
                    other
                )))
            }
        };

        records.push(LabeledTransaction::from_row(format!("row_{}", line + 1), &row, is_fraud)?);
    }

    Ok(records)
}

fn parse_field(record: &csv::StringRecord, idx: usize, name: &str, line: usize) -> Result<f64> {
    let raw = record
        .get(idx)
        .ok_or_else(|| PipelineError::TrainingData(format!("row {}: missing `{}`", line + 1, name)))?;
    let value: f64 = raw.trim().parse().map_err(|_| {
        PipelineError::TrainingData(format!("row {}: `{}` is not a number: {:?}", line + 1, name, raw))
    })?;
    if !value.is_finite() {
        return Err(PipelineError::TrainingData(format!(
            "row {}: `{}` is not finite",
            line + 1,
            name
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> String {
        let mut cols = raw_columns();
        cols.push("Class".to_string());
        cols.join(",")
    }

    fn row(time: f64, amount: f64, class: u8) -> String {
        let mut fields = vec![time.to_string()];
        fields.extend((1..=COMPONENT_COUNT).map(|i| format!("{:.2}", i as f64 / 10.0)));
        fields.push(amount.to_string());
        fields.push(class.to_string());
        fields.join(",")
    }

    fn parse(text: &str) -> Result<Vec<LabeledTransaction>> {
        read_records(csv::Reader::from_reader(text.as_bytes()))
    }

    #[test]
    fn test_reads_records() {
        let text = format!("{}\n{}\n{}\n", header(), row(0.0, 149.62, 0), row(406.0, 0.0, 1));
        let records = parse(&text).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].transaction.amount, 149.62);
        assert!(!records[0].is_fraud);
        assert_eq!(records[1].transaction.time, 406.0);
        assert!(records[1].is_fraud);
        assert!((records[1].transaction.components[27] - 2.8).abs() < 1e-12);
    }

    #[test]
    fn test_missing_column_rejected() {
        let text = header().replace(",V7,", ",V7x,") + "\n";
        match parse(&text).unwrap_err() {
            PipelineError::TrainingData(msg) => assert!(msg.contains("V7")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        let text = format!("{}\n{}\n", header(), row(0.0, 1.0, 0).replacen("0.10", "abc", 1));
        assert!(matches!(parse(&text), Err(PipelineError::TrainingData(_))));
    }

    #[test]
    fn test_bad_label_rejected() {
        let mut line = row(0.0, 1.0, 0);
        line.pop();
        line.push('7');
        let text = format!("{}\n{}\n", header(), line);
        assert!(matches!(parse(&text), Err(PipelineError::TrainingData(_))));
    }

    #[test]
    fn test_missing_file_is_dataset_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_csv(dir.path().join("creditcard.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::DatasetNotFound { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creditcard.csv");
        std::fs::write(&path, format!("{}\n{}\n", header(), row(1.0, 2.0, 1))).unwrap();

        let records = load_csv(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_fraud);
    }
}
