//! Staged candidate rows as CSV.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use assocload_recon::{CandidateRow, ReconError};
use serde::{Deserialize, Serialize};

use crate::error::IoError;

#[derive(Debug, Serialize, Deserialize)]
struct CandidateCsvRow {
    reconciliation_key: i64,
    identifier: String,
    namespace_key: i64,
    is_subject: bool,
    entity_type: Option<i64>,
    entity_key: Option<i64>,
}

/// Lazy row source over a staged candidate CSV.
pub struct CandidateReader<R: Read> {
    records: csv::DeserializeRecordsIntoIter<R, CandidateCsvRow>,
}

impl<R: Read> CandidateReader<R> {
    pub fn new(reader: R) -> Self {
        let records = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader)
            .into_deserialize();
        Self { records }
    }
}

impl CandidateReader<File> {
    pub fn open(path: &Path) -> Result<Self, IoError> {
        let file = File::open(path).map_err(|source| IoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file))
    }
}

impl<R: Read> Iterator for CandidateReader<R> {
    type Item = Result<CandidateRow, ReconError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                return Some(Err(ReconError::Source(format!("line {line}: {e}"))));
            }
        };
        Some(CandidateRow::from_columns(
            record.reconciliation_key,
            record.identifier,
            record.namespace_key,
            record.is_subject,
            record.entity_type,
            record.entity_key,
        ))
    }
}

pub fn write_candidates<W: Write>(writer: W, rows: &[CandidateRow]) -> Result<(), IoError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(CandidateCsvRow {
            reconciliation_key: row.reconciliation_key,
            identifier: row.identifier.clone(),
            namespace_key: row.namespace_key,
            is_subject: row.is_subject,
            entity_type: row.entity_type(),
            entity_key: row.entity_key(),
        })?;
    }
    wtr.flush().map_err(|e| IoError::Csv(e.into()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAGED: &str = "\
reconciliation_key,identifier,namespace_key,is_subject,entity_type,entity_key
1,MGI:1,1,true,3,500
1,AB1,9,false,,
2,MGI:2,1,true,3,501
";

    #[test]
    fn reads_rows_lazily() {
        let mut reader = CandidateReader::new(STAGED.as_bytes());
        let first = reader.next().unwrap().unwrap();
        assert!(first.is_subject);
        assert_eq!(first.entity_key(), Some(500));
        let second = reader.next().unwrap().unwrap();
        assert_eq!(second.matched, None);
        assert_eq!(reader.count(), 1);
    }

    #[test]
    fn half_filled_row_is_malformed() {
        let data = "reconciliation_key,identifier,namespace_key,is_subject,entity_type,entity_key\n4,AB1,9,false,3,\n";
        let err = CandidateReader::new(data.as_bytes()).next().unwrap().unwrap_err();
        assert!(matches!(err, ReconError::MalformedRow { key: 4, .. }));
    }

    #[test]
    fn bad_number_names_line() {
        let data = "reconciliation_key,identifier,namespace_key,is_subject,entity_type,entity_key\nx,AB1,9,false,,\n";
        let err = CandidateReader::new(data.as_bytes()).next().unwrap().unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn written_rows_read_back() {
        let rows: Vec<CandidateRow> = CandidateReader::new(STAGED.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        let mut buf = Vec::new();
        write_candidates(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, STAGED);
    }
}
