//! Data-provider association files.
//!
//! Tab-delimited. The first non-comment line names one namespace per column;
//! column 0 is the subject namespace. Each data line is one reconciliation
//! unit; a field may hold several comma-separated identifiers.

use crate::error::IoError;

const MIN_COLUMNS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEntry {
    pub identifier: String,
    pub namespace: String,
    pub is_subject: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRecord {
    /// 1-based data line number (comments and header excluded).
    pub record_key: i64,
    pub entries: Vec<ProviderEntry>,
}

#[derive(Debug, Clone)]
pub struct ProviderFile {
    pub namespaces: Vec<String>,
    pub records: Vec<ProviderRecord>,
}

pub fn parse_provider(content: &str) -> Result<ProviderFile, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .from_reader(content.as_bytes());

    // Empty until the header line has been read
    let mut header: Vec<String> = Vec::new();
    let mut records = Vec::new();

    for result in reader.records() {
        let record = result?;
        let line_no = record.position().map(|p| p.line() as usize).unwrap_or(0);

        // Whitespace-only lines carry no data
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }

        if header.is_empty() {
            if record.len() < MIN_COLUMNS {
                return Err(IoError::Format {
                    line: line_no,
                    message: format!(
                        "header needs at least {MIN_COLUMNS} tab-separated namespaces, found {}",
                        record.len()
                    ),
                });
            }
            header = record.iter().map(|f| f.trim().to_string()).collect();
            continue;
        }

        if record.len() != header.len() {
            return Err(IoError::Format {
                line: line_no,
                message: format!("expected {} fields, found {}", header.len(), record.len()),
            });
        }

        let mut entries = Vec::new();
        for (col, field) in record.iter().enumerate() {
            for id in field.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                entries.push(ProviderEntry {
                    identifier: id.to_string(),
                    namespace: header[col].clone(),
                    is_subject: col == 0,
                });
            }
        }

        records.push(ProviderRecord {
            record_key: records.len() as i64 + 1,
            entries,
        });
    }

    if header.is_empty() {
        return Err(IoError::Format {
            line: 0,
            message: "provider file has no header line".into(),
        });
    }
    Ok(ProviderFile { namespaces: header, records })
}
