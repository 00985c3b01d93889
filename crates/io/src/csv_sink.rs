//! Bulk CSV sink: buffered rows become files in the output directory on commit.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use assocload_recon::model::{AssociationRecord, AuxLinkRecord, DiscrepancyCode, DiscrepancyReport};
use assocload_recon::{ReconConfig, ReconError, Sink};
use serde::Serialize;
use tracing::info;

use crate::aux_links::AuxLinkRow;

pub const ASSOCIATIONS_FILE: &str = "associations.csv";
pub const AUX_LINKS_FILE: &str = "aux_links.csv";
pub const SUBJECT_DISCREPANCIES_FILE: &str = "subject_discrepancies.csv";
pub const CANDIDATE_DISCREPANCIES_FILE: &str = "candidate_discrepancies.csv";

const OUTPUT_FILES: [&str; 4] = [
    ASSOCIATIONS_FILE,
    AUX_LINKS_FILE,
    SUBJECT_DISCREPANCIES_FILE,
    CANDIDATE_DISCREPANCIES_FILE,
];

/// Attributes stamped on every association and aux link row.
#[derive(Debug, Clone)]
pub struct SinkSettings {
    pub reference_key: i64,
    pub private: bool,
    pub created_by: String,
}

impl SinkSettings {
    pub fn for_config(config: &ReconConfig) -> Self {
        Self {
            reference_key: config.reference_key,
            private: config.private_identifiers,
            created_by: config.job_stream.clone(),
        }
    }
}

/// Split an identifier into its prefix and its longest trailing digit run.
///
/// `"MGI:12345"` → `("MGI:", Some(12345))`, `"ABC"` → `("ABC", None)`.
/// A digit run too long for an i64 stays in the prefix.
pub fn split_identifier(identifier: &str) -> (&str, Option<i64>) {
    let digits = identifier.bytes().rev().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return (identifier, None);
    }
    let at = identifier.len() - digits;
    match identifier[at..].parse::<i64>() {
        Ok(n) => (&identifier[..at], Some(n)),
        Err(_) => (identifier, None),
    }
}

#[derive(Debug, Serialize)]
struct AssociationCsvRow<'a> {
    identifier: &'a str,
    prefix_part: &'a str,
    numeric_part: Option<i64>,
    namespace_key: i64,
    entity_type: i64,
    entity_key: i64,
    private: bool,
    preferred: bool,
    reference_key: i64,
    created_by: &'a str,
}

#[derive(Debug, Serialize)]
struct SubjectReportCsvRow<'a> {
    code: String,
    subject_identifier: &'a str,
    subject_namespace: i64,
    subject_entity_key: Option<i64>,
    subject_entity_type: Option<i64>,
    expected_type: i64,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct CandidateReportCsvRow<'a> {
    code: String,
    subject_identifier: &'a str,
    subject_namespace: i64,
    subject_entity_key: Option<i64>,
    candidate_identifier: Option<&'a str>,
    candidate_namespace: Option<i64>,
    candidate_entity_key: Option<i64>,
    candidate_entity_type: Option<i64>,
    expected_type: i64,
    message: &'a str,
}

/// Sink writing the four bulk output files.
///
/// The first commit replaces the files and writes headers; later commits
/// append. A commit writes every file to a `.tmp` copy next to its target and
/// renames the copies only after all four are flushed, so a failed commit
/// leaves the previous output as it was.
#[derive(Debug)]
pub struct CsvSink {
    dir: PathBuf,
    settings: SinkSettings,
    associations: Vec<AssociationRecord>,
    aux_links: Vec<AuxLinkRecord>,
    reports: Vec<DiscrepancyReport>,
    started: bool,
}

struct StagedCounts {
    associations: usize,
    aux_links: usize,
    subject: usize,
    candidate: usize,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>, settings: SinkSettings) -> Self {
        Self {
            dir: dir.into(),
            settings,
            associations: Vec::new(),
            aux_links: Vec::new(),
            reports: Vec::new(),
            started: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn staging_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.tmp"))
    }

    /// Staging copy of `name`. After the first commit it starts from the
    /// committed file so new rows are appended.
    fn writer(&self, name: &str) -> Result<csv::Writer<File>, ReconError> {
        let target = self.dir.join(name);
        let path = self.staging_path(name);
        let file = if self.started && target.is_file() {
            fs::copy(&target, &path).map_err(|e| sink_error(&path, e))?;
            OpenOptions::new().append(true).open(&path)
        } else {
            File::create(&path)
        };
        let file = file.map_err(|e| sink_error(&path, e))?;
        Ok(csv::WriterBuilder::new()
            .has_headers(!self.started)
            .from_writer(file))
    }

    fn write_all<T: Serialize>(
        &self,
        name: &str,
        rows: impl Iterator<Item = T>,
    ) -> Result<usize, ReconError> {
        let mut wtr = self.writer(name)?;
        let mut count = 0usize;
        for row in rows {
            wtr.serialize(row)
                .map_err(|e| sink_error(&self.staging_path(name), e))?;
            count += 1;
        }
        wtr.flush().map_err(|e| sink_error(&self.staging_path(name), e))?;
        Ok(count)
    }

    fn stage(&self) -> Result<StagedCounts, ReconError> {
        let s = &self.settings;

        let associations = self.write_all(
            ASSOCIATIONS_FILE,
            self.associations.iter().map(|a| {
                let (prefix_part, numeric_part) = split_identifier(&a.identifier);
                AssociationCsvRow {
                    identifier: &a.identifier,
                    prefix_part,
                    numeric_part,
                    namespace_key: a.namespace_key,
                    entity_type: a.entity_type,
                    entity_key: a.entity_key,
                    private: s.private,
                    preferred: true,
                    reference_key: s.reference_key,
                    created_by: &s.created_by,
                }
            }),
        )?;

        let aux_links = self.write_all(
            AUX_LINKS_FILE,
            self.aux_links.iter().map(|l| AuxLinkRow {
                subject_key: l.subject_key,
                reference_key: s.reference_key,
                created_by: Some(s.created_by.clone()),
            }),
        )?;

        let subject = self.write_all(
            SUBJECT_DISCREPANCIES_FILE,
            self.reports.iter().filter_map(|r| match r.code {
                DiscrepancyCode::Subject(code) => Some(SubjectReportCsvRow {
                    code: code.to_string(),
                    subject_identifier: &r.subject_identifier,
                    subject_namespace: r.subject_namespace,
                    subject_entity_key: r.subject_entity_key,
                    subject_entity_type: r.subject_entity_type,
                    expected_type: r.expected_type,
                    message: &r.message,
                }),
                DiscrepancyCode::Candidate(_) => None,
            }),
        )?;

        let candidate = self.write_all(
            CANDIDATE_DISCREPANCIES_FILE,
            self.reports.iter().filter_map(|r| match r.code {
                DiscrepancyCode::Candidate(code) => Some(CandidateReportCsvRow {
                    code: code.to_string(),
                    subject_identifier: &r.subject_identifier,
                    subject_namespace: r.subject_namespace,
                    subject_entity_key: r.subject_entity_key,
                    candidate_identifier: r.candidate_identifier.as_deref(),
                    candidate_namespace: r.candidate_namespace,
                    candidate_entity_key: r.candidate_entity_key,
                    candidate_entity_type: r.candidate_entity_type,
                    expected_type: r.expected_type,
                    message: &r.message,
                }),
                DiscrepancyCode::Subject(_) => None,
            }),
        )?;

        Ok(StagedCounts { associations, aux_links, subject, candidate })
    }

    fn discard_staged(&self) {
        for name in OUTPUT_FILES {
            let _ = fs::remove_file(self.staging_path(name));
        }
    }
}

fn sink_error(path: &Path, err: impl std::fmt::Display) -> ReconError {
    ReconError::Sink(format!("{}: {err}", path.display()))
}

impl Sink for CsvSink {
    fn associate(&mut self, record: AssociationRecord) -> Result<(), ReconError> {
        self.associations.push(record);
        Ok(())
    }

    fn aux_link(&mut self, record: AuxLinkRecord) -> Result<(), ReconError> {
        self.aux_links.push(record);
        Ok(())
    }

    fn report(&mut self, report: DiscrepancyReport) -> Result<(), ReconError> {
        self.reports.push(report);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ReconError> {
        fs::create_dir_all(&self.dir).map_err(|e| sink_error(&self.dir, e))?;
        // A target that cannot be replaced would fail the rename half way
        for name in OUTPUT_FILES {
            let target = self.dir.join(name);
            if target.exists() && !target.is_file() {
                return Err(sink_error(&target, "exists and is not a regular file"));
            }
        }

        let counts = match self.stage() {
            Ok(counts) => counts,
            Err(e) => {
                self.discard_staged();
                return Err(e);
            }
        };
        for name in OUTPUT_FILES {
            let target = self.dir.join(name);
            fs::rename(self.staging_path(name), &target).map_err(|e| sink_error(&target, e))?;
        }

        info!(
            dir = %self.dir.display(),
            associations = counts.associations,
            aux_links = counts.aux_links,
            subject_reports = counts.subject,
            candidate_reports = counts.candidate,
            "committed output"
        );

        self.associations.clear();
        self.aux_links.clear();
        self.reports.clear();
        self.started = true;
        Ok(())
    }
}
