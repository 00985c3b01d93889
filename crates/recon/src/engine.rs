use tracing::{debug, info, warn};

use crate::cache::AuxLinkCache;
use crate::classify::{decide, resolve_subject, tally_pair, SubjectResolution};
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::group::UnitBuilder;
use crate::model::{
    AssociationRecord, AuxLinkRecord, CandidatePair, CandidateRow, Decision, DiscrepancyCode,
    DiscrepancyReport, ReconMeta, ReconResult, ReconSummary, ReconciliationUnit, RegistryMatch,
    SubjectCode,
};
use crate::policy::NamespacePolicy;
use crate::sink::Sink;

const PROGRESS_EVERY: usize = 10_000;

/// How one unit was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// The subject did not resolve; no candidate pair was evaluated.
    SubjectDiscrepancy(SubjectCode),
    Classified {
        target: RegistryMatch,
        decisions: Vec<(CandidatePair, Decision)>,
        /// A report-skip decision blocked every write in the unit.
        suppressed: bool,
    },
}

/// Processes units one at a time, owning the aux link cache and the counters.
pub struct Reconciler<S> {
    policy: NamespacePolicy,
    linkable_type: Option<i64>,
    cache: AuxLinkCache,
    sink: S,
    summary: ReconSummary,
}

impl<S: Sink> Reconciler<S> {
    pub fn new(policy: NamespacePolicy, linkable_type: Option<i64>, cache: AuxLinkCache, sink: S) -> Self {
        Self {
            policy,
            linkable_type,
            cache,
            sink,
            summary: ReconSummary::default(),
        }
    }

    pub fn summary(&self) -> &ReconSummary {
        &self.summary
    }

    pub fn cache(&self) -> &AuxLinkCache {
        &self.cache
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Commit the sink and hand back the counters and the sink.
    pub fn finish(mut self) -> Result<(ReconSummary, S), ReconError> {
        self.sink.commit()?;
        Ok((self.summary, self.sink))
    }

    pub fn process(&mut self, unit: &ReconciliationUnit) -> Result<UnitOutcome, ReconError> {
        self.summary.units += 1;
        let pairs = unit.distinct_pairs();

        let target = match resolve_subject(unit) {
            SubjectResolution::Resolved(target) => target,
            SubjectResolution::Discrepancy(code) => {
                debug!(unit = unit.key, %code, "subject discrepancy");
                for row in unit.subject_rows() {
                    self.emit_report(DiscrepancyReport {
                        subject_identifier: row.identifier.clone(),
                        subject_namespace: row.namespace_key,
                        subject_entity_key: row.entity_key(),
                        subject_entity_type: row.entity_type(),
                        candidate_identifier: None,
                        candidate_namespace: None,
                        candidate_entity_key: None,
                        candidate_entity_type: None,
                        expected_type: unit.expected_subject_type,
                        code: DiscrepancyCode::Subject(code),
                        message: code.message(),
                    })?;
                }
                self.summary.skipped += pairs.len();
                return Ok(UnitOutcome::SubjectDiscrepancy(code));
            }
        };

        // Decide everything before writing anything, so an unclassified
        // namespace aborts with nothing emitted for this unit.
        let mut decisions = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let mode = self.policy.mode(pair.namespace_key)?;
            let tally = tally_pair(unit, &pair, target);
            let decision = decide(mode, &tally);
            debug!(
                unit = unit.key,
                identifier = %pair.identifier,
                namespace = pair.namespace_key,
                %mode,
                same_type = tally.same_type,
                same_obj = tally.same_obj,
                diff_type = tally.diff_type,
                ?decision,
                "classified pair"
            );
            decisions.push((pair, decision));
        }
        let suppressed = decisions.iter().any(|(_, d)| d.blocks_unit());

        let subject = unit
            .subject_rows()
            .find(|r| r.matched == Some(target))
            .map(|r| (r.identifier.clone(), r.namespace_key))
            .unwrap_or_default();

        for (pair, decision) in &decisions {
            if *decision == Decision::Exists {
                debug!(identifier = %pair.identifier, namespace = pair.namespace_key, "exists");
                self.summary.existing += 1;
                continue;
            }

            if let Some(code) = decision.code() {
                for row in unit.rows_for(pair) {
                    self.emit_report(DiscrepancyReport {
                        subject_identifier: subject.0.clone(),
                        subject_namespace: subject.1,
                        subject_entity_key: Some(target.entity_key),
                        subject_entity_type: Some(unit.expected_subject_type),
                        candidate_identifier: Some(row.identifier.clone()),
                        candidate_namespace: Some(row.namespace_key),
                        candidate_entity_key: row.entity_key(),
                        candidate_entity_type: row.entity_type(),
                        expected_type: unit.expected_subject_type,
                        code: DiscrepancyCode::Candidate(code),
                        message: code.message(),
                    })?;
                }
            }

            if decision.wants_write() && !suppressed {
                self.associate(pair, target)?;
            }
        }

        if suppressed {
            warn!(
                unit = unit.key,
                pairs = decisions.len(),
                "conflicting candidate pair; no associations made for this unit"
            );
            self.summary.skipped += decisions.len();
        }

        Ok(UnitOutcome::Classified { target, decisions, suppressed })
    }

    fn associate(&mut self, pair: &CandidatePair, target: RegistryMatch) -> Result<(), ReconError> {
        debug!(
            identifier = %pair.identifier,
            namespace = pair.namespace_key,
            entity_key = target.entity_key,
            entity_type = target.entity_type,
            "associate"
        );
        self.sink.associate(AssociationRecord {
            identifier: pair.identifier.clone(),
            namespace_key: pair.namespace_key,
            entity_type: target.entity_type,
            entity_key: target.entity_key,
        })?;
        self.summary.associated += 1;

        if self.linkable_type == Some(target.entity_type) && !self.cache.contains(target.entity_key) {
            self.sink.aux_link(AuxLinkRecord { subject_key: target.entity_key })?;
            self.cache.record(target.entity_key);
            self.summary.aux_links += 1;
        }
        Ok(())
    }

    fn emit_report(&mut self, report: DiscrepancyReport) -> Result<(), ReconError> {
        let histogram = match report.code {
            DiscrepancyCode::Subject(c) => self.summary.subject_codes.entry(c.to_string()),
            DiscrepancyCode::Candidate(c) => self.summary.candidate_codes.entry(c.to_string()),
        };
        *histogram.or_insert(0) += 1;
        self.sink.report(report)?;
        self.summary.reported += 1;
        Ok(())
    }
}

/// Run a full reconciliation over a key-contiguous row source.
///
/// The sink is committed once, after the last unit. Any error aborts the run
/// before that commit.
pub fn run<I, S>(
    config: &ReconConfig,
    rows: I,
    cache: AuxLinkCache,
    sink: S,
) -> Result<(ReconResult, S), ReconError>
where
    I: IntoIterator<Item = Result<CandidateRow, ReconError>>,
    S: Sink,
{
    let policy = config.namespace_policy()?;
    info!(
        single = ?policy.single(),
        multiple = ?policy.multiple(),
        aux_links = cache.len(),
        "starting reconciliation '{}'",
        config.name
    );

    let mut reconciler = Reconciler::new(policy, config.linkable_type, cache, sink);
    let mut count = 0usize;
    for unit in UnitBuilder::new(rows.into_iter(), config.subject_type.key) {
        let unit = unit?;
        if count > 0 && count % PROGRESS_EVERY == 0 {
            info!("processed {count} units");
        }
        count += 1;
        reconciler.process(&unit)?;
    }
    info!("processed {count} units");

    let (summary, sink) = reconciler.finish()?;
    Ok((
        ReconResult {
            meta: ReconMeta {
                config_name: config.name.clone(),
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                run_at: chrono::Utc::now().to_rfc3339(),
            },
            summary,
        },
        sink,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PairCode;
    use crate::sink::MemorySink;

    const SEGMENT: i64 = 3;
    const MARKER: i64 = 2;
    const SEQ_SINGLE: i64 = 9;
    const SEQ_MULTI: i64 = 26;

    fn subject(key: i64, entity: Option<(i64, i64)>) -> CandidateRow {
        CandidateRow::from_columns(key, "MGI:100", 1, true, entity.map(|e| e.0), entity.map(|e| e.1))
            .unwrap()
    }

    fn cand(key: i64, id: &str, ns: i64, entity: Option<(i64, i64)>) -> CandidateRow {
        CandidateRow::from_columns(key, id, ns, false, entity.map(|e| e.0), entity.map(|e| e.1))
            .unwrap()
    }

    fn unit(key: i64, rows: Vec<CandidateRow>) -> ReconciliationUnit {
        ReconciliationUnit { key, expected_subject_type: SEGMENT, rows }
    }

    fn reconciler() -> Reconciler<MemorySink> {
        let policy = NamespacePolicy::new([SEQ_SINGLE], [SEQ_MULTI]).unwrap();
        Reconciler::new(policy, Some(SEGMENT), AuxLinkCache::new(), MemorySink::new())
    }

    #[test]
    fn new_identifier_is_associated() {
        let mut r = reconciler();
        let u = unit(1, vec![subject(1, Some((SEGMENT, 500))), cand(1, "AB0001", SEQ_SINGLE, None)]);
        let outcome = r.process(&u).unwrap();

        assert!(matches!(outcome, UnitOutcome::Classified { suppressed: false, .. }));
        assert_eq!(r.summary().associated, 1);
        assert_eq!(r.sink().associations[0].entity_key, 500);
        assert_eq!(r.sink().associations[0].entity_type, SEGMENT);
        assert_eq!(r.sink().aux_links.len(), 1);
        assert!(r.cache().contains(500));
    }

    #[test]
    fn existing_association_writes_nothing() {
        let mut r = reconciler();
        let u = unit(
            1,
            vec![subject(1, Some((SEGMENT, 500))), cand(1, "AB0001", SEQ_SINGLE, Some((SEGMENT, 500)))],
        );
        r.process(&u).unwrap();
        assert_eq!(r.summary().existing, 1);
        assert!(r.sink().associations.is_empty());
        assert!(r.sink().reports.is_empty());
        assert!(r.sink().aux_links.is_empty());
    }

    #[test]
    fn subject_discrepancy_reports_each_subject_row() {
        let mut r = reconciler();
        let u = unit(
            1,
            vec![
                subject(1, Some((MARKER, 10))),
                subject(1, Some((MARKER, 11))),
                cand(1, "AB0001", SEQ_SINGLE, None),
                cand(1, "AB0002", SEQ_SINGLE, None),
                cand(1, "AB0002", SEQ_SINGLE, None),
            ],
        );
        let outcome = r.process(&u).unwrap();
        assert_eq!(outcome, UnitOutcome::SubjectDiscrepancy(SubjectCode::C));
        assert_eq!(r.sink().reports.len(), 2);
        assert!(r
            .sink()
            .reports
            .iter()
            .all(|rep| rep.code == DiscrepancyCode::Subject(SubjectCode::C) && rep.candidate_identifier.is_none()));
        assert_eq!(r.summary().skipped, 2);
        assert_eq!(r.summary().reported, 2);
        assert_eq!(r.summary().subject_codes["C"], 2);
        assert!(r.sink().associations.is_empty());
    }

    #[test]
    fn unresolved_subject_is_code_a() {
        let mut r = reconciler();
        let u = unit(1, vec![subject(1, None), cand(1, "AB0001", SEQ_SINGLE, None)]);
        assert_eq!(r.process(&u).unwrap(), UnitOutcome::SubjectDiscrepancy(SubjectCode::A));
        let rep = &r.sink().reports[0];
        assert_eq!(rep.subject_entity_key, None);
        assert_eq!(rep.expected_type, SEGMENT);
    }

    #[test]
    fn report_associate_writes_and_reports() {
        let mut r = reconciler();
        let u = unit(
            1,
            vec![
                subject(1, Some((SEGMENT, 500))),
                cand(1, "AB0001", SEQ_MULTI, Some((SEGMENT, 600))),
                cand(1, "AB0001", SEQ_MULTI, Some((SEGMENT, 601))),
                cand(1, "AB0001", SEQ_MULTI, Some((MARKER, 7))),
            ],
        );
        let outcome = r.process(&u).unwrap();
        match outcome {
            UnitOutcome::Classified { decisions, suppressed, .. } => {
                assert!(!suppressed);
                assert_eq!(decisions[0].1, Decision::AssociateWithReport(PairCode::L));
            }
            other => panic!("unexpected {other:?}"),
        }
        // one report per matching row
        assert_eq!(r.sink().reports.len(), 3);
        assert_eq!(r.summary().candidate_codes["L"], 3);
        assert_eq!(r.sink().associations.len(), 1);
        assert_eq!(r.summary().associated, 1);
        let rep = &r.sink().reports[2];
        assert_eq!(rep.subject_identifier, "MGI:100");
        assert_eq!(rep.subject_entity_key, Some(500));
        assert_eq!(rep.candidate_entity_type, Some(MARKER));
    }

    #[test]
    fn report_skip_suppresses_the_whole_unit() {
        let mut r = reconciler();
        let u = unit(
            1,
            vec![
                subject(1, Some((SEGMENT, 500))),
                cand(1, "NEW1", SEQ_SINGLE, None),
                cand(1, "CONFLICT", SEQ_SINGLE, Some((SEGMENT, 999))),
                cand(1, "FLAGGED", SEQ_MULTI, Some((SEGMENT, 998))),
                cand(1, "THERE", SEQ_SINGLE, Some((SEGMENT, 500))),
            ],
        );
        let outcome = r.process(&u).unwrap();
        assert!(matches!(outcome, UnitOutcome::Classified { suppressed: true, .. }));
        assert!(r.sink().associations.is_empty());
        assert!(r.sink().aux_links.is_empty());
        // E for CONFLICT (report-skip) and E for FLAGGED (report-associate) are both still reported
        assert_eq!(r.sink().reports.len(), 2);
        assert_eq!(r.summary().existing, 1);
        assert_eq!(r.summary().skipped, 4);
        assert_eq!(r.summary().associated, 0);
    }

    #[test]
    fn unclassified_namespace_aborts_before_writes() {
        let mut r = reconciler();
        let u = unit(
            1,
            vec![
                subject(1, Some((SEGMENT, 500))),
                cand(1, "NEW1", SEQ_SINGLE, None),
                cand(1, "ODD", 77, None),
            ],
        );
        let err = r.process(&u).unwrap_err();
        assert!(matches!(err, ReconError::UnclassifiedNamespace { namespace_key: 77 }));
        assert!(r.sink().associations.is_empty());
    }

    #[test]
    fn aux_link_once_per_subject() {
        let mut r = reconciler();
        let first = unit(
            1,
            vec![
                subject(1, Some((SEGMENT, 500))),
                cand(1, "A1", SEQ_SINGLE, None),
                cand(1, "A2", SEQ_MULTI, None),
            ],
        );
        let second = unit(2, vec![subject(2, Some((SEGMENT, 500))), cand(2, "A3", SEQ_SINGLE, None)]);
        r.process(&first).unwrap();
        r.process(&second).unwrap();
        assert_eq!(r.summary().associated, 3);
        assert_eq!(r.sink().aux_links.len(), 1);
        assert_eq!(r.summary().aux_links, 1);
    }

    #[test]
    fn primed_cache_blocks_aux_link() {
        let policy = NamespacePolicy::new([SEQ_SINGLE], []).unwrap();
        let mut r = Reconciler::new(policy, Some(SEGMENT), AuxLinkCache::primed([500]), MemorySink::new());
        r.process(&unit(1, vec![subject(1, Some((SEGMENT, 500))), cand(1, "A1", SEQ_SINGLE, None)]))
            .unwrap();
        assert_eq!(r.sink().associations.len(), 1);
        assert!(r.sink().aux_links.is_empty());
    }

    #[test]
    fn non_linkable_subject_gets_no_aux_link() {
        let policy = NamespacePolicy::new([SEQ_SINGLE], []).unwrap();
        let mut r = Reconciler::new(policy, None, AuxLinkCache::new(), MemorySink::new());
        r.process(&unit(1, vec![subject(1, Some((SEGMENT, 500))), cand(1, "A1", SEQ_SINGLE, None)]))
            .unwrap();
        assert!(r.sink().aux_links.is_empty());
    }

    #[test]
    fn finish_commits_once() {
        let r = reconciler();
        let (summary, sink) = r.finish().unwrap();
        assert_eq!(summary, ReconSummary::default());
        assert_eq!(sink.commits, 1);
    }
}
