use assocload_recon::model::{DiscrepancyCode, SubjectCode};
use assocload_recon::{run, AuxLinkCache, CandidateRow, MemorySink, ReconConfig, ReconError};
use proptest::prelude::*;

const CONFIG: &str = r#"
name = "Integration"
job_stream = "assocload_test"
reference_key = 1000
linkable_type = 3

[subject_type]
name = "Molecular Segment"
key = 3

[namespaces]
"MGI" = 1
"Sequence DB" = 9
"RIKEN" = 26

[policy]
single = ["Sequence DB"]
multiple = ["RIKEN"]

[files]
candidates = "staged.csv"
"#;

const SEGMENT: i64 = 3;
const OTHER: i64 = 2;
const SINGLE: i64 = 9;
const MULTIPLE: i64 = 26;

fn config() -> ReconConfig {
    ReconConfig::from_toml(CONFIG).unwrap()
}

fn row(key: i64, id: &str, ns: i64, subject: bool, entity: Option<(i64, i64)>) -> CandidateRow {
    CandidateRow::from_columns(key, id, ns, subject, entity.map(|e| e.0), entity.map(|e| e.1)).unwrap()
}

fn run_rows(rows: Vec<CandidateRow>) -> Result<(assocload_recon::ReconResult, MemorySink), ReconError> {
    run(&config(), rows.into_iter().map(Ok), AuxLinkCache::new(), MemorySink::new())
}

// -------------------------------------------------------------------------
// Scenarios
// -------------------------------------------------------------------------

#[test]
fn scenario_single_namespace_new_identifier() {
    let (result, sink) = run_rows(vec![
        row(1, "MGI:1", 1, true, Some((SEGMENT, 42))),
        row(1, "AB000001", SINGLE, false, None),
    ])
    .unwrap();
    assert_eq!(result.summary.associated, 1);
    assert_eq!(result.summary.existing, 0);
    assert_eq!(sink.associations.len(), 1);
    assert_eq!(sink.commits, 1);
    assert_eq!(result.meta.config_name, "Integration");
}

#[test]
fn scenario_single_namespace_existing() {
    let (result, sink) = run_rows(vec![
        row(1, "MGI:1", 1, true, Some((SEGMENT, 42))),
        row(1, "AB000001", SINGLE, false, Some((SEGMENT, 42))),
    ])
    .unwrap();
    assert_eq!(result.summary.existing, 1);
    assert!(sink.associations.is_empty());
    assert!(sink.reports.is_empty());
}

#[test]
fn scenario_subject_resolves_to_two_other_entities() {
    let (result, sink) = run_rows(vec![
        row(1, "MGI:1", 1, true, Some((OTHER, 5))),
        row(1, "MGI:1", 1, true, Some((OTHER, 6))),
        row(1, "AB000001", SINGLE, false, None),
        row(1, "AB000002", MULTIPLE, false, None),
        row(1, "AB000003", MULTIPLE, false, None),
    ])
    .unwrap();
    assert_eq!(sink.reports.len(), 2);
    assert!(sink
        .reports
        .iter()
        .all(|r| r.code == DiscrepancyCode::Subject(SubjectCode::C)));
    assert_eq!(result.summary.skipped, 3);
    assert!(sink.associations.is_empty());
}

#[test]
fn scenario_multiple_namespace_report_and_associate() {
    let (result, sink) = run_rows(vec![
        row(1, "MGI:1", 1, true, Some((SEGMENT, 42))),
        row(1, "RK01", MULTIPLE, false, Some((SEGMENT, 50))),
        row(1, "RK01", MULTIPLE, false, Some((SEGMENT, 51))),
        row(1, "RK01", MULTIPLE, false, Some((OTHER, 9))),
    ])
    .unwrap();
    assert_eq!(result.summary.associated, 1);
    assert_eq!(result.summary.candidate_codes.get("L"), Some(&3));
    assert_eq!(sink.associations[0].identifier, "RK01");
}

#[test]
fn scenario_unclassified_namespace_aborts_run() {
    let err = run_rows(vec![
        row(1, "MGI:1", 1, true, Some((SEGMENT, 42))),
        row(1, "X1", 404, false, None),
        row(2, "MGI:2", 1, true, Some((SEGMENT, 43))),
        row(2, "AB000009", SINGLE, false, None),
    ])
    .unwrap_err();
    assert!(err.is_config());
    assert!(err.to_string().contains("404"));
}

#[test]
fn non_contiguous_source_aborts_without_commit() {
    let mut sink = MemorySink::new();
    let rows = vec![
        row(1, "MGI:1", 1, true, Some((SEGMENT, 42))),
        row(2, "MGI:2", 1, true, Some((SEGMENT, 43))),
        row(1, "AB000001", SINGLE, false, None),
    ];
    let err = run(&config(), rows.into_iter().map(Ok), AuxLinkCache::new(), &mut sink).unwrap_err();
    assert!(matches!(err, ReconError::NonContiguousKey { key: 1 }));
    assert_eq!(sink.commits, 0);
}

#[test]
fn rerun_converges() {
    // Second pass sees the first pass's writes as registry matches.
    let first = vec![
        row(1, "MGI:1", 1, true, Some((SEGMENT, 42))),
        row(1, "AB000001", SINGLE, false, None),
    ];
    let (_, sink) = run_rows(first).unwrap();
    let written = &sink.associations[0];

    let second = vec![
        row(1, "MGI:1", 1, true, Some((SEGMENT, 42))),
        row(
            1,
            &written.identifier,
            written.namespace_key,
            false,
            Some((written.entity_type, written.entity_key)),
        ),
    ];
    let (result, sink) = run_rows(second).unwrap();
    assert_eq!(result.summary.existing, 1);
    assert!(sink.associations.is_empty());
    assert!(sink.reports.is_empty());
}

// -------------------------------------------------------------------------
// Properties
// -------------------------------------------------------------------------

fn candidate_strategy() -> impl Strategy<Value = (u8, bool, Option<(bool, u8)>)> {
    // (identifier index, multiple namespace?, match: (same type?, entity offset))
    (0u8..6, any::<bool>(), proptest::option::of((any::<bool>(), 0u8..3)))
}

fn build_unit(key: i64, cands: &[(u8, bool, Option<(bool, u8)>)]) -> Vec<CandidateRow> {
    let mut rows = vec![row(key, "MGI:1", 1, true, Some((SEGMENT, 42)))];
    for (idx, multi, m) in cands {
        let ns = if *multi { MULTIPLE } else { SINGLE };
        let entity = m.map(|(same, off)| if same { (SEGMENT, 42 + off as i64) } else { (OTHER, off as i64) });
        rows.push(row(key, &format!("ID{idx}"), ns, false, entity));
    }
    rows
}

proptest! {
    #[test]
    fn suppressed_units_make_no_writes(cands in proptest::collection::vec(candidate_strategy(), 1..12)) {
        let rows = build_unit(1, &cands);
        let mut sink = MemorySink::new();
        let policy = config().namespace_policy().unwrap();
        let mut reconciler = assocload_recon::Reconciler::new(policy, Some(SEGMENT), AuxLinkCache::new(), &mut sink);
        let unit = assocload_recon::ReconciliationUnit { key: 1, expected_subject_type: SEGMENT, rows };
        let outcome = reconciler.process(&unit).unwrap();
        let summary = reconciler.summary().clone();
        if let assocload_recon::UnitOutcome::Classified { decisions, suppressed, .. } = outcome {
            let blocked = decisions.iter().any(|(_, d)| d.blocks_unit());
            prop_assert_eq!(suppressed, blocked);
            if blocked {
                prop_assert!(sink.associations.is_empty());
                prop_assert_eq!(summary.associated, 0);
                prop_assert_eq!(summary.skipped, decisions.len());
            } else {
                let wanted = decisions.iter().filter(|(_, d)| d.wants_write()).count();
                prop_assert_eq!(sink.associations.len(), wanted);
            }
        } else {
            prop_assert!(false, "subject always resolves here");
        }
    }

    #[test]
    fn one_aux_link_per_subject(units in proptest::collection::vec(proptest::collection::vec(0u8..50, 1..6), 1..10)) {
        // Every unit targets the same linkable subject with fresh identifiers.
        let mut rows = Vec::new();
        for (key, ids) in units.iter().enumerate() {
            let key = key as i64 + 1;
            rows.push(row(key, "MGI:1", 1, true, Some((SEGMENT, 42))));
            for id in ids {
                rows.push(row(key, &format!("N{key}-{id}"), SINGLE, false, None));
            }
        }
        let (result, sink) = run_rows(rows).unwrap();
        prop_assert!(result.summary.associated >= 1);
        prop_assert_eq!(sink.aux_links.len(), 1);
        prop_assert_eq!(sink.aux_links[0].subject_key, 42);
    }
}
