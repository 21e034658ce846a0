use chrono::NaiveDate;

use super::*;
use crate::error::StorageError;
use crate::model::{IngestReport, SessionKind};
use crate::store::ExamRepository;

const SUBJECTS: [&str; 10] = [
    "ANALISI MATEMATICA I",
    "ALGEBRA LINEARE",
    "FISICA GENERALE",
    "PROGRAMMAZIONE",
    "BASI DI DATI",
    "RETI DI CALCOLATORI",
    "SISTEMI OPERATIVI",
    "CALCOLO NUMERICO",
    "LOGICA",
    "STATISTICA",
];

fn document(pages: Vec<String>) -> SourceDocument {
    SourceDocument {
        name: "esami_regolari.pdf".to_string(),
        pages,
    }
}

fn ten_block_page(third_date: &str) -> String {
    SUBJECTS
        .iter()
        .enumerate()
        .map(|(index, subject)| {
            let date = if index == 2 {
                third_date.to_string()
            } else {
                format!("{:02}/02/2027", index + 1)
            };
            format!("{subject}\n{date}\n")
        })
        .collect()
}

fn run(repository: &mut ExamRepository, document: &SourceDocument, kind: SessionKind) -> IngestReport {
    let extractor = BlockExtractor::new(&AnchorConfig::default()).expect("extractor");
    let parser = RecordParser::new().expect("parser");
    ingest(repository, &extractor, &parser, document, kind).expect("ingest should succeed")
}

#[test]
fn ingest_parses_the_reference_block() {
    let mut repository = ExamRepository::open_in_memory().expect("store");
    let document = document(vec!["ANALISI MATEMATICA I\nLunedì 15 Gennaio 2027".to_string()]);

    let report = run(&mut repository, &document, SessionKind::Ordinary);

    assert_eq!(report.accepted, 1);
    let stored = repository.list_all().expect("list");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].record.subject(), "ANALISI MATEMATICA I");
    assert_eq!(
        stored[0].record.exam_date(),
        NaiveDate::from_ymd_opt(2027, 1, 15).expect("date")
    );
    assert_eq!(stored[0].record.session_kind(), SessionKind::Ordinary);
    assert_eq!(stored[0].record.source_document(), "esami_regolari.pdf");
}

#[test]
fn ingest_isolates_a_malformed_block() {
    for bad_date in ["31/04/2027", "15/02/27"] {
        let mut repository = ExamRepository::open_in_memory().expect("store");
        let document = document(vec![ten_block_page(bad_date)]);

        let report = run(&mut repository, &document, SessionKind::Ordinary);

        assert_eq!(report.block_count, 10);
        assert_eq!(report.accepted, 9);
        assert_eq!(report.rejected.len(), 1);
        let rejection = &report.rejected[0];
        assert_eq!(rejection.block_index, 2);
        assert_eq!(rejection.heading.as_deref(), Some("FISICA GENERALE"));
        assert!(
            rejection.kind == "impossible_date" || rejection.kind == "invalid_date_format",
            "unexpected kind: {}",
            rejection.kind
        );

        let stored = repository
            .list_all()
            .expect("list")
            .into_iter()
            .map(|exam| exam.record.subject().to_string())
            .collect::<Vec<String>>();
        assert_eq!(stored.len(), 9);
        assert!(!stored.contains(&"FISICA GENERALE".to_string()));
        for (index, subject) in SUBJECTS.iter().enumerate() {
            if index != 2 {
                assert!(stored.contains(&subject.to_string()), "missing {subject}");
            }
        }
    }
}

#[test]
fn reingesting_the_same_document_is_idempotent() {
    let mut repository = ExamRepository::open_in_memory().expect("store");
    let document = document(vec![ten_block_page("03/02/2027")]);

    let first = run(&mut repository, &document, SessionKind::Ordinary);
    let count_after_first = repository.count().expect("count");
    let second = run(&mut repository, &document, SessionKind::Ordinary);

    assert_eq!(first.inserted, 10);
    assert_eq!(first.updated, 0);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 10);
    assert_eq!(repository.count().expect("count"), count_after_first);
}

#[test]
fn same_subject_and_date_in_both_sessions_are_kept_apart() {
    let mut repository = ExamRepository::open_in_memory().expect("store");
    let document = document(vec!["LOGICA\n01/03/2027".to_string()]);

    run(&mut repository, &document, SessionKind::Ordinary);
    let report = run(&mut repository, &document, SessionKind::OutOfCourse);

    assert_eq!(report.inserted, 1);
    assert_eq!(repository.count().expect("count"), 2);
}

#[test]
fn ingest_completes_when_every_block_is_rejected() {
    let mut repository = ExamRepository::open_in_memory().expect("store");
    let document = document(vec![
        "orario da definire\nRETI\nda definire\nLOGICA\n99/99/2027".to_string(),
    ]);

    let report = run(&mut repository, &document, SessionKind::OutOfCourse);

    assert_eq!(report.accepted, 0);
    let kinds = report
        .rejected
        .iter()
        .map(|rejection| rejection.kind.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(kinds, vec!["missing_subject", "missing_date", "impossible_date"]);
    assert_eq!(repository.count().expect("count"), 0);
}

fn stored_rows(repository: &ExamRepository) -> Vec<(String, NaiveDate)> {
    repository
        .list_all()
        .expect("list")
        .into_iter()
        .map(|exam| (exam.record.subject().to_string(), exam.record.exam_date()))
        .collect()
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("date")
}

#[test]
fn every_date_line_of_a_subject_is_stored() {
    let mut repository = ExamRepository::open_in_memory().expect("store");
    let document = document(vec![
        "RETI DI CALCOLATORI\n15 gennaio 2027\n12 febbraio 2027\n10 marzo 2027".to_string(),
    ]);

    let report = run(&mut repository, &document, SessionKind::OutOfCourse);

    assert_eq!(report.block_count, 1);
    assert_eq!(report.accepted, 3);
    assert!(report.rejected.is_empty());
    assert_eq!(
        stored_rows(&repository),
        vec![
            ("RETI DI CALCOLATORI".to_string(), date(2027, 1, 15)),
            ("RETI DI CALCOLATORI".to_string(), date(2027, 2, 12)),
            ("RETI DI CALCOLATORI".to_string(), date(2027, 3, 10)),
        ]
    );
}

#[test]
fn a_subject_wrapped_over_two_lines_is_stored_whole() {
    let mut repository = ExamRepository::open_in_memory().expect("store");
    let document = document(vec!["ELEMENTI DI ANALISI\nMATEMATICA\n15/01/2027".to_string()]);

    let report = run(&mut repository, &document, SessionKind::Ordinary);

    assert!(report.rejected.is_empty());
    assert_eq!(
        stored_rows(&repository),
        vec![("ELEMENTI DI ANALISI MATEMATICA".to_string(), date(2027, 1, 15))]
    );
}

#[test]
fn a_time_range_before_the_date_does_not_reject_the_block() {
    let mut repository = ExamRepository::open_in_memory().expect("store");
    let document = document(vec!["RETI\nore 9.30 - 11.30\n15/01/2027".to_string()]);

    let report = run(&mut repository, &document, SessionKind::Ordinary);

    assert_eq!(report.accepted, 1);
    assert!(report.rejected.is_empty());
    assert_eq!(
        stored_rows(&repository),
        vec![("RETI".to_string(), date(2027, 1, 15))]
    );
}

#[test]
fn ordinary_table_day_lists_expand_under_month_headers() {
    let mut repository = ExamRepository::open_in_memory().expect("store");
    let document = document(vec![
        "INSEGNAMENTO\nGennaio 2027\nFebbraio 2027\nALGEBRA LINEARE\n12, 26\n9 e 23".to_string(),
    ]);

    let report = run(&mut repository, &document, SessionKind::Ordinary);

    assert_eq!(report.accepted, 4);
    assert!(report.rejected.is_empty());
    let dates = stored_rows(&repository)
        .into_iter()
        .map(|(_, exam_date)| exam_date)
        .collect::<Vec<NaiveDate>>();
    assert_eq!(
        dates,
        vec![
            date(2027, 1, 12),
            date(2027, 1, 26),
            date(2027, 2, 9),
            date(2027, 2, 23)
        ]
    );
}

#[test]
fn storage_failure_aborts_the_document() {
    let mut repository = ExamRepository::open_in_memory().expect("store");
    repository
        .connection_for_tests()
        .execute_batch("DROP TABLE exams;")
        .expect("drop table");
    let extractor = BlockExtractor::new(&AnchorConfig::default()).expect("extractor");
    let parser = RecordParser::new().expect("parser");
    let document = document(vec![ten_block_page("03/02/2027")]);

    let error = ingest(
        &mut repository,
        &extractor,
        &parser,
        &document,
        SessionKind::Ordinary,
    )
    .expect_err("missing table must fail");

    assert!(matches!(error, StorageError::Unavailable { .. }));
}
