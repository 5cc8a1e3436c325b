#[path = "../common/mod.rs"]
mod common;

use common::{exit, ok, solver_script, tree_snapshot, FakeRunner, Fixture, RecordingPublisher};
use farmdyn_qm::core::error::QmError;
use farmdyn_qm::core::orchestrator::RunOutcome;
use farmdyn_qm::core::session::LOCK_FILE_NAME;
use farmdyn_qm::core::types::{Revision, RevisionRequest};
use std::fs;

#[tokio::test]
async fn test_full_run_publishes_and_archives() {
    let fixture = Fixture::new();
    let batch = fixture.add_batch("batch_test_dairy");
    fs::write(fixture.results_dir.join("res_stale.gdx"), b"old").unwrap();

    let runner = FakeRunner::new(solver_script(
        4711,
        fixture.results_dir.clone(),
        fixture.output_dir.clone(),
        &["scenario7", "scenario8"],
    ));
    let publisher = RecordingPublisher::new();
    let coordinator = fixture.coordinator(runner.clone(), publisher.clone());

    let outcome = coordinator
        .run_one(Revision::Number(4711), &batch)
        .await
        .unwrap();

    let RunOutcome::Executed {
        revision,
        archive,
        extraction,
        ..
    } = outcome
    else {
        panic!("expected an executed run");
    };
    assert_eq!(revision, 4711);
    assert_eq!(archive, fixture.archive_dir("4711", "batch_test_dairy"));
    assert!(extraction.is_clean());
    assert_eq!(
        extraction.published,
        vec![
            "4711::batch_test_dairy::scenario7".to_string(),
            "4711::batch_test_dairy::scenario8".to_string()
        ]
    );

    // stale artifacts of an earlier run are neither published nor archived
    let records = publisher.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.scenario != "stale"));
    assert_eq!(records[0].values.get("totalProfit"), Some(&1250.5));
    assert!(!archive.join("res_stale.gdx").exists());

    assert!(archive.join("res_scenario7.gdx").is_file());
    assert!(archive.join("scenario8.lst").is_file());
    assert!(!fixture.root.join("results").join(LOCK_FILE_NAME).exists());

    let lines = runner.command_lines();
    assert_eq!(lines[0], "svn revert -R ./");
    assert_eq!(lines[1], "svn update -r 4711");
    assert_eq!(lines[2], "svn info --show-item revision");
    assert!(lines[3].starts_with("solver "));
    assert!(lines[3].ends_with("batch_test_dairy.txt"));

    let descriptor = fs::read_to_string(&batch.path).unwrap();
    assert!(descriptor.contains(&format!("output dir = {}", fixture.output_dir.display())));
    assert!(descriptor.contains("Solver = CPLEX"));
}

#[tokio::test]
async fn test_populated_archive_skips_without_side_effects() {
    let fixture = Fixture::new();
    let batch = fixture.add_batch("batch_test_dairy");
    let archive = fixture.archive_dir("4711", "batch_test_dairy");
    fs::create_dir_all(&archive).unwrap();
    fs::write(archive.join("res_scenario7.gdx"), b"GDX").unwrap();
    fs::write(fixture.results_dir.join("res_other.gdx"), b"keep").unwrap();

    let before = tree_snapshot(fixture.temp.path());
    let runner = FakeRunner::new(|_| panic!("no command expected"));
    let publisher = RecordingPublisher::new();
    let coordinator = fixture.coordinator(runner.clone(), publisher.clone());

    let outcome = coordinator
        .run_one(Revision::Number(4711), &batch)
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::AlreadySatisfied { .. }));
    assert!(runner.requests().is_empty());
    assert!(publisher.records().is_empty());
    assert_eq!(tree_snapshot(fixture.temp.path()), before);
}

#[tokio::test]
async fn test_revision_mismatch_stops_before_solver() {
    let fixture = Fixture::new();
    let batch = fixture.add_batch("batch_test_dairy");
    let runner = FakeRunner::new(|request| match request.args.first().map(String::as_str) {
        Some("info") => ok("4710\n"),
        _ if request.tool == "svn" => ok(""),
        _ => panic!("solver must not run"),
    });
    let coordinator = fixture.coordinator(runner.clone(), RecordingPublisher::new());

    let err = coordinator
        .run_one(Revision::Number(4711), &batch)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        QmError::RevisionMismatch {
            expected: 4711,
            actual: 4710
        }
    ));
    assert!(!fixture.archive_dir("4711", "batch_test_dairy").exists());
    assert_eq!(fs::read_to_string(&batch.path).unwrap(), common::DESCRIPTOR);
}

#[tokio::test]
async fn test_solver_failure_fails_run_and_releases_session() {
    let fixture = Fixture::new();
    let batch = fixture.add_batch("batch_test_dairy");
    let runner = FakeRunner::new(|request| match request.tool.as_str() {
        "svn" if request.args.first().map(String::as_str) == Some("info") => ok("12\n"),
        "svn" => ok(""),
        _ => exit(3, "GAMS license missing"),
    });
    let publisher = RecordingPublisher::new();
    let coordinator = fixture.coordinator(runner, publisher.clone());

    let err = coordinator
        .run_one(Revision::Number(12), &batch)
        .await
        .unwrap_err();

    match err {
        QmError::ToolFailure {
            tool, exit_code, ..
        } => {
            assert_eq!(tool, "solver");
            assert_eq!(exit_code, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(publisher.records().is_empty());
    assert!(!fixture.root.join("results").join(LOCK_FILE_NAME).exists());
}

#[tokio::test]
async fn test_descriptor_without_output_dir_is_rejected() {
    let fixture = Fixture::new();
    let batch = fixture.add_batch_with("batch_test_broken", "Solver = CPLEX\n");
    let runner = FakeRunner::new(|request| match request.args.first().map(String::as_str) {
        Some("info") => ok("12\n"),
        _ if request.tool == "svn" => ok(""),
        _ => panic!("solver must not run"),
    });
    let coordinator = fixture.coordinator(runner, RecordingPublisher::new());

    let err = coordinator
        .run_one(Revision::Number(12), &batch)
        .await
        .unwrap_err();
    assert!(matches!(err, QmError::MissingOutputDir(_)));
    assert_eq!(err.code(), "QM-BATCH-001");
}

#[tokio::test]
async fn test_working_copy_runs_without_update() {
    let fixture = Fixture::new();
    let batch = fixture.add_batch("batch_test_dairy");
    let runner = FakeRunner::new(solver_script(
        900,
        fixture.results_dir.clone(),
        fixture.output_dir.clone(),
        &["base"],
    ));
    let publisher = RecordingPublisher::new();
    let coordinator = fixture.coordinator(runner.clone(), publisher.clone());

    let outcome = coordinator
        .run_one(Revision::WorkingCopy, &batch)
        .await
        .unwrap();

    assert_eq!(
        outcome.archive(),
        fixture.archive_dir("WorkingCopy", "batch_test_dairy")
    );
    assert!(runner.command_lines().iter().all(|l| !l.starts_with("svn update")));
    assert_eq!(publisher.records()[0].id, "900::batch_test_dairy::base");
}

#[tokio::test]
async fn test_held_session_reports_scratch_busy() {
    let fixture = Fixture::new();
    let batch = fixture.add_batch("batch_test_dairy");
    fs::write(fixture.root.join("results").join(LOCK_FILE_NAME), b"1").unwrap();
    let runner = FakeRunner::new(|request| match request.args.first().map(String::as_str) {
        Some("info") => ok("12\n"),
        _ => ok(""),
    });
    let coordinator = fixture.coordinator(runner.clone(), RecordingPublisher::new());

    let err = coordinator
        .run_one(Revision::Number(12), &batch)
        .await
        .unwrap_err();
    assert!(matches!(err, QmError::ScratchBusy(_)));
    // the working copy belongs to the session holder and is left alone
    assert!(runner.requests().is_empty());
    assert_eq!(fs::read_to_string(&batch.path).unwrap(), common::DESCRIPTOR);
    assert!(fixture.root.join("results").join(LOCK_FILE_NAME).exists());
}

#[tokio::test]
async fn test_solver_without_artifacts_is_not_a_clean_run() {
    let fixture = Fixture::new();
    let batch = fixture.add_batch("batch_test_dairy");
    let runner = FakeRunner::new(solver_script(
        12,
        fixture.results_dir.clone(),
        fixture.output_dir.clone(),
        &[],
    ));
    let publisher = RecordingPublisher::new();
    let coordinator = fixture.coordinator(runner, publisher.clone());

    let report = coordinator
        .run_sweep(
            RevisionRequest::Exact(Revision::Number(12)),
            std::slice::from_ref(&batch),
        )
        .await
        .unwrap();

    assert!(publisher.records().is_empty());
    assert!(report.runs[0].has_failures());
    assert_eq!(report.exit_code(), 1);
    assert!(report.runs[0].status_line().contains("res_*.gdx"));
}
