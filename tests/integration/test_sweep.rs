#[path = "../common/mod.rs"]
mod common;

use common::{exit, ok, FakeRunner, Fixture, RecordingPublisher, DUMP_CSV};
use farmdyn_qm::core::error::QmError;
use farmdyn_qm::core::types::{Revision, RevisionRequest, RunState};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Head is 120; the solver fails for descriptors whose name contains "broken".
fn sweep_runner(results_dir: PathBuf) -> Arc<FakeRunner> {
    FakeRunner::new(move |request| match request.tool.as_str() {
        "svn" if request.args.first().map(String::as_str) == Some("info") => ok("120\n"),
        "svn" => ok(""),
        "solver" => {
            let descriptor = request.args.last().cloned().unwrap_or_default();
            if descriptor.contains("broken") {
                return exit(1, "solver crashed");
            }
            let scenario = descriptor.trim_end_matches(".txt").to_string();
            fs::write(results_dir.join(format!("res_{}.gdx", scenario)), b"GDX").unwrap();
            ok("")
        }
        "gdxdump" => ok(DUMP_CSV),
        other => panic!("unexpected tool {}", other),
    })
}

#[tokio::test]
async fn test_sweep_continues_after_failed_batch() {
    let fixture = Fixture::new();
    let batches = vec![
        fixture.add_batch("batch_test_a"),
        fixture.add_batch("batch_test_broken"),
        fixture.add_batch("batch_test_c"),
    ];
    let runner = sweep_runner(fixture.results_dir.clone());
    let publisher = RecordingPublisher::new();
    let coordinator = fixture.coordinator(runner.clone(), publisher.clone());

    let report = coordinator
        .run_sweep(RevisionRequest::Head, &batches)
        .await
        .unwrap();

    assert_eq!(report.revision, 120);
    assert_eq!(report.runs.len(), 3);
    assert_eq!(report.runs[0].state, RunState::Satisfied);
    assert_eq!(report.runs[1].state, RunState::Failed);
    assert_eq!(report.runs[2].state, RunState::Satisfied);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.exit_code(), 1);
    assert!(report.runs[1].status_line().contains("QM-TOOL-002"));

    let ids: Vec<String> = publisher.records().into_iter().map(|r| r.id).collect();
    assert_eq!(
        ids,
        vec![
            "120::batch_test_a::batch_test_a".to_string(),
            "120::batch_test_c::batch_test_c".to_string()
        ]
    );

    let lines = runner.command_lines();
    assert_eq!(lines[0], "svn cleanup");
    assert_eq!(lines[1], "svn update -r HEAD --accept=theirs-full");
    assert_eq!(lines[2], "svn info --show-item revision");
}

#[tokio::test]
async fn test_second_sweep_skips_archived_batches() {
    let fixture = Fixture::new();
    let batches = vec![fixture.add_batch("batch_test_a")];
    let publisher = RecordingPublisher::new();
    let coordinator =
        fixture.coordinator(sweep_runner(fixture.results_dir.clone()), publisher.clone());

    let first = coordinator
        .run_sweep(RevisionRequest::Exact(Revision::Number(120)), &batches)
        .await
        .unwrap();
    assert_eq!(first.exit_code(), 0);

    let second = coordinator
        .run_sweep(RevisionRequest::Exact(Revision::Number(120)), &batches)
        .await
        .unwrap();
    assert_eq!(second.exit_code(), 0);
    assert_eq!(second.runs[0].status_line(), "already archived, skipped");
    assert_eq!(publisher.records().len(), 1);
}

#[tokio::test]
async fn test_rejected_scenario_completes_run_with_failure() {
    let fixture = Fixture::new();
    let batches = vec![fixture.add_batch("batch_test_a")];
    let publisher = RecordingPublisher::new();
    publisher.reject_scenario("batch_test_a");
    let coordinator =
        fixture.coordinator(sweep_runner(fixture.results_dir.clone()), publisher.clone());

    let report = coordinator
        .run_sweep(RevisionRequest::Exact(Revision::Number(120)), &batches)
        .await
        .unwrap();

    assert_eq!(report.runs[0].state, RunState::Satisfied);
    assert!(report.runs[0].has_failures());
    assert_eq!(report.exit_code(), 1);
    assert!(fixture
        .archive_dir("120", "batch_test_a")
        .join("res_batch_test_a.gdx")
        .is_file());
}

#[tokio::test]
async fn test_unresolvable_head_aborts_sweep() {
    let fixture = Fixture::new();
    let batches = vec![fixture.add_batch("batch_test_a")];
    let runner = FakeRunner::new(|request| match request.args.first().map(String::as_str) {
        Some("update") => exit(1, "E170013: Unable to connect to a repository"),
        _ => ok(""),
    });
    let coordinator = fixture.coordinator(runner.clone(), RecordingPublisher::new());

    let err = coordinator
        .run_sweep(RevisionRequest::Head, &batches)
        .await
        .unwrap_err();
    assert!(matches!(err, QmError::ToolFailure { .. }));
    assert!(runner.requests().iter().all(|r| r.tool == "svn"));
}
