#[path = "../common/mod.rs"]
mod common;

use async_trait::async_trait;
use common::RecordingPublisher;
use farmdyn_qm::core::config::ExtractionConfig;
use farmdyn_qm::core::error::QmError;
use farmdyn_qm::core::results_processor::{
    parse_dump_csv, record_id, ArtifactDecoder, ResultExtractor, ResultRecord,
};
use indexmap::IndexMap;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Fails for artifacts whose name contains "corrupt", otherwise returns two values.
struct TableDecoder;

#[async_trait]
impl ArtifactDecoder for TableDecoder {
    async fn decode(&self, artifact: &Path, symbol: &str) -> Result<IndexMap<String, f64>, QmError> {
        assert_eq!(symbol, "p_sumRes");
        if artifact.to_string_lossy().contains("corrupt") {
            return Err(QmError::ArtifactDecode {
                path: artifact.to_path_buf(),
                cause: "not a GDX file".to_string(),
            });
        }
        let mut values = IndexMap::new();
        values.insert("totalProfit".to_string(), 1250.5);
        values.insert("labourHours".to_string(), 2100.0);
        Ok(values)
    }
}

fn extractor(dir: &Path, publisher: Arc<RecordingPublisher>) -> ResultExtractor {
    ResultExtractor::new(
        dir.to_path_buf(),
        ExtractionConfig::default(),
        Arc::new(TableDecoder),
        publisher,
    )
}

#[test]
fn test_record_serializes_identity_and_values_flat() {
    let mut values = IndexMap::new();
    values.insert("A".to_string(), 1.5);
    values.insert("B".to_string(), 2.75);
    let record = ResultRecord::new(1234, "feeding_trial", "scenario7", values);

    assert_eq!(
        serde_json::to_value(&record).unwrap(),
        json!({
            "_id": "1234::feeding_trial::scenario7",
            "revision": 1234,
            "batch_name": "feeding_trial",
            "scenario": "scenario7",
            "A": 1.5,
            "B": 2.75
        })
    );
    assert_eq!(record.id, record_id(1234, "feeding_trial", "scenario7"));
}

#[test]
fn test_colliding_labels_are_namespaced() {
    let mut values = IndexMap::new();
    values.insert("revision".to_string(), 3.0);
    values.insert("_id".to_string(), 4.0);
    let record = ResultRecord::new(1, "b", "s", values);

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["revision"], json!(1));
    assert_eq!(json["_id"], json!("1::b::s"));
    assert_eq!(json["value:revision"], json!(3.0));
    assert_eq!(json["value:_id"], json!(4.0));
}

#[test]
fn test_record_ids_differ_per_identity_component() {
    let ids = [
        record_id(1, "batch_test_a", "s1"),
        record_id(2, "batch_test_a", "s1"),
        record_id(1, "batch_test_b", "s1"),
        record_id(1, "batch_test_a", "s2"),
    ];
    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_parse_dump_csv_from_gdxdump() {
    let dump = "\"Dim1\",\"Dim2\",\"Val\"\n\
                \"sum\",\"totalProfit\",1250.5\n\
                \"sum\",\"herdSize\",Eps\n\
                \"sum\",\"shadowPrice\",+Inf\n";
    let table = parse_dump_csv(dump).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.get("totalProfit"), Some(&1250.5));
    assert_eq!(table.get("herdSize"), Some(&0.0));
    assert!(table.get("shadowPrice").is_none());
}

#[test]
fn test_parse_dump_csv_rejects_garbage_rows() {
    assert!(parse_dump_csv("\"Dim1\",\"Val\"\n\"sum\",\"x\",abc\n").is_err());
}

#[tokio::test]
async fn test_extract_publishes_matching_artifacts_only() {
    let temp = TempDir::new().unwrap();
    for name in [
        "res_scenario8.gdx",
        "res_scenario7.GDX",
        "other_scenario9.gdx",
        "res_scenario10.lst",
    ] {
        fs::write(temp.path().join(name), b"GDX").unwrap();
    }
    let publisher = RecordingPublisher::new();

    let summary = extractor(temp.path(), publisher.clone())
        .extract_and_publish(4711, "batch_test_dairy")
        .await
        .unwrap();

    assert!(summary.is_clean());
    let scenarios: Vec<String> = publisher.records().into_iter().map(|r| r.scenario).collect();
    assert_eq!(scenarios, vec!["scenario7", "scenario8"]);
}

#[tokio::test]
async fn test_decode_failure_is_recorded_and_others_continue() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("res_corrupt.gdx"), b"??").unwrap();
    fs::write(temp.path().join("res_scenario7.gdx"), b"GDX").unwrap();
    let publisher = RecordingPublisher::new();

    let summary = extractor(temp.path(), publisher.clone())
        .extract_and_publish(4711, "batch_test_dairy")
        .await
        .unwrap();

    assert_eq!(summary.published, vec!["4711::batch_test_dairy::scenario7"]);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].scenario, "corrupt");
    assert_eq!(summary.failures[0].error.code(), "QM-RES-001");
}

#[tokio::test]
async fn test_missing_results_dir_is_recorded_as_decode_failure() {
    let temp = TempDir::new().unwrap();
    let publisher = RecordingPublisher::new();
    let summary = extractor(&temp.path().join("absent"), publisher.clone())
        .extract_and_publish(1, "batch_test_dairy")
        .await
        .unwrap();
    assert!(summary.published.is_empty());
    assert!(publisher.records().is_empty());
    assert!(!summary.is_clean());
    assert_eq!(summary.failures[0].scenario, "res_*.gdx");
    assert_eq!(summary.failures[0].error.code(), "QM-RES-001");
}

#[tokio::test]
async fn test_results_without_artifacts_are_not_clean() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("res_scenario10.lst"), b"listing").unwrap();
    let publisher = RecordingPublisher::new();

    let summary = extractor(temp.path(), publisher.clone())
        .extract_and_publish(4711, "batch_test_dairy")
        .await
        .unwrap();

    assert_eq!(summary.failures.len(), 1);
    assert!(matches!(
        &summary.failures[0].error,
        QmError::ArtifactDecode { path, .. } if path == temp.path()
    ));
}
