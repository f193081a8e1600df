//! File-backed session context tests

use aerisk_common::session::{SessionContext, UploadBundle, KEY_PREDICTION_RESULT};
use aerisk_common::PredictionResult;
use serde_json::json;

fn sample_bundle() -> UploadBundle {
    UploadBundle {
        file_name: "fleet.csv".to_string(),
        csv_text: "engine_id,cycle\n1,1\n1,2\n".to_string(),
        analysis_type: "remaining_useful_life".to_string(),
        result: PredictionResult::from_value(json!({
            "model": "remaining_useful_life",
            "rows": 2,
            "prediction": [{"rul": 45, "unit": "cycles"}],
            "confidence_score": "0.912"
        }))
        .unwrap(),
    }
}

#[test]
fn test_session_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let bundle = sample_bundle();
    SessionContext::open(&path).commit(&bundle).unwrap();

    let reopened = SessionContext::open(&path);
    let snapshot = reopened.snapshot().unwrap().expect("snapshot after reopen");
    assert_eq!(snapshot.result, bundle.result);
    assert_eq!(snapshot.file_name.as_deref(), Some("fleet.csv"));
    assert_eq!(snapshot.csv_text.as_deref(), Some(bundle.csv_text.as_str()));
    assert_eq!(snapshot.analysis_type.as_deref(), Some("remaining_useful_life"));
}

#[test]
fn test_missing_file_is_empty_session() {
    let dir = tempfile::tempdir().unwrap();
    let session = SessionContext::open(dir.path().join("absent.json"));
    assert!(session.snapshot().unwrap().is_none());
}

#[test]
fn test_corrupt_file_is_empty_session_and_replaced_on_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "garbage").unwrap();

    let session = SessionContext::open(&path);
    assert!(session.snapshot().unwrap().is_none());

    session.commit(&sample_bundle()).unwrap();
    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(on_disk[KEY_PREDICTION_RESULT].is_string());
}

#[test]
fn test_commit_creates_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.json");

    SessionContext::open(&path).commit(&sample_bundle()).unwrap();
    assert!(path.exists());
    assert_eq!(dir_entries(path.parent().unwrap()), vec!["session.json"]);
}

#[test]
fn test_concurrent_writers_share_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    // Each writer has its own context, as separate CLI invocations would
    let writers: Vec<_> = (0..4)
        .map(|n| {
            let path = path.clone();
            std::thread::spawn(move || {
                let session = SessionContext::open(&path);
                let mut bundle = sample_bundle();
                bundle.file_name = format!("writer-{n}.csv");
                for _ in 0..200 {
                    session.commit(&bundle).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let file_name = SessionContext::open(&path).uploaded_file_name().unwrap();
    assert!(file_name.starts_with("writer-"));
    assert_eq!(dir_entries(dir.path()), vec!["session.json"]);
}

fn dir_entries(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}
