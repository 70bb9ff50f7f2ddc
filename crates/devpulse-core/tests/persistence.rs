use devpulse_core::*;
use proptest::prelude::*;
use serde_json::json;
use std::fs;
use tempfile::tempdir;

fn open(dir: &std::path::Path) -> ContextStore {
    ContextStore::open(JsonFileStore::in_dir(dir))
}

// ── Restart ──────────────────────────────────────────────────────────────────

#[test]
fn test_document_survives_restart() {
    let dir = tempdir().unwrap();

    let before = {
        let store = open(dir.path());
        store
            .record(
                Platform::Github,
                json!({"pull_requests": [{"id": 1, "state": "open"}]}),
            )
            .unwrap();
        store
            .record_failure(Platform::Datadog, "403 Forbidden")
            .unwrap();
        store.document()
    };

    let store = open(dir.path());
    assert_eq!(store.document(), before);
    assert_eq!(store.status().summary.total_pull_requests, 1);
    assert_eq!(
        store.retrieve(Platform::Datadog).last_error.as_deref(),
        Some("403 Forbidden")
    );
}

#[test]
fn test_metric_values_reload_exactly() {
    let dir = tempdir().unwrap();
    let values = [985.6906946328695, 0.1 + 0.2, 1e-300, -42.000000000000014];
    let before = {
        let store = open(dir.path());
        store
            .record(Platform::Datadog, raw_payload(Platform::Datadog, &values))
            .unwrap();
        store.document()
    };

    let store = open(dir.path());
    assert_eq!(store.document(), before);
    match store.retrieve(Platform::Datadog).data {
        Some(PlatformPayload::Datadog(data)) => {
            let reloaded: Vec<f64> = data.metrics.iter().filter_map(|m| m.value).collect();
            assert_eq!(reloaded, values);
        }
        other => panic!("unexpected section data: {:?}", other),
    }
}

#[test]
fn test_file_layout_uses_platform_keys() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    store.record(Platform::AzureDevOps, json!({})).unwrap();

    let raw: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.path().join(CONTEXT_FILE_NAME)).unwrap()).unwrap();
    let sources = raw["data_sources"].as_object().unwrap();
    for key in ["datadog", "github", "azuredevops", "figma"] {
        assert!(sources.contains_key(key), "missing section {}", key);
    }
    assert_eq!(raw["data_sources"]["azuredevops"]["status"], "fetched");
    assert_eq!(raw["data_sources"]["figma"]["status"], "not_fetched");
}

// ── Corruption ───────────────────────────────────────────────────────────────

#[test]
fn test_corrupt_file_starts_empty_and_is_kept_aside() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(CONTEXT_FILE_NAME), b"{\"data_sources\": [").unwrap();

    let store = open(dir.path());
    assert!(store.status().all_not_fetched());
    assert!(dir.path().join("api_context.json.corrupt").exists());

    store.record(Platform::Figma, json!({})).unwrap();
    let reopened = open(dir.path());
    assert!(reopened.retrieve(Platform::Figma).is_fetched());
}

#[test]
fn test_missing_sections_default_to_not_fetched() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join(CONTEXT_FILE_NAME),
        br#"{"last_updated": null, "data_sources": {"github": {"status": "fetched"}}}"#,
    )
    .unwrap();

    let store = open(dir.path());
    let status = store.status();
    assert_eq!(status.data_sources[&Platform::Github].status, FetchStatus::Fetched);
    assert_eq!(status.data_sources[&Platform::Figma].status, FetchStatus::NotFetched);
}

// ── Properties ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Record(Platform, Vec<f64>),
    Fail(Platform),
    Clear,
}

fn finite() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("finite", |v| v.is_finite())
}

fn op() -> impl Strategy<Value = Op> {
    let platform = prop::sample::select(Platform::ALL.to_vec());
    prop_oneof![
        4 => (platform.clone(), prop::collection::vec(finite(), 0..5))
            .prop_map(|(p, values)| Op::Record(p, values)),
        1 => platform.prop_map(Op::Fail),
        1 => Just(Op::Clear),
    ]
}

fn raw_payload(platform: Platform, values: &[f64]) -> serde_json::Value {
    let n = values.len() as u64;
    let items: Vec<_> = (0..n).map(|i| json!({"id": i, "title": format!("item {}", i)})).collect();
    match platform {
        Platform::Github => json!({"pull_requests": items}),
        Platform::AzureDevOps => json!({"work_items": items}),
        Platform::Figma => json!({"total_comments": n}),
        Platform::Datadog => {
            let metrics: Vec<_> = values
                .iter()
                .enumerate()
                .map(|(i, v)| json!({"name": format!("m{}", i), "value": v}))
                .collect();
            json!({"metrics": metrics})
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_reload_equals_document_for_any_sequence(ops in prop::collection::vec(op(), 0..12)) {
        let dir = tempdir().unwrap();
        let store = open(dir.path());
        for op in ops {
            match op {
                Op::Record(p, values) => { store.record(p, raw_payload(p, &values)).unwrap(); }
                Op::Fail(p) => { store.record_failure(p, "upstream unavailable").unwrap(); }
                Op::Clear => store.clear().unwrap(),
            }
        }
        let before = store.document();
        drop(store);

        let reopened = open(dir.path());
        prop_assert_eq!(reopened.document(), before);
    }
}
