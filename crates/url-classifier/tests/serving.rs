// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for serving: hot reload and concurrent classification

use std::{sync::Arc, thread};

use tempfile::TempDir;
use url_classifier::{
    ClassifierError, ModelHandle, PredictionCache, SelectionMetric, UrlClassifier, UrlLabel,
};

mod fixtures;
use fixtures::*;

/// Train a small model and return the artifact path
fn train_into(dir: &TempDir, metric: SelectionMetric) -> std::path::PathBuf {
    let mut config = pipeline_config(dir);
    config.trainer.selection_metric = metric;
    let set = synthetic_set(dir, 300);
    config.trainer().run(&set).unwrap();
    config.trainer.model_path
}

#[tokio::test]
async fn reload_replaces_model_and_keeps_it_on_failure() {
    init_tracing();
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let first_path = train_into(&first_dir, SelectionMetric::F1);
    let second_path = train_into(&second_dir, SelectionMetric::Auc);

    let handle = ModelHandle::new(UrlClassifier::load(&first_path).unwrap());
    let original = handle.current();
    let url = "http://192.168.1.1/login.php";
    handle.classify(url);

    let previous = handle.reload(&second_path).await.unwrap();
    assert_eq!(previous.artifact_id(), original.artifact_id());
    assert_ne!(handle.current().artifact_id(), original.artifact_id());
    assert_eq!(handle.cache_stats().unwrap().entries, 0);

    let serving = handle.current().artifact_id();
    std::fs::write(&first_path, "truncated").unwrap();
    let err = handle.reload(&first_path).await.unwrap_err();
    assert!(matches!(err, ClassifierError::ModelLoad { .. }));
    assert_eq!(handle.current().artifact_id(), serving);

    // The snapshot taken before the reloads still serves the old model
    assert_eq!(original.classify(url).prediction, UrlLabel::Malicious);
}

#[test]
fn concurrent_classification_is_consistent() {
    let dir = TempDir::new().unwrap();
    let path = train_into(&dir, SelectionMetric::F1);
    let handle = Arc::new(ModelHandle::with_cache(
        UrlClassifier::load(&path).unwrap(),
        Some(PredictionCache::with_settings(None, 64)),
    ));

    let urls: Vec<String> = synthetic_records(21, 40)
        .into_iter()
        .map(|record| record.url)
        .collect();
    let expected = handle.current().classify_many(&urls);

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let handle = Arc::clone(&handle);
            let urls = urls.clone();
            thread::spawn(move || handle.classify_many(&urls))
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap(), expected);
    }

    let stats = handle.cache_stats().unwrap();
    assert!(stats.entries <= 64);
    assert!(stats.cache_hits > 0);
}
