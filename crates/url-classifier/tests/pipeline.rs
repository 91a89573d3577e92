// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests: dataset on disk to persisted artifact to predictions

use tempfile::TempDir;
use url_classifier::{
    ClassifierError, DataProcessor, EvaluationReport, ModelArtifact, SelectionMetric,
    TrainingPhase, UrlClassifier, UrlLabel, artifact::read_json,
};

mod fixtures;
use fixtures::*;

/// Train on the default 2000-row synthetic dataset and check the scenarios
#[test]
fn synthetic_dataset_end_to_end() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = pipeline_config(&dir);
    let set = synthetic_set(&dir, config.dataset.sample_size);
    assert_eq!(set.len(), 2000);
    assert_eq!(set.class_counts(), (1000, 1000));

    let mut trainer = config.trainer();
    let outcome = trainer.run(&set).unwrap();
    assert_eq!(trainer.phase(), TrainingPhase::Done);
    assert!(trainer.failures().is_empty());
    assert_eq!(outcome.report.results.len(), 4);

    let best = &outcome.artifact.metadata.evaluation;
    assert!(best.accuracy >= 0.85, "accuracy {}", best.accuracy);
    assert_eq!(best.test_samples, 400);
    assert_eq!(outcome.artifact.metadata.training_samples, 1600);

    let classifier = UrlClassifier::load(&config.trainer.model_path).unwrap();
    assert_eq!(classifier.artifact_id(), outcome.artifact.artifact_id());

    let phishing = classifier.classify("http://192.168.1.1/login.php");
    assert_eq!(phishing.prediction, UrlLabel::Malicious);
    let probability = phishing
        .probability_malicious
        .expect("selected model exposes probabilities");
    assert!(probability > 0.5, "probability {}", probability);

    let wikipedia = classifier.classify("https://www.wikipedia.org");
    assert_eq!(wikipedia.prediction, UrlLabel::Benign);

    let empty = classifier.classify("");
    assert_eq!(empty.url, "");

    let report: EvaluationReport = read_json(&config.trainer.report_path).unwrap();
    assert_eq!(report.best_model.as_deref(), Some(classifier.model_name()));
    assert_eq!(report.artifact_id, Some(classifier.artifact_id()));
    assert_eq!(report.results.len(), 4);
}

/// Ranking on AUC guarantees a winner with probability estimates
#[test]
fn auc_selection_yields_probabilities() {
    let dir = TempDir::new().unwrap();
    let mut config = pipeline_config(&dir);
    config.trainer.selection_metric = SelectionMetric::Auc;
    let set = synthetic_set(&dir, 600);

    let outcome = config.trainer().run(&set).unwrap();
    assert_ne!(outcome.artifact.model_name(), "linear_svm");
    assert!(outcome.report.results["linear_svm"].auc.is_none());

    let classifier = UrlClassifier::from_artifact(outcome.artifact).unwrap();
    let result = classifier.classify("http://192.168.1.1/login.php");
    assert_eq!(result.prediction, UrlLabel::Malicious);
    assert!(result.probability_malicious.unwrap() > 0.5);
}

#[test]
fn repeated_runs_select_same_model() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();

    let first_config = pipeline_config(&first_dir);
    let second_config = pipeline_config(&second_dir);
    let first_set = synthetic_set(&first_dir, 400);
    let second_set = synthetic_set(&second_dir, 400);
    assert_eq!(first_set, second_set);

    let first = first_config.trainer().run(&first_set).unwrap();
    let second = second_config.trainer().run(&second_set).unwrap();

    assert_eq!(first.artifact.model_name(), second.artifact.model_name());
    assert_eq!(first.artifact.model, second.artifact.model);
    assert_eq!(first.report.results, second.report.results);
    assert_ne!(first.artifact.artifact_id(), second.artifact.artifact_id());
}

#[test]
fn persisted_artifact_round_trips() {
    let dir = TempDir::new().unwrap();
    let config = pipeline_config(&dir);
    let set = synthetic_set(&dir, 300);

    let outcome = config.trainer().run(&set).unwrap();
    let loaded = ModelArtifact::load(&config.trainer.model_path).unwrap();
    assert_eq!(loaded, outcome.artifact);

    let in_memory = UrlClassifier::from_artifact(outcome.artifact).unwrap();
    let from_disk = UrlClassifier::from_artifact(loaded).unwrap();
    for record in synthetic_records(99, 50) {
        assert_eq!(in_memory.classify(&record.url), from_disk.classify(&record.url));
    }
}

#[test]
fn type_column_behaves_like_label_column() {
    let dir = TempDir::new().unwrap();
    let records = synthetic_records(5, 120);

    let label_path = write_labeled_csv(&dir.path().join("label.csv"), "label", &records, |label| {
        match label {
            UrlLabel::Benign => "0",
            UrlLabel::Malicious => "1",
        }
    });
    let type_path = write_labeled_csv(&dir.path().join("type.csv"), "type", &records, |label| {
        match label {
            UrlLabel::Benign => "benign",
            UrlLabel::Malicious => "phishing",
        }
    });

    let processor = DataProcessor::default();
    let from_label = processor.load(&label_path, None, None).unwrap();
    let from_type = processor.load(&type_path, None, None).unwrap();
    assert_eq!(from_label, records);
    assert_eq!(from_type, records);

    assert_eq!(
        processor.prepare(&from_label).unwrap(),
        processor.prepare(&from_type).unwrap()
    );
}

#[test]
fn missing_label_column_is_rejected() {
    let dir = TempDir::new().unwrap();
    let records = synthetic_records(5, 20);
    let path = write_labeled_csv(&dir.path().join("unlabeled.csv"), "category", &records, |_| {
        "x"
    });

    let err = DataProcessor::default().load(&path, None, None).unwrap_err();
    assert!(matches!(err, ClassifierError::DatasetFormat { .. }));
    assert!(err.is_dataset_error());
    assert!(err.is_fatal_to_training());
}

#[test]
fn dataset_errors_stop_before_training() {
    let dir = TempDir::new().unwrap();
    let config = pipeline_config(&dir);
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "url,label\nhttps://example.com,0\nhttp://x.tk/login,maybe\n").unwrap();

    let err = config.processor().load(&path, None, None).unwrap_err();
    assert!(matches!(err, ClassifierError::LabelFormat { row: 3, .. }));
    assert!(!config.trainer.model_path.exists());
    assert!(!config.trainer.report_path.exists());
}

#[test]
fn single_class_dataset_is_insufficient() {
    let dir = TempDir::new().unwrap();
    let config = pipeline_config(&dir);
    let benign: Vec<_> = synthetic_records(3, 40)
        .into_iter()
        .filter(|record| record.label == UrlLabel::Benign)
        .collect();
    let set = config.processor().prepare(&benign).unwrap();

    let err = config.trainer().run(&set).unwrap_err();
    assert!(matches!(err, ClassifierError::InsufficientData { .. }));
    assert!(!config.trainer.model_path.exists());
}

#[test]
fn dataset_resolution_falls_back_and_samples() {
    let dir = TempDir::new().unwrap();
    let config = pipeline_config(&dir);
    assert!(config.dataset.resolve_path().is_none());

    let summary = config
        .processor()
        .create_sample(&config.dataset.fallback_path, 50)
        .unwrap();
    assert_eq!(summary.total, 50);
    assert_eq!(
        config.dataset.resolve_path(),
        Some(config.dataset.fallback_path.as_path())
    );
}

#[test]
fn config_file_drives_training() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.yaml");
    std::fs::write(
        &path,
        format!(
            "trainer:\n  seed: 11\n  selection_metric: accuracy\n  parallel: false\n  model_path: {}\n  report_path: {}\nroster:\n  random_forest:\n    n_estimators: 5\n",
            dir.path().join("m.json").display(),
            dir.path().join("r.json").display()
        ),
    )
    .unwrap();

    let config = tokio_test::block_on(url_classifier::PipelineConfig::from_file(&path)).unwrap();
    assert_eq!(config.trainer.seed, 11);
    assert!(!config.trainer.parallel);

    let set = synthetic_set(&dir, 200);
    let outcome = config.trainer().run(&set).unwrap();
    assert_eq!(outcome.report.selection_metric, SelectionMetric::Accuracy);
    assert!(config.trainer.model_path.exists());
    assert!(config.trainer.report_path.exists());
}
