// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0
#![allow(missing_docs, dead_code)]

//! Shared helpers for url-classifier integration tests

use std::{
    fs,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use url_classifier::{
    DataProcessor, PipelineConfig, TrainerConfig, TrainingSet, UrlLabel, UrlRecord,
    dataset::generate_sample,
};

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Pipeline configuration writing every output under `dir`
pub fn pipeline_config(dir: &TempDir) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.dataset.path = dir.path().join("data/dataset.csv");
    config.dataset.fallback_path = dir.path().join("data/url_dataset.csv");
    config.trainer = TrainerConfig {
        model_path: dir.path().join("models/best_model.json"),
        report_path: dir.path().join("results/evaluation_results.json"),
        ..Default::default()
    };
    config
}

/// Write a CSV file with a `url` column and the given label column
pub fn write_labeled_csv(
    path: &Path,
    label_column: &str,
    records: &[UrlRecord],
    label_text: impl Fn(UrlLabel) -> &'static str,
) -> PathBuf {
    let mut content = format!("url,{}\n", label_column);
    for record in records {
        content.push_str(&format!("{},{}\n", record.url, label_text(record.label)));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
    path.to_path_buf()
}

/// Generate, write and reload a synthetic dataset of `count` rows
pub fn synthetic_set(dir: &TempDir, count: usize) -> TrainingSet {
    let processor = DataProcessor::default();
    let path = dir.path().join("data/dataset.csv");
    processor.create_sample(&path, count).unwrap();
    let records = processor.load(&path, None, None).unwrap();
    processor.prepare(&records).unwrap()
}

/// Synthetic records without touching the filesystem
pub fn synthetic_records(seed: u64, count: usize) -> Vec<UrlRecord> {
    generate_sample(seed, count)
}
