// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Phishing URL classification
//!
//! This crate turns raw URLs into fixed-length lexical feature vectors, trains
//! a roster of candidate models on a labeled CSV dataset, selects the best
//! candidate on a held-out split, persists it as a self-describing artifact,
//! and serves predictions from that artifact.
//!
//! # Key Features
//!
//! - **Deterministic feature extraction**: 26 named features, no network
//!   lookups, never fails on malformed input
//! - **Candidate roster**: logistic regression, random forest, gradient
//!   boosting and a linear SVM, fitted in parallel with isolated failures
//! - **Reproducible training**: seeded stratified splits and seeded models
//! - **Versioned artifacts**: atomic JSON writes carrying the feature schema
//!   version, so incompatible models are rejected at load time
//! - **Hot swapping**: [`ModelHandle`] replaces the serving model without
//!   interrupting in-flight classifications
//!
//! # Architecture
//!
//! - [`features`]: URL to [`FeatureVector`] extraction
//! - [`dataset`]: CSV loading, label parsing and synthetic sample generation
//! - [`models`]: candidate estimators and fitted models
//! - [`metrics`]: confusion matrix, ROC AUC and selection metrics
//! - [`trainer`]: the split, train, evaluate, select and persist workflow
//! - [`artifact`]: persisted model artifacts
//! - [`classifier`]: inference against an artifact
//! - [`handle`] and [`cache`]: the serving model reference and its result cache
//! - [`config`]: pipeline configuration
//! - [`error`]: error types
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use url_classifier::{PipelineConfig, UrlClassifier};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::load()?;
//! let processor = config.processor();
//!
//! let dataset = match config.dataset.resolve_path() {
//!     Some(path) => path.to_path_buf(),
//!     None => {
//!         processor.create_sample(&config.dataset.path, config.dataset.sample_size)?;
//!         config.dataset.path.clone()
//!     }
//! };
//!
//! let records = processor.load(
//!     &dataset,
//!     config.dataset.url_column.as_deref(),
//!     config.dataset.label_column.as_deref(),
//! )?;
//! let set = processor.prepare(&records)?;
//! let outcome = config.trainer().run(&set)?;
//! println!("selected {}", outcome.artifact.model_name());
//!
//! let classifier = UrlClassifier::load(&config.trainer.model_path)?;
//! let result = classifier.classify("http://192.168.1.1/login.php");
//! println!("{} -> {}", result.url, result.prediction);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod handle;
pub mod metrics;
pub mod models;
pub mod trainer;

// Re-export main types for convenience
pub use artifact::{ArtifactMetadata, ModelArtifact};
pub use cache::{CacheStats, PredictionCache};
pub use classifier::UrlClassifier;
pub use config::{DatasetConfig, PipelineConfig, TrainerConfig};
pub use dataset::{DataProcessor, DatasetSummary, TrainingSet, UrlRecord};
pub use error::{ClassifierError, ClassifierResult};
pub use features::{ExtractorConfig, FEATURE_COUNT, FEATURE_NAMES, FeatureExtractor, FeatureVector};
pub use handle::ModelHandle;
pub use metrics::{ConfusionMatrix, EvaluationResult, SelectionMetric};
pub use models::{Estimator, FittedModel, RosterConfig};
pub use shared_types::{PredictionResult, UrlLabel};
pub use trainer::{EvaluationReport, ModelTrainer, TrainingOutcome, TrainingPhase};
