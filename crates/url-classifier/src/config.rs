// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Configuration management for the training pipeline
//!
//! Settings can be read from a single YAML file with
//! [`PipelineConfig::from_file`], or assembled from layered sources with
//! [`PipelineConfig::load`]:
//!
//! 1. Built-in defaults
//! 2. `url-classifier.yaml` in the working directory (optional)
//! 3. `url-classifier.{ENVIRONMENT}.yaml` (optional)
//! 4. `URL_CLASSIFIER__*` environment variables, with `__` between nested
//!    keys (e.g. `URL_CLASSIFIER__TRAINER__SEED=7`)

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::{
    dataset::DataProcessor,
    error::{ClassifierError, ClassifierResult},
    features::{ExtractorConfig, FeatureExtractor},
    metrics::SelectionMetric,
    models::RosterConfig,
    trainer::ModelTrainer,
};

/// Base name of the optional configuration files
pub const CONFIG_FILE_NAME: &str = "url-classifier";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "URL_CLASSIFIER";

/// Where training data comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Primary dataset location
    pub path: PathBuf,
    /// Used when `path` does not exist
    pub fallback_path: PathBuf,
    /// URL column to prefer over the default names
    pub url_column: Option<String>,
    /// Label column to prefer over the default names
    pub label_column: Option<String>,
    /// Rows of the synthetic dataset written when no dataset exists
    pub sample_size: usize,
    /// Seed of the synthetic dataset
    pub sample_seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/dataset.csv"),
            fallback_path: PathBuf::from("data/url_dataset.csv"),
            url_column: None,
            label_column: None,
            sample_size: 2000,
            sample_seed: 42,
        }
    }
}

impl DatasetConfig {
    /// The first configured dataset that exists
    pub fn resolve_path(&self) -> Option<&Path> {
        [self.path.as_path(), self.fallback_path.as_path()]
            .into_iter()
            .find(|candidate| candidate.is_file())
    }

    /// Validate dataset settings
    pub fn validate(&self) -> ClassifierResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(ClassifierError::config("dataset path cannot be empty"));
        }

        // Two rows per class are needed for a stratified split
        if self.sample_size < 4 {
            return Err(ClassifierError::config(format!(
                "Invalid sample_size: {} (must be at least 4)",
                self.sample_size
            )));
        }

        Ok(())
    }
}

/// Split, selection and output settings of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Fraction of each class held out for evaluation
    pub test_fraction: f64,
    /// Seed of the train/test split
    pub seed: u64,
    /// Metric that picks the winning candidate
    pub selection_metric: SelectionMetric,
    /// Destination of the selected model artifact
    pub model_path: PathBuf,
    /// Destination of the evaluation report
    pub report_path: PathBuf,
    /// Fit candidates concurrently
    pub parallel: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            selection_metric: SelectionMetric::F1,
            model_path: PathBuf::from("models/best_model.json"),
            report_path: PathBuf::from("results/evaluation_results.json"),
            parallel: true,
        }
    }
}

impl TrainerConfig {
    /// Validate trainer settings
    pub fn validate(&self) -> ClassifierResult<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ClassifierError::config(format!(
                "Invalid test_fraction: {} (must be in (0, 1))",
                self.test_fraction
            )));
        }

        if self.model_path.as_os_str().is_empty() {
            return Err(ClassifierError::config("model_path cannot be empty"));
        }

        if self.report_path.as_os_str().is_empty() {
            return Err(ClassifierError::config("report_path cannot be empty"));
        }

        if self.model_path == self.report_path {
            return Err(ClassifierError::config(format!(
                "model_path and report_path both point to {}",
                self.model_path.display()
            )));
        }

        Ok(())
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dataset location and sampling
    pub dataset: DatasetConfig,
    /// Split, selection and output settings
    pub trainer: TrainerConfig,
    /// Feature extractor settings
    pub features: ExtractorConfig,
    /// Candidate hyper-parameters
    pub roster: RosterConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> ClassifierResult<Self> {
        let path = path.as_ref();
        debug!("Loading pipeline configuration from: {}", path.display());

        let content = fs::read_to_string(path).await.map_err(|e| {
            ClassifierError::io(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: PipelineConfig = serde_yaml::from_str(&content).map_err(|e| {
            ClassifierError::yaml(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        let config = config.normalized();
        config.validate()?;

        info!(
            "Loaded pipeline configuration from {} (metric: {}, test_fraction: {})",
            path.display(),
            config.trainer.selection_metric,
            config.trainer.test_fraction
        );

        Ok(config)
    }

    /// Load configuration from defaults, optional files and the environment
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a source cannot be parsed or the
    /// merged result is invalid
    pub fn load() -> ClassifierResult<Self> {
        Self::load_layered(None)
    }

    /// Like [`PipelineConfig::load`], with an extra file layered on top of the
    /// default files
    pub fn load_layered(extra_file: Option<&Path>) -> ClassifierResult<Self> {
        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name(CONFIG_FILE_NAME).required(false))
            .add_source(
                File::with_name(&format!(
                    "{}.{}",
                    CONFIG_FILE_NAME,
                    environment.to_lowercase()
                ))
                .required(false),
            );

        if let Some(path) = extra_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let merged = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: PipelineConfig = merged.try_deserialize()?;
        let config = config.normalized();
        config.validate()?;

        debug!(environment = %environment, "loaded layered pipeline configuration");
        Ok(config)
    }

    fn normalized(mut self) -> Self {
        self.features = self.features.normalized();
        self
    }

    /// Validate every section
    pub fn validate(&self) -> ClassifierResult<()> {
        self.dataset.validate()?;
        self.trainer.validate()?;
        self.features.validate()?;
        self.roster.validate()?;

        if !self.trainer.parallel {
            warn!("candidate fitting runs sequentially");
        }

        Ok(())
    }

    /// Feature extractor for these settings
    pub fn extractor(&self) -> FeatureExtractor {
        FeatureExtractor::new(self.features.clone())
    }

    /// Data processor for these settings
    pub fn processor(&self) -> DataProcessor {
        DataProcessor::new(self.extractor(), self.dataset.sample_seed)
    }

    /// Trainer for these settings
    pub fn trainer(&self) -> ModelTrainer {
        ModelTrainer::new(
            self.trainer.clone(),
            &self.roster,
            self.extractor().config().clone(),
        )
    }
}
