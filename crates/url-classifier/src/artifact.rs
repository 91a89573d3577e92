// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Persisted model artifacts
//!
//! An artifact bundles the selected [`FittedModel`] with the extractor
//! settings and feature schema it was trained against. Artifacts are written
//! atomically and are never modified after creation; re-training produces a
//! new artifact with a new id.

use std::{
    fs,
    io::{BufWriter, Write},
    path::Path,
};

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    error::{ClassifierError, ClassifierResult},
    features::{ExtractorConfig, FEATURE_NAMES, FEATURE_SCHEMA_VERSION},
    metrics::EvaluationResult,
    models::FittedModel,
};

/// Descriptive fields of an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Unique id of this artifact
    pub artifact_id: Uuid,
    /// Roster name of the winning candidate
    pub model_name: String,
    /// Feature layout the model expects
    pub feature_schema_version: Version,
    /// Feature names in vector order
    pub feature_names: Vec<String>,
    /// When training finished
    pub training_timestamp: DateTime<Utc>,
    /// Rows the model was fitted on
    pub training_samples: usize,
    /// The winner's held-out evaluation
    pub evaluation: EvaluationResult,
}

/// A trained model ready for inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Descriptive fields
    pub metadata: ArtifactMetadata,
    /// Extractor settings used while training
    pub extractor: ExtractorConfig,
    /// The selected model
    pub model: FittedModel,
}

impl ModelArtifact {
    /// Bundle a fitted model with the current feature schema
    pub fn new(
        model: FittedModel,
        extractor: ExtractorConfig,
        training_samples: usize,
        evaluation: EvaluationResult,
    ) -> ClassifierResult<Self> {
        let metadata = ArtifactMetadata {
            artifact_id: Uuid::new_v4(),
            model_name: evaluation.name.clone(),
            feature_schema_version: current_schema_version()?,
            feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            training_timestamp: Utc::now(),
            training_samples,
            evaluation,
        };

        Ok(Self {
            metadata,
            extractor,
            model,
        })
    }

    /// Get the artifact id
    pub fn artifact_id(&self) -> Uuid {
        self.metadata.artifact_id
    }

    /// Get the roster name of the stored model
    pub fn model_name(&self) -> &str {
        &self.metadata.model_name
    }

    /// Write the artifact as JSON, atomically
    ///
    /// # Errors
    ///
    /// Returns `Io` if the destination cannot be written
    #[instrument(skip(self, path), fields(path = %path.as_ref().display(), model = %self.metadata.model_name))]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ClassifierResult<()> {
        write_json_atomic(path.as_ref(), self)?;
        info!(
            artifact_id = %self.metadata.artifact_id,
            "saved model artifact to {}",
            path.as_ref().display()
        );
        Ok(())
    }

    /// Read an artifact and check it matches the running feature schema
    ///
    /// # Errors
    ///
    /// Returns `ModelLoad` when the file is missing, unreadable or corrupt,
    /// or when it was trained against another feature schema
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(path: P) -> ClassifierResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ClassifierError::model_load(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let artifact: Self = serde_json::from_str(&content).map_err(|e| {
            ClassifierError::model_load(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        artifact.check_compatibility()?;

        debug!(
            artifact_id = %artifact.metadata.artifact_id,
            model = %artifact.metadata.model_name,
            "loaded model artifact"
        );

        Ok(artifact)
    }

    /// Check the artifact can be served by this build
    pub fn check_compatibility(&self) -> ClassifierResult<()> {
        let expected = current_schema_version().map_err(ClassifierError::model_load)?;
        if self.metadata.feature_schema_version != expected {
            return Err(ClassifierError::model_load(format!(
                "feature schema version mismatch: artifact uses {}, this build extracts {}",
                self.metadata.feature_schema_version, expected
            )));
        }

        let names_match = self.metadata.feature_names.len() == FEATURE_NAMES.len()
            && self
                .metadata
                .feature_names
                .iter()
                .zip(FEATURE_NAMES)
                .all(|(stored, current)| stored == current);
        if !names_match {
            return Err(ClassifierError::model_load(
                "feature names do not match the current feature schema",
            ));
        }

        if self.model.family() != self.metadata.model_name {
            return Err(ClassifierError::model_load(format!(
                "artifact names model '{}' but contains a {} model",
                self.metadata.model_name,
                self.model.family()
            )));
        }

        if !self.model.is_valid() {
            return Err(ClassifierError::model_load(
                "model parameters are not finite or do not fit the feature schema",
            ));
        }

        Ok(())
    }
}

fn current_schema_version() -> ClassifierResult<Version> {
    Version::parse(FEATURE_SCHEMA_VERSION).map_err(|e| {
        ClassifierError::config(format!(
            "invalid feature schema version '{}': {}",
            FEATURE_SCHEMA_VERSION, e
        ))
    })
}

/// Serialize `value` as pretty JSON into `path` via a temporary file
///
/// The temporary file lives in the destination directory and is renamed over
/// the target, so readers never observe a partial write.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> ClassifierResult<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory).map_err(|e| {
        ClassifierError::io(format!("Failed to create {}: {}", directory.display(), e))
    })?;

    let temp = NamedTempFile::new_in(directory).map_err(|e| {
        ClassifierError::io(format!(
            "Failed to create temporary file in {}: {}",
            directory.display(),
            e
        ))
    })?;

    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|e| ClassifierError::io(format!("Failed to serialize: {}", e)))?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;

    temp.persist(path).map_err(|e| {
        ClassifierError::io(format!("Failed to write {}: {}", path.display(), e.error))
    })?;

    Ok(())
}

/// Read a JSON document
pub fn read_json<T: DeserializeOwned>(path: &Path) -> ClassifierResult<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| ClassifierError::io(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content).map_err(|e| {
        ClassifierError::json(format!("Failed to parse {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        dataset::TrainingSet,
        metrics::EvaluationResult,
        models::{Estimator, LinearSvm, LogisticRegression, tests::separable_set},
    };

    fn artifact(set: &TrainingSet) -> ModelArtifact {
        let model = LogisticRegression::default().fit(set).unwrap();
        let evaluation = EvaluationResult::evaluate("logistic_regression", &model, set).unwrap();
        ModelArtifact::new(model, ExtractorConfig::default(), set.len(), evaluation).unwrap()
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models/best_model.json");
        let set = separable_set(10);
        let original = artifact(&set);

        original.save(&path).unwrap();
        let restored = ModelArtifact::load(&path).unwrap();

        assert_eq!(restored, original);
        assert_eq!(restored.model_name(), "logistic_regression");
        assert_eq!(restored.metadata.feature_names.len(), FEATURE_NAMES.len());
    }

    #[test]
    fn missing_file_is_model_load_error() {
        let dir = TempDir::new().unwrap();
        let err = ModelArtifact::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad { .. }));
    }

    #[test]
    fn corrupt_file_is_model_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.json");
        fs::write(&path, "{ not json").unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad { .. }));
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.json");
        let mut stale = artifact(&separable_set(5));
        stale.metadata.feature_schema_version = Version::new(0, 9, 0);
        write_json_atomic(&path, &stale).unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad { .. }));
        assert!(err.to_string().contains("schema"));

        let mut renamed = artifact(&separable_set(5));
        renamed.metadata.feature_names.swap(0, 1);
        assert!(renamed.check_compatibility().is_err());
    }

    #[test]
    fn truncated_weights_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("truncated.json");
        artifact(&separable_set(10)).save(&path).unwrap();

        let mut document: serde_json::Value = read_json(&path).unwrap();
        document["model"]["parameters"]["weights"] = serde_json::json!([0.5]);
        write_json_atomic(&path, &document).unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad { .. }));
        assert!(err.to_string().contains("feature schema"));
    }

    #[test]
    fn svm_weights_must_include_bias() {
        let set = separable_set(10);
        let model = LinearSvm::default().fit(&set).unwrap();
        let evaluation = EvaluationResult::evaluate("linear_svm", &model, &set).unwrap();
        let intact = ModelArtifact::new(model, ExtractorConfig::default(), set.len(), evaluation)
            .unwrap();
        assert!(intact.check_compatibility().is_ok());

        let mut document = serde_json::to_value(&intact).unwrap();
        let weights = document["model"]["parameters"]["weights"]
            .as_array_mut()
            .unwrap();
        assert_eq!(weights.len(), FEATURE_NAMES.len() + 1);
        weights.pop();

        let truncated: ModelArtifact = serde_json::from_value(document).unwrap();
        let err = truncated.check_compatibility().unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad { .. }));
    }

    #[test]
    fn unparsable_json_is_json_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        fs::write(&path, "[1, 2").unwrap();

        let err = read_json::<Vec<i32>>(&path).unwrap_err();
        assert!(matches!(err, ClassifierError::Json { .. }));
    }

    #[test]
    fn new_artifacts_get_fresh_ids() {
        let set = separable_set(5);
        assert_ne!(artifact(&set).artifact_id(), artifact(&set).artifact_id());
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");

        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        write_json_atomic(&path, &vec![4]).unwrap();

        let value: Vec<i32> = read_json(&path).unwrap();
        assert_eq!(value, vec![4]);

        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn atomic_write_failure_is_io_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let err = write_json_atomic(&blocker.join("out.json"), &1).unwrap_err();
        assert!(matches!(err, ClassifierError::Io { .. }));
    }
}
