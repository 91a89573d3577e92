// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Inference against a persisted model artifact
//!
//! A [`UrlClassifier`] is immutable once built and can be shared across
//! threads; classification never fails, malformed URLs simply produce the
//! degenerate feature vector.

use std::{path::Path, sync::Arc};

use rayon::prelude::*;
use shared_types::PredictionResult;
use tracing::{info, instrument, trace};
use uuid::Uuid;

use crate::{
    artifact::ModelArtifact,
    error::ClassifierResult,
    features::{FeatureExtractor, FeatureVector},
};

/// Classifies URLs with a trained artifact
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    artifact: Arc<ModelArtifact>,
    extractor: FeatureExtractor,
}

impl UrlClassifier {
    /// Load a classifier from an artifact file
    ///
    /// # Errors
    ///
    /// Returns `ModelLoad` when the artifact is missing, unreadable or
    /// incompatible with the running feature schema
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(path: P) -> ClassifierResult<Self> {
        let classifier = Self::from_artifact(ModelArtifact::load(path)?)?;
        info!(
            artifact_id = %classifier.artifact_id(),
            model = %classifier.model_name(),
            "url classifier ready"
        );
        Ok(classifier)
    }

    /// Build a classifier from an in-memory artifact
    ///
    /// # Errors
    ///
    /// Returns `ModelLoad` when the artifact fails its compatibility check
    pub fn from_artifact(artifact: ModelArtifact) -> ClassifierResult<Self> {
        artifact.check_compatibility()?;
        let extractor = FeatureExtractor::new(artifact.extractor.clone());
        Ok(Self {
            artifact: Arc::new(artifact),
            extractor,
        })
    }

    /// Get the artifact being served
    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Get the id of the artifact being served
    pub fn artifact_id(&self) -> Uuid {
        self.artifact.artifact_id()
    }

    /// Get the roster name of the served model
    pub fn model_name(&self) -> &str {
        self.artifact.model_name()
    }

    /// Feature vector the model sees for `url`
    pub fn features(&self, url: &str) -> FeatureVector {
        self.extractor.extract(url)
    }

    /// Classify a single URL
    pub fn classify(&self, url: &str) -> PredictionResult {
        let features = self.extractor.extract(url);
        let model = &self.artifact.model;

        let result = match model.predict_proba(&features) {
            Some(probability) => PredictionResult::from_probability(url, probability),
            None => PredictionResult::label_only(url, model.predict(&features)),
        };

        trace!(url = %url, prediction = %result.prediction, "classified url");
        result
    }

    /// Classify many URLs in parallel, preserving input order
    pub fn classify_many<S>(&self, urls: &[S]) -> Vec<PredictionResult>
    where
        S: AsRef<str> + Sync,
    {
        urls.par_iter()
            .map(|url| self.classify(url.as_ref()))
            .collect()
    }
}
