// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Hot-swappable reference to the serving model
//!
//! Callers take a snapshot with [`ModelHandle::current`] and keep using it
//! for the duration of a request; a concurrent [`ModelHandle::swap`] or
//! [`ModelHandle::reload`] only affects snapshots taken afterwards.

use std::{path::Path, sync::Arc};

use parking_lot::RwLock;
use rayon::prelude::*;
use shared_types::PredictionResult;
use tracing::{debug, info, instrument, warn};

use crate::{
    cache::{CacheStats, PredictionCache, PredictionCacheKey},
    classifier::UrlClassifier,
    error::{ClassifierError, ClassifierResult},
};

/// Shared "current model" for a long-running service
#[derive(Debug)]
pub struct ModelHandle {
    current: RwLock<Arc<UrlClassifier>>,
    cache: Option<PredictionCache>,
}

impl ModelHandle {
    /// Serve `classifier` with a default prediction cache
    pub fn new(classifier: UrlClassifier) -> Self {
        Self::with_cache(classifier, Some(PredictionCache::new()))
    }

    /// Serve `classifier` with the given cache, or none
    pub fn with_cache(classifier: UrlClassifier, cache: Option<PredictionCache>) -> Self {
        Self {
            current: RwLock::new(Arc::new(classifier)),
            cache,
        }
    }

    /// Snapshot of the serving classifier
    pub fn current(&self) -> Arc<UrlClassifier> {
        Arc::clone(&self.current.read())
    }

    /// Replace the serving classifier, returning the previous one
    pub fn swap(&self, classifier: UrlClassifier) -> Arc<UrlClassifier> {
        let incoming = Arc::new(classifier);
        let previous = std::mem::replace(&mut *self.current.write(), Arc::clone(&incoming));

        if let Some(cache) = &self.cache {
            let dropped = cache.retain_artifact(incoming.artifact_id());
            debug!(dropped, "dropped cached predictions of the previous model");
        }

        info!(
            previous_artifact = %previous.artifact_id(),
            artifact_id = %incoming.artifact_id(),
            model = %incoming.model_name(),
            "swapped serving model"
        );
        previous
    }

    /// Load an artifact and swap it in
    ///
    /// Loading runs on the blocking pool. The serving model is only replaced
    /// once the new artifact loaded successfully.
    ///
    /// # Errors
    ///
    /// Returns `ModelLoad` when the artifact cannot be loaded; the current
    /// model keeps serving
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn reload<P: AsRef<Path>>(&self, path: P) -> ClassifierResult<Arc<UrlClassifier>> {
        let path = path.as_ref().to_path_buf();
        let loaded = tokio::task::spawn_blocking(move || UrlClassifier::load(path))
            .await
            .map_err(|e| ClassifierError::model_load(format!("reload task failed: {}", e)))?;

        match loaded {
            Ok(classifier) => Ok(self.swap(classifier)),
            Err(e) => {
                warn!(
                    error = %e,
                    artifact_id = %self.current().artifact_id(),
                    "reload failed, keeping current model"
                );
                Err(e)
            }
        }
    }

    /// Classify a URL with the current model, consulting the cache
    pub fn classify(&self, url: &str) -> PredictionResult {
        let snapshot = self.current();
        self.classify_with(&snapshot, url)
    }

    /// Classify many URLs against a single snapshot, preserving input order
    pub fn classify_many<S>(&self, urls: &[S]) -> Vec<PredictionResult>
    where
        S: AsRef<str> + Sync,
    {
        let snapshot = self.current();
        urls.par_iter()
            .map(|url| self.classify_with(&snapshot, url.as_ref()))
            .collect()
    }

    fn classify_with(&self, classifier: &UrlClassifier, url: &str) -> PredictionResult {
        let Some(cache) = &self.cache else {
            return classifier.classify(url);
        };

        let key = PredictionCacheKey::new(classifier.artifact_id(), url);
        if let Some(cached) = cache.get(&key) {
            return cached;
        }

        let result = classifier.classify(url);

        // Holding the read lock keeps a concurrent swap from landing between
        // the check and the insert
        let current = self.current.read();
        if current.artifact_id() == classifier.artifact_id() {
            cache.insert(key, result.clone());
        }
        result
    }

    /// Cache statistics, when caching is enabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(PredictionCache::stats)
    }
}
