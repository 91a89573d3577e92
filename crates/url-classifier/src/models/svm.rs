// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Linear support vector machine trained with Pegasos-style SGD
//!
//! The model has no calibrated probabilities; it only exposes a margin and
//! the label implied by its sign.

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Estimator, FittedModel, LINEAR_SVM, logistic::dot, scaler::StandardScaler};
use crate::{
    dataset::TrainingSet,
    error::{ClassifierError, ClassifierResult},
    features::{FEATURE_COUNT, FeatureVector},
};

/// Hyper-parameters of [`LinearSvm`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmParams {
    /// Regularization strength
    pub lambda: f64,
    /// Full passes over the training rows
    pub epochs: usize,
    /// Seed of the per-epoch shuffles
    pub seed: u64,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            lambda: 1e-3,
            epochs: 20,
            seed: 42,
        }
    }
}

impl SvmParams {
    /// Validate the hyper-parameters
    pub fn validate(&self) -> ClassifierResult<()> {
        if !(self.lambda.is_finite() && self.lambda > 0.0) {
            return Err(ClassifierError::config(format!(
                "svm lambda must be positive, got {}",
                self.lambda
            )));
        }
        if self.epochs == 0 {
            return Err(ClassifierError::config("svm epochs must be at least 1"));
        }
        Ok(())
    }
}

/// Linear SVM estimator
#[derive(Debug, Clone, Default)]
pub struct LinearSvm {
    params: SvmParams,
}

impl LinearSvm {
    /// Create a new estimator
    pub fn new(params: SvmParams) -> Self {
        Self { params }
    }
}

/// Fitted linear SVM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmModel {
    scaler: StandardScaler,
    /// Feature weights followed by the bias weight
    weights: Vec<f64>,
}

impl SvmModel {
    /// Signed distance to the separating hyperplane
    pub fn decision_function(&self, row: &FeatureVector) -> f64 {
        let mut x = self.scaler.transform(row);
        x.push(1.0);
        dot(&self.weights, &x)
    }

    /// Check the weights, bias included, match the feature schema and are finite
    pub fn is_valid(&self) -> bool {
        self.scaler.is_valid()
            && self.weights.len() == FEATURE_COUNT + 1
            && self.weights.iter().all(|w| w.is_finite())
    }
}

impl Estimator for LinearSvm {
    fn name(&self) -> &'static str {
        LINEAR_SVM
    }

    fn fit(&self, train: &TrainingSet) -> ClassifierResult<FittedModel> {
        if train.is_empty() {
            return Err(ClassifierError::model_fit(
                self.name(),
                "empty training set",
            ));
        }

        let scaler = StandardScaler::fit(train.features());
        let rows: Vec<Vec<f64>> = train
            .features()
            .iter()
            .map(|row| {
                let mut x = scaler.transform(row);
                x.push(1.0);
                x
            })
            .collect();
        let signs: Vec<f64> = train
            .labels()
            .iter()
            .map(|label| if label.is_malicious() { 1.0 } else { -1.0 })
            .collect();

        let lambda = self.params.lambda;
        let radius = 1.0 / lambda.sqrt();
        let mut weights = vec![0.0; rows[0].len()];
        let mut order: Vec<usize> = (0..rows.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut step = 0u64;

        for _ in 0..self.params.epochs {
            order.shuffle(&mut rng);
            for &i in &order {
                step += 1;
                let eta = 1.0 / (lambda * step as f64);
                let margin = signs[i] * dot(&weights, &rows[i]);

                let decay = 1.0 - eta * lambda;
                weights.iter_mut().for_each(|w| *w *= decay);
                if margin < 1.0 {
                    for (w, xi) in weights.iter_mut().zip(&rows[i]) {
                        *w += eta * signs[i] * xi;
                    }
                }

                // Project back onto the ball of radius 1/sqrt(lambda)
                let norm = dot(&weights, &weights).sqrt();
                if norm > radius {
                    let factor = radius / norm;
                    weights.iter_mut().for_each(|w| *w *= factor);
                }
            }
        }

        let model = SvmModel { scaler, weights };
        if !model.is_valid() {
            return Err(ClassifierError::model_fit(
                self.name(),
                "weights are not finite",
            ));
        }

        debug!(steps = step, lambda, "fitted linear svm");

        Ok(FittedModel::LinearSvm(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::separable_set;

    #[test]
    fn learns_separable_data() {
        let set = separable_set(40);
        let model = LinearSvm::default().fit(&set).unwrap();

        for (row, label) in set.features().iter().zip(set.labels()) {
            assert_eq!(model.predict(row), *label);
        }
    }

    #[test]
    fn has_no_probabilities() {
        let set = separable_set(10);
        let model = LinearSvm::default().fit(&set).unwrap();
        assert!(model.predict_proba(&set.features()[0]).is_none());
        assert!(!model.has_probabilities());
    }

    #[test]
    fn params_validation() {
        assert!(SvmParams::default().validate().is_ok());
        let params = SvmParams {
            lambda: 0.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
