// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Gradient boosted trees with logistic loss
//!
//! Each round fits a shallow [`RegressionTree`] to the residuals `y - p` of a
//! row subsample. Leaf outputs take a Newton step,
//! `sum(residual) / sum(p * (1 - p))`, and are shrunk by the learning rate.

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    Estimator, FittedModel, GRADIENT_BOOSTING, sigmoid,
    tree::{RegressionTree, TreeParams},
};
use crate::{
    dataset::TrainingSet,
    error::{ClassifierError, ClassifierResult},
    features::FeatureVector,
};

/// Bound on a single leaf output, in log-odds
const LEAF_LIMIT: f64 = 4.0;

/// Bound on the initial log-odds for single-class input
const PRIOR_LIMIT: f64 = 10.0;

/// Hyper-parameters of [`GradientBoosting`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    /// Boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    /// Depth limit of each tree
    pub max_depth: usize,
    /// Minimum rows per leaf
    pub min_samples_leaf: usize,
    /// Fraction of rows each round is fitted on
    pub subsample: f64,
    /// Seed of the row subsampling
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 60,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 3,
            subsample: 0.8,
            seed: 42,
        }
    }
}

impl BoostingParams {
    /// Validate the hyper-parameters
    pub fn validate(&self) -> ClassifierResult<()> {
        if self.n_estimators == 0 {
            return Err(ClassifierError::config("boosting n_estimators must be at least 1"));
        }
        if self.max_depth == 0 {
            return Err(ClassifierError::config("boosting max_depth must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ClassifierError::config(format!(
                "boosting learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ClassifierError::config(format!(
                "boosting subsample must be in (0, 1], got {}",
                self.subsample
            )));
        }
        Ok(())
    }
}

/// Gradient boosting estimator
#[derive(Debug, Clone, Default)]
pub struct GradientBoosting {
    params: BoostingParams,
}

impl GradientBoosting {
    /// Create a new estimator
    pub fn new(params: BoostingParams) -> Self {
        Self { params }
    }
}

/// Fitted gradient boosting ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingModel {
    initial_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl BoostingModel {
    /// Raw log-odds score
    pub fn decision_function(&self, row: &FeatureVector) -> f64 {
        self.initial_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    /// Probability of the malicious class
    pub fn predict_proba(&self, row: &FeatureVector) -> f64 {
        sigmoid(self.decision_function(row))
    }

    /// Get the number of boosting rounds kept
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Check every parameter is finite and every tree is valid
    pub fn is_valid(&self) -> bool {
        self.initial_score.is_finite()
            && self.learning_rate.is_finite()
            && self.trees.iter().all(RegressionTree::is_valid)
    }
}

impl Estimator for GradientBoosting {
    fn name(&self) -> &'static str {
        GRADIENT_BOOSTING
    }

    fn fit(&self, train: &TrainingSet) -> ClassifierResult<FittedModel> {
        if train.is_empty() {
            return Err(ClassifierError::model_fit(
                self.name(),
                "empty training set",
            ));
        }

        let n = train.len();
        let targets = train.targets();
        let positive_rate = targets.iter().sum::<f64>() / n as f64;
        let initial_score = (positive_rate / (1.0 - positive_rate))
            .ln()
            .clamp(-PRIOR_LIMIT, PRIOR_LIMIT);

        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: 2 * self.params.min_samples_leaf.max(1),
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: None,
        };
        let sample_size = ((n as f64 * self.params.subsample).ceil() as usize).clamp(1, n);

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut scores = vec![initial_score; n];
        let mut trees = Vec::with_capacity(self.params.n_estimators);
        let mut rows: Vec<usize> = (0..n).collect();

        for round in 0..self.params.n_estimators {
            let probabilities: Vec<f64> = scores.iter().map(|&s| sigmoid(s)).collect();
            let residuals: Vec<f64> = targets
                .iter()
                .zip(&probabilities)
                .map(|(y, p)| y - p)
                .collect();

            rows.shuffle(&mut rng);
            let mut sample = rows[..sample_size].to_vec();
            sample.sort_unstable();

            let newton_step = |indices: &[usize]| {
                let numerator: f64 = indices.iter().map(|&i| residuals[i]).sum();
                let denominator: f64 = indices
                    .iter()
                    .map(|&i| probabilities[i] * (1.0 - probabilities[i]))
                    .sum();
                (numerator / denominator.max(1e-12)).clamp(-LEAF_LIMIT, LEAF_LIMIT)
            };

            let tree = RegressionTree::fit(
                train.features(),
                &residuals,
                sample,
                &tree_params,
                &mut rng,
                &newton_step,
            );

            for (score, row) in scores.iter_mut().zip(train.features()) {
                *score += self.params.learning_rate * tree.predict(row);
            }

            if scores.iter().any(|s| !s.is_finite()) {
                return Err(ClassifierError::model_fit(
                    self.name(),
                    format!("non-finite scores after round {}", round),
                ));
            }

            trees.push(tree);
        }

        let model = BoostingModel {
            initial_score,
            learning_rate: self.params.learning_rate,
            trees,
        };

        debug!(
            trees = model.n_trees(),
            initial_score = model.initial_score,
            "fitted gradient boosting"
        );

        Ok(FittedModel::GradientBoosting(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::separable_set;

    #[test]
    fn learns_separable_data() {
        let set = separable_set(40);
        let model = GradientBoosting::default().fit(&set).unwrap();

        for (row, label) in set.features().iter().zip(set.labels()) {
            assert_eq!(model.predict(row), *label);
        }
    }

    #[test]
    fn fit_is_deterministic() {
        let set = separable_set(25);
        let first = GradientBoosting::default().fit(&set).unwrap();
        let second = GradientBoosting::default().fit(&set).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn single_class_input_stays_finite() {
        let set = separable_set(10);
        let benign: Vec<usize> = (0..set.len())
            .filter(|&i| set.labels()[i].is_benign())
            .collect();

        let model = GradientBoosting::default().fit(&set.subset(&benign)).unwrap();
        let p = model.predict_proba(&set.features()[benign[0]]).unwrap();
        assert!(p.is_finite());
        assert!(p < 0.5);
    }

    #[test]
    fn params_validation() {
        assert!(BoostingParams::default().validate().is_ok());
        let params = BoostingParams {
            subsample: 1.5,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
