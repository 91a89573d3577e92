// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Random forest of bagged CART trees

use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    Estimator, FittedModel, RANDOM_FOREST,
    tree::{RegressionTree, TreeParams, mean_target},
};
use crate::{
    dataset::TrainingSet,
    error::{ClassifierError, ClassifierResult},
    features::{FEATURE_COUNT, FeatureVector},
};

/// Hyper-parameters of [`RandomForest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Depth limit of each tree
    pub max_depth: usize,
    /// Minimum rows to split a node
    pub min_samples_split: usize,
    /// Minimum rows per leaf
    pub min_samples_leaf: usize,
    /// Features examined per split; `sqrt(FEATURE_COUNT)` when unset
    pub max_features: Option<usize>,
    /// Seed of the bootstrap and feature sampling
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            max_depth: 10,
            min_samples_split: 4,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

impl ForestParams {
    /// Validate the hyper-parameters
    pub fn validate(&self) -> ClassifierResult<()> {
        if self.n_estimators == 0 {
            return Err(ClassifierError::config("forest n_estimators must be at least 1"));
        }
        if self.max_depth == 0 {
            return Err(ClassifierError::config("forest max_depth must be at least 1"));
        }
        if self.max_features == Some(0) {
            return Err(ClassifierError::config("forest max_features must be at least 1"));
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        let default_features = (FEATURE_COUNT as f64).sqrt().round() as usize;
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: Some(self.max_features.unwrap_or(default_features).min(FEATURE_COUNT)),
        }
    }
}

/// Random forest estimator
#[derive(Debug, Clone, Default)]
pub struct RandomForest {
    params: ForestParams,
}

impl RandomForest {
    /// Create a new estimator
    pub fn new(params: ForestParams) -> Self {
        Self { params }
    }
}

/// Fitted random forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    trees: Vec<RegressionTree>,
}

impl ForestModel {
    /// Mean malicious fraction of the leaves the row reaches
    pub fn predict_proba(&self, row: &FeatureVector) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let total: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        total / self.trees.len() as f64
    }

    /// Get the number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Check the forest has trees and every tree is valid
    pub fn is_valid(&self) -> bool {
        !self.trees.is_empty() && self.trees.iter().all(RegressionTree::is_valid)
    }
}

impl Estimator for RandomForest {
    fn name(&self) -> &'static str {
        RANDOM_FOREST
    }

    fn fit(&self, train: &TrainingSet) -> ClassifierResult<FittedModel> {
        if train.is_empty() {
            return Err(ClassifierError::model_fit(
                self.name(),
                "empty training set",
            ));
        }

        let targets = train.targets();
        let tree_params = self.params.tree_params();
        let n = train.len();

        // Each tree owns an RNG derived from the forest seed
        let trees: Vec<RegressionTree> = (0..self.params.n_estimators)
            .into_par_iter()
            .map(|tree_index| {
                let mut rng = StdRng::seed_from_u64(self.params.seed.wrapping_add(tree_index as u64));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                RegressionTree::fit(
                    train.features(),
                    &targets,
                    bootstrap,
                    &tree_params,
                    &mut rng,
                    &|indices: &[usize]| mean_target(&targets, indices),
                )
            })
            .collect();

        let model = ForestModel { trees };
        if !model.is_valid() {
            return Err(ClassifierError::model_fit(
                self.name(),
                "forest contains non-finite nodes",
            ));
        }

        debug!(
            trees = model.n_trees(),
            max_depth = self.params.max_depth,
            "fitted random forest"
        );

        Ok(FittedModel::RandomForest(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::separable_set;

    #[test]
    fn learns_separable_data() {
        let set = separable_set(40);
        let model = RandomForest::default().fit(&set).unwrap();

        let correct = set
            .features()
            .iter()
            .zip(set.labels())
            .filter(|(row, label)| model.predict(row) == **label)
            .count();
        assert!(correct as f64 / set.len() as f64 > 0.9);
    }

    #[test]
    fn fit_is_deterministic() {
        let set = separable_set(30);
        let params = ForestParams {
            n_estimators: 8,
            ..Default::default()
        };

        let first = RandomForest::new(params.clone()).fit(&set).unwrap();
        let second = RandomForest::new(params).fit(&set).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn probabilities_are_bounded() {
        let set = separable_set(20);
        let model = RandomForest::default().fit(&set).unwrap();
        for row in set.features() {
            let p = model.predict_proba(row).unwrap();
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn params_validation() {
        assert!(ForestParams::default().validate().is_ok());
        let params = ForestParams {
            n_estimators: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
