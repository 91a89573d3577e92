// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! L2-regularized logistic regression trained with batch gradient descent

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Estimator, FittedModel, LOGISTIC_REGRESSION, scaler::StandardScaler, sigmoid};
use crate::{
    dataset::TrainingSet,
    error::{ClassifierError, ClassifierResult},
    features::{FEATURE_COUNT, FeatureVector},
};

/// Hyper-parameters of [`LogisticRegression`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticParams {
    /// Gradient descent step size
    pub learning_rate: f64,
    /// Full passes over the training rows
    pub epochs: usize,
    /// L2 penalty on the weights
    pub l2: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            epochs: 300,
            l2: 1e-3,
        }
    }
}

impl LogisticParams {
    /// Validate the hyper-parameters
    pub fn validate(&self) -> ClassifierResult<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ClassifierError::config(format!(
                "logistic learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(ClassifierError::config("logistic epochs must be at least 1"));
        }
        if !(self.l2.is_finite() && self.l2 >= 0.0) {
            return Err(ClassifierError::config(format!(
                "logistic l2 must be non-negative, got {}",
                self.l2
            )));
        }
        Ok(())
    }
}

/// Logistic regression estimator
#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    params: LogisticParams,
}

impl LogisticRegression {
    /// Create a new estimator
    pub fn new(params: LogisticParams) -> Self {
        Self { params }
    }
}

/// Fitted logistic regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    scaler: StandardScaler,
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticModel {
    /// Probability of the malicious class
    pub fn predict_proba(&self, row: &FeatureVector) -> f64 {
        let x = self.scaler.transform(row);
        sigmoid(dot(&self.weights, &x) + self.bias)
    }

    /// Check the weights match the feature schema and are finite
    pub fn is_valid(&self) -> bool {
        self.scaler.is_valid()
            && self.weights.len() == FEATURE_COUNT
            && self.bias.is_finite()
            && self.weights.iter().all(|w| w.is_finite())
    }
}

impl Estimator for LogisticRegression {
    fn name(&self) -> &'static str {
        LOGISTIC_REGRESSION
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
            .map(|row| scaler.transform(row))
            .collect();
        let targets = train.targets();

        let n = rows.len() as f64;
        let dims = rows[0].len();
        let mut weights = vec![0.0; dims];
        let mut bias = 0.0;

        for _ in 0..self.params.epochs {
            let mut grad_w = vec![0.0; dims];
            let mut grad_b = 0.0;

            for (x, y) in rows.iter().zip(&targets) {
                let error = sigmoid(dot(&weights, x) + bias) - y;
                for (g, xi) in grad_w.iter_mut().zip(x) {
                    *g += error * xi;
                }
                grad_b += error;
            }

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= self.params.learning_rate * (g / n + self.params.l2 * *w);
            }
            bias -= self.params.learning_rate * grad_b / n;
        }

        let model = LogisticModel {
            scaler,
            weights,
            bias,
        };
        if !model.is_valid() {
            return Err(ClassifierError::model_fit(
                self.name(),
                "gradient descent diverged",
            ));
        }

        debug!(
            epochs = self.params.epochs,
            bias = model.bias,
            "fitted logistic regression"
        );

        Ok(FittedModel::LogisticRegression(model))
    }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use shared_types::UrlLabel;

    use super::*;
    use crate::models::tests::separable_set;

    #[test]
    fn learns_separable_data() {
        let set = separable_set(40);
        let model = LogisticRegression::default().fit(&set).unwrap();

        for (row, label) in set.features().iter().zip(set.labels()) {
            assert_eq!(model.predict(row), *label);
        }
        let probability = model.predict_proba(&set.features()[0]).unwrap();
        assert!((0.0..=1.0).contains(&probability));
    }

    #[test]
    fn empty_set_fails() {
        let err = LogisticRegression::default()
            .fit(&TrainingSet::default())
            .unwrap_err();
        assert!(matches!(err, ClassifierError::ModelFit { .. }));
    }

    #[test]
    fn single_class_predicts_that_class() {
        let set = separable_set(10);
        let malicious: Vec<usize> = set
            .labels()
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_malicious())
            .map(|(i, _)| i)
            .collect();
        let only_malicious = set.subset(&malicious);

        let model = LogisticRegression::default().fit(&only_malicious).unwrap();
        assert_eq!(model.predict(&set.features()[malicious[0]]), UrlLabel::Malicious);
    }

    #[test]
    fn params_validation() {
        assert!(LogisticParams::default().validate().is_ok());
        let params = LogisticParams {
            epochs: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
