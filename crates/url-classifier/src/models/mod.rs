// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Candidate model families and the training roster
//!
//! Every family implements [`Estimator`], which turns a [`TrainingSet`] into
//! a [`FittedModel`]. The fitted model is a closed enum so it can be
//! persisted inside an artifact and dispatched without trait objects at
//! inference time.

pub mod boosting;
pub mod forest;
pub mod logistic;
pub mod scaler;
pub mod svm;
pub mod tree;

use serde::{Deserialize, Serialize};
use shared_types::UrlLabel;

pub use boosting::{BoostingModel, BoostingParams, GradientBoosting};
pub use forest::{ForestModel, ForestParams, RandomForest};
pub use logistic::{LogisticModel, LogisticParams, LogisticRegression};
pub use svm::{LinearSvm, SvmModel, SvmParams};

use crate::{dataset::TrainingSet, error::ClassifierResult, features::FeatureVector};

/// Roster name of [`LogisticRegression`]
pub const LOGISTIC_REGRESSION: &str = "logistic_regression";
/// Roster name of [`RandomForest`]
pub const RANDOM_FOREST: &str = "random_forest";
/// Roster name of [`GradientBoosting`]
pub const GRADIENT_BOOSTING: &str = "gradient_boosting";
/// Roster name of [`LinearSvm`]
pub const LINEAR_SVM: &str = "linear_svm";

/// Candidate names in roster order
pub const ROSTER_ORDER: [&str; 4] = [
    LOGISTIC_REGRESSION,
    RANDOM_FOREST,
    GRADIENT_BOOSTING,
    LINEAR_SVM,
];

/// A trainable candidate
#[cfg_attr(test, mockall::automock)]
pub trait Estimator: Send + Sync {
    /// Stable candidate name used in reports and artifacts
    fn name(&self) -> &'static str;

    /// Fit the candidate on the training rows
    ///
    /// # Errors
    ///
    /// Returns `ModelFit` when the candidate cannot produce a usable model
    fn fit(&self, train: &TrainingSet) -> ClassifierResult<FittedModel>;
}

/// A fitted model of any family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", content = "parameters", rename_all = "snake_case")]
pub enum FittedModel {
    /// Fitted logistic regression
    LogisticRegression(LogisticModel),
    /// Fitted random forest
    RandomForest(ForestModel),
    /// Fitted gradient boosting ensemble
    GradientBoosting(BoostingModel),
    /// Fitted linear SVM
    LinearSvm(SvmModel),
}

impl FittedModel {
    /// Name of the family that produced this model
    pub fn family(&self) -> &'static str {
        match self {
            Self::LogisticRegression(_) => LOGISTIC_REGRESSION,
            Self::RandomForest(_) => RANDOM_FOREST,
            Self::GradientBoosting(_) => GRADIENT_BOOSTING,
            Self::LinearSvm(_) => LINEAR_SVM,
        }
    }

    /// Probability of the malicious class, when the family provides one
    pub fn predict_proba(&self, row: &FeatureVector) -> Option<f64> {
        match self {
            Self::LogisticRegression(model) => Some(model.predict_proba(row)),
            Self::RandomForest(model) => Some(model.predict_proba(row)),
            Self::GradientBoosting(model) => Some(model.predict_proba(row)),
            Self::LinearSvm(_) => None,
        }
    }

    /// Predicted label
    ///
    /// Consistent with [`FittedModel::predict_proba`] whenever it is present.
    pub fn predict(&self, row: &FeatureVector) -> UrlLabel {
        match self {
            Self::LinearSvm(model) => {
                if model.decision_function(row) > 0.0 {
                    UrlLabel::Malicious
                } else {
                    UrlLabel::Benign
                }
            }
            _ => self
                .predict_proba(row)
                .map(UrlLabel::from_probability)
                .unwrap_or(UrlLabel::Benign),
        }
    }

    /// Check if the family provides probabilities
    pub fn has_probabilities(&self) -> bool {
        !matches!(self, Self::LinearSvm(_))
    }

    /// Check that every learned parameter is finite
    pub fn is_valid(&self) -> bool {
        match self {
            Self::LogisticRegression(model) => model.is_valid(),
            Self::RandomForest(model) => model.is_valid(),
            Self::GradientBoosting(model) => model.is_valid(),
            Self::LinearSvm(model) => model.is_valid(),
        }
    }
}

/// Hyper-parameters of every roster candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Logistic regression settings
    pub logistic_regression: LogisticParams,
    /// Random forest settings
    pub random_forest: ForestParams,
    /// Gradient boosting settings
    pub gradient_boosting: BoostingParams,
    /// Linear SVM settings
    pub linear_svm: SvmParams,
}

impl RosterConfig {
    /// Validate every candidate's hyper-parameters
    pub fn validate(&self) -> ClassifierResult<()> {
        self.logistic_regression.validate()?;
        self.random_forest.validate()?;
        self.gradient_boosting.validate()?;
        self.linear_svm.validate()
    }

    /// Estimators in roster order
    pub fn estimators(&self) -> Vec<Box<dyn Estimator>> {
        vec![
            Box::new(LogisticRegression::new(self.logistic_regression.clone())),
            Box::new(RandomForest::new(self.random_forest.clone())),
            Box::new(GradientBoosting::new(self.gradient_boosting.clone())),
            Box::new(LinearSvm::new(self.linear_svm.clone())),
        ]
    }
}

/// Numerically stable logistic function
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
