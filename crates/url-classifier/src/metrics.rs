// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Binary classification metrics
//!
//! Malicious is the positive class. Ratios with a zero denominator are `0.0`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use shared_types::UrlLabel;

use crate::{
    dataset::TrainingSet,
    error::{ClassifierError, ClassifierResult},
    models::FittedModel,
};

/// Counts of predicted versus actual labels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Benign predicted benign
    #[serde(rename = "tn")]
    pub true_negatives: usize,
    /// Benign predicted malicious
    #[serde(rename = "fp")]
    pub false_positives: usize,
    /// Malicious predicted benign
    #[serde(rename = "fn")]
    pub false_negatives: usize,
    /// Malicious predicted malicious
    #[serde(rename = "tp")]
    pub true_positives: usize,
}

impl ConfusionMatrix {
    /// Tally predictions against the actual labels
    pub fn from_predictions(actual: &[UrlLabel], predicted: &[UrlLabel]) -> Self {
        let mut matrix = Self::default();
        for (truth, guess) in actual.iter().zip(predicted) {
            match (truth, guess) {
                (UrlLabel::Benign, UrlLabel::Benign) => matrix.true_negatives += 1,
                (UrlLabel::Benign, UrlLabel::Malicious) => matrix.false_positives += 1,
                (UrlLabel::Malicious, UrlLabel::Benign) => matrix.false_negatives += 1,
                (UrlLabel::Malicious, UrlLabel::Malicious) => matrix.true_positives += 1,
            }
        }
        matrix
    }

    /// Get the number of predictions counted
    pub fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }

    /// Fraction of correct predictions
    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    /// Precision of the malicious class; 0 without positive predictions
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// Recall of the malicious class; 0 without malicious samples
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    /// Harmonic mean of precision and recall
    pub fn f1(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Area under the ROC curve via the Mann-Whitney U statistic
///
/// Tied scores receive their average rank. Returns `None` unless both
/// classes are present.
pub fn roc_auc(actual: &[UrlLabel], scores: &[f64]) -> Option<f64> {
    let positives = actual.iter().filter(|l| l.is_malicious()).count();
    let negatives = actual.len() - positives;
    if positives == 0 || negatives == 0 || scores.len() != actual.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; ties share the mean of start+1..=end
        let average = (start + 1 + end) as f64 / 2.0;
        for &index in &order[start..end] {
            ranks[index] = average;
        }
        start = end;
    }

    let positive_rank_sum: f64 = actual
        .iter()
        .zip(&ranks)
        .filter(|(label, _)| label.is_malicious())
        .map(|(_, rank)| rank)
        .sum();

    let p = positives as f64;
    let u = positive_rank_sum - p * (p + 1.0) / 2.0;
    Some(u / (p * negatives as f64))
}

/// Metrics of one candidate on the held-out split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Candidate name
    pub name: String,
    /// Fraction of correct predictions
    pub accuracy: f64,
    /// Malicious-class precision
    pub precision: f64,
    /// Malicious-class recall
    pub recall: f64,
    /// Malicious-class F1
    pub f1: f64,
    /// Present only for models with probabilities and two-class test data
    pub auc: Option<f64>,
    /// Prediction counts
    pub confusion_matrix: ConfusionMatrix,
    /// Rows in the held-out split
    pub test_samples: usize,
}

impl EvaluationResult {
    /// Score a fitted model on the test rows
    ///
    /// # Errors
    ///
    /// Returns `ModelFit` if the model produces a non-finite probability
    pub fn evaluate(name: &str, model: &FittedModel, test: &TrainingSet) -> ClassifierResult<Self> {
        let mut predicted = Vec::with_capacity(test.len());
        let mut scores = Vec::with_capacity(test.len());

        for row in test.features() {
            if let Some(probability) = model.predict_proba(row) {
                if !probability.is_finite() {
                    return Err(ClassifierError::model_fit(
                        name,
                        "non-finite probability during evaluation",
                    ));
                }
                scores.push(probability);
            }
            predicted.push(model.predict(row));
        }

        let matrix = ConfusionMatrix::from_predictions(test.labels(), &predicted);
        let auc = if model.has_probabilities() && test.has_both_classes() {
            roc_auc(test.labels(), &scores)
        } else {
            None
        };

        Ok(Self {
            name: name.to_string(),
            accuracy: matrix.accuracy(),
            precision: matrix.precision(),
            recall: matrix.recall(),
            f1: matrix.f1(),
            auc,
            confusion_matrix: matrix,
            test_samples: test.len(),
        })
    }
}

/// Metric used to pick the winning candidate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMetric {
    /// F1 of the malicious class
    #[default]
    F1,
    /// Overall accuracy
    Accuracy,
    /// Precision of the malicious class
    Precision,
    /// Recall of the malicious class
    Recall,
    /// Area under the ROC curve
    Auc,
}

impl SelectionMetric {
    /// Get the configuration name of the metric
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F1 => "f1",
            Self::Accuracy => "accuracy",
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::Auc => "auc",
        }
    }

    /// Value of this metric in a result; `None` ranks below every value
    pub fn score(&self, result: &EvaluationResult) -> Option<f64> {
        match self {
            Self::F1 => Some(result.f1),
            Self::Accuracy => Some(result.accuracy),
            Self::Precision => Some(result.precision),
            Self::Recall => Some(result.recall),
            Self::Auc => result.auc,
        }
    }
}

impl fmt::Display for SelectionMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionMetric {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f1" => Ok(Self::F1),
            "accuracy" => Ok(Self::Accuracy),
            "precision" => Ok(Self::Precision),
            "recall" => Ok(Self::Recall),
            "auc" | "roc_auc" => Ok(Self::Auc),
            other => Err(ClassifierError::config(format!(
                "unknown selection metric '{}'",
                other
            ))),
        }
    }
}
