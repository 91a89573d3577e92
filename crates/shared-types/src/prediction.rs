// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Prediction result returned by the classifier query surface

use serde::{Deserialize, Serialize};

use crate::label::UrlLabel;

/// Classification of a single URL
///
/// When the underlying model produces probability estimates, the two
/// probabilities sum to one and `confidence` is the larger of them. Models
/// without probability estimates only populate `prediction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// The URL exactly as it was submitted
    pub url: String,
    /// Predicted label
    pub prediction: UrlLabel,
    /// Probability that the URL is malicious
    pub probability_malicious: Option<f64>,
    /// Probability that the URL is benign
    pub probability_benign: Option<f64>,
    /// Confidence of the prediction (max of both probabilities)
    pub confidence: Option<f64>,
}

impl PredictionResult {
    /// Build a result from a malicious-class probability
    ///
    /// The probability is clamped into `[0, 1]`; the label follows from it.
    pub fn from_probability(url: impl Into<String>, probability_malicious: f64) -> Self {
        let probability_malicious = if probability_malicious.is_nan() {
            0.5
        } else {
            probability_malicious.clamp(0.0, 1.0)
        };
        let probability_benign = 1.0 - probability_malicious;

        Self {
            url: url.into(),
            prediction: UrlLabel::from_probability(probability_malicious),
            probability_malicious: Some(probability_malicious),
            probability_benign: Some(probability_benign),
            confidence: Some(probability_malicious.max(probability_benign)),
        }
    }

    /// Build a result carrying only a label
    pub fn label_only(url: impl Into<String>, prediction: UrlLabel) -> Self {
        Self {
            url: url.into(),
            prediction,
            probability_malicious: None,
            probability_benign: None,
            confidence: None,
        }
    }

    /// Check if the prediction is malicious
    pub fn is_malicious(&self) -> bool {
        self.prediction.is_malicious()
    }

    /// Check if probability estimates are present
    pub fn has_probabilities(&self) -> bool {
        self.probability_malicious.is_some()
    }
}
