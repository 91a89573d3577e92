// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Per-feature standardization for the linear models

use serde::{Deserialize, Serialize};

use crate::features::{FEATURE_COUNT, FeatureVector};

/// Zero-mean, unit-variance feature scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Learn means and standard deviations from the rows
    ///
    /// Constant features keep a scale of `1.0`.
    pub fn fit(rows: &[FeatureVector]) -> Self {
        let n = rows.len().max(1) as f64;

        let mut means = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (mean, value) in means.iter_mut().zip(row.as_slice()) {
                *mean += value;
            }
        }
        means.iter_mut().for_each(|mean| *mean /= n);

        let mut scales = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for ((scale, mean), value) in scales.iter_mut().zip(&means).zip(row.as_slice()) {
                *scale += (value - mean).powi(2);
            }
        }
        for scale in scales.iter_mut() {
            let std = (*scale / n).sqrt();
            *scale = if std > 1e-12 && std.is_finite() { std } else { 1.0 };
        }

        Self { means, scales }
    }

    /// Standardize one row
    pub fn transform(&self, row: &FeatureVector) -> Vec<f64> {
        row.as_slice()
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect()
    }

    /// Check the learned parameters are usable
    pub fn is_valid(&self) -> bool {
        self.means.len() == FEATURE_COUNT
            && self.scales.len() == FEATURE_COUNT
            && self.means.iter().chain(&self.scales).all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(first: f64, second: f64) -> FeatureVector {
        let mut values = [0.0; FEATURE_COUNT];
        values[0] = first;
        values[1] = second;
        FeatureVector::new(values)
    }

    #[test]
    fn standardizes_columns() {
        let rows = vec![row(1.0, 5.0), row(3.0, 5.0)];
        let scaler = StandardScaler::fit(&rows);

        let transformed = scaler.transform(&rows[0]);
        assert!((transformed[0] + 1.0).abs() < 1e-12);
        // Constant column is centered but not scaled
        assert_eq!(transformed[1], 0.0);
        assert!(scaler.is_valid());
    }

    #[test]
    fn empty_input_is_identity() {
        let scaler = StandardScaler::fit(&[]);
        let transformed = scaler.transform(&row(2.0, -3.0));
        assert_eq!(transformed[0], 2.0);
        assert_eq!(transformed[1], -3.0);
    }
}
