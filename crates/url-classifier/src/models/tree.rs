// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Regression trees shared by the forest and boosting families
//!
//! Splits maximize `sum(left)^2 / n_left + sum(right)^2 / n_right`, which is
//! the reduction in squared error for the node's targets. With 0/1 targets
//! this is the Gini criterion, so the same builder serves classification
//! (forest) and residual fitting (boosting).

use rand::{Rng, seq::index};
use serde::{Deserialize, Serialize};

use crate::features::{FEATURE_COUNT, FeatureVector};

/// Gains below this are treated as no improvement
const MIN_GAIN: f64 = 1e-12;

/// Growth limits of a single tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Depth limit; the root is depth 0
    pub max_depth: usize,
    /// Minimum rows to split a node
    pub min_samples_split: usize,
    /// Minimum rows per leaf
    pub min_samples_leaf: usize,
    /// Features examined per split; all when `None`
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

/// A fitted binary regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl RegressionTree {
    /// Grow a tree over the rows at `indices`
    ///
    /// `leaf_value` computes the output of a leaf from the rows it holds.
    pub fn fit<R: Rng>(
        features: &[FeatureVector],
        targets: &[f64],
        indices: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
        leaf_value: &dyn Fn(&[usize]) -> f64,
    ) -> Self {
        let builder = TreeBuilder {
            features,
            targets,
            params,
            leaf_value,
        };

        Self {
            root: builder.build(indices, 0, rng),
        }
    }

    /// Output of the leaf the row falls into
    pub fn predict(&self, row: &FeatureVector) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row.value(*feature) <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Number of levels below the root
    pub fn depth(&self) -> usize {
        fn depth_of(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        depth_of(&self.root)
    }

    /// Check every threshold and leaf value is finite and every feature index valid
    pub fn is_valid(&self) -> bool {
        fn valid(node: &TreeNode) -> bool {
            match node {
                TreeNode::Leaf { value } => value.is_finite(),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    *feature < FEATURE_COUNT && threshold.is_finite() && valid(left) && valid(right)
                }
            }
        }
        valid(&self.root)
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

struct TreeBuilder<'a> {
    features: &'a [FeatureVector],
    targets: &'a [f64],
    params: &'a TreeParams,
    leaf_value: &'a dyn Fn(&[usize]) -> f64,
}

impl TreeBuilder<'_> {
    fn leaf(&self, indices: &[usize]) -> TreeNode {
        let value = if indices.is_empty() {
            0.0
        } else {
            (self.leaf_value)(indices)
        };

        TreeNode::Leaf {
            value: if value.is_finite() { value } else { 0.0 },
        }
    }

    fn build<R: Rng>(&self, indices: Vec<usize>, depth: usize, rng: &mut R) -> TreeNode {
        if depth >= self.params.max_depth
            || indices.len() < self.params.min_samples_split.max(2)
        {
            return self.leaf(&indices);
        }

        match self.find_best_split(&indices, rng) {
            Some(split) => {
                let left = self.build(split.left, depth + 1, rng);
                let right = self.build(split.right, depth + 1, rng);
                TreeNode::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            None => self.leaf(&indices),
        }
    }

    fn candidate_features<R: Rng>(&self, rng: &mut R) -> Vec<usize> {
        match self.params.max_features {
            Some(k) if k > 0 && k < FEATURE_COUNT => {
                let mut chosen = index::sample(rng, FEATURE_COUNT, k).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..FEATURE_COUNT).collect(),
        }
    }

    fn find_best_split<R: Rng>(&self, indices: &[usize], rng: &mut R) -> Option<Split> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let total: f64 = indices.iter().map(|&i| self.targets[i]).sum();
        let parent_score = total * total / n as f64;

        let mut best: Option<(usize, f64, f64)> = None;
        let mut sorted = indices.to_vec();

        for feature in self.candidate_features(rng) {
            sorted.sort_by(|&a, &b| {
                self.features[a]
                    .value(feature)
                    .total_cmp(&self.features[b].value(feature))
                    .then(a.cmp(&b))
            });

            let mut left_sum = 0.0;
            for position in 1..n {
                left_sum += self.targets[sorted[position - 1]];

                let previous = self.features[sorted[position - 1]].value(feature);
                let current = self.features[sorted[position]].value(feature);
                if previous >= current || position < min_leaf || n - position < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / position as f64
                    + right_sum * right_sum / (n - position) as f64
                    - parent_score;

                if gain > MIN_GAIN && best.is_none_or(|(_, _, best_gain)| gain > best_gain) {
                    best = Some((feature, (previous + current) / 2.0, gain));
                }
            }
        }

        let (feature, threshold, _) = best?;
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| self.features[i].value(feature) <= threshold);

        if left.is_empty() || right.is_empty() {
            return None;
        }

        Some(Split {
            feature,
            threshold,
            left,
            right,
        })
    }
}

/// Mean of the targets at `indices`
pub fn mean_target(targets: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn rows(values: &[f64]) -> Vec<FeatureVector> {
        values
            .iter()
            .map(|&v| {
                let mut row = [0.0; FEATURE_COUNT];
                row[3] = v;
                FeatureVector::new(row)
            })
            .collect()
    }

    #[test]
    fn separates_on_threshold() {
        let features = rows(&[1.0, 2.0, 3.0, 10.0, 11.0, 12.0]);
        let targets = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut rng = StdRng::seed_from_u64(1);

        let tree = RegressionTree::fit(
            &features,
            &targets,
            (0..6).collect(),
            &TreeParams::default(),
            &mut rng,
            &|idx: &[usize]| mean_target(&targets, idx),
        );

        assert_eq!(tree.predict(&features[0]), 0.0);
        assert_eq!(tree.predict(&features[5]), 1.0);
        assert_eq!(tree.depth(), 1);
        assert!(tree.is_valid());
    }

    #[test]
    fn pure_node_becomes_leaf() {
        let features = rows(&[1.0, 2.0, 3.0]);
        let targets = vec![1.0, 1.0, 1.0];
        let mut rng = StdRng::seed_from_u64(1);

        let tree = RegressionTree::fit(
            &features,
            &targets,
            (0..3).collect(),
            &TreeParams::default(),
            &mut rng,
            &|idx: &[usize]| mean_target(&targets, idx),
        );

        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict(&features[1]), 1.0);
    }

    #[test]
    fn respects_max_depth() {
        let features = rows(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let targets = vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let params = TreeParams {
            max_depth: 2,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);

        let tree = RegressionTree::fit(
            &features,
            &targets,
            (0..8).collect(),
            &params,
            &mut rng,
            &|idx: &[usize]| mean_target(&targets, idx),
        );
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn same_seed_same_tree() {
        let features = rows(&[5.0, 1.0, 4.0, 2.0, 8.0, 7.0]);
        let targets = vec![1.0, 0.0, 1.0, 0.0, 1.0, 1.0];
        let params = TreeParams {
            max_features: Some(3),
            ..Default::default()
        };

        let build = || {
            let mut rng = StdRng::seed_from_u64(99);
            RegressionTree::fit(
                &features,
                &targets,
                (0..6).collect(),
                &params,
                &mut rng,
                &|idx: &[usize]| mean_target(&targets, idx),
            )
        };

        assert_eq!(build(), build());
    }
}
