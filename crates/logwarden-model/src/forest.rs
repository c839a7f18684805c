use crate::error::ModelError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Euler-Mascheroni constant, used in the average path length term.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Fitting parameters for the forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of isolation trees.
    pub tree_count: usize,
    /// Subsample size per tree, capped at the batch size.
    pub sample_size: usize,
    /// RNG seed, so refitting on identical data is deterministic.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            tree_count: 100,
            sample_size: 256,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

/// An isolation forest over fixed-width feature vectors.
///
/// `score` returns the raw isolation score in `(0, 1]`: points that
/// isolate in few random splits score high, dense points score around
/// 0.5 or lower. Higher raw score means more anomalous; the model
/// service inverts this into a normality score at its boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
    dimensions: usize,
}

impl IsolationForest {
    /// Fits a forest on the given rows. All rows must have the same
    /// width; the width becomes the forest's dimensionality.
    pub fn fit(data: &[Vec<f64>], config: &ForestConfig) -> Result<Self, ModelError> {
        let dimensions = data.first().map(|row| row.len()).unwrap_or(0);
        if data.is_empty() || dimensions == 0 {
            return Err(ModelError::EmptyBatch);
        }

        let sample_size = config.sample_size.min(data.len()).max(1);
        let height_limit = (sample_size as f64).log2().ceil().max(1.0) as usize;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let trees = (0..config.tree_count.max(1))
            .map(|_| {
                let sample = rand::seq::index::sample(&mut rng, data.len(), sample_size);
                let indices: Vec<usize> = sample.into_iter().collect();
                build_tree(data, &indices, 0, height_limit, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            sample_size,
            dimensions,
        })
    }

    /// Raw isolation score for one vector. Vectors shorter than the
    /// forest's dimensionality are padded with 0.0.
    pub fn score(&self, point: &[f64]) -> f64 {
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(tree, point, 0))
            .sum();
        let mean_path = total / self.trees.len() as f64;
        let normalizer = average_path_length(self.sample_size);
        if normalizer <= 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / normalizer)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn build_tree(
    data: &[Vec<f64>],
    indices: &[usize],
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || indices.len() <= 1 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Only features with spread in this partition can split it.
    let dimensions = data[indices[0]].len();
    let mut splittable = Vec::new();
    for feature in 0..dimensions {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &i in indices {
            let v = data[i][feature];
            min = min.min(v);
            max = max.max(v);
        }
        if max > min {
            splittable.push((feature, min, max));
        }
    }
    if splittable.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
    let threshold = rng.gen_range(min..max);

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| data[i][feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(data, &left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(data, &right, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &Node, point: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            let value = point.get(*feature).copied().unwrap_or(0.0);
            if value < *threshold {
                path_length(left, point, depth + 1)
            } else {
                path_length(right, point, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` nodes,
/// the standard isolation-forest normalization term.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
