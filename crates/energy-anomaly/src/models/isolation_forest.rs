//! Isolation forest: an ensemble of random partition trees.
//!
//! Each tree is grown on a subsample of `psi` rows by splitting on a random
//! non-constant feature at a uniform random value, up to depth
//! `ceil(log2(psi))`. Points that are isolated after few splits are
//! anomalous. With `E[h(x)]` the mean path length over all trees:
//!
//! ```text
//!   s(x)   = 2^(-E[h(x)] / c(psi))           in (0, 1], higher = more anomalous
//!   offset = percentile(-s, 100 · contamination)
//!   decision(x) = -s(x) - offset              negative = outlier
//! ```

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::error::{AnomalyError, AnomalyResult};
use crate::stats;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Expected path length of an unsuccessful search in a binary search tree
/// of `n` nodes; normalizes isolation depths.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Clone, Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn path_length(&self, x: ArrayView1<'_, f64>) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    value,
                    left,
                    right,
                } => {
                    node = if x[*feature] < *value { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Unfitted isolation-forest parameters.
#[derive(Clone, Debug)]
pub struct IsolationForest {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

/// A grown forest plus its contamination offset.
#[derive(Clone, Debug)]
pub struct FittedForest {
    trees: Vec<Node>,
    psi: usize,
    offset: f64,
}

impl IsolationForest {
    /// Grow the forest on `data` (rows = samples) and calibrate the offset.
    pub fn fit(&self, data: &Array2<f64>) -> AnomalyResult<FittedForest> {
        let n = data.nrows();
        if n < 2 {
            return Err(AnomalyError::computation(
                "isolation-forest",
                format!("needs at least 2 rows, got {n}"),
            ));
        }
        if self.n_estimators == 0 {
            return Err(AnomalyError::computation("isolation-forest", "no estimators"));
        }

        let psi = self.max_samples.clamp(2, n);
        let height_limit = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let trees = (0..self.n_estimators)
            .map(|_| {
                let sample = index::sample(&mut rng, n, psi).into_vec();
                grow(data, sample, 0, height_limit, &mut rng)
            })
            .collect();

        let mut forest = FittedForest {
            trees,
            psi,
            offset: 0.0,
        };
        let raw = forest.score_samples(data);
        forest.offset = stats::percentile(&raw, 100.0 * self.contamination).ok_or_else(|| {
            AnomalyError::computation("isolation-forest", "offset percentile undefined")
        })?;
        Ok(forest)
    }
}

fn grow(
    data: &Array2<f64>,
    rows: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || rows.len() <= 1 {
        return Node::Leaf { size: rows.len() };
    }

    let candidates: Vec<(usize, f64, f64)> = (0..data.ncols())
        .filter_map(|f| {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                let v = data[[r, f]];
                (lo.min(v), hi.max(v))
            });
            (lo < hi).then_some((f, lo, hi))
        })
        .collect();
    if candidates.is_empty() {
        return Node::Leaf { size: rows.len() };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let value = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) =
        rows.into_iter().partition(|&r| data[[r, feature]] < value);

    Node::Split {
        feature,
        value,
        left: Box::new(grow(data, left, depth + 1, height_limit, rng)),
        right: Box::new(grow(data, right, depth + 1, height_limit, rng)),
    }
}

impl FittedForest {
    /// Negated anomaly score `-s(x)` per row; lower = more anomalous.
    pub fn score_samples(&self, data: &Array2<f64>) -> Vec<f64> {
        let norm = average_path_length(self.psi);
        let trees = self.trees.len() as f64;
        data.rows()
            .into_iter()
            .map(|x| {
                let mean_depth = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / trees;
                -(2f64.powf(-mean_depth / norm))
            })
            .collect()
    }

    /// `score_samples - offset`; negative values are outliers.
    pub fn decision_function(&self, data: &Array2<f64>) -> Vec<f64> {
        self.score_samples(data)
            .into_iter()
            .map(|s| s - self.offset)
            .collect()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
