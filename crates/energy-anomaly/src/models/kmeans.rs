//! Lloyd's k-means with k-means++ seeding and multiple restarts.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{AnomalyError, AnomalyResult};

/// Unfitted k-means parameters.
#[derive(Clone, Copy, Debug)]
pub struct KMeans {
    pub k: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub seed: u64,
}

/// Best clustering over all restarts.
#[derive(Clone, Debug)]
pub struct FittedKMeans {
    pub centers: Array2<f64>,
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub iterations: usize,
}

pub fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of and squared distance to the nearest of `centers`.
pub fn nearest(x: ArrayView1<'_, f64>, centers: &Array2<f64>) -> (usize, f64) {
    centers
        .rows()
        .into_iter()
        .map(|c| squared_distance(x, c))
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best })
}

impl KMeans {
    pub fn fit(&self, data: &Array2<f64>) -> AnomalyResult<FittedKMeans> {
        let n = data.nrows();
        if self.k == 0 || n < self.k {
            return Err(AnomalyError::computation(
                "kmeans",
                format!("cannot form {} clusters from {n} rows", self.k),
            ));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(AnomalyError::computation("kmeans", "non-finite input"));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<FittedKMeans> = None;
        for run in 0..self.n_init.max(1) {
            let centers = self.seed_centers(data, &mut rng);
            let fitted = self.lloyd(data, centers);
            debug!(run, inertia = fitted.inertia, iterations = fitted.iterations, "kmeans restart");
            if best.as_ref().map_or(true, |b| fitted.inertia < b.inertia) {
                best = Some(fitted);
            }
        }
        best.ok_or_else(|| AnomalyError::computation("kmeans", "no restart produced a clustering"))
    }

    /// k-means++: each new center is drawn with probability proportional
    /// to its squared distance from the closest chosen center.
    fn seed_centers(&self, data: &Array2<f64>, rng: &mut StdRng) -> Array2<f64> {
        let n = data.nrows();
        let mut centers = Array2::<f64>::zeros((self.k, data.ncols()));
        centers.row_mut(0).assign(&data.row(rng.gen_range(0..n)));

        let mut closest: Vec<f64> = data
            .rows()
            .into_iter()
            .map(|x| squared_distance(x, centers.row(0)))
            .collect();

        for c in 1..self.k {
            let total: f64 = closest.iter().sum();
            let pick = if total > 0.0 {
                let mut target = rng.gen::<f64>() * total;
                closest
                    .iter()
                    .position(|&d| {
                        target -= d;
                        target < 0.0
                    })
                    .unwrap_or(n - 1)
            } else {
                rng.gen_range(0..n)
            };
            centers.row_mut(c).assign(&data.row(pick));
            for (i, x) in data.rows().into_iter().enumerate() {
                closest[i] = closest[i].min(squared_distance(x, centers.row(c)));
            }
        }
        centers
    }

    fn lloyd(&self, data: &Array2<f64>, mut centers: Array2<f64>) -> FittedKMeans {
        let n = data.nrows();
        let mut labels = vec![usize::MAX; n];
        let mut iterations = 0;

        for iter in 0..self.max_iter.max(1) {
            iterations = iter + 1;
            let mut changed = false;
            let mut distances = vec![0.0; n];
            for (i, x) in data.rows().into_iter().enumerate() {
                let (label, d) = nearest(x, &centers);
                distances[i] = d;
                if labels[i] != label {
                    labels[i] = label;
                    changed = true;
                }
            }
            if !changed {
                break;
            }

            let mut sums = Array2::<f64>::zeros(centers.dim());
            let mut counts = vec![0usize; self.k];
            for (i, x) in data.rows().into_iter().enumerate() {
                let mut row = sums.row_mut(labels[i]);
                row += &x;
                counts[labels[i]] += 1;
            }
            for c in 0..self.k {
                if counts[c] > 0 {
                    let mean = &sums.row(c) / counts[c] as f64;
                    centers.row_mut(c).assign(&mean);
                } else {
                    // Empty cluster: move it onto the worst-fit point.
                    let far = distances
                        .iter()
                        .enumerate()
                        .max_by(|a, b| a.1.total_cmp(b.1))
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    centers.row_mut(c).assign(&data.row(far));
                    distances[far] = 0.0;
                }
            }
        }

        // The last update may have moved centers after labels were assigned.
        let mut inertia = 0.0;
        for (i, x) in data.rows().into_iter().enumerate() {
            let (label, d) = nearest(x, &centers);
            labels[i] = label;
            inertia += d;
        }
        FittedKMeans {
            centers,
            labels,
            inertia,
            iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Array2<f64> {
        let mut v = Vec::new();
        for i in 0..20 {
            let jitter = (i % 5) as f64 * 0.01;
            v.extend_from_slice(&[jitter, jitter]);
            v.extend_from_slice(&[10.0 + jitter, 10.0 - jitter]);
        }
        Array2::from_shape_vec((40, 2), v).unwrap()
    }

    fn kmeans(k: usize) -> KMeans {
        KMeans {
            k,
            n_init: 10,
            max_iter: 300,
            seed: 42,
        }
    }

    #[test]
    fn separates_two_blobs() {
        let fitted = kmeans(2).fit(&blobs()).unwrap();
        assert_ne!(fitted.labels[0], fitted.labels[1]);
        assert!(fitted.labels.iter().step_by(2).all(|&l| l == fitted.labels[0]));
        assert!(fitted.labels.iter().skip(1).step_by(2).all(|&l| l == fitted.labels[1]));
        assert!(fitted.inertia < 1.0);
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let a = kmeans(3).fit(&blobs()).unwrap();
        let b = kmeans(3).fit(&blobs()).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.centers, b.centers);
    }

    #[test]
    fn identical_points_do_not_break_seeding() {
        let data = Array2::from_elem((5, 2), 1.0);
        let fitted = kmeans(2).fit(&data).unwrap();
        assert_eq!(fitted.inertia, 0.0);
    }

    #[test]
    fn too_many_clusters_is_an_error() {
        assert!(kmeans(5).fit(&Array2::zeros((2, 1))).is_err());
    }

    #[test]
    fn labels_follow_final_centers_when_iterations_run_out() {
        let data = Array2::from_shape_vec((6, 1), vec![0.0, 1.0, 2.0, 8.0, 9.0, 30.0]).unwrap();
        let fitted = KMeans {
            k: 2,
            n_init: 1,
            max_iter: 1,
            seed: 3,
        }
        .fit(&data)
        .unwrap();
        assert_eq!(fitted.iterations, 1);
        let mut inertia = 0.0;
        for (x, &label) in data.rows().into_iter().zip(&fitted.labels) {
            let (best, d) = nearest(x, &fitted.centers);
            assert_eq!(label, best);
            inertia += d;
        }
        assert!((fitted.inertia - inertia).abs() < 1e-9);
    }

    #[test]
    fn nearest_center_lookup() {
        let centers = Array2::from_shape_vec((2, 1), vec![0.0, 10.0]).unwrap();
        let x = ndarray::arr1(&[8.0]);
        assert_eq!(nearest(x.view(), &centers), (1, 4.0));
    }
}
