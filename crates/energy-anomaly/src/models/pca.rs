//! Principal component analysis by symmetric eigendecomposition.
//!
//! The covariance matrix is diagonalized with cyclic Jacobi rotations, which
//! is exact enough for the handful of features the reconstruction detector
//! builds and needs no LAPACK.

use ndarray::{Array1, Array2, Axis};

use crate::error::{AnomalyError, AnomalyResult};

const MAX_SWEEPS: usize = 100;
const OFF_DIAGONAL_TOLERANCE: f64 = 1e-12;

/// Unfitted PCA parameters.
#[derive(Clone, Copy, Debug)]
pub struct Pca {
    pub n_components: usize,
}

/// Fitted projection: mean vector plus the top principal axes (one per row).
#[derive(Clone, Debug)]
pub struct FittedPca {
    mean: Array1<f64>,
    components: Array2<f64>,
    explained_variance: Vec<f64>,
}

impl Pca {
    /// Component count actually used for `rows × features` data.
    pub fn effective_components(&self, rows: usize, features: usize) -> usize {
        self.n_components
            .min(rows.saturating_sub(1))
            .min(features)
            .max(1)
    }

    pub fn fit(&self, data: &Array2<f64>) -> AnomalyResult<FittedPca> {
        let (rows, features) = data.dim();
        if rows < 2 || features == 0 {
            return Err(AnomalyError::computation(
                "pca",
                format!("cannot project {rows}x{features} data"),
            ));
        }
        let k = self.effective_components(rows, features);

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| AnomalyError::computation("pca", "empty data"))?;
        let centered = data - &mean;
        let covariance = centered.t().dot(&centered) / (rows - 1) as f64;

        let (values, vectors) = symmetric_eigen(&covariance)?;
        let mut order: Vec<usize> = (0..features).collect();
        order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

        let mut components = Array2::<f64>::zeros((k, features));
        for (row, &idx) in order.iter().take(k).enumerate() {
            components.row_mut(row).assign(&vectors.column(idx));
        }
        let explained_variance = order.iter().take(k).map(|&i| values[i].max(0.0)).collect();

        Ok(FittedPca {
            mean,
            components,
            explained_variance,
        })
    }
}

impl FittedPca {
    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean).dot(&self.components.t())
    }

    pub fn inverse_transform(&self, reduced: &Array2<f64>) -> Array2<f64> {
        reduced.dot(&self.components) + &self.mean
    }

    /// Per-row mean squared error between `data` and its reconstruction.
    pub fn reconstruction_error(&self, data: &Array2<f64>) -> Vec<f64> {
        let reconstructed = self.inverse_transform(&self.transform(data));
        let cols = data.ncols().max(1) as f64;
        (data - &reconstructed)
            .rows()
            .into_iter()
            .map(|r| r.iter().map(|d| d * d).sum::<f64>() / cols)
            .collect()
    }
}

/// Eigenvalues and eigenvectors (as columns) of a symmetric matrix.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> AnomalyResult<(Vec<f64>, Array2<f64>)> {
    let p = matrix.nrows();
    if p != matrix.ncols() {
        return Err(AnomalyError::computation("pca", "covariance is not square"));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(AnomalyError::computation("pca", "covariance is not finite"));
    }

    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(p);
    let scale = a.iter().map(|x| x * x).sum::<f64>().sqrt().max(f64::MIN_POSITIVE);

    for _ in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for i in 0..p {
            for j in i + 1..p {
                off += a[[i, j]] * a[[i, j]];
            }
        }
        if off.sqrt() <= OFF_DIAGONAL_TOLERANCE * scale {
            let values = (0..p).map(|i| a[[i, i]]).collect();
            return Ok((values, v));
        }

        for i in 0..p {
            for j in i + 1..p {
                let aij = a[[i, j]];
                if aij == 0.0 {
                    continue;
                }
                let theta = (a[[j, j]] - a[[i, i]]) / (2.0 * aij);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..p {
                    let (aki, akj) = (a[[k, i]], a[[k, j]]);
                    a[[k, i]] = c * aki - s * akj;
                    a[[k, j]] = s * aki + c * akj;
                }
                for k in 0..p {
                    let (aik, ajk) = (a[[i, k]], a[[j, k]]);
                    a[[i, k]] = c * aik - s * ajk;
                    a[[j, k]] = s * aik + c * ajk;
                }
                for k in 0..p {
                    let (vki, vkj) = (v[[k, i]], v[[k, j]]);
                    v[[k, i]] = c * vki - s * vkj;
                    v[[k, j]] = s * vki + c * vkj;
                }
            }
        }
    }
    Err(AnomalyError::computation(
        "pca",
        format!("eigendecomposition did not converge in {MAX_SWEEPS} sweeps"),
    ))
}
