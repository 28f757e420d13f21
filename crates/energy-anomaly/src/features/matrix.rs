//! Model-ready feature matrices.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use tracing::debug;

use crate::error::{AnomalyError, AnomalyResult};

/// Row-aligned numeric features backed by an `ndarray` matrix.
///
/// Rows match the caller's table rows one to one. Construction replaces every
/// NaN/Infinity with 0, so a `FeatureMatrix` is always finite.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    data: Array2<f64>,
}

impl FeatureMatrix {
    /// Assemble a matrix from named, equal-length columns.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> AnomalyResult<Self> {
        let Some(rows) = columns.first().map(|(_, v)| v.len()) else {
            return Err(AnomalyError::computation("feature-matrix", "no feature columns"));
        };
        if let Some((name, v)) = columns.iter().find(|(_, v)| v.len() != rows) {
            return Err(AnomalyError::computation(
                "feature-matrix",
                format!("feature '{name}' has {} rows, expected {rows}", v.len()),
            ));
        }

        let mut data = Array2::<f64>::zeros((rows, columns.len()));
        let mut replaced = 0usize;
        for (j, (_, values)) in columns.iter().enumerate() {
            for (i, &v) in values.iter().enumerate() {
                if v.is_finite() {
                    data[[i, j]] = v;
                } else {
                    replaced += 1;
                }
            }
        }
        if replaced > 0 {
            debug!(replaced, "zeroed non-finite feature cells");
        }
        Ok(Self {
            names: columns.into_iter().map(|(n, _)| n).collect(),
            data,
        })
    }

    /// Wrap an existing matrix, zeroing non-finite cells.
    pub fn from_array(names: Vec<String>, mut data: Array2<f64>) -> AnomalyResult<Self> {
        if names.len() != data.ncols() {
            return Err(AnomalyError::computation(
                "feature-matrix",
                format!("{} names for {} columns", names.len(), data.ncols()),
            ));
        }
        data.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
        Ok(Self { names, data })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.data.row(i)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|j| self.data.column(j))
    }

    /// Column-wise standardization with population statistics computed on
    /// this matrix. Constant columns are centered only.
    pub fn standardize(&self) -> Self {
        let n = self.nrows();
        if n == 0 {
            return self.clone();
        }
        let mean = self
            .data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.ncols()));
        let std = self
            .data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
        let mut data = (&self.data - &mean) / &std;
        data.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
        Self {
            names: self.names.clone(),
            data,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}
