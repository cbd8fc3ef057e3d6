//! Fitted feature scalers.
//!
//! The training pipeline fit one scaler over the two input channels and one
//! over the power target. Their fitted parameters are exported as small JSON
//! files and loaded here.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Row-wise forward transform over multi-column feature rows.
pub trait RowScaler: Send + Sync {
    /// Number of columns the scaler was fit on.
    fn n_features(&self) -> usize;

    /// Map raw rows to normalised rows. Input must have `n_features()` columns.
    fn transform(&self, rows: ArrayView2<f64>) -> Result<Array2<f64>>;
}

/// Inverse transform for a single-column target.
pub trait ScalarScaler: Send + Sync {
    /// Number of columns the scaler was fit on. Must be 1 to be usable.
    fn n_features(&self) -> usize;

    /// Map a normalised value back to physical units.
    fn inverse_transform(&self, value: f64) -> Result<f64>;
}

/// A scaler with parameters fitted at training time.
///
/// Serialized with a `kind` tag:
///
/// ```json
/// {"kind": "standard", "mean": [12.1, 0.0], "scale": [4.2, 1.0]}
/// {"kind": "min_max", "min": [-0.5], "scale": [0.002]}
/// {"kind": "identity", "n_features": 2}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedScaler {
    /// Standardisation: `(x - mean) / scale`.
    Standard { mean: Vec<f64>, scale: Vec<f64> },

    /// Range scaling: `x * scale + min`.
    MinMax { min: Vec<f64>, scale: Vec<f64> },

    /// Pass-through.
    Identity { n_features: usize },
}

impl FittedScaler {
    /// Load and validate a scaler from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| PipelineError::artifact_load(path, e))?;
        let scaler: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PipelineError::artifact_load(path, e))?;
        scaler
            .validate()
            .map_err(|reason| PipelineError::artifact_load(path, reason))?;
        Ok(scaler)
    }

    /// Number of columns the scaler was fit on.
    pub fn n_features(&self) -> usize {
        match self {
            Self::Standard { mean, .. } => mean.len(),
            Self::MinMax { min, .. } => min.len(),
            Self::Identity { n_features } => *n_features,
        }
    }

    /// Check fitted parameters for structural problems.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let (offsets, scale) = match self {
            Self::Standard { mean, scale } => (mean, scale),
            Self::MinMax { min, scale } => (min, scale),
            Self::Identity { n_features } => {
                if *n_features == 0 {
                    return Err("identity scaler must have at least one feature".to_string());
                }
                return Ok(());
            }
        };

        if offsets.is_empty() {
            return Err("scaler has no fitted columns".to_string());
        }
        if offsets.len() != scale.len() {
            return Err(format!(
                "offset has {} columns but scale has {}",
                offsets.len(),
                scale.len()
            ));
        }
        if let Some(i) = offsets.iter().position(|v| !v.is_finite()) {
            return Err(format!("non-finite offset in column {i}"));
        }
        if let Some(i) = scale.iter().position(|v| !v.is_finite() || *v == 0.0) {
            return Err(format!("scale in column {i} must be finite and non-zero"));
        }

        Ok(())
    }

    /// Forward transform of one value in column `col`.
    fn forward(&self, col: usize, x: f64) -> f64 {
        match self {
            Self::Standard { mean, scale } => (x - mean[col]) / scale[col],
            Self::MinMax { min, scale } => x * scale[col] + min[col],
            Self::Identity { .. } => x,
        }
    }

    /// Inverse transform of one value in column `col`.
    fn inverse(&self, col: usize, x: f64) -> f64 {
        match self {
            Self::Standard { mean, scale } => x * scale[col] + mean[col],
            Self::MinMax { min, scale } => (x - min[col]) / scale[col],
            Self::Identity { .. } => x,
        }
    }

    /// Inverse transform of whole rows.
    pub fn inverse_transform_rows(&self, rows: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_columns(rows.ncols())?;
        let mut out = rows.to_owned();
        for (col, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            column.mapv_inplace(|x| self.inverse(col, x));
        }
        Ok(out)
    }

    fn check_columns(&self, ncols: usize) -> Result<()> {
        if ncols != self.n_features() {
            return Err(PipelineError::shape_mismatch(
                "scaler columns",
                self.n_features(),
                ncols,
            ));
        }
        Ok(())
    }
}

impl RowScaler for FittedScaler {
    fn n_features(&self) -> usize {
        FittedScaler::n_features(self)
    }

    fn transform(&self, rows: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_columns(rows.ncols())?;
        let mut out = rows.to_owned();
        for (col, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            column.mapv_inplace(|x| self.forward(col, x));
        }
        Ok(out)
    }
}

impl ScalarScaler for FittedScaler {
    fn n_features(&self) -> usize {
        FittedScaler::n_features(self)
    }

    fn inverse_transform(&self, value: f64) -> Result<f64> {
        let row = Array1::from_elem(1, value).insert_axis(Axis(0));
        let restored = self.inverse_transform_rows(row.view())?;
        Ok(restored[[0, 0]])
    }
}
