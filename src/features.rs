//! Input window construction for the sequence model.
//!
//! The deployed LSTM was trained on windows of 30 time steps with two
//! channels. At serving time only the voltage channel is observed: it is
//! broadcast over every time step and the second channel is left at zero.
//!
//! **Critical for correctness**: the layout here must match what the model
//! saw during training. The zero-filled second channel is reproduced as-is.

use crate::error::{PipelineError, Result};
use ndarray::{Array2, Array3, Axis};

/// Number of time steps in one model input window.
pub const WINDOW_SIZE: usize = 30;

/// Number of channels per time step.
pub const NUM_FEATURES: usize = 2;

/// Column holding the voltage reading.
pub const VOLTAGE_COLUMN: usize = 0;

/// Column that the model expects but no sensor feeds; always zero.
pub const PLACEHOLDER_COLUMN: usize = 1;

/// Build the raw (unscaled) input window for one voltage reading.
///
/// Returns a `WINDOW_SIZE x NUM_FEATURES` matrix where every row is
/// `[voltage, 0.0]`. No validation is done on `voltage`.
///
/// # Example
/// ```
/// use turbine_inference::features::{build_window, NUM_FEATURES, WINDOW_SIZE};
///
/// let window = build_window(12.5);
/// assert_eq!(window.dim(), (WINDOW_SIZE, NUM_FEATURES));
/// assert_eq!(window[[0, 0]], 12.5);
/// assert_eq!(window[[29, 1]], 0.0);
/// ```
pub fn build_window(voltage: f64) -> Array2<f64> {
    let mut window = Array2::<f64>::zeros((WINDOW_SIZE, NUM_FEATURES));
    window.column_mut(VOLTAGE_COLUMN).fill(voltage);
    window
}

/// Reshape a normalised window into a single-element batch of shape
/// `(1, WINDOW_SIZE, NUM_FEATURES)` in the model's `f32` precision.
pub fn to_batch(normalized: &Array2<f64>) -> Result<Array3<f32>> {
    if normalized.dim() != (WINDOW_SIZE, NUM_FEATURES) {
        return Err(PipelineError::shape_mismatch(
            "normalized window",
            (WINDOW_SIZE, NUM_FEATURES),
            normalized.dim(),
        ));
    }

    Ok(normalized.mapv(|v| v as f32).insert_axis(Axis(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_window_shape() {
        for voltage in [0.0, -42.0, 10.0, 1.0e12, f64::MIN_POSITIVE] {
            let window = build_window(voltage);
            assert_eq!(window.nrows(), WINDOW_SIZE);
            assert_eq!(window.ncols(), NUM_FEATURES);
        }
    }

    #[test]
    fn test_build_window_broadcasts_voltage() {
        let window = build_window(57.3);
        assert!(window.column(VOLTAGE_COLUMN).iter().all(|&v| v == 57.3));
    }

    #[test]
    fn test_build_window_placeholder_is_zero() {
        let window = build_window(99.9);
        assert!(window.column(PLACEHOLDER_COLUMN).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_build_window_is_fresh() {
        let mut first = build_window(1.0);
        first.fill(7.0);
        let second = build_window(1.0);
        assert_eq!(second[[0, PLACEHOLDER_COLUMN]], 0.0);
    }

    #[test]
    fn test_to_batch_shape() {
        let batch = to_batch(&build_window(3.5)).unwrap();
        assert_eq!(batch.dim(), (1, WINDOW_SIZE, NUM_FEATURES));
        assert_eq!(batch[[0, 10, 0]], 3.5_f32);
        assert_eq!(batch[[0, 10, 1]], 0.0_f32);
    }

    #[test]
    fn test_to_batch_rejects_wrong_shape() {
        let err = to_batch(&Array2::zeros((24, 2))).unwrap_err();
        assert!(err.is_shape_mismatch());
    }
}
