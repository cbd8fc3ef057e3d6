//! Sequence model interface and the ONNX Runtime backed implementation.

use crate::error::{PipelineError, Result};
use crate::features::{NUM_FEATURES, WINDOW_SIZE};
use ndarray::ArrayView3;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// A forecasting model over fixed-size input windows.
///
/// Input is one batch element of shape `(1, window_size(), num_features())`;
/// output is one value in normalised space.
pub trait SequenceModel: Send + Sync {
    /// Declared number of time steps per window.
    fn window_size(&self) -> usize;

    /// Declared number of channels per time step.
    fn num_features(&self) -> usize;

    /// Run the model on one window.
    fn forecast(&self, batch: ArrayView3<f32>) -> Result<f32>;
}

/// Sequence model executed through ONNX Runtime.
///
/// The session is behind a mutex because `Session::run` needs exclusive
/// access; callers only ever see `&self`.
pub struct OnnxModel {
    session: Mutex<Session>,
    input_shape: Vec<i64>,
    output_shape: Vec<i64>,
    output_name: String,
}

impl OnnxModel {
    /// Load an ONNX model and check its declared shapes.
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX file
    /// * `optimize_graph` - Use the highest graph optimisation level
    /// * `intra_threads` - Threads used inside a single operator
    ///
    /// # Example
    /// ```no_run
    /// use turbine_inference::OnnxModel;
    /// use std::path::Path;
    ///
    /// let model = OnnxModel::load(Path::new("model_turbine.onnx"), true, 1).unwrap();
    /// ```
    pub fn load(model_path: &Path, optimize_graph: bool, intra_threads: usize) -> Result<Self> {
        if !model_path.is_file() {
            return Err(PipelineError::artifact_load(model_path, "file not found"));
        }

        let session = Session::builder()
            .map_err(|e| PipelineError::artifact_load(model_path, e))?
            .with_optimization_level(if optimize_graph {
                GraphOptimizationLevel::Level3
            } else {
                GraphOptimizationLevel::Level1
            })
            .map_err(|e| PipelineError::artifact_load(model_path, e))?
            .with_intra_threads(intra_threads)
            .map_err(|e| PipelineError::artifact_load(model_path, e))?
            .commit_from_file(model_path)
            .map_err(|e| PipelineError::artifact_load(model_path, e))?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| PipelineError::artifact_load(model_path, "model declares no inputs"))?;
        let output = session
            .outputs
            .first()
            .ok_or_else(|| PipelineError::artifact_load(model_path, "model declares no outputs"))?;

        let input_shape: Vec<i64> = input
            .input_type
            .tensor_shape()
            .map(|shape| shape.iter().copied().collect())
            .ok_or_else(|| PipelineError::artifact_load(model_path, "model input is not a tensor"))?;
        let output_shape: Vec<i64> = output
            .output_type
            .tensor_shape()
            .map(|shape| shape.iter().copied().collect())
            .ok_or_else(|| PipelineError::artifact_load(model_path, "model output is not a tensor"))?;
        let output_name = output.name.clone();

        check_input_shape(&input_shape)?;
        check_output_shape(&output_shape)?;

        info!(
            path = %model_path.display(),
            input = ?input_shape,
            output = ?output_shape,
            "loaded ONNX sequence model"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_shape,
            output_shape,
            output_name,
        })
    }

    /// Input shape as declared by the graph (`-1` marks a dynamic dimension).
    pub fn input_shape(&self) -> &[i64] {
        &self.input_shape
    }

    /// Output shape as declared by the graph.
    pub fn output_shape(&self) -> &[i64] {
        &self.output_shape
    }
}

impl SequenceModel for OnnxModel {
    fn window_size(&self) -> usize {
        declared_dim(self.input_shape[1], WINDOW_SIZE)
    }

    fn num_features(&self) -> usize {
        declared_dim(self.input_shape[2], NUM_FEATURES)
    }

    fn forecast(&self, batch: ArrayView3<f32>) -> Result<f32> {
        let input_tensor =
            Value::from_array(batch.to_owned()).map_err(PipelineError::inference)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PipelineError::inference("session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(PipelineError::inference)?;

        let output = outputs.get(&self.output_name).ok_or_else(|| {
            PipelineError::inference(format!("missing model output {}", self.output_name))
        })?;
        let (_, values) = output
            .try_extract_tensor::<f32>()
            .map_err(PipelineError::inference)?;

        match values {
            [value] => Ok(*value),
            other => Err(PipelineError::shape_mismatch("model output", [1, 1], other.len())),
        }
    }
}

/// A dynamic dimension (`-1`) resolves to the fixed layout constant.
fn declared_dim(dim: i64, fixed: usize) -> usize {
    if dim < 0 {
        fixed
    } else {
        dim as usize
    }
}

fn dim_matches(dim: i64, fixed: usize) -> bool {
    dim < 0 || dim as usize == fixed
}

/// Input must be `(batch, WINDOW_SIZE, NUM_FEATURES)`; batch may be dynamic or 1.
pub(crate) fn check_input_shape(shape: &[i64]) -> Result<()> {
    let ok = shape.len() == 3
        && dim_matches(shape[0], 1)
        && dim_matches(shape[1], WINDOW_SIZE)
        && dim_matches(shape[2], NUM_FEATURES);
    if !ok {
        return Err(PipelineError::shape_mismatch(
            "model input",
            [1, WINDOW_SIZE as i64, NUM_FEATURES as i64],
            shape,
        ));
    }
    Ok(())
}

/// Output must be `(batch, 1)`.
pub(crate) fn check_output_shape(shape: &[i64]) -> Result<()> {
    let ok = shape.len() == 2 && dim_matches(shape[0], 1) && dim_matches(shape[1], 1);
    if !ok {
        return Err(PipelineError::shape_mismatch("model output", [1, 1], shape));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_shape_accepts_fixed_and_dynamic() {
        assert!(check_input_shape(&[1, 30, 2]).is_ok());
        assert!(check_input_shape(&[-1, 30, 2]).is_ok());
        assert!(check_input_shape(&[-1, -1, 2]).is_ok());
    }

    #[test]
    fn test_input_shape_rejects_wrong_layout() {
        assert!(check_input_shape(&[1, 24, 2]).unwrap_err().is_shape_mismatch());
        assert!(check_input_shape(&[1, 30, 3]).unwrap_err().is_shape_mismatch());
        assert!(check_input_shape(&[30, 2]).unwrap_err().is_shape_mismatch());
        assert!(check_input_shape(&[4, 30, 2]).unwrap_err().is_shape_mismatch());
    }

    #[test]
    fn test_output_shape() {
        assert!(check_output_shape(&[-1, 1]).is_ok());
        assert!(check_output_shape(&[1, 1]).is_ok());
        assert!(check_output_shape(&[1, 5]).unwrap_err().is_shape_mismatch());
        assert!(check_output_shape(&[1]).unwrap_err().is_shape_mismatch());
    }

    #[test]
    fn test_declared_dim() {
        assert_eq!(declared_dim(-1, WINDOW_SIZE), WINDOW_SIZE);
        assert_eq!(declared_dim(30, WINDOW_SIZE), 30);
    }

    #[test]
    fn test_load_missing_model() {
        let err = OnnxModel::load(Path::new("/nonexistent/model_turbine.onnx"), true, 1)
            .err()
            .unwrap();
        assert!(err.is_artifact_load());
    }
}
