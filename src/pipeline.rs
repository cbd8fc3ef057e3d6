//! Voltage-to-power inference pipeline.
//!
//! Provides the main InferencePipeline struct: load the sequence model and
//! its two fitted scalers, then turn one voltage reading into one power
//! estimate in Watts.

use crate::error::{PipelineError, Result};
use crate::features::{build_window, to_batch, NUM_FEATURES, WINDOW_SIZE};
use crate::model::{OnnxModel, SequenceModel};
use crate::scaler::{FittedScaler, RowScaler, ScalarScaler};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default file name of the exported sequence model.
pub const DEFAULT_MODEL_FILE: &str = "model_turbine.onnx";

/// Default file name of the fitted input scaler.
pub const DEFAULT_INPUT_SCALER_FILE: &str = "scaler_X.json";

/// Default file name of the fitted output scaler.
pub const DEFAULT_OUTPUT_SCALER_FILE: &str = "scaler_y.json";

/// Configuration for loading the pipeline artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Path to the ONNX sequence model
    pub model_path: PathBuf,

    /// Path to the fitted input scaler (2 columns)
    pub input_scaler_path: PathBuf,

    /// Path to the fitted output scaler (1 column)
    pub output_scaler_path: PathBuf,

    /// Enable graph optimization
    pub optimize_graph: bool,

    /// Intra-op threads for the ONNX session
    pub intra_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::in_dir(".")
    }
}

impl PipelineConfig {
    /// Config pointing at the default artifact file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model_path: dir.join(DEFAULT_MODEL_FILE),
            input_scaler_path: dir.join(DEFAULT_INPUT_SCALER_FILE),
            output_scaler_path: dir.join(DEFAULT_OUTPUT_SCALER_FILE),
            optimize_graph: true,
            intra_threads: 1, // Single-threaded for determinism
        }
    }

    /// Read a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| PipelineError::artifact_load(path, e))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PipelineError::artifact_load(path, e))
    }

    /// All artifact paths, in load order.
    pub fn artifact_paths(&self) -> [&Path; 3] {
        [
            self.model_path.as_path(),
            self.input_scaler_path.as_path(),
            self.output_scaler_path.as_path(),
        ]
    }
}

/// Health classification shown next to a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerStatus {
    /// Positive output.
    Normal,
    /// Zero or negative output.
    LowOrNegative,
}

/// Result of a single power prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    /// Voltage the prediction was made for
    pub voltage: f64,

    /// Predicted power output in Watts (not clamped)
    pub power_watts: f64,
}

impl PredictionResult {
    /// `Normal` when the predicted power is strictly positive.
    pub fn status(&self) -> PowerStatus {
        if self.power_watts > 0.0 {
            PowerStatus::Normal
        } else {
            PowerStatus::LowOrNegative
        }
    }

    /// Predicted power divided by 100, reported as a percentage reference.
    pub fn stability_reference(&self) -> f64 {
        self.power_watts / 100.0
    }
}

/// Voltage-to-power inference pipeline.
///
/// Holds the three artifacts read-only; `predict` takes `&self` and keeps no
/// state between calls.
pub struct InferencePipeline {
    model: Box<dyn SequenceModel>,
    input_scaler: Box<dyn RowScaler>,
    output_scaler: Box<dyn ScalarScaler>,
}

impl std::fmt::Debug for InferencePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferencePipeline")
            .field("window_size", &self.model.window_size())
            .field("num_features", &self.model.num_features())
            .field("input_scaler_features", &self.input_scaler.n_features())
            .field("output_scaler_features", &self.output_scaler.n_features())
            .finish()
    }
}

impl InferencePipeline {
    /// Assemble a pipeline from already constructed artifacts.
    ///
    /// Fails with `ShapeMismatch` if the model's window layout differs from
    /// `WINDOW_SIZE x NUM_FEATURES`, and with `ArtifactLoad` if either scaler
    /// was fit on the wrong number of columns.
    pub fn new(
        model: Box<dyn SequenceModel>,
        input_scaler: Box<dyn RowScaler>,
        output_scaler: Box<dyn ScalarScaler>,
    ) -> Result<Self> {
        let declared = (model.window_size(), model.num_features());
        if declared != (WINDOW_SIZE, NUM_FEATURES) {
            return Err(PipelineError::shape_mismatch(
                "model window",
                (WINDOW_SIZE, NUM_FEATURES),
                declared,
            ));
        }

        if input_scaler.n_features() != NUM_FEATURES {
            return Err(PipelineError::artifact_load(
                "input scaler",
                format!(
                    "fit on {} columns, expected {}",
                    input_scaler.n_features(),
                    NUM_FEATURES
                ),
            ));
        }

        if output_scaler.n_features() != 1 {
            return Err(PipelineError::artifact_load(
                "output scaler",
                format!("fit on {} columns, expected 1", output_scaler.n_features()),
            ));
        }

        Ok(Self {
            model,
            input_scaler,
            output_scaler,
        })
    }

    /// Load the ONNX model and both scalers from disk.
    ///
    /// # Example
    /// ```no_run
    /// use turbine_inference::{InferencePipeline, PipelineConfig};
    ///
    /// let pipeline = InferencePipeline::load(&PipelineConfig::in_dir("artifacts")).unwrap();
    /// let watts = pipeline.predict_watts(10.0).unwrap();
    /// ```
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        let model = OnnxModel::load(
            &config.model_path,
            config.optimize_graph,
            config.intra_threads,
        )?;
        let input_scaler = load_scaler(&config.input_scaler_path, NUM_FEATURES)?;
        let output_scaler = load_scaler(&config.output_scaler_path, 1)?;

        let pipeline = Self::new(
            Box::new(model),
            Box::new(input_scaler),
            Box::new(output_scaler),
        )?;

        info!(
            model = %config.model_path.display(),
            input_scaler = %config.input_scaler_path.display(),
            output_scaler = %config.output_scaler_path.display(),
            "inference pipeline ready"
        );

        Ok(pipeline)
    }

    /// Predict power output for one voltage reading.
    ///
    /// Fails with `InvalidInput` for NaN or infinite voltage. Any finite
    /// value is accepted.
    pub fn predict(&self, voltage: f64) -> Result<PredictionResult> {
        if !voltage.is_finite() {
            return Err(PipelineError::InvalidInput { voltage });
        }

        let window = build_window(voltage);
        let normalized = self.input_scaler.transform(window.view())?;
        let batch = to_batch(&normalized)?;

        let predicted = self.model.forecast(batch.view())?;
        let power_watts = self.output_scaler.inverse_transform(f64::from(predicted))?;

        debug!(voltage, predicted, power_watts, "prediction");

        Ok(PredictionResult {
            voltage,
            power_watts,
        })
    }

    /// Predict power output in Watts.
    pub fn predict_watts(&self, voltage: f64) -> Result<f64> {
        self.predict(voltage).map(|result| result.power_watts)
    }
}

/// Load a scaler file and check its column count.
fn load_scaler(path: &Path, expected_features: usize) -> Result<FittedScaler> {
    let scaler = FittedScaler::from_json_file(path)?;
    if scaler.n_features() != expected_features {
        return Err(PipelineError::artifact_load(
            path,
            format!(
                "fit on {} columns, expected {}",
                scaler.n_features(),
                expected_features
            ),
        ));
    }
    Ok(scaler)
}
