//! Gas turbine power forecasting from a single voltage reading.
//!
//! This crate turns one voltage measurement into a predicted electrical power
//! output (Watts) using an LSTM exported to ONNX and two fitted scalers.
//! Artifacts are loaded once per process and shared read-only.

pub mod cache;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod scaler;

pub use cache::{global_pipeline, predict, ArtifactCache};
pub use error::{PipelineError, Result};
pub use features::{build_window, NUM_FEATURES, WINDOW_SIZE};
pub use model::{OnnxModel, SequenceModel};
pub use pipeline::{InferencePipeline, PipelineConfig, PowerStatus, PredictionResult};
pub use scaler::{FittedScaler, RowScaler, ScalarScaler};
