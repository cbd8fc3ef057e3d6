//! Load-once cache for the pipeline artifacts.
//!
//! Loading the ONNX session and the scalers happens once per process. The
//! outcome, success or failure, is kept and handed to every later caller.

use crate::error::Result;
use crate::pipeline::{InferencePipeline, PipelineConfig};
use std::sync::OnceLock;
use tracing::warn;

/// Lazily loaded, read-only pipeline.
///
/// Concurrent first callers block until the single load finishes and then
/// all observe the same pipeline or the same error.
#[derive(Debug, Default)]
pub struct ArtifactCache {
    cell: OnceLock<Result<InferencePipeline>>,
}

impl ArtifactCache {
    /// Create an empty cache.
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Return the cached pipeline, loading it from `config` on first use.
    ///
    /// `config` is only consulted by the call that performs the load.
    pub fn get_or_load(&self, config: &PipelineConfig) -> Result<&InferencePipeline> {
        self.get_or_try_load(|| InferencePipeline::load(config))
    }

    /// Return the cached pipeline, running `load` on first use.
    pub fn get_or_try_load<F>(&self, load: F) -> Result<&InferencePipeline>
    where
        F: FnOnce() -> Result<InferencePipeline>,
    {
        self.cell
            .get_or_init(|| {
                let loaded = load();
                if let Err(e) = &loaded {
                    warn!(error = %e, "artifact load failed");
                }
                loaded
            })
            .as_ref()
            .map_err(|e| e.clone())
    }

    /// True once a load has been attempted.
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

static ARTIFACTS: ArtifactCache = ArtifactCache::new();

/// Process-wide pipeline, loaded from `config` on first access.
pub fn global_pipeline(config: &PipelineConfig) -> Result<&'static InferencePipeline> {
    ARTIFACTS.get_or_load(config)
}

/// Predict power in Watts using the process-wide pipeline and the default
/// artifact locations.
pub fn predict(voltage: f64) -> Result<f64> {
    global_pipeline(&PipelineConfig::default())?.predict_watts(voltage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::features::{NUM_FEATURES, WINDOW_SIZE};
    use crate::model::SequenceModel;
    use crate::scaler::FittedScaler;
    use ndarray::ArrayView3;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ConstantModel(f32);

    impl SequenceModel for ConstantModel {
        fn window_size(&self) -> usize {
            WINDOW_SIZE
        }
        fn num_features(&self) -> usize {
            NUM_FEATURES
        }
        fn forecast(&self, _batch: ArrayView3<f32>) -> Result<f32> {
            Ok(self.0)
        }
    }

    fn constant_pipeline(value: f32) -> Result<InferencePipeline> {
        InferencePipeline::new(
            Box::new(ConstantModel(value)),
            Box::new(FittedScaler::Identity { n_features: 2 }),
            Box::new(FittedScaler::Identity { n_features: 1 }),
        )
    }

    #[test]
    fn test_loads_once() {
        let cache = ArtifactCache::new();
        let loads = AtomicUsize::new(0);

        assert!(!cache.is_loaded());
        for _ in 0..5 {
            let pipeline = cache
                .get_or_try_load(|| {
                    loads.fetch_add(1, Ordering::SeqCst);
                    constant_pipeline(0.5)
                })
                .unwrap();
            assert_eq!(pipeline.predict_watts(1.0).unwrap(), 0.5);
        }
        assert!(cache.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_access() {
        let cache = ArtifactCache::new();
        let loads = AtomicUsize::new(0);

        let addresses: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let pipeline = cache
                            .get_or_try_load(|| {
                                loads.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(std::time::Duration::from_millis(20));
                                constant_pipeline(0.25)
                            })
                            .unwrap();
                        pipeline as *const InferencePipeline as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(addresses.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_failure_is_replayed() {
        let cache = ArtifactCache::new();

        let first = cache
            .get_or_try_load(|| Err(PipelineError::artifact_load("model_turbine.onnx", "missing")))
            .unwrap_err();
        assert!(first.is_artifact_load());

        let second = cache
            .get_or_try_load(|| panic!("loader must not run twice"))
            .unwrap_err();
        assert_eq!(first, second);
    }

    #[test]
    fn test_get_or_load_missing_artifacts() {
        let cache = ArtifactCache::new();
        let config = PipelineConfig::in_dir("/nonexistent/artifacts");
        let err = cache.get_or_load(&config).unwrap_err();
        assert!(err.is_artifact_load());
    }
}
