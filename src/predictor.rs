// -- imports
use image::DynamicImage;

use crate::annotation::Detection;
use crate::error::{AppError, Result};
use crate::model::FrozenModelConfig;

/// Seam to the external detection model library.
///
/// Implementations receive the decoded image as the `image` crate delivers
/// it (RGB). Backends whose networks expect BGR input reorder channels
/// themselves.
pub trait Predictor {
    /// Predict instances for one image. Zero instances is a valid outcome,
    /// not an error.
    fn predict(&self, image: &DynamicImage) -> Result<Vec<Detection>>;
}

impl std::fmt::Debug for dyn Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Predictor")
    }
}

/// Build the predictor backend named in the executor config.
pub fn build_predictor(
    backend: &str,
    model_config: &FrozenModelConfig,
) -> Result<Box<dyn Predictor>> {
    match backend {
        "null" => Ok(Box::new(NullPredictor::load(model_config)?)),
        other => Err(AppError::ModelLoad(format!(
            "unknown predictor backend {:?}, expected one of: null",
            other
        ))),
    }
}

/// Pipeline-validation backend: loads the weight file into memory like a
/// real backend would, then reports zero detections for every image.
pub struct NullPredictor {
    weights: Vec<u8>,
}

impl NullPredictor {
    pub fn load(model_config: &FrozenModelConfig) -> Result<Self> {
        let path = model_config.weights();
        let weights = std::fs::read(path)
            .map_err(|e| AppError::ModelLoad(format!("cannot read weights {:?}: {}", path, e)))?;
        tracing::debug!("Loaded {} weight bytes from {:?}", weights.len(), path);
        Ok(Self { weights })
    }

    pub fn weight_len(&self) -> usize {
        self.weights.len()
    }
}

impl Predictor for NullPredictor {
    fn predict(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }
}

/// Backend returning a fixed set of detections for every image. Used by the
/// test suite and by embedders that precompute predictions.
pub struct ScriptedPredictor {
    detections: Vec<Detection>,
}

impl ScriptedPredictor {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}

impl Predictor for ScriptedPredictor {
    fn predict(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }
}

// -- tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_null_predictor_loads_weights_and_detects_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let weight_path = temp_dir.path().join("model_final.pth");
        fs::write(&weight_path, b"0123456789").unwrap();

        let mut model_config = ModelConfig::default();
        model_config.set_weights(weight_path);
        let predictor = NullPredictor::load(&model_config.freeze()).unwrap();

        assert_eq!(predictor.weight_len(), 10);
        let image = DynamicImage::new_rgb8(4, 4);
        assert!(predictor.predict(&image).unwrap().is_empty());
    }

    #[test]
    fn test_null_predictor_missing_weights() {
        let mut model_config = ModelConfig::default();
        model_config.set_weights("/nonexistent/model_final.pth".into());
        assert!(NullPredictor::load(&model_config.freeze()).is_err());
    }

    #[test]
    fn test_build_predictor_unknown_backend() {
        let model_config = ModelConfig::default().freeze();
        let err = build_predictor("tensorrt", &model_config).unwrap_err();
        assert!(err.to_string().contains("tensorrt"));
    }
}
