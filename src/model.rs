// -- imports
use serde::Deserialize;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::annotation::{Annotation, InstancePolicy, convert_detections};
use crate::config::ExecutorConfig;
use crate::error::{AppError, Result};
use crate::predictor::{Predictor, build_predictor};

// -- artifact resolution

const MODEL_CONFIG_FILE: &str = "config.yaml";

/// Extensions the weight-file resolver recognizes
const WEIGHT_EXTENSIONS: [&str; 4] = ["pth", "pt", "pkl", "onnx"];

/// Locate the required `config.yaml` inside the model-artifacts directory.
///
/// # Errors
///
/// Returns `AppError::ConfigNotFound` naming the file and directory if absent.
pub fn find_config_file(models_dir: &Path) -> Result<PathBuf> {
    let config_file = models_dir.join(MODEL_CONFIG_FILE);
    if config_file.is_file() {
        Ok(config_file)
    } else {
        Err(AppError::ConfigNotFound {
            file: MODEL_CONFIG_FILE.to_string(),
            models_dir: models_dir.to_path_buf(),
        })
    }
}

/// Resolve the weight file: the explicit `param.model_params_path` when set,
/// otherwise the newest weight-like file in the models directory.
pub fn find_weight_file(config: &ExecutorConfig) -> Result<PathBuf> {
    let models_dir = &config.input.models_dir;

    if let Some(rel) = &config.param.model_params_path {
        let path = if rel.is_absolute() {
            rel.clone()
        } else {
            models_dir.join(rel)
        };
        return if path.is_file() {
            Ok(path)
        } else {
            Err(AppError::WeightNotFound(path))
        };
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(models_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_weight_file(p))
        .collect();

    // Newest first
    candidates.sort_by_key(|p| {
        std::fs::metadata(p)
            .and_then(|m| m.modified())
            .unwrap_or(std::time::UNIX_EPOCH)
    });

    candidates
        .pop()
        .ok_or_else(|| AppError::WeightNotFound(models_dir.clone()))
}

fn is_weight_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        WEIGHT_EXTENSIONS.contains(&ext.as_str())
    })
}

// -- model configuration (config.yaml)

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    #[serde(rename = "MODEL")]
    pub model: ModelNode,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelNode {
    #[serde(rename = "WEIGHTS")]
    pub weights: PathBuf,

    #[serde(rename = "RETINANET")]
    pub retinanet: ScoreThreshNode,

    #[serde(rename = "ROI_HEADS")]
    pub roi_heads: ScoreThreshNode,

    #[serde(rename = "PANOPTIC_FPN")]
    pub panoptic_fpn: PanopticFpnNode,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoreThreshNode {
    #[serde(rename = "SCORE_THRESH_TEST")]
    pub score_thresh_test: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PanopticFpnNode {
    #[serde(rename = "COMBINE")]
    pub combine: CombineNode,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CombineNode {
    #[serde(rename = "INSTANCES_CONFIDENCE_THRESH")]
    pub instances_confidence_thresh: f32,
}

impl ModelConfig {
    /// Parse the model configuration from a `config.yaml` file. Unknown keys
    /// are ignored; the required nested keys get defaults when absent.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Override the weight path recorded in the config file.
    pub fn set_weights(&mut self, weights: PathBuf) {
        self.model.weights = weights;
    }

    /// Set the confidence threshold on all three detection head types to the
    /// single user-supplied value.
    pub fn set_score_thresholds(&mut self, conf: f32) {
        self.model.retinanet.score_thresh_test = conf;
        self.model.roi_heads.score_thresh_test = conf;
        self.model.panoptic_fpn.combine.instances_confidence_thresh = conf;
    }

    /// Freeze the configuration. The frozen form exposes getters only; no
    /// further mutation is possible before the predictor is built.
    pub fn freeze(self) -> FrozenModelConfig {
        FrozenModelConfig { inner: self }
    }
}

/// An immutable model configuration, ready for predictor construction.
#[derive(Debug, Clone)]
pub struct FrozenModelConfig {
    inner: ModelConfig,
}

impl FrozenModelConfig {
    pub fn weights(&self) -> &Path {
        &self.inner.model.weights
    }

    pub fn retinanet_score_thresh(&self) -> f32 {
        self.inner.model.retinanet.score_thresh_test
    }

    pub fn roi_heads_score_thresh(&self) -> f32 {
        self.inner.model.roi_heads.score_thresh_test
    }

    pub fn panoptic_instances_thresh(&self) -> f32 {
        self.inner.model.panoptic_fpn.combine.instances_confidence_thresh
    }
}

// -- detector

/// The loaded, ready-to-run inference engine: frozen model configuration,
/// class names and the instance policy, wrapping a predictor backend.
pub struct Detector {
    model_config: FrozenModelConfig,
    class_names: Vec<String>,
    policy: InstancePolicy,
    predictor: Box<dyn Predictor>,
}

impl Detector {
    /// Resolve artifacts, apply thresholds, freeze the configuration and
    /// construct the predictor backend named in the executor config.
    ///
    /// Loads model weights into memory; the resource is held for the process
    /// lifetime and reclaimed on exit.
    pub fn load(config: &ExecutorConfig) -> Result<Self> {
        let config_file = find_config_file(&config.input.models_dir)?;
        let weight_file = find_weight_file(config)?;
        tracing::info!("Model config: {:?}", config_file);
        tracing::info!("Model weights: {:?}", weight_file);

        let mut model_config = ModelConfig::from_yaml(&config_file)?;
        model_config.set_weights(weight_file);
        model_config.set_score_thresholds(config.param.conf_threshold);
        let frozen = model_config.freeze();

        let predictor = build_predictor(&config.param.backend, &frozen)?;
        Ok(Self::with_predictor(config, frozen, predictor))
    }

    /// Build a detector around an already-constructed predictor backend.
    pub fn with_predictor(
        config: &ExecutorConfig,
        model_config: FrozenModelConfig,
        predictor: Box<dyn Predictor>,
    ) -> Self {
        Self {
            model_config,
            class_names: config.param.class_names.clone(),
            policy: config.param.instance_policy,
            predictor,
        }
    }

    pub fn model_config(&self) -> &FrozenModelConfig {
        &self.model_config
    }

    /// Run the predictor on one decoded image and convert its raw instances
    /// into standardized annotations under the configured instance policy.
    pub fn infer(&self, image: &DynamicImage) -> Result<Vec<Annotation>> {
        let detections = self.predictor.predict(image)?;
        Ok(convert_detections(
            &detections,
            &self.class_names,
            self.policy,
        ))
    }
}

// -- tests
