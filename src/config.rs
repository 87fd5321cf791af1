// -- imports
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::annotation::{InstancePolicy, deserialize_instance_policy};
use crate::error::{AppError, Result};

// -- config sections

/// Orchestrator-provided inputs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Directory holding the trained model artifacts (config.yaml + weights)
    pub models_dir: PathBuf,

    /// Index file listing the candidate image paths, one per line
    pub candidate_index: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("/in/models"),
            candidate_index: PathBuf::from("/in/candidate-index.tsv"),
        }
    }
}

/// User-tunable parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParamConfig {
    /// Class names, indexed by the model's class ids
    pub class_names: Vec<String>,

    /// Confidence threshold applied to every detection head
    pub conf_threshold: f32,

    /// Explicit weight file, relative to models_dir (auto-resolved if unset)
    pub model_params_path: Option<PathBuf>,

    /// How many predicted instances to keep per image
    #[serde(deserialize_with = "deserialize_instance_policy")]
    pub instance_policy: InstancePolicy,

    /// Predictor backend to construct
    pub backend: String,
}

impl Default for ParamConfig {
    fn default() -> Self {
        Self {
            class_names: Vec::new(),
            conf_threshold: 0.25,
            model_params_path: None,
            instance_policy: InstancePolicy::default(),
            backend: "null".to_string(),
        }
    }
}

/// Which stages this orchestrated run executes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub run_mining: bool,
    pub run_infer: bool,
}

/// Orchestrator-facing output sinks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Monitor file the orchestrator polls for progress
    pub monitor_file: PathBuf,

    /// Final inference result document
    pub infer_result_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            monitor_file: PathBuf::from("/out/monitor.txt"),
            infer_result_file: PathBuf::from("/out/infer-result.json"),
        }
    }
}

// -- merged config

/// Merged executor configuration. Parsed once at startup, immutable after.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub input: InputConfig,
    pub param: ParamConfig,
    pub task: TaskConfig,
    pub output: OutputConfig,
}

/// Position of the inference stage among the run's logical sub-stages,
/// used to scale per-stage progress into one overall percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSlot {
    pub index: usize,
    pub total: usize,
}

impl TaskSlot {
    /// Slot of the inference stage: task 1-of-2 when a mining stage also
    /// runs, task 0-of-1 otherwise. Purely computed from the two flags.
    pub fn for_infer(run_mining: bool, run_infer: bool) -> Self {
        if run_mining && run_infer {
            Self { index: 1, total: 2 }
        } else {
            Self { index: 0, total: 1 }
        }
    }
}

impl ExecutorConfig {
    /// Parse the executor config file with explicit base dir for resolving
    /// relative paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if:
    /// - The path is not a valid toml file
    /// - File read fails
    /// - TOML parsing fails
    /// - A required parameter is missing or out of range
    pub fn from_toml(toml_path: &Path, base_dir: &Path) -> Result<Self> {
        if !toml_path.is_file() || toml_path.extension().is_none_or(|ext| ext != "toml") {
            return Err(AppError::Config(format!(
                "executor config path is not a valid .toml file: {:?}",
                toml_path
            )));
        }

        let content = std::fs::read_to_string(toml_path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.resolve_paths(base_dir);
        config.validate()?;

        Ok(config)
    }

    /// Parse the config file named by the `EXECUTOR_CONFIG` environment
    /// variable (default `/in/executor-config.toml`). The executor takes no
    /// CLI arguments; this is its only process boundary.
    pub fn from_env() -> Result<Self> {
        let toml_path = std::env::var("EXECUTOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/in/executor-config.toml"));
        let base_dir = toml_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::from_toml(&toml_path, &base_dir)
    }

    pub fn infer_task_slot(&self) -> TaskSlot {
        TaskSlot::for_infer(self.task.run_mining, self.task.run_infer)
    }

    /// Resolve relative paths against the base dir
    fn resolve_paths(&mut self, base_dir: &Path) {
        for path in [
            &mut self.input.models_dir,
            &mut self.input.candidate_index,
            &mut self.output.monitor_file,
            &mut self.output.infer_result_file,
        ] {
            if !path.is_absolute() {
                *path = base_dir.join(path.as_path());
            }
        }
    }

    /// Fail fast on parameters the pipeline cannot run without.
    fn validate(&self) -> Result<()> {
        if self.param.class_names.is_empty() {
            return Err(AppError::Config(
                "param.class_names must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.param.conf_threshold) {
            return Err(AppError::Config(format!(
                "param.conf_threshold must be within [0, 1], got {}",
                self.param.conf_threshold
            )));
        }
        Ok(())
    }
}

// -- tests
