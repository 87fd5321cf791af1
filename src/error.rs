use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the executor
#[derive(Error, Debug)]
pub enum AppError {
    #[error("TOML config file error: {0}")]
    TomlConfig(#[from] toml::de::Error),

    #[error("model config file error: {0}")]
    YamlConfig(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no config file {file} found in {models_dir}")]
    ConfigNotFound { file: String, models_dir: PathBuf },

    #[error("no weight file found in {0}")]
    WeightNotFound(PathBuf),

    #[error("model loading failed: {0}")]
    ModelLoad(String),

    #[error("image loading failed for {path}: {reason}")]
    ImageLoad { path: PathBuf, reason: String },

    #[error("inference error: {0}")]
    Inference(String),

    #[error("result writing failed: {0}")]
    ResultWrite(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type with default AppError
pub type Result<T, E = AppError> = std::result::Result<T, E>;
