mod annotation;
mod config;
mod dataset;
mod error;
mod infer;
mod logging;
mod model;
mod monitor;
mod predictor;
mod progress_bar;
mod writer;

pub use annotation::{Annotation, BBox, Detection, InstancePolicy, convert_detections};
pub use config::{ExecutorConfig, TaskSlot};
pub use dataset::{CandidateIndex, decode_image};
pub use error::{AppError, Result};
pub use logging::init_logger;
pub use model::{Detector, FrozenModelConfig, ModelConfig, find_config_file, find_weight_file};
pub use monitor::{FileMonitor, MemoryMonitor, Monitor, Stage, monitor_gap, stage_percent};
pub use predictor::{NullPredictor, Predictor, ScriptedPredictor, build_predictor};
pub use progress_bar::progress_bar_style;
pub use writer::{InferResult, JsonResultWriter, MemoryWriter, ResultWriter};

// Core pipeline
pub use infer::run_infer_task;
