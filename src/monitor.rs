// -- imports
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::TaskSlot;
use crate::error::Result;

// -- progress scaling

/// State code the orchestrator understands for an in-flight task
const TASK_STATE_RUNNING: u8 = 2;

/// Logical stages of one task, with fixed weight shares of its percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preprocess,
    Task,
    Postprocess,
}

impl Stage {
    /// Where this stage starts within the task's [0, 1] range
    const fn start(self) -> f32 {
        match self {
            Stage::Preprocess => 0.0,
            Stage::Task => 0.1,
            Stage::Postprocess => 0.9,
        }
    }

    /// This stage's share of the task's [0, 1] range
    const fn weight(self) -> f32 {
        match self {
            Stage::Preprocess => 0.1,
            Stage::Task => 0.8,
            Stage::Postprocess => 0.1,
        }
    }
}

/// Scale fractional completion `p` of a stage into the overall run
/// percentage, accounting for the task's slot among 1 or 2 total tasks.
/// This lets the orchestrator drive a single unified progress bar across
/// combined mining + inference runs.
pub fn stage_percent(stage: Stage, p: f32, slot: TaskSlot) -> f32 {
    let p = p.clamp(0.0, 1.0);
    (slot.index as f32 + stage.start() + stage.weight() * p) / slot.total as f32
}

/// Report at most 100 times across a dataset of `total` items, and always
/// at least every item. Rounding the gap up keeps the report count bounded
/// by 100 for every `total`; the guard keeps a zero-item dataset from
/// dividing by zero downstream.
pub fn monitor_gap(total: usize) -> usize {
    total.div_ceil(100).max(1)
}

// -- monitor sink

/// External progress-reporting sink polled by the orchestrator.
pub trait Monitor {
    fn write_percent(&mut self, percent: f32) -> Result<()>;
}

/// Monitor protocol over a file, overwritten in place on every report:
/// `<unix-millis>\t<percent>\t<state>`.
pub struct FileMonitor {
    path: PathBuf,
}

impl FileMonitor {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Monitor for FileMonitor {
    fn write_percent(&mut self, percent: f32) -> Result<()> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let line = format!("{}\t{:.6}\t{}\n", millis, percent, TASK_STATE_RUNNING);
        std::fs::write(&self.path, line)?;
        tracing::debug!("Reported progress: {:.4}", percent);
        Ok(())
    }
}

/// In-memory monitor recording every reported percentage.
#[derive(Debug, Default)]
pub struct MemoryMonitor {
    pub percents: Vec<f32>,
}

impl Monitor for MemoryMonitor {
    fn write_percent(&mut self, percent: f32) -> Result<()> {
        self.percents.push(percent);
        Ok(())
    }
}

// -- tests
