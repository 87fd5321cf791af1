// -- imports
use indexmap::IndexMap;
use serde::Serialize;
use serde::ser::SerializeMap;
use std::path::{Path, PathBuf};

use crate::annotation::Annotation;
use crate::error::{AppError, Result};

// -- inference result

/// Mapping from image path to its annotations, preserving the order in
/// which images were processed. Built incrementally, written once.
#[derive(Debug, Clone, Default)]
pub struct InferResult {
    entries: IndexMap<PathBuf, Vec<Annotation>>,
}

impl InferResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
        }
    }

    /// Record annotations for one image. A repeated path replaces the
    /// earlier entry, keeping its original position.
    pub fn insert(&mut self, path: PathBuf, annotations: Vec<Annotation>) {
        self.entries.insert(path, annotations);
    }

    pub fn get(&self, path: &Path) -> Option<&[Annotation]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &Vec<Annotation>)> {
        self.entries.iter()
    }
}

impl Serialize for InferResult {
    /// Serialize as a JSON object keyed by image path, in insertion order.
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, annotations) in &self.entries {
            map.serialize_entry(&path.to_string_lossy(), annotations)?;
        }
        map.end()
    }
}

// -- result sink

/// External result sink; receives the complete mapping exactly once.
pub trait ResultWriter {
    fn write(&mut self, result: &InferResult) -> Result<()>;
}

/// Writes the result as a single JSON document. No partial writes, no
/// retry; a failure propagates and aborts the run.
pub struct JsonResultWriter {
    path: PathBuf,
}

impl JsonResultWriter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ResultWriter for JsonResultWriter {
    fn write(&mut self, result: &InferResult) -> Result<()> {
        let json = serde_json::to_string_pretty(result)
            .map_err(|e| AppError::ResultWrite(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| AppError::ResultWrite(format!("{:?}: {}", self.path, e)))?;
        tracing::info!("Inference result written to {:?}", self.path);
        Ok(())
    }
}

/// In-memory writer recording every write it receives.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    pub written: Vec<InferResult>,
}

impl ResultWriter for MemoryWriter {
    fn write(&mut self, result: &InferResult) -> Result<()> {
        self.written.push(result.clone());
        Ok(())
    }
}

// -- tests
