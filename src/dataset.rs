// -- imports
use image::DynamicImage;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// The candidate dataset partition: an index file listing one asset path
/// per line. A tab-separated annotation column may follow the path and is
/// ignored for inference.
#[derive(Debug, Clone, Default)]
pub struct CandidateIndex {
    items: Vec<PathBuf>,
}

impl CandidateIndex {
    pub fn load(index_file: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(index_file)?;
        let items = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let asset = line.split('\t').next().unwrap_or(line);
                PathBuf::from(asset)
            })
            .collect();
        Ok(Self { items })
    }

    /// Item count, known in advance of iteration.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[PathBuf] {
        &self.items
    }
}

/// Decode one candidate image. A corrupt or unreadable input aborts the
/// whole run (batch-job semantics), so the failure is returned, not skipped.
pub fn decode_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| AppError::ImageLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

// -- tests
