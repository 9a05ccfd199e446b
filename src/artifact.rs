//! Artifact sinks: where stage outputs get dumped.
//!
//! The pipeline never touches the filesystem directly; it hands named JSON
//! values to an [`ArtifactSink`]. [`DirectorySink`] writes timestamped files,
//! [`MemorySink`] keeps them for inspection and [`NullSink`] drops them.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ArtifactError, ArtifactResult};

/// Destination for intermediate and final JSON artifacts.
pub trait ArtifactSink: Send + Sync {
    /// Store one artifact. Returns the written path, if the sink has one.
    fn write_json(&self, name: &str, value: &serde_json::Value) -> ArtifactResult<Option<PathBuf>>;
}

impl<T: ArtifactSink + ?Sized> ArtifactSink for std::sync::Arc<T> {
    fn write_json(&self, name: &str, value: &serde_json::Value) -> ArtifactResult<Option<PathBuf>> {
        (**self).write_json(name, value)
    }
}

/// Writes `<name>_<YYYYmmdd_HHMMSS>.json` files into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Artifact file name stem from a free-text name ("Reinforcement Learning"
/// becomes "Reinforcement_Learning").
pub fn file_stem(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl ArtifactSink for DirectorySink {
    fn write_json(&self, name: &str, value: &serde_json::Value) -> ArtifactResult<Option<PathBuf>> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ArtifactError::Io {
            path: self.dir.display().to_string(),
            source: e,
        })?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("{}_{timestamp}.json", file_stem(name)));
        let content =
            serde_json::to_string_pretty(value).map_err(|e| ArtifactError::Serialization {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        std::fs::write(&path, content).map_err(|e| ArtifactError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Some(path))
    }
}

/// Keeps artifacts in memory, in write order.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all stored artifacts, in write order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|e| e.iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default()
    }

    /// The most recent artifact with this name.
    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        let entries = self.entries.lock().ok()?;
        entries
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }
}

impl ArtifactSink for MemorySink {
    fn write_json(&self, name: &str, value: &serde_json::Value) -> ArtifactResult<Option<PathBuf>> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((name.to_string(), value.clone()));
        }
        Ok(None)
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ArtifactSink for NullSink {
    fn write_json(
        &self,
        _name: &str,
        _value: &serde_json::Value,
    ) -> ArtifactResult<Option<PathBuf>> {
        Ok(None)
    }
}
