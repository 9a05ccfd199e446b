//! XDG path resolution for prereq-tree.
//!
//! The config file lives under `$XDG_CONFIG_HOME/prereq-tree/`, dumps and
//! rendered trees default to `$XDG_DATA_HOME/prereq-tree/output/`.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

const APP_DIR: &str = "prereq-tree";

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(prereq::paths::no_home),
        help("Set the HOME environment variable, or pass --config and --output explicitly.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(prereq::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Application directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// `$XDG_CONFIG_HOME/prereq-tree/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/prereq-tree/`
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Resolve from the environment with the standard XDG fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;
        Ok(Self::from_env_values(
            &home,
            std::env::var("XDG_CONFIG_HOME").ok().as_deref(),
            std::env::var("XDG_DATA_HOME").ok().as_deref(),
        ))
    }

    fn from_env_values(home: &Path, config_home: Option<&str>, data_home: Option<&str>) -> Self {
        let base = |var: Option<&str>, fallback: &str| {
            var.filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join(fallback))
                .join(APP_DIR)
        };
        Self {
            config_dir: base(config_home, ".config"),
            data_dir: base(data_home, ".local/share"),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Default directory for dumps and rendered trees.
    pub fn output_dir(&self) -> PathBuf {
        self.data_dir.join("output")
    }
}

/// Create a directory and its parents. Idempotent.
pub fn ensure_dir(dir: &Path) -> PathResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
        path: dir.display().to_string(),
        source: e,
    })
}
