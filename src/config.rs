//! Pipeline configuration, persisted as TOML.
//!
//! Every field has a serde default so a partial file (or none at all) yields
//! a usable configuration. The binary layers CLI flags on top.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::ModelConfig;
use crate::pipeline::selection::{SelectionPolicy, SelectionStrategy};
use crate::provider::RelevanceMode;
use crate::provider::scholar::ScholarConfig;

/// Errors from configuration loading.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(prereq::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(prereq::config::parse),
        help("Check the TOML syntax; `prereq-tree config show` prints a valid example.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(prereq::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config value for `{field}`: {message}")]
    #[diagnostic(code(prereq::config::invalid), help("{message}"))]
    Invalid { field: String, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Where survey papers come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurveySource {
    /// Ask the model.
    #[default]
    Model,
    /// Search Semantic Scholar.
    SemanticScholar,
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Worker threads for fan-out stages; 0 = one per CPU.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Low-count selection strategy.
    #[serde(default)]
    pub selection: SelectionStrategy,
    /// Fraction of low-count titles kept by the quota strategy.
    #[serde(default = "default_low_quota_fraction")]
    pub low_quota_fraction: f64,
    /// Titles kept per concept by the agent-ranked strategy.
    #[serde(default = "default_ranked_top_n")]
    pub ranked_top_n: usize,
    /// How yes/no relevance replies are decoded.
    #[serde(default)]
    pub relevance_mode: RelevanceMode,
    /// Where survey papers come from.
    #[serde(default)]
    pub survey_source: SurveySource,
    #[serde(default = "default_survey_papers_per_concept")]
    pub survey_papers_per_concept: usize,
    #[serde(default = "default_seminal_works_per_paper")]
    pub seminal_works_per_paper: usize,
    /// Publication year filter for Semantic Scholar, e.g. "2020-2025".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_year_range: Option<String>,
    /// Enrich each distinct paper once instead of once per (concept, paper).
    #[serde(default)]
    pub dedupe_enrichment: bool,
    /// Ask for a relevance explanation per pruned paper.
    #[serde(default)]
    pub explain_papers: bool,
    /// Dump every stage's output through the artifact sink.
    #[serde(default = "default_true")]
    pub dump_intermediate: bool,
    /// Output directory; defaults to the XDG data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub scholar: ScholarConfig,
}

fn default_workers() -> usize {
    8
}
fn default_low_quota_fraction() -> f64 {
    0.3
}
fn default_ranked_top_n() -> usize {
    6
}
fn default_survey_papers_per_concept() -> usize {
    6
}
fn default_seminal_works_per_paper() -> usize {
    5
}
fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            selection: SelectionStrategy::default(),
            low_quota_fraction: default_low_quota_fraction(),
            ranked_top_n: default_ranked_top_n(),
            relevance_mode: RelevanceMode::default(),
            survey_source: SurveySource::default(),
            survey_papers_per_concept: default_survey_papers_per_concept(),
            seminal_works_per_paper: default_seminal_works_per_paper(),
            survey_year_range: None,
            dedupe_enrichment: false,
            explain_papers: false,
            dump_intermediate: true,
            output_dir: None,
            model: ModelConfig::default(),
            scholar: ScholarConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: "<memory>".into(),
            message: e.to_string(),
        })
    }

    /// Reject values the selection and lookup stages cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.low_quota_fraction > 0.0 && self.low_quota_fraction <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "low_quota_fraction".into(),
                message: format!(
                    "must be in (0, 1], got {}",
                    self.low_quota_fraction
                ),
            });
        }
        for (field, value) in [
            ("ranked_top_n", self.ranked_top_n),
            ("survey_papers_per_concept", self.survey_papers_per_concept),
            ("seminal_works_per_paper", self.seminal_works_per_paper),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    message: "must be at least 1".into(),
                });
            }
        }
        Ok(())
    }

    /// The selection policy these settings describe.
    pub fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            strategy: self.selection,
            low_quota_fraction: self.low_quota_fraction,
            ranked_top_n: self.ranked_top_n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.workers, 8);
        assert_eq!(config.selection, SelectionStrategy::Quota);
        assert_eq!(config.relevance_mode, RelevanceMode::ExactMatch);
        assert!(config.dump_intermediate);
    }

    #[test]
    fn partial_file_overrides_fields() {
        let config: PipelineConfig = toml::from_str(
            r#"
            selection = "agent-ranked"
            survey_source = "semantic-scholar"
            survey_year_range = "2020-2025"

            [model]
            model = "qwen2.5"
            "#,
        )
        .unwrap();
        assert_eq!(config.selection, SelectionStrategy::AgentRanked);
        assert_eq!(config.survey_source, SurveySource::SemanticScholar);
        assert_eq!(config.model.model, "qwen2.5");
        assert_eq!(config.model.base_url, "http://localhost:11434");
        assert_eq!(config.scholar.search_limit, 15);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");
        let config = PipelineConfig {
            explain_papers: true,
            ranked_top_n: 4,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn load_or_default_without_file() {
        let config =
            PipelineConfig::load_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = PipelineConfig {
            low_quota_fraction: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref field, .. }) if field == "low_quota_fraction"
        ));

        let config = PipelineConfig {
            ranked_top_n: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
