//! Rich diagnostic error types for prereq-tree.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains. Only input errors are
//! fatal to a pipeline run; provider failures are recovered per unit of work
//! and surface in the stage reports instead.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::LlmError;
use crate::paths::PathError;
use crate::wiki::WikiError;

/// Top-level error type for prereq-tree.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum PrereqError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Concept(#[from] ConceptError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Wiki(#[from] WikiError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),
}

// ---------------------------------------------------------------------------
// Concept extraction (input) errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConceptError {
    #[error("project description not found: {path}")]
    #[diagnostic(
        code(prereq::concept::not_found),
        help("Pass an existing JSON file with a \"description\" field, e.g. `prereq-tree run --project queries/robotics.json`.")
    )]
    NotFound { path: String },

    #[error("failed to read project description: {path}")]
    #[diagnostic(
        code(prereq::concept::read),
        help("Check the file permissions and that the file is valid UTF-8 JSON.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("project description is missing field \"{field}\"")]
    #[diagnostic(
        code(prereq::concept::missing_field),
        help("The project file must contain a non-empty \"{field}\" string.")
    )]
    MissingField { field: String },

    #[error("failed to parse concept extraction result: {message}")]
    #[diagnostic(
        code(prereq::concept::parse),
        help(
            "The extractor must return a JSON object with project_title, project_summary, \
             prerequisites, fundamental_concepts, core_concepts and specialized_concepts."
        )
    )]
    Parse { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),
}

// ---------------------------------------------------------------------------
// Reference provider errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ProviderError {
    #[error("{call} lookup failed for \"{subject}\": {message}")]
    #[diagnostic(
        code(prereq::provider::call),
        help("The lookup service could not be reached or rejected the request. The unit of work is skipped.")
    )]
    Call {
        call: &'static str,
        subject: String,
        message: String,
    },

    #[error("{call} response for \"{subject}\" is not well-formed: {message}")]
    #[diagnostic(
        code(prereq::provider::parse),
        help("The service replied, but not in the expected JSON shape. The unit of work yields an empty result.")
    )]
    Parse {
        call: &'static str,
        subject: String,
        message: String,
    },
}

impl ProviderError {
    /// Short label of the call shape that failed.
    pub fn call(&self) -> &'static str {
        match self {
            Self::Call { call, .. } | Self::Parse { call, .. } => call,
        }
    }

    /// Whether the failure happened while decoding a reply.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("failed to start a worker pool with {threads} threads: {message}")]
    #[diagnostic(
        code(prereq::pipeline::worker_pool),
        help("Lower `workers` in the config, or set it to 0 to use one thread per CPU.")
    )]
    WorkerPool { threads: usize, message: String },
}

// ---------------------------------------------------------------------------
// Artifact sink errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ArtifactError {
    #[error("failed to write artifact: {path}")]
    #[diagnostic(
        code(prereq::artifact::io),
        help("Check that the output directory is writable and the disk is not full.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize artifact \"{name}\": {message}")]
    #[diagnostic(code(prereq::artifact::serde), help("This is a bug; please report it."))]
    Serialization { name: String, message: String },
}

// ---------------------------------------------------------------------------
// Render errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RenderError {
    #[error("failed to write rendered graph: {path}")]
    #[diagnostic(
        code(prereq::render::io),
        help("Check that the output path's directory exists and is writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read tree export: {path}")]
    #[diagnostic(
        code(prereq::render::read),
        help("Pass a knowledge_tree_*.json file written by a previous `prereq-tree run`.")
    )]
    Read { path: String, message: String },

    #[error("tree export is not a valid knowledge tree: {message}")]
    #[diagnostic(
        code(prereq::render::invalid_tree),
        help("A tree needs exactly one root node and edges between known node ids.")
    )]
    InvalidTree { message: String },

    #[error("failed to encode graph data: {message}")]
    #[diagnostic(code(prereq::render::encode), help("This is a bug; please report it."))]
    Encode { message: String },
}

pub type ConceptResult<T> = std::result::Result<T, ConceptError>;
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
pub type ArtifactResult<T> = std::result::Result<T, ArtifactError>;
pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// Convenience alias for functions returning prereq-tree results.
pub type PrereqResult<T> = std::result::Result<T, PrereqError>;
