// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # prereq-tree
//!
//! Builds a knowledge-prerequisite graph for a research project: from a short
//! project description it infers concept categories, finds survey papers and
//! their seminal references per core concept, selects and prunes the papers
//! relevant to the project, and attaches foundational topics with learning
//! resources to each one.
//!
//! ## Architecture
//!
//! - **Concepts** (`concept`): project description → categorized concepts
//! - **Providers** (`provider`): model- and Semantic Scholar-backed lookups
//! - **Pipeline** (`pipeline`): survey → seminal counts → selection → pruning
//!   → enrichment, each stage a parallel fan-out on a bounded pool
//! - **Tree** (`tree`): four-level petgraph DAG of the result
//! - **Rendering** (`render`): vis-network HTML and Graphviz DOT
//!
//! ## Library usage
//!
//! ```no_run
//! use prereq_tree::artifact::NullSink;
//! use prereq_tree::concept::{LlmConceptExtractor, ProjectDescription};
//! use prereq_tree::config::PipelineConfig;
//! use prereq_tree::llm::OllamaClient;
//! use prereq_tree::pipeline::Pipeline;
//! use prereq_tree::provider::llm::LlmReferenceProvider;
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::default();
//! let model = Arc::new(OllamaClient::new(config.model.clone()));
//! let pipeline = Pipeline::new(
//!     config.clone(),
//!     Box::new(LlmConceptExtractor::new(model.clone())),
//!     Box::new(LlmReferenceProvider::new(model, config.relevance_mode)),
//!     Box::new(NullSink),
//! )
//! .unwrap();
//! let project = ProjectDescription::from_json(r#"{"description": "Robot grasping with RL"}"#).unwrap();
//! let output = pipeline.run(&project).unwrap();
//! println!("{} nodes", output.tree.node_count());
//! ```

pub mod artifact;
pub mod concept;
pub mod config;
pub mod error;
pub mod llm;
pub mod paths;
pub mod pipeline;
pub mod provider;
pub mod render;
pub mod tree;
pub mod wiki;
