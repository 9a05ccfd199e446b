//! Project descriptions and the concept categories inferred from them.
//!
//! A project file is a small JSON document with a free-text `description`
//! (and optionally a `title`). The [`ConceptExtractor`] turns it into a
//! [`ConceptSet`]: the project title and summary plus four concept lists.
//! The set is produced once per run and never mutated afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConceptError, ConceptResult};
use crate::llm::{TextModel, extract_json_object};

/// Which of the four categories a concept belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConceptKind {
    /// Static knowledge the reader must already have.
    Prerequisite,
    /// Project-specific background needed to engage with the core concepts.
    Fundamental,
    /// Central focus areas of the project.
    Core,
    /// Applied implementations of core concepts.
    Specialized,
}

impl ConceptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prerequisite => "prerequisite",
            Self::Fundamental => "fundamental",
            Self::Core => "core",
            Self::Specialized => "specialized",
        }
    }
}

/// A category label with its kind tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Concept {
    pub label: String,
    pub kind: ConceptKind,
}

/// The record returned by concept extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptSet {
    #[serde(default)]
    pub project_title: String,
    #[serde(default)]
    pub project_summary: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub fundamental_concepts: Vec<String>,
    #[serde(default)]
    pub core_concepts: Vec<String>,
    #[serde(default)]
    pub specialized_concepts: Vec<String>,
}

impl ConceptSet {
    /// Labels of one category, in extraction order.
    pub fn labels(&self, kind: ConceptKind) -> &[String] {
        match kind {
            ConceptKind::Prerequisite => &self.prerequisites,
            ConceptKind::Fundamental => &self.fundamental_concepts,
            ConceptKind::Core => &self.core_concepts,
            ConceptKind::Specialized => &self.specialized_concepts,
        }
    }

    /// Every concept with its kind tag.
    pub fn concepts(&self) -> Vec<Concept> {
        [
            ConceptKind::Prerequisite,
            ConceptKind::Fundamental,
            ConceptKind::Core,
            ConceptKind::Specialized,
        ]
        .into_iter()
        .flat_map(|kind| {
            self.labels(kind).iter().map(move |label| Concept {
                label: label.clone(),
                kind,
            })
        })
        .collect()
    }
}

/// A project description file: `{"title": "...", "description": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDescription {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl ProjectDescription {
    /// Load and validate a project file.
    pub fn load(path: &Path) -> ConceptResult<Self> {
        if !path.exists() {
            return Err(ConceptError::NotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConceptError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate project JSON.
    pub fn from_json(content: &str) -> ConceptResult<Self> {
        let project: Self = serde_json::from_str(content).map_err(|e| ConceptError::Parse {
            message: format!("project file: {e}"),
        })?;
        if project.description.trim().is_empty() {
            return Err(ConceptError::MissingField {
                field: "description".into(),
            });
        }
        Ok(project)
    }
}

/// Turns a project description into categorized concepts.
pub trait ConceptExtractor: Send + Sync {
    fn extract(&self, project: &ProjectDescription) -> ConceptResult<ConceptSet>;
}

/// Concept extraction by prompting a [`TextModel`].
pub struct LlmConceptExtractor<M> {
    model: M,
}

impl<M: TextModel> LlmConceptExtractor<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    fn prompt(description: &str) -> String {
        format!(
            "Analyze the following project description and extract concepts into four categories:\n\
             - Prerequisites: static knowledge or skills the reader must already possess.\n\
             - Fundamental: project-specific background needed to engage with the core concepts.\n\
             - Core: the central focus areas of the project.\n\
             - Specialized: applied implementations of the core concepts.\n\
             Also give the project a short title and a one-paragraph summary.\n\n\
             Project description:\n{description}\n\n\
             Respond with ONLY this JSON object, without code fences:\n\
             {{\"project_title\": \"<title>\", \"project_summary\": \"<summary>\", \
             \"prerequisites\": [\"<concept>\"], \"fundamental_concepts\": [\"<concept>\"], \
             \"core_concepts\": [\"<concept>\"], \"specialized_concepts\": [\"<concept>\"]}}"
        )
    }
}

impl<M: TextModel> ConceptExtractor for LlmConceptExtractor<M> {
    fn extract(&self, project: &ProjectDescription) -> ConceptResult<ConceptSet> {
        let reply = self
            .model
            .complete(crate::provider::llm::SYSTEM_PROMPT, &Self::prompt(&project.description))?;
        debug!(reply = %reply, "concept extraction reply");

        let json = extract_json_object(&reply).ok_or_else(|| ConceptError::Parse {
            message: "no JSON object in reply".into(),
        })?;
        let mut set: ConceptSet = serde_json::from_str(json).map_err(|e| ConceptError::Parse {
            message: e.to_string(),
        })?;

        if set.project_title.trim().is_empty() {
            set.project_title = project
                .title
                .clone()
                .unwrap_or_else(|| "Research Project".into());
        }
        if set.project_summary.trim().is_empty() {
            set.project_summary = project.description.trim().to_string();
        }

        info!(
            title = %set.project_title,
            core = set.core_concepts.len(),
            fundamental = set.fundamental_concepts.len(),
            specialized = set.specialized_concepts.len(),
            "extracted concepts"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    struct Canned(&'static str);

    impl TextModel for Canned {
        fn complete(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    fn project() -> ProjectDescription {
        ProjectDescription {
            title: Some("Grasping".into()),
            description: "A robot arm that learns to grasp unfamiliar objects.".into(),
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = ProjectDescription::load(Path::new("/nonexistent/robotics.json")).unwrap_err();
        assert!(matches!(err, ConceptError::NotFound { .. }));
    }

    #[test]
    fn empty_description_is_missing_field() {
        let err = ProjectDescription::from_json(r#"{"description": "   "}"#).unwrap_err();
        assert!(matches!(err, ConceptError::MissingField { ref field } if field == "description"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("robotics.json");
        std::fs::write(&path, r#"{"description": "Self-improving robots."}"#).unwrap();
        let project = ProjectDescription::load(&path).unwrap();
        assert_eq!(project.description, "Self-improving robots.");
        assert_eq!(project.title, None);
    }

    #[test]
    fn extractor_parses_fenced_reply() {
        let extractor = LlmConceptExtractor::new(Canned(
            "```json\n{\"project_title\": \"Adaptive Grasping\", \"project_summary\": \"RL for grasping.\", \
             \"prerequisites\": [\"Linear Algebra\"], \"fundamental_concepts\": [\"Control Theory\"], \
             \"core_concepts\": [\"Reinforcement Learning\", \"Robotic Grasping\"], \
             \"specialized_concepts\": [\"Sim-to-Real Transfer\"]}\n```",
        ));
        let set = extractor.extract(&project()).unwrap();
        assert_eq!(set.project_title, "Adaptive Grasping");
        assert_eq!(set.core_concepts.len(), 2);
        assert_eq!(set.labels(ConceptKind::Specialized), ["Sim-to-Real Transfer"]);
        assert_eq!(set.concepts().len(), 5);
    }

    #[test]
    fn extractor_fills_missing_title_and_summary() {
        let extractor = LlmConceptExtractor::new(Canned(r#"{"core_concepts": ["Grasping"]}"#));
        let set = extractor.extract(&project()).unwrap();
        assert_eq!(set.project_title, "Grasping");
        assert!(set.project_summary.starts_with("A robot arm"));
    }

    #[test]
    fn extractor_rejects_non_json() {
        let extractor = LlmConceptExtractor::new(Canned("Sure! Here are the concepts."));
        let err = extractor.extract(&project()).unwrap_err();
        assert!(matches!(err, ConceptError::Parse { .. }));
    }
}
