//! Reference providers: external lookups keyed by a topic or paper title.
//!
//! A [`ReferenceProvider`] answers the call shapes the pipeline fans out:
//! survey papers for a topic, seminal works behind a paper, relevance ranking
//! and yes/no relevance, foundational topics for a paper, resources for those
//! topics, and a short relevance explanation. Every call fails independently;
//! callers recover per unit of work.
//!
//! - [`llm::LlmReferenceProvider`] answers everything by prompting a model.
//! - [`scholar::ScholarSurveyProvider`] answers survey lookups from Semantic
//!   Scholar and delegates the rest.

pub mod llm;
pub mod scholar;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;

/// A paper returned by a survey or seminal-work lookup. Only the title is
/// guaranteed; metadata depends on the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidatePaper {
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_access: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "abstract")]
    pub abstract_text: Option<String>,
}

impl CandidatePaper {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// A work cited as seminal by some survey paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeminalWork {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl SeminalWork {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            year: None,
        }
    }
}

/// A foundational topic scoped to one paper, with its recommended resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundationalTopic {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl FoundationalTopic {
    pub const NO_RESOURCE: &'static str = "No resource available";

    /// The resource, or the placeholder shown when none was found.
    pub fn resource_or_placeholder(&self) -> &str {
        self.resource.as_deref().unwrap_or(Self::NO_RESOURCE)
    }
}

/// Outcome of a yes/no relevance judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelevanceVerdict {
    Relevant,
    NotRelevant,
}

impl RelevanceVerdict {
    /// Strict text matching: relevant iff the reply is exactly `yes` after
    /// trimming and lowercasing. `"Yes."` is not relevant.
    pub fn from_exact_reply(reply: &str) -> Self {
        if reply.trim().to_lowercase() == "yes" {
            Self::Relevant
        } else {
            Self::NotRelevant
        }
    }

    pub fn is_relevant(self) -> bool {
        self == Self::Relevant
    }
}

/// How relevance replies are requested and decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelevanceMode {
    /// Ask for a bare `yes`/`no` and match it exactly.
    #[default]
    ExactMatch,
    /// Ask for `{"relevant": true|false}` and decode it.
    Structured,
}

/// Inputs of a yes/no relevance judgment.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceQuery<'a> {
    pub topic: &'a str,
    pub paper_title: &'a str,
    pub project_summary: &'a str,
    pub specialized_concepts: &'a [String],
}

/// Inputs of a foundational-topic lookup.
#[derive(Debug, Clone, Copy)]
pub struct TopicQuery<'a> {
    pub paper_title: &'a str,
    /// Known fundamental concepts to seed the answer with.
    pub existing_concepts: &'a [String],
    /// Core concepts the answer must not repeat.
    pub core_concepts: &'a [String],
}

/// External knowledge lookups. Implementations must be shareable across the
/// worker pool; no call retries.
pub trait ReferenceProvider: Send + Sync {
    /// Survey papers on a topic.
    fn survey_papers(&self, topic: &str, limit: usize) -> ProviderResult<Vec<CandidatePaper>>;

    /// Seminal works a paper would likely cite.
    fn seminal_works(&self, paper_title: &str, limit: usize) -> ProviderResult<Vec<SeminalWork>>;

    /// Rank candidate titles by relevance to a topic within the project,
    /// returning at most `top_n` of them, best first.
    fn rank_relevance(
        &self,
        topic: &str,
        project_summary: &str,
        candidates: &[String],
        top_n: usize,
    ) -> ProviderResult<Vec<String>>;

    /// Whether a paper is essential to the topic or to the project.
    fn judge_relevance(&self, query: &RelevanceQuery<'_>) -> ProviderResult<RelevanceVerdict>;

    /// Foundational topics needed to understand a paper.
    fn foundational_topics(&self, query: &TopicQuery<'_>) -> ProviderResult<Vec<String>>;

    /// One resource recommendation per topic, keyed by topic.
    fn topic_resources(
        &self,
        paper_title: &str,
        topics: &[String],
    ) -> ProviderResult<IndexMap<String, String>>;

    /// A short rationale for why a paper matters to a topic.
    fn explain_relevance(
        &self,
        topic: &str,
        paper_title: &str,
        project_summary: &str,
    ) -> ProviderResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_reply_matching_is_strict() {
        assert_eq!(RelevanceVerdict::from_exact_reply("yes"), RelevanceVerdict::Relevant);
        assert_eq!(RelevanceVerdict::from_exact_reply("  YES \n"), RelevanceVerdict::Relevant);
        assert_eq!(RelevanceVerdict::from_exact_reply("Yes."), RelevanceVerdict::NotRelevant);
        assert_eq!(RelevanceVerdict::from_exact_reply("yes, it is"), RelevanceVerdict::NotRelevant);
        assert_eq!(RelevanceVerdict::from_exact_reply("no"), RelevanceVerdict::NotRelevant);
    }

    #[test]
    fn missing_resource_uses_placeholder() {
        let topic = FoundationalTopic {
            topic: "Control Theory".into(),
            resource: None,
        };
        assert_eq!(topic.resource_or_placeholder(), "No resource available");
    }

    #[test]
    fn candidate_paper_metadata_is_optional() {
        let paper: CandidatePaper = serde_json::from_str(r#"{"title": "A Survey"}"#).unwrap();
        assert_eq!(paper, CandidatePaper::titled("A Survey"));
        let json = serde_json::to_string(&paper).unwrap();
        assert_eq!(json, r#"{"title":"A Survey"}"#);
    }

    #[test]
    fn relevance_mode_parses_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: RelevanceMode,
        }
        let w: Wrapper = toml::from_str(r#"mode = "structured""#).unwrap();
        assert_eq!(w.mode, RelevanceMode::Structured);
    }
}
