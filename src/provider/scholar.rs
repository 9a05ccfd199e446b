//! Survey lookups against the Semantic Scholar Graph API.
//!
//! Semantic Scholar has no "survey" filter, so the lookup searches for
//! `"<topic> survey"` and keeps papers whose title reads like a survey. If
//! that yields too few, a second plain search on the topic is filtered the
//! same way. All other call shapes go to the wrapped provider.

use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};

use super::{
    CandidatePaper, ReferenceProvider, RelevanceQuery, RelevanceVerdict, SeminalWork, TopicQuery,
};

const FIELDS: &str = "title,url,year,citationCount,isOpenAccess,authors,abstract,externalIds";

const SURVEY_KEYWORDS: &[&str] = &[
    "survey",
    "review",
    "overview",
    "systematic analysis",
    "meta-analysis",
    "state of the art",
];

const ABSTRACT_PREVIEW: usize = 200;

/// Configuration for the Semantic Scholar client (`[scholar]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScholarConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Results requested per search; more than needed, since most get filtered.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_base_url() -> String {
    "https://api.semanticscholar.org/graph/v1".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_search_limit() -> usize {
    15
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            search_limit: default_search_limit(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<PaperData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperData {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    citation_count: Option<u64>,
    #[serde(default)]
    is_open_access: Option<bool>,
    #[serde(default)]
    authors: Vec<AuthorData>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    external_ids: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct AuthorData {
    #[serde(default)]
    name: Option<String>,
}

impl PaperData {
    fn looks_like_survey(&self) -> bool {
        self.title.as_deref().is_some_and(|t| {
            let lower = t.to_lowercase();
            SURVEY_KEYWORDS.iter().any(|k| lower.contains(k))
        })
    }

    fn into_candidate(self) -> CandidatePaper {
        let doi = self
            .external_ids
            .as_ref()
            .and_then(|ids| ids.get("DOI"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let abstract_text = Some(match self.abstract_text {
            Some(text) if !text.is_empty() => {
                format!("{}...", text.chars().take(ABSTRACT_PREVIEW).collect::<String>())
            }
            _ => "No abstract available".into(),
        });

        CandidatePaper {
            title: self.title.unwrap_or_default(),
            authors: self.authors.into_iter().filter_map(|a| a.name).collect(),
            year: self.year,
            doi,
            url: self.url,
            citation_count: self.citation_count,
            open_access: self.is_open_access,
            abstract_text,
        }
    }
}

/// Append survey-looking papers from one search batch, skipping titles
/// already found, until `limit` is reached.
fn take_surveys(batch: Vec<PaperData>, found: &mut Vec<CandidatePaper>, limit: usize) {
    for paper in batch {
        if found.len() >= limit {
            break;
        }
        if !paper.looks_like_survey() {
            continue;
        }
        let candidate = paper.into_candidate();
        if found.iter().any(|p| p.title == candidate.title) {
            continue;
        }
        found.push(candidate);
    }
}

/// Run the survey query, then the plain topic query if it came up short.
/// A failed second query keeps whatever the first one found.
fn gather_surveys<F>(
    topic: &str,
    limit: usize,
    mut search: F,
) -> ProviderResult<Vec<CandidatePaper>>
where
    F: FnMut(&str) -> ProviderResult<Vec<PaperData>>,
{
    let mut found = Vec::new();
    take_surveys(search(&format!("{topic} survey"))?, &mut found, limit);
    if found.len() < limit {
        match search(topic) {
            Ok(batch) => take_surveys(batch, &mut found, limit),
            Err(e) if !found.is_empty() => {
                warn!(topic, found = found.len(), error = %e, "fallback search failed");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(found)
}

/// Survey lookups from Semantic Scholar, everything else from `inner`.
pub struct ScholarSurveyProvider {
    config: ScholarConfig,
    year_range: Option<String>,
    agent: ureq::Agent,
    inner: Box<dyn ReferenceProvider>,
}

impl ScholarSurveyProvider {
    pub fn new(
        config: ScholarConfig,
        year_range: Option<String>,
        inner: Box<dyn ReferenceProvider>,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            config,
            year_range,
            agent,
            inner,
        }
    }

    fn search(&self, topic: &str, query: &str) -> ProviderResult<Vec<PaperData>> {
        let url = format!("{}/paper/search", self.config.base_url);
        let limit = self.config.search_limit.to_string();
        let mut request = self
            .agent
            .get(&url)
            .query("query", query)
            .query("fields", FIELDS)
            .query("limit", &limit);
        if let Some(years) = &self.year_range {
            request = request.query("year", years);
        }
        if let Some(key) = &self.config.api_key {
            request = request.set("x-api-key", key);
        }

        let response = request.call().map_err(|e| ProviderError::Call {
            call: "survey-papers",
            subject: topic.to_string(),
            message: e.to_string(),
        })?;
        let body: SearchResponse = response.into_json().map_err(|e| ProviderError::Parse {
            call: "survey-papers",
            subject: topic.to_string(),
            message: e.to_string(),
        })?;
        debug!(topic, query, hits = body.data.len(), "semantic scholar search");
        Ok(body.data)
    }
}

impl ReferenceProvider for ScholarSurveyProvider {
    fn survey_papers(&self, topic: &str, limit: usize) -> ProviderResult<Vec<CandidatePaper>> {
        gather_surveys(topic, limit, |query| self.search(topic, query))
    }

    fn seminal_works(&self, paper_title: &str, limit: usize) -> ProviderResult<Vec<SeminalWork>> {
        self.inner.seminal_works(paper_title, limit)
    }

    fn rank_relevance(
        &self,
        topic: &str,
        project_summary: &str,
        candidates: &[String],
        top_n: usize,
    ) -> ProviderResult<Vec<String>> {
        self.inner
            .rank_relevance(topic, project_summary, candidates, top_n)
    }

    fn judge_relevance(&self, query: &RelevanceQuery<'_>) -> ProviderResult<RelevanceVerdict> {
        self.inner.judge_relevance(query)
    }

    fn foundational_topics(&self, query: &TopicQuery<'_>) -> ProviderResult<Vec<String>> {
        self.inner.foundational_topics(query)
    }

    fn topic_resources(
        &self,
        paper_title: &str,
        topics: &[String],
    ) -> ProviderResult<IndexMap<String, String>> {
        self.inner.topic_resources(paper_title, topics)
    }

    fn explain_relevance(
        &self,
        topic: &str,
        paper_title: &str,
        project_summary: &str,
    ) -> ProviderResult<String> {
        self.inner
            .explain_relevance(topic, paper_title, project_summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(json: &str) -> Vec<PaperData> {
        serde_json::from_str::<SearchResponse>(json).unwrap().data
    }

    #[test]
    fn keeps_only_survey_titles() {
        let data = batch(
            r#"{"total": 3, "data": [
                {"paperId": "a", "title": "Deep Reinforcement Learning: A Survey", "year": 2021,
                 "citationCount": 412, "isOpenAccess": true,
                 "authors": [{"authorId": "1", "name": "Ada Lovelace"}],
                 "externalIds": {"DOI": "10.1000/xyz", "CorpusId": 42}},
                {"paperId": "b", "title": "Grasping with Point Clouds"},
                {"paperId": "c", "title": "Robot Learning: State of the Art and Open Problems"}
            ]}"#,
        );
        let mut found = Vec::new();
        take_surveys(data, &mut found, 3);

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].authors, ["Ada Lovelace"]);
        assert_eq!(found[0].doi.as_deref(), Some("10.1000/xyz"));
        assert_eq!(found[0].citation_count, Some(412));
        assert_eq!(found[0].abstract_text.as_deref(), Some("No abstract available"));
        assert_eq!(found[1].title, "Robot Learning: State of the Art and Open Problems");
    }

    #[test]
    fn second_batch_skips_known_titles_and_respects_limit() {
        let mut found = vec![CandidatePaper::titled("A Review of Grasping")];
        let data = batch(
            r#"{"data": [
                {"title": "A Review of Grasping"},
                {"title": "An Overview of Tactile Sensing"},
                {"title": "Meta-Analysis of Sim2Real"}
            ]}"#,
        );
        take_surveys(data, &mut found, 2);
        let titles: Vec<_> = found.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["A Review of Grasping", "An Overview of Tactile Sensing"]);
    }

    #[test]
    fn failed_fallback_keeps_first_batch() {
        let mut queries = Vec::new();
        let found = gather_surveys("Grasping", 3, |query| {
            queries.push(query.to_string());
            if queries.len() == 1 {
                Ok(batch(r#"{"data": [{"title": "A Review of Grasping"}]}"#))
            } else {
                Err(ProviderError::Call {
                    call: "survey-papers",
                    subject: "Grasping".into(),
                    message: "status code 429".into(),
                })
            }
        })
        .unwrap();
        assert_eq!(queries, ["Grasping survey", "Grasping"]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "A Review of Grasping");
    }

    #[test]
    fn failed_fallback_with_nothing_found_is_an_error() {
        let mut calls = 0;
        let result = gather_surveys("Grasping", 3, |_| {
            calls += 1;
            if calls == 1 {
                Ok(Vec::new())
            } else {
                Err(ProviderError::Call {
                    call: "survey-papers",
                    subject: "Grasping".into(),
                    message: "status code 500".into(),
                })
            }
        });
        assert!(matches!(result, Err(ProviderError::Call { .. })));
    }

    #[test]
    fn short_abstracts_still_get_ellipsis() {
        let data = batch(
            r#"{"data": [{"title": "A Survey", "abstract": "Short."}, {"title": "A Review", "abstract": ""}]}"#,
        );
        let mut found = Vec::new();
        take_surveys(data, &mut found, 2);
        assert_eq!(found[0].abstract_text.as_deref(), Some("Short...."));
        assert_eq!(found[1].abstract_text.as_deref(), Some("No abstract available"));
    }

    #[test]
    fn long_abstracts_are_previewed() {
        let text = "x".repeat(300);
        let data = batch(&format!(
            r#"{{"data": [{{"title": "A Survey", "abstract": "{text}"}}]}}"#
        ));
        let mut found = Vec::new();
        take_surveys(data, &mut found, 1);
        let preview = found[0].abstract_text.as_deref().unwrap();
        assert_eq!(preview.len(), ABSTRACT_PREVIEW + 3);
        assert!(preview.ends_with("..."));
    }
}
