//! Scripted provider for stage tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use indexmap::IndexMap;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{
    CandidatePaper, ReferenceProvider, RelevanceQuery, RelevanceVerdict, SeminalWork, TopicQuery,
};

/// Canned answers keyed by subject; anything unscripted is an empty answer
/// (or "no" for relevance). Subjects in `fail` produce a parse error for
/// the given call shape.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    pub surveys: HashMap<String, Vec<String>>,
    pub seminal: HashMap<String, Vec<String>>,
    pub rankings: HashMap<String, Vec<String>>,
    pub relevance: HashMap<String, String>,
    pub topics: HashMap<String, Vec<String>>,
    pub resources: HashMap<String, Vec<(String, String)>>,
    pub explanations: HashMap<String, String>,
    pub fail: HashSet<(&'static str, String)>,
    pub calls: Mutex<Vec<(&'static str, String)>>,
}

impl ScriptedProvider {
    fn enter(&self, call: &'static str, subject: &str) -> ProviderResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((call, subject.to_string()));
        if self.fail.contains(&(call, subject.to_string())) {
            return Err(ProviderError::Parse {
                call,
                subject: subject.to_string(),
                message: "scripted failure".into(),
            });
        }
        Ok(())
    }

    pub fn calls_to(&self, call: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == call)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

impl ReferenceProvider for ScriptedProvider {
    fn survey_papers(&self, topic: &str, limit: usize) -> ProviderResult<Vec<CandidatePaper>> {
        self.enter("survey-papers", topic)?;
        Ok(self
            .surveys
            .get(topic)
            .into_iter()
            .flatten()
            .take(limit)
            .map(CandidatePaper::titled)
            .collect())
    }

    fn seminal_works(&self, paper_title: &str, limit: usize) -> ProviderResult<Vec<SeminalWork>> {
        self.enter("seminal-works", paper_title)?;
        Ok(self
            .seminal
            .get(paper_title)
            .into_iter()
            .flatten()
            .take(limit)
            .map(SeminalWork::titled)
            .collect())
    }

    fn rank_relevance(
        &self,
        topic: &str,
        _project_summary: &str,
        _candidates: &[String],
        _top_n: usize,
    ) -> ProviderResult<Vec<String>> {
        self.enter("relevance-ranking", topic)?;
        Ok(self.rankings.get(topic).cloned().unwrap_or_default())
    }

    fn judge_relevance(&self, query: &RelevanceQuery<'_>) -> ProviderResult<RelevanceVerdict> {
        self.enter("relevance", query.paper_title)?;
        let reply = self
            .relevance
            .get(query.paper_title)
            .map(String::as_str)
            .unwrap_or("no");
        Ok(RelevanceVerdict::from_exact_reply(reply))
    }

    fn foundational_topics(&self, query: &TopicQuery<'_>) -> ProviderResult<Vec<String>> {
        self.enter("foundational-topics", query.paper_title)?;
        Ok(self
            .topics
            .get(query.paper_title)
            .cloned()
            .unwrap_or_default())
    }

    fn topic_resources(
        &self,
        paper_title: &str,
        _topics: &[String],
    ) -> ProviderResult<IndexMap<String, String>> {
        self.enter("topic-resources", paper_title)?;
        Ok(self
            .resources
            .get(paper_title)
            .into_iter()
            .flatten()
            .cloned()
            .collect())
    }

    fn explain_relevance(
        &self,
        _topic: &str,
        paper_title: &str,
        _project_summary: &str,
    ) -> ProviderResult<String> {
        self.enter("explanation", paper_title)?;
        self.explanations
            .get(paper_title)
            .cloned()
            .ok_or_else(|| ProviderError::Call {
                call: "explanation",
                subject: paper_title.to_string(),
                message: "unscripted".into(),
            })
    }
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
