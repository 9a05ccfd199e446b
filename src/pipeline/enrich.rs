//! Topic enrichment in two passes.
//!
//! Pass 1 asks for the foundational topics behind each pruned paper. Pass 2
//! starts only after pass 1 has settled for every paper and asks for one
//! resource per topic, for papers that got at least one topic.
//!
//! By default pass 1 runs once per (concept, paper) pair, so a paper listed
//! under two concepts is enriched twice; the later concept's answer is the
//! one kept. `dedupe` runs it once per distinct paper instead.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::provider::{FoundationalTopic, ReferenceProvider, TopicQuery};

use super::pool::WorkerPool;
use super::report::StageReport;
use super::selection::SelectedSet;

/// Paper title → its foundational topics with resources, in answer order.
pub type EnrichedTopics = IndexMap<String, Vec<FoundationalTopic>>;

#[derive(Debug, Clone, Copy)]
pub struct EnrichContext<'a> {
    /// Fundamental concepts offered as seeds.
    pub fundamental_concepts: &'a [String],
    /// Core concepts the answer must not repeat.
    pub core_concepts: &'a [String],
    pub dedupe: bool,
}

/// Reports for both passes.
#[derive(Debug, Clone)]
pub struct EnrichReports {
    pub topics: StageReport,
    pub resources: StageReport,
}

pub fn enrich_papers(
    pool: &WorkerPool,
    provider: &dyn ReferenceProvider,
    pruned: &SelectedSet,
    ctx: EnrichContext<'_>,
) -> (EnrichedTopics, EnrichReports) {
    let (topics, topic_report) = discover_topics(pool, provider, pruned, ctx);
    let (enriched, resource_report) = attach_resources(pool, provider, topics);
    info!(
        papers = enriched.len(),
        topics = enriched.values().map(Vec::len).sum::<usize>(),
        "enriched papers"
    );
    (
        enriched,
        EnrichReports {
            topics: topic_report,
            resources: resource_report,
        },
    )
}

fn discover_topics(
    pool: &WorkerPool,
    provider: &dyn ReferenceProvider,
    pruned: &SelectedSet,
    ctx: EnrichContext<'_>,
) -> (IndexMap<String, Vec<String>>, StageReport) {
    let mut papers: Vec<&str> = pruned.values().flatten().map(String::as_str).collect();
    if ctx.dedupe {
        let mut seen = HashSet::new();
        papers.retain(|p| seen.insert(*p));
    }

    let outcomes = pool.fan_out(&papers, |&paper_title| {
        provider.foundational_topics(&TopicQuery {
            paper_title,
            existing_concepts: ctx.fundamental_concepts,
            core_concepts: ctx.core_concepts,
        })
    });

    let mut report = StageReport::new("topics");
    let mut topics: IndexMap<String, Vec<String>> = IndexMap::new();
    for (&paper, outcome) in papers.iter().zip(outcomes) {
        let found = clean_topics(report.settle(paper, outcome));
        debug!(paper, topics = found.len(), "foundational topics");
        topics.insert(paper.to_string(), found);
    }
    (topics, report)
}

fn attach_resources(
    pool: &WorkerPool,
    provider: &dyn ReferenceProvider,
    topics: IndexMap<String, Vec<String>>,
) -> (EnrichedTopics, StageReport) {
    let pending: Vec<(&str, &[String])> = topics
        .iter()
        .filter(|(_, t)| !t.is_empty())
        .map(|(p, t)| (p.as_str(), t.as_slice()))
        .collect();

    let outcomes = pool.fan_out(&pending, |&(paper, list)| provider.topic_resources(paper, list));

    let mut report = StageReport::new("resources");
    let mut resources: IndexMap<&str, IndexMap<String, String>> = IndexMap::new();
    for (&(paper, _), outcome) in pending.iter().zip(outcomes) {
        resources.insert(paper, report.settle(paper, outcome));
    }

    let enriched = topics
        .iter()
        .map(|(paper, list)| {
            let found = resources.get(paper.as_str());
            let entries: Vec<FoundationalTopic> = list
                .iter()
                .map(|topic| FoundationalTopic {
                    topic: topic.clone(),
                    resource: found.and_then(|r| lookup_resource(r, topic)),
                })
                .collect();
            (paper.clone(), entries)
        })
        .collect();
    (enriched, report)
}

/// Trim, drop blanks and repeats.
fn clean_topics(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect()
}

/// Exact key first, then case-insensitive. Blank resources count as absent.
fn lookup_resource(resources: &IndexMap<String, String>, topic: &str) -> Option<String> {
    resources
        .get(topic)
        .or_else(|| {
            resources
                .iter()
                .find(|(k, _)| k.trim().eq_ignore_ascii_case(topic))
                .map(|(_, v)| v)
        })
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}
