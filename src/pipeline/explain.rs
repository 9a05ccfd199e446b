//! Optional relevance explanations for pruned papers.

use indexmap::IndexMap;
use tracing::info;

use crate::provider::ReferenceProvider;

use super::pool::WorkerPool;
use super::report::StageReport;
use super::selection::SelectedSet;

/// Paper title → why it matters. Papers whose call failed are absent.
pub type Explanations = IndexMap<String, String>;

/// One explanation per (concept, paper) pair; for a paper under several
/// concepts the last concept's explanation is kept.
pub fn explain_papers(
    pool: &WorkerPool,
    provider: &dyn ReferenceProvider,
    pruned: &SelectedSet,
    project_summary: &str,
) -> (Explanations, StageReport) {
    let pairs: Vec<(&str, &str)> = pruned
        .iter()
        .flat_map(|(concept, titles)| titles.iter().map(move |t| (concept.as_str(), t.as_str())))
        .collect();

    let outcomes = pool.fan_out(&pairs, |&(topic, paper)| {
        provider.explain_relevance(topic, paper, project_summary)
    });

    let mut report = StageReport::new("explain");
    let mut explanations = Explanations::new();
    for (&(_, paper), outcome) in pairs.iter().zip(outcomes) {
        report.tasks += 1;
        match outcome {
            Ok(text) => {
                explanations.insert(paper.to_string(), text);
            }
            Err(err) => report.record_failure(paper, &err),
        }
    }
    info!(explained = explanations.len(), "relevance explanations");
    (explanations, report)
}
