//! Survey collection: one survey-paper lookup per core concept.

use indexmap::IndexMap;
use tracing::info;

use crate::provider::{CandidatePaper, ReferenceProvider};

use super::pool::WorkerPool;
use super::report::StageReport;

/// Core concept → survey papers found for it, in concept order.
pub type SurveyResults = IndexMap<String, Vec<CandidatePaper>>;

/// Fan out one survey lookup per core concept. A failed lookup leaves the
/// concept with no papers.
pub fn collect_surveys(
    pool: &WorkerPool,
    provider: &dyn ReferenceProvider,
    core_concepts: &[String],
    per_concept: usize,
) -> (SurveyResults, StageReport) {
    let outcomes = pool.fan_out(core_concepts, |concept| {
        provider.survey_papers(concept, per_concept)
    });

    let mut report = StageReport::new("survey");
    let mut surveys = SurveyResults::new();
    for (concept, outcome) in core_concepts.iter().zip(outcomes) {
        let papers = report.settle(concept, outcome);
        info!(concept = %concept, papers = papers.len(), "survey papers");
        surveys.insert(concept.clone(), papers);
    }
    (surveys, report)
}
