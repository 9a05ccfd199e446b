//! Relevance pruning: one independent yes/no judgment per selected paper.

use tracing::info;

use crate::provider::{ReferenceProvider, RelevanceQuery};

use super::pool::WorkerPool;
use super::report::StageReport;
use super::selection::SelectedSet;

/// Context shared by every judgment.
#[derive(Debug, Clone, Copy)]
pub struct PruneContext<'a> {
    pub project_summary: &'a str,
    pub specialized_concepts: &'a [String],
}

/// Keep a title only when its judgment comes back relevant. Failed calls
/// drop the title like a "no" would. Order is preserved and every concept
/// stays present, possibly empty.
pub fn prune_selected(
    pool: &WorkerPool,
    provider: &dyn ReferenceProvider,
    selected: &SelectedSet,
    ctx: PruneContext<'_>,
) -> (SelectedSet, StageReport) {
    let pairs: Vec<(&str, &str)> = selected
        .iter()
        .flat_map(|(concept, titles)| titles.iter().map(move |t| (concept.as_str(), t.as_str())))
        .collect();

    let verdicts = pool.fan_out(&pairs, |&(topic, paper_title)| {
        provider.judge_relevance(&RelevanceQuery {
            topic,
            paper_title,
            project_summary: ctx.project_summary,
            specialized_concepts: ctx.specialized_concepts,
        })
    });

    let mut report = StageReport::new("prune");
    let mut pruned: SelectedSet = selected.keys().map(|c| (c.clone(), Vec::new())).collect();
    for (&(concept, title), verdict) in pairs.iter().zip(verdicts) {
        report.tasks += 1;
        match verdict {
            Ok(v) if v.is_relevant() => {
                if let Some(kept) = pruned.get_mut(concept) {
                    kept.push(title.to_string());
                }
            }
            Ok(_) => {}
            Err(err) => report.record_failure(title, &err),
        }
    }

    for (concept, kept) in &pruned {
        let before = selected.get(concept).map_or(0, Vec::len);
        info!(concept = %concept, before, after = kept.len(), "pruned papers");
    }
    (pruned, report)
}
