//! Seminal-work aggregation.
//!
//! Every (concept, survey paper) pair gets one independent seminal-works
//! lookup. Tasks only return their own reference list; the counts are folded
//! into the [`FrequencyTable`] on the calling thread after the barrier, so
//! the result does not depend on completion order.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::provider::{ReferenceProvider, SeminalWork};

use super::pool::WorkerPool;
use super::report::StageReport;
use super::survey::SurveyResults;

/// Reference title → number of distinct survey papers citing it.
pub type TitleCounts = IndexMap<String, usize>;

/// Core concept → title counts. Titles keep their discovery order, which
/// breaks ties in selection. Equality ignores order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyTable {
    concepts: IndexMap<String, TitleCounts>,
}

/// One task's output: the references a survey paper returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeminalDelta {
    pub concept: String,
    pub source: String,
    pub references: Vec<SeminalWork>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure a concept is present, even with no titles.
    pub fn ensure_concept(&mut self, concept: &str) {
        if !self.concepts.contains_key(concept) {
            self.concepts.insert(concept.to_string(), TitleCounts::new());
        }
    }

    /// Fold deltas into a table. Each title counts once per distinct source
    /// paper within a concept, however often that source lists it.
    pub fn fold<I>(deltas: I) -> Self
    where
        I: IntoIterator<Item = SeminalDelta>,
    {
        let mut table = Self::new();
        let mut seen: HashSet<(String, String, String)> = HashSet::new();
        for delta in deltas {
            table.ensure_concept(&delta.concept);
            for work in delta.references {
                let title = work.title.trim();
                if title.is_empty() {
                    continue;
                }
                let key = (delta.concept.clone(), delta.source.clone(), title.to_string());
                if !seen.insert(key) {
                    continue;
                }
                if let Some(counts) = table.concepts.get_mut(&delta.concept) {
                    *counts.entry(title.to_string()).or_insert(0) += 1;
                }
            }
        }
        table
    }

    pub fn concepts(&self) -> impl Iterator<Item = (&String, &TitleCounts)> {
        self.concepts.iter()
    }

    pub fn counts(&self, concept: &str) -> Option<&TitleCounts> {
        self.concepts.get(concept)
    }

    pub fn count(&self, concept: &str, title: &str) -> usize {
        self.counts(concept)
            .and_then(|c| c.get(title))
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

impl FromIterator<(String, TitleCounts)> for FrequencyTable {
    fn from_iter<T: IntoIterator<Item = (String, TitleCounts)>>(iter: T) -> Self {
        Self {
            concepts: iter.into_iter().collect(),
        }
    }
}

/// Concept → survey paper → the raw references it returned.
pub type TopReferences = IndexMap<String, IndexMap<String, Vec<SeminalWork>>>;

/// Output of the aggregation stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeminalOutput {
    pub counts: FrequencyTable,
    pub top_references: TopReferences,
}

/// Fan out one seminal-works lookup per (concept, survey paper) pair and
/// fold the results. A failed lookup contributes an empty reference list.
pub fn aggregate_seminal(
    pool: &WorkerPool,
    provider: &dyn ReferenceProvider,
    surveys: &SurveyResults,
    per_paper: usize,
) -> (SeminalOutput, StageReport) {
    let pairs: Vec<(&str, &str)> = surveys
        .iter()
        .flat_map(|(concept, papers)| {
            papers
                .iter()
                .map(move |p| (concept.as_str(), p.title.as_str()))
        })
        .collect();

    let outcomes = pool.fan_out(&pairs, |&(_, title)| provider.seminal_works(title, per_paper));

    let mut report = StageReport::new("seminal");
    let mut top_references = TopReferences::new();
    let mut deltas = Vec::with_capacity(pairs.len());
    for (&(concept, source), outcome) in pairs.iter().zip(outcomes) {
        let references = report.settle(source, outcome);
        let per_concept = top_references.entry(concept.to_string()).or_default();
        let listed = per_concept.entry(source.to_string()).or_default();
        for work in &references {
            if !listed.iter().any(|w| w.title == work.title) {
                listed.push(work.clone());
            }
        }
        deltas.push(SeminalDelta {
            concept: concept.to_string(),
            source: source.to_string(),
            references,
        });
    }

    let mut counts = FrequencyTable::fold(deltas);
    for concept in surveys.keys() {
        counts.ensure_concept(concept);
        top_references.entry(concept.clone()).or_default();
    }

    for (concept, titles) in counts.concepts() {
        let repeated = titles.values().filter(|&&c| c > 1).count();
        info!(concept = %concept, titles = titles.len(), repeated, "seminal counts");
    }

    (
        SeminalOutput {
            counts,
            top_references,
        },
        report,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{ScriptedProvider, strings};
    use crate::provider::CandidatePaper;

    fn delta(concept: &str, source: &str, refs: &[&str]) -> SeminalDelta {
        SeminalDelta {
            concept: concept.into(),
            source: source.into(),
            references: refs.iter().map(|r| SeminalWork::titled(*r)).collect(),
        }
    }

    #[test]
    fn fold_counts_distinct_sources() {
        let table = FrequencyTable::fold([
            delta("RL", "Survey A", &["Q-learning", "DQN", "Q-learning"]),
            delta("RL", "Survey B", &["Q-learning", "PPO"]),
            delta("Vision", "Survey C", &["Q-learning"]),
        ]);
        assert_eq!(table.count("RL", "Q-learning"), 2);
        assert_eq!(table.count("RL", "DQN"), 1);
        assert_eq!(table.count("RL", "PPO"), 1);
        assert_eq!(table.count("Vision", "Q-learning"), 1);
        assert_eq!(table.count("Vision", "DQN"), 0);
    }

    #[test]
    fn fold_is_order_independent() {
        let deltas = vec![
            delta("RL", "A", &["x", "y"]),
            delta("RL", "B", &["y", "z"]),
            delta("RL", "C", &["z", "x", "w"]),
            delta("Vision", "D", &["x"]),
        ];
        let forward = FrequencyTable::fold(deltas.clone());
        let backward = FrequencyTable::fold(deltas.iter().rev().cloned());
        let mut shuffled = deltas.clone();
        shuffled.swap(0, 2);
        shuffled.swap(1, 3);
        assert_eq!(forward, backward);
        assert_eq!(forward, FrequencyTable::fold(shuffled));
    }

    #[test]
    fn aggregate_tracks_references_and_failures() {
        let mut provider = ScriptedProvider::default();
        provider
            .seminal
            .insert("Survey A".into(), strings(&["Sutton 1998", "DQN"]));
        provider
            .seminal
            .insert("Survey B".into(), strings(&["Sutton 1998"]));
        provider.fail.insert(("seminal-works", "Survey C".into()));

        let mut surveys = SurveyResults::new();
        surveys.insert(
            "RL".into(),
            vec![
                CandidatePaper::titled("Survey A"),
                CandidatePaper::titled("Survey B"),
                CandidatePaper::titled("Survey C"),
            ],
        );
        surveys.insert("Empty".into(), Vec::new());

        let pool = WorkerPool::new(4).unwrap();
        let (out, report) = aggregate_seminal(&pool, &provider, &surveys, 5);

        assert_eq!(out.counts.count("RL", "Sutton 1998"), 2);
        assert_eq!(out.counts.count("RL", "DQN"), 1);
        assert_eq!(out.counts.counts("Empty").map(|c| c.len()), Some(0));
        assert_eq!(out.top_references["RL"]["Survey A"].len(), 2);
        assert!(out.top_references["RL"]["Survey C"].is_empty());
        assert!(out.top_references["Empty"].is_empty());
        assert_eq!(report.tasks, 3);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn table_serializes_as_nested_map() {
        let table = FrequencyTable::fold([delta("RL", "A", &["x"])]);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json, serde_json::json!({"RL": {"x": 1}}));
        let back: FrequencyTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }
}
