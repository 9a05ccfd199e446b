//! Paper selection over a seminal frequency table.
//!
//! Per concept, titles cited by more than one survey paper (HIGH) are always
//! kept. Titles cited once (LOW) are ranked and cut by the configured
//! strategy, then appended after HIGH.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::provider::ReferenceProvider;

use super::pool::WorkerPool;
use super::report::StageReport;
use super::seminal::{FrequencyTable, TitleCounts};

/// Concept → selected titles, in selection rank.
pub type SelectedSet = IndexMap<String, Vec<String>>;

/// How LOW titles are ranked and cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Keep `max(1, floor(fraction * |LOW|))` titles in discovery order.
    #[default]
    Quota,
    /// Ask the provider to rank LOW against the project summary.
    AgentRanked,
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quota => write!(f, "quota"),
            Self::AgentRanked => write!(f, "agent-ranked"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionPolicy {
    pub strategy: SelectionStrategy,
    pub low_quota_fraction: f64,
    pub ranked_top_n: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::Quota,
            low_quota_fraction: 0.3,
            ranked_top_n: 6,
        }
    }
}

/// Titles of one concept partitioned by count, each in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub high: Vec<String>,
    pub low: Vec<String>,
}

/// Partition a concept's titles into HIGH (count > 1) and LOW (count == 1).
pub fn split(counts: &TitleCounts) -> Split {
    let mut out = Split::default();
    for (title, &count) in counts {
        match count {
            0 => {}
            1 => out.low.push(title.clone()),
            _ => out.high.push(title.clone()),
        }
    }
    out
}

/// LOW titles kept by the quota strategy.
pub fn quota_size(low_len: usize, fraction: f64) -> usize {
    if low_len == 0 {
        return 0;
    }
    let raw = (fraction * low_len as f64).floor() as usize;
    raw.max(1).min(low_len)
}

/// What the agent-ranked strategy needs to reach the provider.
#[derive(Clone, Copy)]
pub struct Ranker<'a> {
    pub pool: &'a WorkerPool,
    pub provider: &'a dyn ReferenceProvider,
    pub project_summary: &'a str,
}

impl SelectionPolicy {
    pub fn quota(fraction: f64) -> Self {
        Self {
            strategy: SelectionStrategy::Quota,
            low_quota_fraction: fraction,
            ..Self::default()
        }
    }

    /// Quota selection. Pure; needs no provider.
    pub fn select_quota(&self, table: &FrequencyTable) -> SelectedSet {
        table
            .concepts()
            .map(|(concept, counts)| {
                let Split { mut high, low } = split(counts);
                let mut ranked: Vec<(&String, usize)> = low
                    .iter()
                    .map(|t| (t, counts.get(t).copied().unwrap_or(0)))
                    .collect();
                // Stable: equal counts stay in discovery order.
                ranked.sort_by(|a, b| b.1.cmp(&a.1));
                let keep = quota_size(low.len(), self.low_quota_fraction);
                high.extend(ranked.into_iter().take(keep).map(|(t, _)| t.clone()));
                (concept.clone(), high)
            })
            .collect()
    }

    /// Select per concept with the configured strategy. The ranker is only
    /// consulted for [`SelectionStrategy::AgentRanked`].
    pub fn select(&self, table: &FrequencyTable, ranker: Ranker<'_>) -> (SelectedSet, StageReport) {
        let mut report = StageReport::new("selection");
        let selected = match self.strategy {
            SelectionStrategy::Quota => self.select_quota(table),
            SelectionStrategy::AgentRanked => self.select_ranked(table, ranker, &mut report),
        };
        for (concept, titles) in &selected {
            info!(
                concept = %concept,
                strategy = %self.strategy,
                selected = titles.len(),
                "selected papers"
            );
        }
        (selected, report)
    }

    fn select_ranked(
        &self,
        table: &FrequencyTable,
        ranker: Ranker<'_>,
        report: &mut StageReport,
    ) -> SelectedSet {
        let splits: Vec<(&String, Split)> = table
            .concepts()
            .map(|(concept, counts)| (concept, split(counts)))
            .collect();
        let pending: Vec<(&str, &[String])> = splits
            .iter()
            .filter(|(_, s)| !s.low.is_empty())
            .map(|(c, s)| (c.as_str(), s.low.as_slice()))
            .collect();

        let outcomes = ranker.pool.fan_out(&pending, |&(concept, low)| {
            ranker
                .provider
                .rank_relevance(concept, ranker.project_summary, low, self.ranked_top_n)
        });

        let mut ranked: IndexMap<&str, Vec<String>> = IndexMap::new();
        for (&(concept, low), outcome) in pending.iter().zip(outcomes) {
            let returned = report.settle(concept, outcome);
            let kept = filter_ranked(returned, low, self.ranked_top_n);
            debug!(concept, candidates = low.len(), kept = kept.len(), "ranked low-count titles");
            ranked.insert(concept, kept);
        }

        splits
            .into_iter()
            .map(|(concept, Split { mut high, .. })| {
                if let Some(low) = ranked.swap_remove(concept.as_str()) {
                    high.extend(low);
                }
                (concept.clone(), high)
            })
            .collect()
    }
}

/// Keep ranker output that names a LOW title, once each, up to `top_n`.
/// Returned titles are mapped back to the LOW spelling.
fn filter_ranked(returned: Vec<String>, low: &[String], top_n: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    returned
        .iter()
        .filter_map(|t| match_low(t, low))
        .filter(|t| seen.insert(*t))
        .take(top_n)
        .cloned()
        .collect()
}

/// Exact match first, then ignoring case and runs of whitespace.
fn match_low<'a>(title: &str, low: &'a [String]) -> Option<&'a String> {
    let title = title.trim();
    low.iter().find(|l| l.as_str() == title).or_else(|| {
        let wanted = fold_title(title);
        low.iter().find(|l| fold_title(l) == wanted)
    })
}

fn fold_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
