//! The paper-selection pipeline.
//!
//! Stages run in a fixed order, each a full barrier over its fan-out:
//!
//! 1. concept extraction (fatal on failure)
//! 2. [`survey`]: survey papers per core concept
//! 3. [`seminal`]: seminal works per survey paper, folded into counts
//! 4. [`selection`]: HIGH/LOW split and strategy cut
//! 5. [`prune`]: yes/no relevance per selected paper
//! 6. [`explain`]: optional relevance explanations
//! 7. [`enrich`]: foundational topics, then resources
//! 8. tree assembly
//!
//! Only concept extraction can fail the run. Every later failure is local to
//! one unit of work and ends up in that stage's [`StageReport`].

pub mod enrich;
pub mod explain;
pub mod pool;
pub mod prune;
pub mod report;
pub mod selection;
pub mod seminal;
pub mod survey;

#[cfg(test)]
pub(crate) mod testing;

use serde::Serialize;
use tracing::{info, warn};

use crate::artifact::ArtifactSink;
use crate::concept::{ConceptExtractor, ConceptSet, ProjectDescription};
use crate::config::PipelineConfig;
use crate::error::PrereqResult;
use crate::provider::ReferenceProvider;
use crate::tree::{KnowledgeTree, TreeInputs};

use self::enrich::{EnrichContext, EnrichedTopics};
use self::explain::Explanations;
use self::pool::WorkerPool;
use self::prune::PruneContext;
use self::report::StageReport;
use self::selection::{Ranker, SelectedSet};
use self::seminal::SeminalOutput;
use self::survey::SurveyResults;

/// Everything one run produced.
#[derive(Debug)]
pub struct PipelineOutput {
    pub concepts: ConceptSet,
    pub surveys: SurveyResults,
    pub seminal: SeminalOutput,
    pub selected: SelectedSet,
    pub pruned: SelectedSet,
    pub explanations: Explanations,
    pub topics: EnrichedTopics,
    pub tree: KnowledgeTree,
    /// One report per fan-out stage, in run order.
    pub reports: Vec<StageReport>,
}

impl PipelineOutput {
    pub fn failed_tasks(&self) -> usize {
        self.reports.iter().map(|r| r.failures.len()).sum()
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    pool: WorkerPool,
    extractor: Box<dyn ConceptExtractor>,
    provider: Box<dyn ReferenceProvider>,
    sink: Box<dyn ArtifactSink>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        extractor: Box<dyn ConceptExtractor>,
        provider: Box<dyn ReferenceProvider>,
        sink: Box<dyn ArtifactSink>,
    ) -> PrereqResult<Self> {
        let pool = WorkerPool::new(config.workers)?;
        Ok(Self {
            config,
            pool,
            extractor,
            provider,
            sink,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extract concepts from the project, then run every later stage.
    pub fn run(&self, project: &ProjectDescription) -> PrereqResult<PipelineOutput> {
        let concepts = self.extractor.extract(project)?;
        Ok(self.run_with_concepts(concepts))
    }

    /// Run the stages after concept extraction. Cannot fail.
    pub fn run_with_concepts(&self, concepts: ConceptSet) -> PipelineOutput {
        let cfg = &self.config;
        let provider = self.provider.as_ref();
        let mut reports = Vec::new();
        info!(
            project = %concepts.project_title,
            core = concepts.core_concepts.len(),
            workers = self.pool.threads(),
            "pipeline started"
        );

        let (surveys, report) = survey::collect_surveys(
            &self.pool,
            provider,
            &concepts.core_concepts,
            cfg.survey_papers_per_concept,
        );
        reports.push(report);
        self.dump("survey_papers", &surveys);

        let (seminal, report) =
            seminal::aggregate_seminal(&self.pool, provider, &surveys, cfg.seminal_works_per_paper);
        reports.push(report);
        self.dump("seminal_counts", &seminal.counts);
        self.dump("top_references", &seminal.top_references);

        let ranker = Ranker {
            pool: &self.pool,
            provider,
            project_summary: &concepts.project_summary,
        };
        let (selected, report) = cfg.selection_policy().select(&seminal.counts, ranker);
        reports.push(report);
        self.dump("selected_papers", &selected);

        let (pruned, report) = prune::prune_selected(
            &self.pool,
            provider,
            &selected,
            PruneContext {
                project_summary: &concepts.project_summary,
                specialized_concepts: &concepts.specialized_concepts,
            },
        );
        reports.push(report);
        self.dump("pruned_papers", &pruned);

        let explanations = if cfg.explain_papers {
            let (explanations, report) =
                explain::explain_papers(&self.pool, provider, &pruned, &concepts.project_summary);
            reports.push(report);
            explanations
        } else {
            Explanations::new()
        };

        let (topics, enrich_reports) = enrich::enrich_papers(
            &self.pool,
            provider,
            &pruned,
            EnrichContext {
                fundamental_concepts: &concepts.fundamental_concepts,
                core_concepts: &concepts.core_concepts,
                dedupe: cfg.dedupe_enrichment,
            },
        );
        reports.push(enrich_reports.topics);
        reports.push(enrich_reports.resources);
        self.dump("foundational_topics", &topics);

        let tree = KnowledgeTree::assemble(&TreeInputs {
            project_title: &concepts.project_title,
            core_concepts: &concepts.core_concepts,
            pruned: &pruned,
            topics: &topics,
            explanations: &explanations,
        });
        self.dump("knowledge_tree", &tree.export());

        let failed: usize = reports.iter().map(|r| r.failures.len()).sum();
        info!(
            nodes = tree.node_count(),
            edges = tree.edge_count(),
            failed_tasks = failed,
            "pipeline finished"
        );

        PipelineOutput {
            concepts,
            surveys,
            seminal,
            selected,
            pruned,
            explanations,
            topics,
            tree,
            reports,
        }
    }

    /// Hand a stage output to the sink. Failures are logged, never fatal.
    fn dump<T: Serialize + ?Sized>(&self, name: &str, value: &T) {
        if !self.config.dump_intermediate {
            return;
        }
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(artifact = name, error = %e, "could not serialize artifact");
                return;
            }
        };
        match self.sink.write_json(name, &value) {
            Ok(Some(path)) => info!(artifact = name, path = %path.display(), "wrote artifact"),
            Ok(None) => {}
            Err(e) => warn!(artifact = name, error = %e, "could not write artifact"),
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("workers", &self.pool.threads())
            .field("selection", &self.config.selection)
            .finish_non_exhaustive()
    }
}
