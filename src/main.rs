//! prereq-tree CLI: knowledge-prerequisite trees for research projects.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use tracing::{info, warn};

use prereq_tree::artifact::{ArtifactSink, DirectorySink, file_stem};
use prereq_tree::concept::{LlmConceptExtractor, ProjectDescription};
use prereq_tree::config::{PipelineConfig, SurveySource};
use prereq_tree::error::PrereqResult;
use prereq_tree::llm::{LlmError, OllamaClient};
use prereq_tree::paths::{AppPaths, PathError, ensure_dir};
use prereq_tree::pipeline::Pipeline;
use prereq_tree::pipeline::pool::WorkerPool;
use prereq_tree::pipeline::selection::{Ranker, SelectionStrategy};
use prereq_tree::pipeline::seminal::FrequencyTable;
use prereq_tree::provider::ReferenceProvider;
use prereq_tree::provider::llm::LlmReferenceProvider;
use prereq_tree::provider::scholar::ScholarSurveyProvider;
use prereq_tree::render::{DotRenderer, GraphRenderer, HtmlRenderer, load_tree};
use prereq_tree::wiki::WikiExplorer;

#[derive(Parser)]
#[command(
    name = "prereq-tree",
    version,
    about = "Build knowledge-prerequisite trees for research projects"
)]
struct Cli {
    /// Config file (defaults to the XDG config file if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on a project description.
    Run {
        /// JSON file with a "description" (and optional "title") field.
        #[arg(long)]
        project: PathBuf,

        /// Output directory for dumps and the rendered tree.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Override the selection strategy.
        #[arg(long, value_enum)]
        selection: Option<StrategyArg>,

        /// Override the worker count (0 = one per CPU).
        #[arg(long)]
        workers: Option<usize>,

        /// Ask for a relevance explanation per kept paper.
        #[arg(long)]
        explain: bool,

        /// Skip intermediate JSON dumps.
        #[arg(long)]
        no_dump: bool,

        /// Rendered tree format.
        #[arg(long, value_enum, default_value = "html")]
        format: FormatArg,
    },

    /// Apply a selection policy to a saved seminal_counts dump.
    Select {
        /// seminal_counts JSON file.
        #[arg(long)]
        table: PathBuf,

        /// Override the selection strategy.
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Project summary for the agent-ranked strategy.
        #[arg(long, default_value = "")]
        summary: String,
    },

    /// Render a saved knowledge_tree dump.
    Render {
        /// knowledge_tree JSON file.
        #[arg(long)]
        tree: PathBuf,

        #[arg(long, value_enum, default_value = "html")]
        format: FormatArg,

        /// Output file (defaults to the tree file with the format's extension).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Explore a topic from its Wikipedia article.
    Explore {
        /// Article title, e.g. "Reinforcement learning".
        topic: String,

        /// Output directory for the exploration dump.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show or initialize the configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Write the default configuration to the config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Quota,
    AgentRanked,
}

impl From<StrategyArg> for SelectionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Quota => SelectionStrategy::Quota,
            StrategyArg::AgentRanked => SelectionStrategy::AgentRanked,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Html,
    Dot,
}

impl FormatArg {
    fn renderer(self) -> Box<dyn GraphRenderer> {
        match self {
            FormatArg::Html => Box::new(HtmlRenderer::default()),
            FormatArg::Dot => Box::new(DotRenderer),
        }
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let paths = AppPaths::resolve();
    let config_file = match (&cli.config, &paths) {
        (Some(path), _) => Some(path.clone()),
        (None, Ok(paths)) => Some(paths.config_file()),
        (None, Err(_)) => None,
    };
    let mut config = match (&cli.config, &config_file) {
        (Some(path), _) => PipelineConfig::load(path)?,
        (None, Some(path)) => PipelineConfig::load_or_default(path)?,
        (None, None) => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Run {
            project,
            output,
            selection,
            workers,
            explain,
            no_dump,
            format,
        } => {
            if let Some(strategy) = selection {
                config.selection = strategy.into();
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }
            config.explain_papers |= explain;
            if no_dump {
                config.dump_intermediate = false;
            }
            config.validate()?;

            // Fail on a bad project file before probing anything.
            let project = ProjectDescription::load(&project)?;
            let output_dir = resolve_output(output, &config, &paths)?;

            let model = connect_model(&config)?;
            let provider = build_provider(&config, model.clone());
            let pipeline = Pipeline::new(
                config.clone(),
                Box::new(LlmConceptExtractor::new(model)),
                provider,
                Box::new(DirectorySink::new(&output_dir)),
            )?;

            let result = pipeline.run(&project)?;

            let renderer = format.renderer();
            let target = output_dir.join(format!(
                "{}_tree.{}",
                file_stem(&result.concepts.project_title),
                renderer.extension()
            ));
            let written = renderer.render_to_file(&result.tree, &target)?;

            println!("Project: {}", result.concepts.project_title);
            println!(
                "Tree: {} nodes, {} edges -> {}",
                result.tree.node_count(),
                result.tree.edge_count(),
                written.display()
            );
            for report in &result.reports {
                println!("  {report}");
            }
            if result.failed_tasks() > 0 {
                println!(
                    "{} lookups failed; the tree may be missing papers or topics.",
                    result.failed_tasks()
                );
            }
        }

        Commands::Select {
            table,
            strategy,
            summary,
        } => {
            if let Some(strategy) = strategy {
                config.selection = strategy.into();
            }
            config.validate()?;
            let content = std::fs::read_to_string(&table).into_diagnostic()?;
            let counts: FrequencyTable = serde_json::from_str(&content).into_diagnostic()?;

            let policy = config.selection_policy();
            let selected = match policy.strategy {
                SelectionStrategy::Quota => policy.select_quota(&counts),
                SelectionStrategy::AgentRanked => {
                    let model = connect_model(&config)?;
                    let provider = build_provider(&config, model);
                    let pool = WorkerPool::new(config.workers)?;
                    let ranker = Ranker {
                        pool: &pool,
                        provider: provider.as_ref(),
                        project_summary: &summary,
                    };
                    let (selected, report) = policy.select(&counts, ranker);
                    if !report.is_clean() {
                        eprintln!("{report}");
                    }
                    selected
                }
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&selected).into_diagnostic()?
            );
        }

        Commands::Render { tree, format, out } => {
            let loaded = load_tree(&tree)?;
            let renderer = format.renderer();
            let out = out.unwrap_or_else(|| tree.with_extension(renderer.extension()));
            let written = renderer.render_to_file(&loaded, &out)?;
            println!(
                "Rendered {} nodes to {}",
                loaded.node_count(),
                written.display()
            );
        }

        Commands::Explore { topic, output } => {
            let output_dir = resolve_output(output, &config, &paths)?;
            let model = connect_model(&config)?;
            let exploration = WikiExplorer::new(model).explore(&topic)?;

            let value = serde_json::to_value(&exploration).into_diagnostic()?;
            let written = DirectorySink::new(&output_dir).write_json(&topic, &value)?;

            println!("Key concepts: {}", exploration.key_concepts.len());
            println!("Subtopics: {}", exploration.subtopics.len());
            println!("Researchers: {}", exploration.researchers.len());
            println!("References: {}", exploration.references.len());
            println!("\nSummary: {}", exploration.summary);
            if let Some(path) = written {
                println!("\nSaved to {}", path.display());
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", config.to_toml()?);
            }
            ConfigAction::Init { force } => {
                let Some(path) = config_file else {
                    miette::bail!("cannot determine a config path; pass --config <file>");
                };
                if path.exists() && !force {
                    miette::bail!(
                        "{} already exists; pass --force to overwrite",
                        path.display()
                    );
                }
                PipelineConfig::default().save(&path)?;
                println!("Wrote default config to {}", path.display());
            }
        },
    }

    Ok(())
}

/// `--output`, then the configured directory, then the XDG data directory.
fn resolve_output(
    flag: Option<PathBuf>,
    config: &PipelineConfig,
    paths: &std::result::Result<AppPaths, PathError>,
) -> PrereqResult<PathBuf> {
    let dir = match (flag, &config.output_dir, paths) {
        (Some(dir), _, _) => dir,
        (None, Some(dir), _) => dir.clone(),
        (None, None, Ok(paths)) => paths.output_dir(),
        (None, None, Err(_)) => PathBuf::from("output"),
    };
    ensure_dir(&dir)?;
    Ok(dir)
}

/// Probe Ollama and hand back a shareable client.
fn connect_model(config: &PipelineConfig) -> PrereqResult<Arc<OllamaClient>> {
    let mut client = OllamaClient::new(config.model.clone());
    if !client.probe() {
        return Err(LlmError::Unavailable {
            url: config.model.base_url.clone(),
        }
        .into());
    }
    if !client.has_model() {
        warn!(model = client.model(), "model not listed by Ollama; requests may fail");
    }
    info!(model = client.model(), "connected to Ollama");
    Ok(Arc::new(client))
}

fn build_provider(config: &PipelineConfig, model: Arc<OllamaClient>) -> Box<dyn ReferenceProvider> {
    let llm = LlmReferenceProvider::new(model, config.relevance_mode);
    match config.survey_source {
        SurveySource::Model => Box::new(llm),
        SurveySource::SemanticScholar => Box::new(ScholarSurveyProvider::new(
            config.scholar.clone(),
            config.survey_year_range.clone(),
            Box::new(llm),
        )),
    }
}
