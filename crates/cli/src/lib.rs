use anyhow::{Context as AnyhowContext, Result};
use archmap_enrich::{EnrichmentSummary, StaticOracle};
use archmap_pipeline::{load_facts, Pipeline, PipelineConfig, PipelineOutput, DEFAULT_REPOSITORY_NAME};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod report;

#[derive(Parser)]
#[command(name = "archmap")]
#[command(about = "Recover a C4 architecture model from collector facts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the model, metrics and diagrams from a fact file
    Recover(RecoverArgs),

    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args)]
struct RecoverArgs {
    /// Collector fact document (JSON)
    facts: PathBuf,

    /// Pipeline configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Canned oracle answers (JSON) used for enrichment
    #[arg(long)]
    annotations: Option<PathBuf>,

    /// Name of the recovered system (defaults to the fact file's directory)
    #[arg(long)]
    repo_name: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = "archmap-out")]
    output: PathBuf,

    /// Skip enrichment even when annotations are given
    #[arg(long)]
    no_enrich: bool,
}

#[derive(Args)]
struct ConfigArgs {
    /// Configuration file to validate and print
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct RecoverOutput {
    output_dir: String,
    files: Vec<String>,
    people: usize,
    systems: usize,
    containers: usize,
    components: usize,
    relationships: usize,
    enrichment: EnrichmentSummary,
    warnings: Vec<String>,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Recover(args) => run_recover(args).await,
        Commands::Config(args) => run_config(args),
    }
}

async fn run_recover(args: RecoverArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(name) = args.repo_name {
        config.repository_name = name;
    } else if config.repository_name == DEFAULT_REPOSITORY_NAME {
        if let Some(name) = repository_name_from(&args.facts) {
            config.repository_name = name;
        }
    }
    if args.no_enrich {
        config.enrichment.enabled = false;
    }
    config
        .validate()
        .map_err(|msg| anyhow::anyhow!("Invalid configuration: {msg}"))?;

    let facts = load_facts(&args.facts)
        .with_context(|| format!("Failed to load facts from {}", args.facts.display()))?;

    let mut pipeline = Pipeline::new(config);
    if let Some(path) = &args.annotations {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read annotations {}", path.display()))?;
        let oracle = StaticOracle::from_json(&raw)
            .with_context(|| format!("Invalid annotations in {}", path.display()))?;
        log::info!("Loaded {} canned annotations", oracle.len());
        pipeline = pipeline.with_oracle(Arc::new(oracle));
    }

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted; finishing with fallback descriptions");
                cancel.cancel();
            }
        })
    };

    let output = pipeline.run(facts, cancel).await;
    interrupt.abort();
    let output = output.context("Architecture recovery failed")?;

    for warning in &output.warnings {
        log::warn!("{warning}");
    }

    let files = write_outputs(&output, &args.output)?;
    let summary = RecoverOutput {
        output_dir: args.output.display().to_string(),
        files: files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect(),
        people: output.model.people.len(),
        systems: output.model.systems.len(),
        containers: output.model.containers.len(),
        components: output.model.components.len(),
        relationships: output.model.relationships.len(),
        enrichment: output.enrichment.summary(),
        warnings: output.warnings.iter().map(|w| w.to_string()).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_config(args: ConfigArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn repository_name_from(facts: &Path) -> Option<String> {
    let absolute = fs::canonicalize(facts).ok()?;
    absolute
        .parent()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.trim().is_empty())
}

fn write_outputs(output: &PipelineOutput, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut documents = vec![
        ("model.json".to_string(), output.model.to_json()?),
        (
            "metrics.json".to_string(),
            serde_json::to_string_pretty(&output.metrics)?,
        ),
        ("graph.json".to_string(), output.graph.to_json()?),
        ("summary.md".to_string(), report::render_summary(output)),
    ];
    documents.extend(
        output
            .diagrams()
            .into_iter()
            .map(|diagram| (diagram.file_name, diagram.content)),
    );

    let mut written = Vec::with_capacity(documents.len());
    for (name, content) in documents {
        let path = dir.join(&name);
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    log::info!("Wrote {} files to {}", written.len(), dir.display());
    Ok(written)
}
