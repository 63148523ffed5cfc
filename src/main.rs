use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use translation_catalog::catalog::ValidationReport;
use translation_catalog::config::Config;
use translation_catalog::storage::FsStorage;
use translation_catalog::translation::DeepLProvider;
use translation_catalog::workflow::Workflow;

#[derive(Debug, Parser)]
#[command(name = "translation-catalog")]
#[command(about = "Maintain gettext PO/MO translation catalogs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Compute everything but write no catalog, backup or MO file
    #[arg(long, global = true)]
    dry_run: bool,

    /// Strings per translation request
    #[arg(long, global = true, value_name = "N")]
    batch_size: Option<usize>,

    /// DeepL API key (overrides DEEPL_API_KEY)
    #[arg(long, global = true, value_name = "KEY")]
    api_key: Option<String>,

    /// Minimum coverage percentage for validate
    #[arg(long, global = true, value_name = "PERCENT")]
    min_coverage: Option<f64>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Report coverage of the PO file against the template
    Analyze,
    /// Export untranslated strings as CSV, JSON and a text template
    Extract,
    /// Machine-translate untranslated strings via DeepL
    Translate,
    /// Merge translations from a CSV, JSON or text template file
    Import {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
    /// Alias of import
    Merge {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
    /// Compile the PO file to MO
    Compile,
    /// Validate coverage and quality; exits 1 when the gate fails
    Validate,
    /// Analyze, extract, translate, compile and validate
    Full,
}

impl Cli {
    /// Apply command-line overrides on top of the environment.
    fn apply(&self, config: &mut Config) -> Result<()> {
        config.dry_run = self.dry_run;
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(api_key) = &self.api_key {
            config.deepl_api_key = Some(api_key.clone());
        }
        if let Some(min_coverage) = self.min_coverage {
            config.min_coverage = min_coverage;
            config.warn_coverage = config.warn_coverage.max(min_coverage);
        }
        config.validate()
    }
}

fn gate_exit_code(report: &ValidationReport) -> ExitCode {
    println!("{}", report);
    if report.passes_gate() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file (ignored in CI)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("translation_catalog={}", level).parse()?),
        )
        .init();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    cli.apply(&mut config)?;
    if config.dry_run {
        info!("Dry run mode - no files will be written");
    }

    let provider = match &config.deepl_api_key {
        Some(_) => Some(DeepLProvider::from_config(reqwest::Client::new(), &config)?),
        None => None,
    };
    let workflow = Workflow::new(FsStorage, config);

    match cli.command {
        Command::Analyze => {
            let analysis = workflow.analyze()?;
            println!("{}", analysis.report);
        }
        Command::Extract => match workflow.extract()? {
            Some(paths) => {
                println!("CSV:      {}", paths.csv.display());
                println!("JSON:     {}", paths.json.display());
                println!("Template: {}", paths.template.display());
            }
            None => println!("Nothing to extract."),
        },
        Command::Translate => {
            let provider = provider.context(
                "DeepL API key not configured. Set DEEPL_API_KEY or pass --api-key.",
            )?;
            let summary = workflow.translate(&provider).await?;
            info!(
                "Translated {}/{} strings, {} entries updated, {} failed batches",
                summary.translated, summary.requested, summary.updated, summary.failed_batches
            );
        }
        Command::Import { input } | Command::Merge { input } => {
            let outcome = workflow
                .import(&input)
                .with_context(|| format!("Failed to import {}", input.display()))?;
            info!("{} translations updated", outcome.updated);
        }
        Command::Compile => {
            if let Some(stats) = workflow.compile()? {
                info!("Compiled {} strings ({} bytes)", stats.strings, stats.bytes);
            }
        }
        Command::Validate => {
            let report = workflow.validate()?;
            return Ok(gate_exit_code(&report));
        }
        Command::Full => {
            let report = workflow.full(provider.as_ref()).await?;
            return Ok(gate_exit_code(&report));
        }
    }

    Ok(ExitCode::SUCCESS)
}
