use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use company_analyst::analysis::format_analysis;
use company_analyst::api::{self, AppState, Session};
use company_analyst::batch::{parse_batch_input, BatchRunner};
use company_analyst::config::ConfigSources;
use company_analyst::export::{export_results, timestamped_file_name, VALIDATION_PREFIX};
use company_analyst::providers::OpenAIProvider;
use company_analyst::validation::{run_validation, ValidationInputs, DEFAULT_VALIDATION_TEMPLATE};
use company_analyst::{AnalysisClient, PromptTemplate};

const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Parser)]
#[command(name = "company-analyst")]
#[command(about = "Company analysis through a chat-completion LLM API", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, help = "API key, overrides every other source")]
    api_key: Option<String>,

    #[arg(long, help = "Path to a .env file (defaults to ./.env when present)")]
    env_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the browser UI and JSON API
    Serve {
        #[arg(long, env = "PORT", default_value_t = 8501)]
        port: u16,

        #[arg(long, help = "Path to a .env file (defaults to ./.env when present)")]
        env_file: Option<PathBuf>,
    },
    /// Analyse a single company
    Analyze {
        #[arg(help = "Company name")]
        company: String,

        #[arg(long, help = "File containing the prompt template")]
        prompt_file: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Analyse every company in a JSON array file
    Batch {
        #[arg(help = "JSON file with an array of names or {\"name\": ...} objects")]
        input: PathBuf,

        #[arg(long, help = "File containing the prompt template")]
        prompt_file: Option<PathBuf>,

        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Validate a batch output against input and expected JSON
    Validate {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        expected: PathBuf,

        #[arg(long)]
        actual: PathBuf,

        #[arg(long, help = "File containing the validation prompt template")]
        prompt_file: Option<PathBuf>,

        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, env_file } => {
            let session = match read_env_file(env_file.as_deref())? {
                Some(content) => Session::with_env_content(&content),
                None => Session::default(),
            };
            api::serve(AppState::from_env(session), port).await?
        }
        Commands::Analyze {
            company,
            prompt_file,
            config,
        } => run_single(&company, prompt_file.as_deref(), &config).await?,
        Commands::Batch {
            input,
            prompt_file,
            output_dir,
            config,
        } => run_batch(&input, prompt_file.as_deref(), &output_dir, &config).await?,
        Commands::Validate {
            input,
            expected,
            actual,
            prompt_file,
            output_dir,
            config,
        } => {
            let inputs = ValidationInputs {
                input: Some(read_json(&input)?),
                expected: Some(read_json(&expected)?),
                actual: Some(read_json(&actual)?),
            };
            run_validate(&inputs, prompt_file.as_deref(), &output_dir, &config).await?
        }
    }

    Ok(())
}

fn read_env_file(path: Option<&Path>) -> Result<Option<String>> {
    match path {
        Some(path) => fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("Failed to read env file: {}", path.display())),
        None if Path::new(DEFAULT_ENV_FILE).exists() => Ok(Some(
            fs::read_to_string(DEFAULT_ENV_FILE).context("Failed to read .env file")?,
        )),
        None => Ok(None),
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn load_template(path: Option<&Path>) -> Result<PromptTemplate> {
    match path {
        Some(path) => Ok(PromptTemplate::new(
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read prompt file: {}", path.display()))?,
        )),
        None => Ok(PromptTemplate::default()),
    }
}

/// Resolves configuration first so a missing key fails before any request.
fn build_client(args: &ConfigArgs) -> Result<AnalysisClient> {
    let mut sources = ConfigSources::new().with_process_env();
    if let Some(content) = read_env_file(args.env_file.as_deref())? {
        sources = sources.with_env_block(&content);
    }
    if let Some(key) = &args.api_key {
        sources = sources.with_direct_key(key.clone());
    }

    let config = sources.resolve()?;
    log::info!(
        "Using model {} (key {})",
        config.model,
        config.masked_api_key()
    );
    let provider = OpenAIProvider::from_config(&config)?;
    Ok(AnalysisClient::new(Arc::new(provider), config))
}

async fn run_single(company: &str, prompt_file: Option<&Path>, args: &ConfigArgs) -> Result<()> {
    let template = load_template(prompt_file)?;
    let client = build_client(args)?;

    let result = client.analyze_company(&template, company).await?;
    if let Some(text) = &result.text {
        println!("{}", format_analysis(text));
    }
    Ok(())
}

async fn run_batch(
    input: &Path,
    prompt_file: Option<&Path>,
    output_dir: &Path,
    args: &ConfigArgs,
) -> Result<()> {
    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read batch file: {}", input.display()))?;
    let entries = parse_batch_input(&content)?;
    let template = load_template(prompt_file)?;
    let client = build_client(args)?;

    let report = BatchRunner::new(&client, &template)
        .run_with_progress(&entries, |progress| {
            eprintln!(
                "[{}/{}] {:.0}% processed",
                progress.completed,
                progress.total,
                progress.fraction() * 100.0
            );
        })
        .await;

    for result in &report.results {
        match (&result.text, &result.error) {
            (Some(text), _) => println!("{}:\n{}\n", result.company, format_analysis(text)),
            (None, Some(error)) => println!("{}: Error: {}\n", result.company, error),
            (None, None) => {}
        }
    }

    let path = export_results(&report.results, output_dir)?;
    println!(
        "Processed {} companies ({} succeeded, {} failed). Results written to {}",
        report.total_companies,
        report.succeeded,
        report.failed,
        path.display()
    );
    Ok(())
}

async fn run_validate(
    inputs: &ValidationInputs,
    prompt_file: Option<&Path>,
    output_dir: &Path,
    args: &ConfigArgs,
) -> Result<()> {
    let template = match prompt_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt file: {}", path.display()))?,
        None => DEFAULT_VALIDATION_TEMPLATE.to_string(),
    };
    let client = build_client(args)?;

    let report = run_validation(&client, &template, inputs).await?;
    println!("{}", serde_json::to_string_pretty(&report.validation_analysis)?);

    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(timestamped_file_name(VALIDATION_PREFIX, chrono::Local::now()));
    fs::write(&path, serde_json::to_string_pretty(&report)?)?;
    println!("Validation report written to {}", path.display());
    Ok(())
}
