mod config;
mod persistence;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;

use promptloops_core::{LoopRunner, OptimizationOutcome, OptimizerConfig, Termination};
use promptloops_eval::{load_samples, Sample, SchemaDescriptor};
use promptloops_logging::{init_tracing, LogFormat, Logger, RunStart, RunWriter};
use promptloops_provider::{create_provider, ProviderConfig, ProviderType};

use config::ProjectConfig;

const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Parser, Debug)]
#[command(
    name = "promptloops",
    about = "Iterative prompt optimization for structured extraction",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Optimize an extraction prompt against a labeled dataset
    Run(RunArgs),
    /// Print the synthesized starting prompt and the JSON schema
    Schema(SchemaArgs),
    /// Print the best prompt from a saved run
    Best(BestArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Labeled dataset (.jsonl or .json)
    #[arg(short, long, env = "PROMPTLOOPS_DATA")]
    data: PathBuf,

    /// Use only the first N samples
    #[arg(short = 's', long, env = "PROMPTLOOPS_SAMPLES")]
    samples: Option<usize>,

    /// Initial prompt (synthesized from the fields when omitted)
    #[arg(short, long, conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Read the initial prompt from a file
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Number of iterations
    #[arg(short = 'n', long, env = "PROMPTLOOPS_LOOPS", allow_negative_numbers = true)]
    loops: Option<i64>,

    /// Past iterations shown to the mentor
    #[arg(short = 'w', long, env = "PROMPTLOOPS_WINDOW_SIZE", allow_negative_numbers = true)]
    window_size: Option<i64>,

    /// Concurrent extraction calls per iteration
    #[arg(long, env = "PROMPTLOOPS_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Directory for results.json, best_prompt.md and iterations.md
    #[arg(short, long, env = "PROMPTLOOPS_OUTPUT", default_value = "promptloops-output")]
    output: PathBuf,

    /// Diagnostic log level (RUST_LOG overrides)
    #[arg(long, env = "PROMPTLOOPS_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log output format: pretty, json or compact
    #[arg(long, env = "PROMPTLOOPS_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    /// Also append JSON events to this file
    #[arg(long, env = "PROMPTLOOPS_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Provider for both agent and mentor
    #[arg(long, value_enum, env = "PROMPTLOOPS_PROVIDER")]
    provider: Option<ProviderChoice>,

    /// Model for the extraction agent
    #[arg(long, env = "PROMPTLOOPS_AGENT_MODEL")]
    agent_model: Option<String>,

    /// Model for the mentor
    #[arg(long, env = "PROMPTLOOPS_MENTOR_MODEL")]
    mentor_model: Option<String>,

    /// Per-call timeout in seconds
    #[arg(long, env = "PROMPTLOOPS_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Output final result as JSON
    #[arg(long)]
    json_output: bool,

    /// Dry run: show what would happen without calling any model
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Infer fields from this dataset when promptloops.toml declares none
    #[arg(short, long)]
    data: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BestArgs {
    /// Output directory of a previous run
    #[arg(short, long, env = "PROMPTLOOPS_OUTPUT", default_value = "promptloops-output")]
    output: PathBuf,

    /// Print the whole best record as JSON
    #[arg(long)]
    json_output: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderChoice {
    Claude,
    Opencode,
}

impl From<ProviderChoice> for ProviderType {
    fn from(choice: ProviderChoice) -> Self {
        match choice {
            ProviderChoice::Claude => ProviderType::ClaudeCode,
            ProviderChoice::Opencode => ProviderType::OpenCode,
        }
    }
}

/// Everything resolved from flags, environment and the project file
struct RunPlan {
    samples: Vec<Sample>,
    schema: SchemaDescriptor,
    optimizer: OptimizerConfig,
    initial_prompt: Option<String>,
    agent_type: ProviderType,
    mentor_type: ProviderType,
    agent_model: Option<String>,
    mentor_model: Option<String>,
    timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let project = ProjectConfig::load(&working_dir)?.unwrap_or_default();

    match cli.command {
        Command::Run(args) => {
            init_tracing(&args.log_level, args.log_format);
            let code = run(args, project, &working_dir).await?;
            std::process::exit(code);
        }
        Command::Schema(args) => print_schema(args, &project),
        Command::Best(args) => print_best(args),
    }
}

async fn run(args: RunArgs, project: ProjectConfig, working_dir: &Path) -> Result<i32> {
    let plan = resolve_plan(&args, &project)?;

    if args.dry_run {
        print_plan(&args, &plan);
        return Ok(0);
    }

    let agent = create_provider(plan.agent_type);
    let mentor = create_provider(plan.mentor_type);

    if !agent.is_available().await {
        anyhow::bail!(
            "Agent provider '{}' is not available. Make sure it's installed and in PATH.",
            agent.name()
        );
    }
    if !mentor.is_available().await {
        anyhow::bail!(
            "Mentor provider '{}' is not available. Make sure it's installed and in PATH.",
            mentor.name()
        );
    }

    let logger = match &args.log_file {
        Some(path) => Logger::with_file(args.log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(args.log_format),
    };

    let agent_config = role_config(working_dir, plan.timeout, plan.agent_model.clone());
    let mentor_config = role_config(working_dir, plan.timeout, plan.mentor_model.clone());

    let journal_prompt = plan
        .initial_prompt
        .clone()
        .unwrap_or_else(|| plan.schema.synthesize_prompt());
    let journal = match RunWriter::new(&journal_prompt) {
        Ok(writer) => Some(writer),
        Err(e) => {
            tracing::warn!(error = %e, "Run journal disabled");
            None
        }
    };
    if let Some(ref journal) = journal {
        journal.write_start(&RunStart {
            initial_prompt: &journal_prompt,
            dataset: Some(args.data.as_path()),
            samples: plan.samples.len(),
            agent_provider: agent.name(),
            mentor_provider: mentor.name(),
            agent_model: plan.agent_model.as_deref(),
            mentor_model: plan.mentor_model.as_deref(),
            loop_count: plan.optimizer.loop_count,
            window_size: plan.optimizer.window_size,
        });
    }

    let mut runner = LoopRunner::new(
        agent.as_ref(),
        mentor.as_ref(),
        &plan.schema,
        plan.optimizer.clone(),
        Arc::new(logger),
    )?
    .with_agent_config(agent_config)
    .with_mentor_config(mentor_config);
    if let Some(ref journal) = journal {
        runner = runner.with_journal(journal);
    }

    let outcome = runner.run(&plan.samples, plan.initial_prompt.clone()).await?;

    let saved = persistence::save_results(&outcome, &args.output)?;

    if args.json_output {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "termination": outcome.termination,
            "best": outcome.best(),
            "metrics": outcome.metrics(),
            "output_dir": args.output,
        }))?;
        println!("{}", json);
    } else {
        print_outcome(&outcome);
        eprintln!("Results: {}", saved.results.display());
        eprintln!("Best prompt: {}", saved.best_prompt.display());
        if let Some(ref journal) = journal {
            eprintln!("Run log: {}", journal.path().display());
        }
    }

    Ok(outcome.exit_code())
}

fn resolve_plan(args: &RunArgs, project: &ProjectConfig) -> Result<RunPlan> {
    let samples = load_samples(&args.data, args.samples)
        .with_context(|| format!("Failed to load dataset {}", args.data.display()))?;
    if samples.is_empty() {
        anyhow::bail!("Dataset {} contains no samples", args.data.display());
    }

    let schema = match project.schema()? {
        Some(schema) => schema,
        None => SchemaDescriptor::infer(&samples)
            .context("No [[fields]] configured and none could be inferred from the dataset")?,
    };

    let section = &project.optimizer;
    let defaults = OptimizerConfig::default();
    let mut optimizer = OptimizerConfig::from_signed(
        args.loops
            .or(section.loops)
            .unwrap_or(defaults.loop_count as i64),
        args.window_size
            .or(section.window)
            .unwrap_or(defaults.window_size as i64),
    )?;
    optimizer.concurrency = args
        .concurrency
        .or(section.concurrency)
        .unwrap_or(defaults.concurrency);
    optimizer.top_errors = section.top_errors.unwrap_or(defaults.top_errors);
    optimizer.max_error_examples = section
        .max_error_examples
        .unwrap_or(defaults.max_error_examples);
    optimizer.excerpt_chars = section.excerpt_chars.unwrap_or(defaults.excerpt_chars);
    if let Some(policy) = project.matching {
        optimizer.match_policy = policy;
    }
    optimizer.validate()?;

    // blank prompts fall back to the synthesized one, same as the loop does
    let initial_prompt = match (&args.prompt, &args.prompt_file) {
        (Some(prompt), _) => Some(prompt.trim().to_string()),
        (None, Some(path)) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read prompt file {}", path.display()))?;
            Some(content.trim().to_string())
        }
        (None, None) => None,
    }
    .filter(|prompt| !prompt.is_empty());

    Ok(RunPlan {
        samples,
        schema,
        optimizer,
        initial_prompt,
        agent_type: role_provider(args.provider, project.agent_provider())?,
        mentor_type: role_provider(args.provider, project.mentor_provider())?,
        agent_model: args
            .agent_model
            .clone()
            .or_else(|| project.agent_model().map(String::from)),
        mentor_model: args
            .mentor_model
            .clone()
            .or_else(|| project.mentor_model().map(String::from)),
        timeout: Duration::from_secs(
            args.timeout_secs
                .or(project.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        ),
    })
}

/// Priority: CLI flag > project file > claude
fn role_provider(flag: Option<ProviderChoice>, file: Option<&str>) -> Result<ProviderType> {
    match (flag, file) {
        (Some(choice), _) => Ok(choice.into()),
        (None, Some(name)) => name
            .parse::<ProviderType>()
            .map_err(|e| anyhow::anyhow!("{} (in {})", e, config::CONFIG_FILE_NAME)),
        (None, None) => Ok(ProviderType::ClaudeCode),
    }
}

fn role_config(working_dir: &Path, timeout: Duration, model: Option<String>) -> ProviderConfig {
    let config = ProviderConfig::new(working_dir.to_path_buf()).with_timeout(timeout);
    match model {
        Some(model) => config.with_model(model),
        None => config,
    }
}

fn print_schema(args: SchemaArgs, project: &ProjectConfig) -> Result<()> {
    let schema = match (project.schema()?, &args.data) {
        (Some(schema), _) => schema,
        (None, Some(data)) => {
            let samples = load_samples(data, None)
                .with_context(|| format!("Failed to load dataset {}", data.display()))?;
            SchemaDescriptor::infer(&samples)
                .context("No fields could be inferred from the dataset")?
        }
        (None, None) => anyhow::bail!(
            "No [[fields]] in {} and no --data to infer them from",
            config::CONFIG_FILE_NAME
        ),
    };

    println!("{}", "=== Initial Prompt ===".bold());
    println!("{}", schema.synthesize_prompt());
    println!();
    println!("{}", "=== JSON Schema ===".bold());
    println!("{}", serde_json::to_string_pretty(&schema.to_json_schema())?);
    Ok(())
}

fn print_best(args: BestArgs) -> Result<()> {
    let loaded = persistence::load_results(&args.output)?;
    let Some(best) = loaded.best else {
        anyhow::bail!("Run in {} has no iterations", args.output.display());
    };

    if args.json_output {
        println!("{}", serde_json::to_string_pretty(&best)?);
    } else {
        eprintln!(
            "Iteration {} of {} at {:.1}% ({}, {})",
            best.iteration,
            loaded.total_iterations,
            best.accuracy * 100.0,
            loaded.termination.label(),
            loaded.timestamp
        );
        eprintln!(
            "Improvement {:+.1} pts over {:.1}s",
            loaded.metrics.improvement * 100.0,
            loaded.total_duration_secs
        );
        println!("{}", best.prompt);
    }
    Ok(())
}

fn print_plan(args: &RunArgs, plan: &RunPlan) {
    println!("=== Dry Run ===");
    println!("Dataset: {} ({} samples)", args.data.display(), plan.samples.len());
    println!(
        "Fields: {}",
        plan.schema.field_names().collect::<Vec<_>>().join(", ")
    );
    match &plan.initial_prompt {
        Some(prompt) => println!("Prompt: {}", preview(prompt, 100)),
        None => println!("Prompt: synthesized from fields"),
    }
    println!(
        "Agent: {} ({})",
        plan.agent_type,
        plan.agent_model.as_deref().unwrap_or("default model")
    );
    println!(
        "Mentor: {} ({})",
        plan.mentor_type,
        plan.mentor_model.as_deref().unwrap_or("default model")
    );
    println!(
        "Loops: {}, window: {}, concurrency: {}",
        plan.optimizer.loop_count, plan.optimizer.window_size, plan.optimizer.concurrency
    );
    println!("Timeout: {}s per call", plan.timeout.as_secs());
    println!("Output: {}", args.output.display());
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

fn print_outcome(outcome: &OptimizationOutcome) {
    let metrics = outcome.metrics();
    eprintln!();
    match &outcome.termination {
        Termination::Completed => {
            eprintln!("{}", "=== COMPLETED ===".bright_green().bold());
        }
        Termination::PerfectScore => {
            eprintln!("{}", "=== PERFECT SCORE ===".bright_green().bold());
        }
        Termination::RefinementUnavailable { iteration, error } => {
            eprintln!("{}", "=== STOPPED EARLY ===".bright_yellow().bold());
            eprintln!("Mentor failed after iteration {}: {}", iteration, error);
        }
        Termination::ProviderUnavailable { iteration } => {
            eprintln!("{}", "=== PROVIDER UNAVAILABLE ===".bright_red().bold());
            eprintln!("Every sample failed in iteration {}", iteration);
        }
    }
    eprintln!("Iterations: {}", metrics.iterations);
    if let Some(best) = outcome.best() {
        eprintln!(
            "Best: iteration {} at {:.1}% (~{} tokens)",
            best.iteration,
            best.accuracy * 100.0,
            best.prompt_tokens
        );
    }
    eprintln!(
        "Accuracy: final {:.1}%, average {:.1}%, improvement {:+.1} pts",
        metrics.final_accuracy * 100.0,
        metrics.average_accuracy * 100.0,
        metrics.improvement * 100.0
    );
    eprintln!("Duration: {:.1}s", outcome.total_duration_secs);
}
