//! Codejudge CLI
//!
//! Runs single executions and whole submissions against a local Docker
//! daemon, or serves the HTTP API.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codejudge::{Config, EXAMPLE_CONFIG, ExecutionRequest, Judge, Submission, TestCase};
use serde_json::Value;
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codejudge")]
#[command(about = "Judge function submissions inside disposable containers")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: codejudge.toml)
        #[arg(short, long, default_value = "codejudge.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Serve the HTTP API
    Serve {
        /// Address to bind (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Call a function once and print its result
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language ID (e.g., python, cpp)
        #[arg(short, long)]
        language: String,

        /// Function to call
        #[arg(short, long, default_value = ExecutionRequest::DEFAULT_FUNCTION_NAME)]
        function: String,

        /// Positional arguments as a JSON array
        #[arg(short, long, default_value = "[]")]
        args: String,

        /// Time limit in milliseconds
        #[arg(short, long)]
        time_limit: Option<u64>,
    },

    /// Judge a source file against a JSON array of test cases
    Judge {
        /// Source file to judge
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language ID (e.g., java, javascript)
        #[arg(short, long)]
        language: String,

        /// JSON file holding the test cases
        #[arg(long)]
        cases: PathBuf,

        /// Function to call
        #[arg(short, long, default_value = ExecutionRequest::DEFAULT_FUNCTION_NAME)]
        function: String,

        /// Time limit per case in milliseconds
        #[arg(short, long)]
        time_limit: Option<u64>,
    },

    /// List available languages
    Languages,

    /// Show the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Init { output, force } = &cli.command {
        return init_config(output, *force).await;
    }

    if let Some(path) = &cli.config {
        info!(?path, "loading configuration");
    } else {
        debug!("using default configuration");
    }
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Serve { bind } => serve(config, bind).await,
        Commands::Run {
            source,
            language,
            function,
            args,
            time_limit,
        } => run_once(config, &source, language, function, &args, time_limit).await,
        Commands::Judge {
            source,
            language,
            cases,
            function,
            time_limit,
        } => judge_file(config, &source, language, &cases, function, time_limit).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn serve(config: Config, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let judge = Judge::connect(config).context("failed to connect to docker")?;
    judge
        .health()
        .await
        .context("docker daemon is not reachable")?;

    codejudge::serve(judge, &bind).await.context("server failed")
}

async fn run_once(
    config: Config,
    source: &Path,
    language: String,
    function: String,
    args: &str,
    time_limit: Option<u64>,
) -> Result<()> {
    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;
    let args: Vec<Value> =
        serde_json::from_str(args).context("arguments must be a JSON array")?;

    let mut request = ExecutionRequest::new(language, code)
        .with_function_name(function)
        .with_args(args);
    request.time_limit_ms = time_limit;

    let judge = Judge::connect(config).context("failed to connect to docker")?;
    info!(language = %request.language, function = %request.function_name, "running program");
    let result = judge.execute(&request).await.context("execution failed")?;

    // Result on stdout, diagnostics on stderr, so the output can be piped
    if let Some(output) = &result.stdout {
        println!("{output}");
    }
    for line in &result.stderr_lines {
        eprintln!("{line}");
    }

    info!(
        status = %result.status,
        runtime = format_args!("{} ms", result.runtime_ms),
        "execution result"
    );

    if result.is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

async fn judge_file(
    config: Config,
    source: &Path,
    language: String,
    cases: &Path,
    function: String,
    time_limit: Option<u64>,
) -> Result<()> {
    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;
    let cases = tokio::fs::read(cases)
        .await
        .context("failed to read test cases")?;
    let cases: Vec<TestCase> =
        serde_json::from_slice(&cases).context("test cases must be a JSON array")?;

    let mut submission = Submission::new(language, code).with_function_name(function);
    submission.time_limit_ms = time_limit;
    submission.test_cases = cases;

    let judge = Judge::connect(config).context("failed to connect to docker")?;
    let verdict = judge.judge(&submission).await.context("judging failed")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&verdict).context("failed to encode verdict")?
    );

    if verdict.verdict.is_accepted() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    for id in config.language_ids() {
        let Some(lang) = config.languages.get(id) else {
            continue;
        };
        let lang_type = if lang.is_compiled() {
            "compiled"
        } else {
            "interpreted"
        };
        println!("  {:<12} {} ({}, {})", id, lang.name, lang_type, lang.image);
    }
}

fn show_config(config: &Config) {
    let limits = &config.default_limits;
    println!("Default resource limits:");
    println!("  Time limit: {:?} ms", limits.time_limit_ms);
    println!("  Memory limit: {:?} MB", limits.memory_limit_mb);
    println!("  CPUs: {:?}", limits.cpus);
    println!("  Max processes: {:?}", limits.max_processes);
    println!("  Max output: {:?} KB", limits.max_output_kb);
    println!("  Kill grace: {:?} ms", limits.kill_grace_ms);
    println!();
    println!(
        "Docker socket: {}",
        config.docker.socket.as_deref().unwrap_or("(local default)")
    );
    println!("Container prefix: {}", config.docker.container_prefix);
    println!("Workspace root: {}", config.workspace_root().display());
    println!("Server bind: {}", config.server.bind);
    println!("Float tolerance: {}", config.harness.float_tolerance);
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
