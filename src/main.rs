//! hound-ingest CLI
//!
//! Entry point for the `hound-ingest` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use hound_ingest::config::{env_overrides, Overrides, CONFIG_ENV_VAR};
use hound_ingest::pipeline::IngestionPipeline;
use hound_ingest::relationships::parse_exclusions;
use hound_ingest::report::aggregate_exit_code;
use hound_ingest::signal::SignalHandler;
use hound_ingest::{query_attack_path, ApiClient, ApiError, CancelToken, EffectiveConfig, ExitCode, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hound-ingest")]
#[command(about = "Signed uploads and attack path queries against a BloodHound-style API", version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Path to a TOML config file (also HOUND_CONFIG)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Server URL with explicit scheme and port, e.g. https://bloodhound.lab:443
    #[arg(long, global = true)]
    url: Option<String>,

    /// API token id
    #[arg(long, global = true)]
    token_id: Option<String>,

    /// API token key
    #[arg(long, global = true)]
    token_key: Option<String>,

    /// Accept invalid TLS certificates (lab servers only)
    #[arg(long, global = true)]
    insecure: bool,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    request_timeout: Option<u64>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check credentials and print the API and server version
    Version,

    /// List domains known to the server
    Domains,

    /// Upload collector JSON files, one run per file
    Upload {
        /// Payload files, uploaded in the order given
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Records per chunk
        #[arg(long)]
        chunk_size: Option<u64>,

        /// Chunks per job
        #[arg(long)]
        chunks_per_job: Option<u64>,

        /// Seconds between job status checks
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Longest wait in seconds for one job to finish
        #[arg(long)]
        poll_max_wait: Option<u64>,
    },

    /// Find the shortest attack path between two objects
    Query {
        /// Name of the start object
        #[arg(long)]
        start: String,

        /// Name of the target object
        #[arg(long)]
        end: String,

        /// Relationship kinds to leave out (comma-separated, e.g. "AdminTo,DCSync")
        #[arg(long, default_value = "")]
        exclude: String,
    },

    /// Print the effective configuration with secrets redacted
    Config,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);
    process::exit(run(cli).as_i32());
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> ExitCode {
    let effective = match load_config(&cli) {
        Ok(c) => c,
        Err(message) => {
            eprintln!("Error loading config: {}", message);
            return ExitCode::Config;
        }
    };

    if let Commands::Config = cli.command {
        return print_json(&effective.to_json());
    }

    let settings = match effective.settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return e.exit_code();
        }
    };
    let client = match settings.build_client() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::Config;
        }
    };

    let json = cli.global.json;
    match cli.command {
        Commands::Version => run_version(&client, json),
        Commands::Domains => run_domains(&client, json),
        Commands::Upload { files, .. } => run_upload(&client, &settings, &files, json),
        Commands::Query { start, end, exclude } => run_query(&client, &start, &end, &exclude, json),
        Commands::Config => ExitCode::Success,
    }
}

fn load_config(cli: &Cli) -> Result<EffectiveConfig, String> {
    let config_path = cli
        .global
        .config
        .clone()
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

    let env_layer = env_overrides(std::env::vars())
        .and_then(|o| o.to_value())
        .map_err(|e| e.to_string())?;

    let mut overrides = Overrides {
        url: cli.global.url.clone(),
        token_id: cli.global.token_id.clone(),
        token_key: cli.global.token_key.clone(),
        request_timeout_seconds: cli.global.request_timeout,
        insecure: cli.global.insecure.then_some(true),
        ..Default::default()
    };
    if let Commands::Upload {
        chunk_size,
        chunks_per_job,
        poll_interval,
        poll_max_wait,
        ..
    } = &cli.command
    {
        overrides.chunk_size = *chunk_size;
        overrides.chunks_per_job = *chunks_per_job;
        overrides.poll_interval_seconds = *poll_interval;
        overrides.poll_max_wait_seconds = *poll_max_wait;
    }
    let cli_layer = overrides.to_value().map_err(|e| e.to_string())?;

    EffectiveConfig::build(config_path.as_deref(), env_layer, cli_layer).map_err(|e| e.to_string())
}

fn print_json(result: &Result<String, serde_json::Error>) -> ExitCode {
    match result {
        Ok(json) => {
            println!("{}", json);
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            ExitCode::Aborted
        }
    }
}

fn api_exit_code(error: &ApiError) -> ExitCode {
    match error {
        ApiError::NoResultsFound { .. } | ApiError::NoPathFound { .. } => ExitCode::NoResults,
        ApiError::Transport(e) if e.is_network() => ExitCode::Network,
        ApiError::Transport(e) if matches!(e.status(), Some(401) | Some(403)) => ExitCode::Config,
        _ => ExitCode::Aborted,
    }
}

fn run_version(client: &ApiClient, json: bool) -> ExitCode {
    match client.get_version() {
        Ok(version) if json => print_json(&serde_json::to_string_pretty(&version)),
        Ok(version) => {
            println!("API version: {}", version.api_version);
            println!("Server version: {}", version.server_version);
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            api_exit_code(&e)
        }
    }
}

fn run_domains(client: &ApiClient, json: bool) -> ExitCode {
    let domains = match client.get_domains() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return api_exit_code(&e);
        }
    };

    if json {
        return print_json(&serde_json::to_string_pretty(&domains));
    }
    if domains.is_empty() {
        println!("No domains.");
    }
    for domain in &domains {
        let collected = if domain.collected { "collected" } else { "not collected" };
        println!("{:<40} {:<8} {} ({})", domain.name, domain.domain_type, domain.id, collected);
    }
    ExitCode::Success
}

fn run_upload(client: &ApiClient, settings: &Settings, files: &[PathBuf], json: bool) -> ExitCode {
    // Fail on bad credentials before opening any job
    match client.get_version() {
        Ok(version) => tracing::info!(
            api = %version.api_version,
            server = %version.server_version,
            endpoint = %settings.endpoint,
            "credentials accepted"
        ),
        Err(e) => {
            eprintln!("Error: credential check failed: {}", e);
            return api_exit_code(&e);
        }
    }

    let cancel = CancelToken::new();
    let handler = SignalHandler::new(cancel.clone());
    if let Err(e) = handler.install(|| process::exit(ExitCode::Cancelled.as_i32())) {
        tracing::warn!(error = %e, "could not install interrupt handler");
    }

    let pipeline = IngestionPipeline::new(client, settings.pipeline, cancel);
    let runs = pipeline.run_files(files);

    let mut codes = Vec::with_capacity(runs.len());
    for run in &runs {
        match &run.result {
            Ok(report) if json => {
                print_json(&report.to_json());
            }
            Ok(report) => println!("{}", report.human_summary()),
            Err(e) => eprintln!("Error: {}", e),
        }
        codes.push(run.exit_code());
    }
    if runs.len() < files.len() {
        codes.push(ExitCode::Cancelled);
    }
    aggregate_exit_code(&codes)
}

fn run_query(client: &ApiClient, start: &str, end: &str, exclude: &str, json: bool) -> ExitCode {
    match query_attack_path(client, start, end, &parse_exclusions(exclude)) {
        Ok(path) if json => print_json(&serde_json::to_string_pretty(&path)),
        Ok(path) => {
            println!("{} -> {} ({} hop(s))", path.start.name, path.end.name, path.hops.len());
            println!("{}", path.render());
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}
