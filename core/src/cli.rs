use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::executor::ProgramExecutor;
use crate::tasks::{CommandRegistry, Domain, DomainSchema};
use crate::transcript::{Conversation, Transcript};

#[derive(Parser)]
#[command(name = "turnscript")]
#[command(about = "Turnscript - Execute program turns of task-oriented dialogues", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log filter used when RUST_LOG is unset (overrides config)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute every program turn of a transcript and print the results
    Run {
        /// Transcript file
        transcript: PathBuf,

        /// Domain schema (overrides config)
        #[arg(short = 's', long = "schema")]
        schema: Option<PathBuf>,

        /// Also execute the follow-up turn derived from each result
        #[arg(long)]
        auto_followup: bool,
    },

    /// Parse and rewrite every program turn without executing it
    Check {
        /// Transcript file
        transcript: PathBuf,
    },

    /// List the commands a turn may call
    Commands {
        /// Domain schema (overrides config)
        #[arg(short = 's', long = "schema")]
        schema: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with provided arguments
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli)
}

fn run_cli_with_args(cli: Cli) -> Result<()> {
    let schema_override = match &cli.command {
        Commands::Run { schema, .. } | Commands::Commands { schema } => schema.clone(),
        Commands::Check { .. } | Commands::Config => None,
    };

    let config = Config::builder()
        .config_path(cli.config.map(PathBuf::from))
        .schema_path(schema_override)
        .log_level(cli.log_level)
        .build()
        .context("Failed to load configuration")?;

    init_tracing(&config.log.level);

    match cli.command {
        Commands::Run {
            transcript,
            auto_followup,
            ..
        } => run_transcript(&config, &transcript, auto_followup),
        Commands::Check { transcript } => check_transcript(&config, &transcript),
        Commands::Commands { .. } => list_commands(&config),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Already installed when the CLI is embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_domain(config: &Config) -> Result<Option<Domain>> {
    let Some(path) = &config.domain.schema_path else {
        tracing::warn!("No domain schema configured; only auxiliary commands are available");
        return Ok(None);
    };

    let schema = DomainSchema::load(path)
        .with_context(|| format!("Failed to load domain schema {}", path.display()))?;
    let domain = schema
        .build()
        .with_context(|| format!("Invalid domain schema {}", path.display()))?;
    Ok(Some(domain))
}

fn read_transcript(config: &Config, path: &Path) -> Result<Transcript> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript {}", path.display()))?;
    Transcript::parse(&text, &config.executor.follow_marker)
        .with_context(|| format!("Invalid transcript {}", path.display()))
}

fn run_transcript(config: &Config, path: &Path, auto_followup: bool) -> Result<()> {
    let transcript = read_transcript(config, path)?;
    let executor = match load_domain(config)? {
        Some(domain) => ProgramExecutor::with_app_context(domain.registry, domain.app_context),
        None => ProgramExecutor::new(CommandRegistry::default()),
    }
    .with_options(config.executor.clone());

    let mut conversation = Conversation::new(executor).with_auto_followup(auto_followup);
    conversation.run_transcript(transcript);

    let report = conversation.report();
    println!("{}", serde_json::to_string_pretty(&report)?);

    let failed = report.turns.iter().filter(|turn| turn.error.is_some()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} program turns failed", failed, report.turns.len());
    }
    Ok(())
}

fn check_transcript(config: &Config, path: &Path) -> Result<()> {
    let transcript = read_transcript(config, path)?;
    let executor =
        ProgramExecutor::new(CommandRegistry::default()).with_options(config.executor.clone());

    let mut failed = 0;
    let mut total = 0;
    for turn in transcript.program_turns() {
        total += 1;
        match executor.prepare(&turn.expression) {
            Ok(_) => println!("turn {}: ok", turn.index),
            Err(e) => {
                failed += 1;
                match e.span() {
                    Some(span) => {
                        println!("turn {} (column {}): {}", turn.index, span.start + 1, e)
                    }
                    None => println!("turn {}: {}", turn.index, e),
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} program turns failed to parse", failed, total);
    }
    Ok(())
}

fn list_commands(config: &Config) -> Result<()> {
    match load_domain(config)? {
        Some(domain) => {
            println!("# domain {}", domain.version_hash);
            for signature in domain.registry.signatures() {
                println!("{}", signature);
            }
        }
        None => {
            for signature in CommandRegistry::default().signatures() {
                println!("{}", signature);
            }
        }
    }
    Ok(())
}
