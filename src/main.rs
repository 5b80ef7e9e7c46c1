//! audio-resolver - turn a media link into a direct, playable audio URL
//!
//! Runs as an HTTP service (`serve`) or resolves a single link headlessly
//! (`resolve`).

use anyhow::Result;
use audio_resolver::extractor::outcome::AttemptOutcome;
use audio_resolver::server::{self, AppState};
use audio_resolver::utils::AppSettings;
use audio_resolver::{extract_id, ResolverError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to a TOML config file
    #[arg(long, global = true, env = "AUDIO_RESOLVER_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (e.g. "debug", "audio_resolver=trace")
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Listen address, overrides the config file
        #[arg(long, env = "AUDIO_RESOLVER_BIND")]
        bind: Option<String>,

        /// Global budget per resolution in milliseconds
        #[arg(long, env = "AUDIO_RESOLVER_BUDGET_MS")]
        budget_ms: Option<u64>,
    },
    /// Resolve one link and print the stream URL
    Resolve {
        url: String,

        /// Global budget in milliseconds
        #[arg(long)]
        budget_ms: Option<u64>,
    },
    /// Print the identifier parsed from INPUT
    Id { input: String },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Command::Id { input } = &args.command {
        return Ok(match extract_id(input) {
            Some(id) => {
                println!("{}", id);
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("No identifier found in {:?}", input);
                ExitCode::FAILURE
            }
        });
    }

    let mut settings = AppSettings::load(args.config.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    match args.command {
        Command::Serve { bind, budget_ms } => {
            if let Some(bind) = bind {
                settings.bind = bind;
            }
            apply_budget(&mut settings, budget_ms)?;
            let state = AppState::from_settings(&settings)?;
            rt.block_on(server::serve(state, &settings.bind))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Resolve { url, budget_ms } => {
            apply_budget(&mut settings, budget_ms)?;
            let state = AppState::from_settings(&settings)?;
            Ok(rt.block_on(resolve_cli(state, url)))
        }
        Command::Id { .. } => Ok(ExitCode::SUCCESS),
    }
}

fn apply_budget(settings: &mut AppSettings, budget_ms: Option<u64>) -> Result<()> {
    if let Some(budget_ms) = budget_ms {
        settings.global_budget_ms = budget_ms;
        settings.validate()?;
    }
    Ok(())
}

async fn resolve_cli(state: AppState, url: String) -> ExitCode {
    match server::resolve_input(&state, &url).await {
        Ok(resolved) => {
            print_attempts(&resolved.attempts);
            println!("{}", resolved.chosen.url);
            ExitCode::SUCCESS
        }
        Err(ResolverError::AllProvidersFailed { attempts }) => {
            print_attempts(&attempts);
            eprintln!("No stream found");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_attempts(attempts: &[AttemptOutcome]) {
    for (index, attempt) in attempts.iter().enumerate() {
        match attempt {
            AttemptOutcome::Success { provider, candidates } => {
                eprintln!("{:>2}. {:<20} ok ({} candidate(s))", index + 1, provider, candidates.len())
            }
            AttemptOutcome::Failure { provider, reason } => {
                eprintln!("{:>2}. {:<20} {}", index + 1, provider, reason)
            }
        }
    }
}
