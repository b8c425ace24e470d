use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use account_recovery::probe::{self, Backoff, FlowOutcome, ResetClient};
use account_recovery::reset::diagnostics;

/// Inspect and exercise the password reset flow of a running service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Database of the service; defaults to DATABASE_URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show accounts and reset codes stored for an email
    Inspect {
        email: String,
        /// Print code values, not only their state
        #[arg(long)]
        reveal_codes: bool,
    },
    /// Request a code over HTTP, read it from the store, redeem it, log in
    Flow {
        email: String,
        #[arg(long)]
        new_password: String,
        #[arg(long, default_value = "http://localhost:8000")]
        base_url: String,
        /// Store reads before giving up on the issued code
        #[arg(long, default_value_t = 5)]
        attempts: u32,
        /// First backoff delay in milliseconds, doubled after each miss
        #[arg(long, default_value_t = 100)]
        initial_delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<bool, String> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&args.database_url)
        .await
        .map_err(|e| format!("Failed to connect to database: {e}"))?;

    match args.command {
        Command::Inspect {
            email,
            reveal_codes,
        } => {
            let report = diagnostics::inspect(&pool, &email, reveal_codes)
                .await
                .map_err(|e| format!("Diagnostic query failed: {e}"))?;

            if report.has_case_mismatch() {
                tracing::warn!(
                    "No account stored as {:?}, but {:?} owns the same identity",
                    report.queried,
                    report.identity_match.as_ref().map(|a| a.email.as_str()),
                );
            }

            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| format!("Failed to render report: {e}"))?;
            println!("{json}");

            Ok(report.identity_match.is_some())
        }
        Command::Flow {
            email,
            new_password,
            base_url,
            attempts,
            initial_delay_ms,
        } => {
            let client = ResetClient::new(&base_url)?;
            let backoff = Backoff {
                attempts,
                initial: Duration::from_millis(initial_delay_ms),
                ..Backoff::default()
            };

            let outcome = probe::run_flow(&pool, &client, &email, &new_password, &backoff).await?;
            match &outcome {
                FlowOutcome::Succeeded => tracing::info!("Password reset flow succeeded"),
                FlowOutcome::CodeNeverVisible => {
                    tracing::error!("No new reset code appeared after {attempts} reads")
                }
                FlowOutcome::RequestRejected(resp) => {
                    tracing::error!("forgot-password rejected: {} {}", resp.status, resp.body)
                }
                FlowOutcome::ConfirmRejected(resp) => {
                    tracing::error!("reset-password rejected: {} {}", resp.status, resp.body)
                }
                FlowOutcome::LoginRejected(resp) => {
                    tracing::error!("login with new password rejected: {} {}", resp.status, resp.body)
                }
            }

            Ok(matches!(outcome, FlowOutcome::Succeeded))
        }
    }
}
