mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::aml::ScreenArgs;
use commands::gate::{CommitArgs, EvaluateArgs, ResetArgs};
use commands::risk::{PatternsArgs, ScoreArgs};
use commands::verification::{CompleteArgs, RecommendArgs, RequestArgs};

/// Compliance and risk-control decisions for fiat/crypto transaction rails
#[derive(Parser)]
#[command(
    name = "rgd",
    version,
    about = "Compliance and risk-control decisions for fiat/crypto transaction rails",
    long_about = "A CLI for the railguard compliance engine. Seeds an in-memory engine \
                  from a scenario file (users and deposit history) and runs one \
                  operation against it: velocity-gate checks, counterparty AML \
                  screening, risk scoring, pattern detection, and verification flows."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a proposed transaction against tier limits and usage
    Evaluate(EvaluateArgs),
    /// Record a settled transaction (usage counters + deposit event)
    Commit(CommitArgs),
    /// Screen a counterparty address against AML providers
    Screen(ScreenArgs),
    /// Composite risk score with the per-factor breakdown
    RiskScore(ScoreArgs),
    /// Behavioral pattern sweep over the trailing 30 days
    Patterns(PatternsArgs),
    /// Verification recommendation for a user
    Recommend(RecommendArgs),
    /// Put a user into a pending-verification state
    RequestVerification(RequestArgs),
    /// Resolve a pending verification into a tier outcome
    CompleteVerification(CompleteArgs),
    /// Zero all daily usage counters (scheduler operation)
    ResetDaily(ResetArgs),
    /// Zero all weekly usage counters (scheduler operation)
    ResetWeekly(ResetArgs),
    /// Zero all monthly usage counters (scheduler operation)
    ResetMonthly(ResetArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Evaluate(args) => commands::gate::run_evaluate(args),
        Commands::Commit(args) => commands::gate::run_commit(args),
        Commands::Screen(args) => commands::aml::run_screen(args),
        Commands::RiskScore(args) => commands::risk::run_score(args),
        Commands::Patterns(args) => commands::risk::run_patterns(args),
        Commands::Recommend(args) => commands::verification::run_recommend(args),
        Commands::RequestVerification(args) => commands::verification::run_request(args),
        Commands::CompleteVerification(args) => commands::verification::run_complete(args),
        Commands::ResetDaily(args) => commands::gate::run_reset_daily(args),
        Commands::ResetWeekly(args) => commands::gate::run_reset_weekly(args),
        Commands::ResetMonthly(args) => commands::gate::run_reset_monthly(args),
        Commands::Version => {
            println!("rgd {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
