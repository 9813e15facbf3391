use clap::Args;
use railguard_core::store::UserStore;
use serde_json::Value;

use crate::commands::{parse_amount, parse_kind};
use crate::input;

#[derive(Args)]
pub struct EvaluateArgs {
    /// Scenario file (JSON or YAML) seeding users and deposit history
    #[arg(long)]
    pub input: Option<String>,
    #[arg(long)]
    pub user: String,
    #[arg(long)]
    pub amount: String,
    /// FIAT_TO_CRYPTO, CRYPTO_TO_FIAT, or CRYPTO_WITHDRAWAL
    #[arg(long)]
    pub kind: String,
}

#[derive(Args)]
pub struct CommitArgs {
    #[arg(long)]
    pub input: Option<String>,
    #[arg(long)]
    pub user: String,
    #[arg(long)]
    pub amount: String,
    #[arg(long)]
    pub kind: String,
    #[arg(long, default_value = "USD")]
    pub currency: String,
}

#[derive(Args)]
pub struct ResetArgs {
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_evaluate(args: EvaluateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let engine = input::load_scenario(&args.input)?.into_engine()?;
    let amount = parse_amount(&args.amount)?;
    let kind = parse_kind(&args.kind)?;

    let decision = engine.evaluate_transaction(&args.user, amount, kind)?;
    Ok(serde_json::to_value(decision)?)
}

pub fn run_commit(args: CommitArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let engine = input::load_scenario(&args.input)?.into_engine()?;
    let amount = parse_amount(&args.amount)?;
    let kind = parse_kind(&args.kind)?;

    let event = engine.commit_transaction(&args.user, amount, kind, &args.currency)?;
    let user = engine.users().get(&args.user);
    Ok(serde_json::json!({
        "event": event,
        "user": user,
    }))
}

fn run_reset(
    args: ResetArgs,
    reset: impl Fn(&railguard_core::MemoryComplianceEngine),
) -> Result<Value, Box<dyn std::error::Error>> {
    let engine = input::load_scenario(&args.input)?.into_engine()?;
    reset(&engine);

    let mut users = Vec::new();
    engine.users().for_each(|user| users.push(user.clone()));
    Ok(serde_json::json!({ "users": users }))
}

pub fn run_reset_daily(args: ResetArgs) -> Result<Value, Box<dyn std::error::Error>> {
    run_reset(args, |e| e.reset_daily())
}

pub fn run_reset_weekly(args: ResetArgs) -> Result<Value, Box<dyn std::error::Error>> {
    run_reset(args, |e| e.reset_weekly())
}

pub fn run_reset_monthly(args: ResetArgs) -> Result<Value, Box<dyn std::error::Error>> {
    run_reset(args, |e| e.reset_monthly())
}
