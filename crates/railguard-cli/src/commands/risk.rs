use clap::Args;
use serde_json::Value;

use crate::input;

#[derive(Args)]
pub struct ScoreArgs {
    #[arg(long)]
    pub input: Option<String>,
    #[arg(long)]
    pub user: String,
}

#[derive(Args)]
pub struct PatternsArgs {
    #[arg(long)]
    pub input: Option<String>,
    #[arg(long)]
    pub user: String,
}

pub fn run_score(args: ScoreArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let engine = input::load_scenario(&args.input)?.into_engine()?;
    let score = engine.risk_score(&args.user)?;
    Ok(serde_json::to_value(score)?)
}

pub fn run_patterns(args: PatternsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let engine = input::load_scenario(&args.input)?.into_engine()?;
    let report = engine.unusual_patterns(&args.user)?;
    Ok(serde_json::to_value(report)?)
}
