use clap::Args;
use serde_json::Value;

use crate::commands::parse_verification_type;
use crate::input;

#[derive(Args)]
pub struct RecommendArgs {
    #[arg(long)]
    pub input: Option<String>,
    #[arg(long)]
    pub user: String,
}

#[derive(Args)]
pub struct RequestArgs {
    #[arg(long)]
    pub input: Option<String>,
    #[arg(long)]
    pub user: String,
    /// LIGHT or STANDARD
    #[arg(long = "type")]
    pub verification_type: String,
}

#[derive(Args)]
pub struct CompleteArgs {
    #[arg(long)]
    pub input: Option<String>,
    #[arg(long)]
    pub user: String,
    /// Submitted document identifiers
    #[arg(long)]
    pub document: Vec<String>,
}

pub fn run_recommend(args: RecommendArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let engine = input::load_scenario(&args.input)?.into_engine()?;
    let recommendation = engine.verification_recommendation(&args.user)?;
    Ok(serde_json::to_value(recommendation)?)
}

pub fn run_request(args: RequestArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let engine = input::load_scenario(&args.input)?.into_engine()?;
    let verification_type = parse_verification_type(&args.verification_type)?;
    let outcome = engine.request_verification(&args.user, verification_type)?;
    Ok(serde_json::to_value(outcome)?)
}

pub fn run_complete(args: CompleteArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let engine = input::load_scenario(&args.input)?.into_engine()?;
    let outcome = engine.complete_verification(&args.user, &args.document)?;
    Ok(serde_json::to_value(outcome)?)
}
