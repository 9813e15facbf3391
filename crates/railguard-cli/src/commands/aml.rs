use clap::Args;
use serde_json::Value;

use crate::commands::parse_amount;
use crate::input;

#[derive(Args)]
pub struct ScreenArgs {
    /// Scenario file; optional, screening needs no user state
    #[arg(long)]
    pub input: Option<String>,
    /// Counterparty address to screen
    #[arg(long)]
    pub address: String,
    /// Transaction amount, if known
    #[arg(long)]
    pub amount: Option<String>,
    /// Attach the screening result to this user's compliance record
    #[arg(long)]
    pub attach_to: Option<String>,
}

pub fn run_screen(args: ScreenArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let engine = input::load_scenario(&args.input)?.into_engine()?;
    let amount = args.amount.as_deref().map(parse_amount).transpose()?;

    let result = engine.screen_counterparty(&args.address, amount)?;
    if let Some(user_id) = &args.attach_to {
        engine.attach_aml_result(user_id, &result)?;
    }
    Ok(serde_json::to_value(result)?)
}
