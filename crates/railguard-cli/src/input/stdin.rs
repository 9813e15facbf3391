use std::io::{self, Read};

use railguard_core::scenario::ScenarioState;

/// Attempt to read a JSON scenario from stdin if data is being piped.
/// Returns None if stdin is a TTY (interactive).
pub fn read_stdin() -> Result<Option<ScenarioState>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let scenario: ScenarioState = serde_json::from_str(trimmed)?;
    Ok(Some(scenario))
}
