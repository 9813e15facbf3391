pub mod file;
pub mod stdin;

use railguard_core::scenario::ScenarioState;

/// Load the scenario from `--input`, then piped stdin, then fall back to an
/// empty world (useful for user-free operations such as screening).
pub fn load_scenario(
    input: &Option<String>,
) -> Result<ScenarioState, Box<dyn std::error::Error>> {
    if let Some(path) = input {
        return file::read_scenario(path);
    }
    if let Some(scenario) = stdin::read_stdin()? {
        return Ok(scenario);
    }
    Ok(ScenarioState::default())
}
