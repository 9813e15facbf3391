use std::fs;
use std::path::Path;

use railguard_core::scenario::ScenarioState;

/// Read a scenario file (JSON, or YAML by extension) into a seed state.
pub fn read_scenario(path: &str) -> Result<ScenarioState, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;

    let is_yaml = canonical
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    let scenario: ScenarioState = if is_yaml {
        serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    } else {
        serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    };
    Ok(scenario)
}

/// Resolve and validate the path before reading.
fn resolve_path(path: &str) -> Result<std::path::PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }
    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}
