use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use shared::config::Config;

/// Writes the default configuration in the specified format.
///
/// # Arguments
/// * `format` - The format of the configuration file ("yaml" or "json").
/// * `output` - Target path; `config.<format>` in the working directory when absent.
///
/// # Errors
/// Returns an error if the format is unsupported or if writing the file fails.
pub fn generate_config(format: &str, output: Option<PathBuf>) -> Result<()> {
    let config = Config::with_defaults();
    let (serialized, default_name) = match format {
        "yaml" => (serde_yml::to_string(&config)?, "config.yaml"),
        "json" => (serde_json::to_string_pretty(&config)?, "config.json"),
        _ => bail!("Unsupported format. Use 'yaml' or 'json'."),
    };

    let path = output.unwrap_or_else(|| PathBuf::from(default_name));
    fs::write(&path, serialized)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("Configuration file '{}' generated successfully.", path.display());
    Ok(())
}
