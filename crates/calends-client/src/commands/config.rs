//! Configuration commands.

use crate::app::Settings;
use crate::config::{ClientConfig, DISCOVERED_FILES};
use crate::error::{ClientError, ClientResult};

/// Dump the effective configuration to stdout.
pub fn dump(settings: &Settings) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&settings.config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    match &settings.config_path {
        Some(path) => println!("# loaded from {}", path.display()),
        None => println!("# defaults (no configuration file found)"),
    }
    println!("{}", toml_str);
    Ok(())
}

/// Validate the configuration and every calendar source.
pub fn validate(settings: &Settings) -> ClientResult<()> {
    settings.validate()?;
    let sources = settings.sources()?;
    for source in &sources {
        println!("  {}: {}", source.name, source.key());
    }
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file paths.
pub fn path(settings: &Settings) -> ClientResult<()> {
    if let Some(path) = &settings.config_path {
        println!("active: {}", path.display());
    }
    println!("config: {}", ClientConfig::default_path().display());
    for name in DISCOVERED_FILES {
        println!("local:  {}", settings.base_dir.join(name).display());
    }
    Ok(())
}
