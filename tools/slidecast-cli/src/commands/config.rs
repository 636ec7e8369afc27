//! Print the effective configuration.

use slidecast_common::config::AppConfig;

pub fn run(config: &AppConfig, save: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if save {
        config.save()?;
        println!("\nSaved to the user config location.");
    }
    Ok(())
}
