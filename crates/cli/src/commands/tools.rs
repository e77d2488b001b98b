//! `ragent tools`: list the tools offered to the model.

use anyhow::Context;
use ragent_config::AppConfig;

pub fn run(config: &AppConfig, schema: bool) -> anyhow::Result<()> {
    let registry = ragent_tools::default_registry(config.tools.timeout())
        .context("Failed to build the tool registry")?;
    let definitions = registry.definitions();

    if schema {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    let width = definitions.iter().map(|d| d.name.len()).max().unwrap_or(0);
    for def in &definitions {
        println!("  {:width$}  {}", def.name, def.description);
    }
    println!();
    println!("  {} tools", definitions.len());
    Ok(())
}
