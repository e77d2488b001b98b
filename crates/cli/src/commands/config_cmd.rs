//! `ragent config`: print configuration.

use ragent_config::AppConfig;

/// The loaded configuration. Secrets are redacted by its `Debug` form.
pub fn print_effective(config: &AppConfig) -> anyhow::Result<()> {
    println!("{config:#?}");
    Ok(())
}

/// The built-in defaults, ready to save as `ragent.toml`.
pub fn print_default() -> anyhow::Result<()> {
    print!("{}", AppConfig::default_toml());
    Ok(())
}
