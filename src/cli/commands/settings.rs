//! Config file command.

use crate::config::{self, Config};
use crate::error::{Error, ResultExt};

/// Show the config file location and effective settings, or write defaults.
pub fn cmd_config(init: bool) -> anyhow::Result<()> {
    if init {
        let path = config::save(&Config::default())
            .map_err(Error::from)
            .with_context("writing default config")?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    match config::config_path() {
        Some(path) if path.exists() => println!("# {}", path.display()),
        Some(path) => println!("# {} (not created, showing defaults)", path.display()),
        None => println!("# no config directory available, showing defaults"),
    }
    print!("{}", toml::to_string_pretty(&config::load())?);
    Ok(())
}
