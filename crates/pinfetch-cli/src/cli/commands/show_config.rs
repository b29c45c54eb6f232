//! Config command: print the effective configuration.

use anyhow::Result;
use pinfetch_core::config::{self, PinfetchConfig};
use pinfetch_core::logging;

pub fn run_show_config(cfg: &PinfetchConfig) -> Result<()> {
    println!("# {}", config::config_path()?.display());
    if let Ok(log) = logging::log_file_path() {
        println!("# log: {}", log.display());
    }
    print!("{}", toml::to_string_pretty(cfg)?);
    match cfg.security_config() {
        Ok(sec) if sec.is_protection_disabled() => {
            println!("# WARNING: no trusted domains; every fetch will be rejected")
        }
        Ok(_) => {}
        Err(e) => println!("# INVALID: {}", e),
    }
    Ok(())
}
