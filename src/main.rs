mod audio;
mod cli;
mod config;
mod dsp;
mod naming;
mod process;

use anyhow::{bail, Result};
use clap::Parser;

use cli::Cli;
use config::Config;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => {
            let cfg = config::load_config(path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => {
            if cli.master.is_none() {
                bail!("Either a configuration file (--config) or a master file (--master) is required");
            }
            Config::default()
        }
    };

    cli.apply_to(&mut cfg)?;

    if cfg.produce_mask() == 0 {
        log::warn!("nothing to produce; pass --produce or set \"produce\" in the config");
        return Ok(());
    }

    process::process_file_groups(&cfg)
}
