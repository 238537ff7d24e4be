use std::fs::File;
use std::io::{self, BufWriter};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use isodf::config::Cli;
use isodf::correct_files;
use isodf::report::{write_diagnostics, write_report};

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level())).init();

    let config = cli.correction_config()?;
    let background = cli.background_regex()?;

    let outcome = correct_files(&cli.data, &cli.formulas, background.as_ref(), &config)?;

    match &cli.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            write_report(BufWriter::new(file), &outcome)?;
            info!("report written to {}", path.display());
        }
        None => write_report(io::stdout().lock(), &outcome)?,
    }

    if let Some(path) = &cli.failures {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_diagnostics(BufWriter::new(file), &outcome)?;
    } else if !outcome.failures.is_empty() {
        warn!("{} species failed, pass --failures to keep the details", outcome.failures.len());
    }

    Ok(())
}
