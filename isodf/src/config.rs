use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use regex::Regex;

use isocore::algorithm::correction::CorrectionMethod;
use isocore::batch::{CorrectionConfig, UnlabelledCorrection};

/// Correct MassHunter isotopologue intensities for natural isotope abundance.
#[derive(Parser, Debug)]
#[command(name = "isodf", version, about)]
pub struct Cli {
    /// MassHunter CSV export with `<species> M+n Results` columns
    pub data: PathBuf,

    /// composition table: name, formula (e.g. `C8 O2 N1 H26 Si2`), tracer atom count
    pub formulas: PathBuf,

    /// report path, stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON file with correction settings, flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// convolution (cauchy) or combinatorial (species)
    #[arg(long)]
    pub method: Option<CorrectionMethod>,

    /// samples whose name matches this regular expression are background measurements
    #[arg(long)]
    pub background_pattern: Option<String>,

    /// subtract the mean background from every experimental sample
    #[arg(long)]
    pub subtract_background: bool,

    /// fraction of unlabelled biomass to remove, 0 <= f < 1
    #[arg(long)]
    pub unlabelled_fraction: Option<f64>,

    /// sample used as the unlabelled reference distribution
    #[arg(long)]
    pub unlabelled_reference: Option<String>,

    /// worker threads
    #[arg(long)]
    pub threads: Option<usize>,

    /// write failed species and warnings as JSON to this path
    #[arg(long)]
    pub failures: Option<PathBuf>,

    /// more log output, repeat for debug
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// log filter derived from `-v`, `RUST_LOG` still wins
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    pub fn background_regex(&self) -> Result<Option<Regex>> {
        self.background_pattern
            .as_deref()
            .map(|pattern| Regex::new(pattern).with_context(|| format!("invalid background pattern `{}`", pattern)))
            .transpose()
    }

    /// settings from `--config` (or defaults) with the command-line flags applied on top
    pub fn correction_config(&self) -> Result<CorrectionConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => CorrectionConfig::default(),
        };

        if let Some(method) = self.method {
            config.method = method;
        }
        if self.subtract_background {
            config.subtract_background = true;
        }
        if let Some(threads) = self.threads {
            config.num_threads = threads;
        }

        match (self.unlabelled_fraction, &mut config.unlabelled) {
            (Some(fraction), Some(unlabelled)) => unlabelled.fraction = fraction,
            (Some(fraction), None) => {
                config.unlabelled = Some(UnlabelledCorrection { fraction, reference_sample: None });
            }
            (None, _) => {}
        }

        if let Some(reference) = &self.unlabelled_reference {
            match &mut config.unlabelled {
                Some(unlabelled) => unlabelled.reference_sample = Some(reference.clone()),
                None => bail!("--unlabelled-reference needs an unlabelled fraction"),
            }
        }

        if let Some(unlabelled) = &config.unlabelled {
            if !(0.0..1.0).contains(&unlabelled.fraction) {
                bail!("unlabelled fraction {} is outside [0, 1)", unlabelled.fraction);
            }
        }

        Ok(config)
    }
}

pub fn load_config(path: &Path) -> Result<CorrectionConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}
