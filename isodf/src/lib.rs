// src/lib.rs
pub mod config;
pub mod formulas;
pub mod masshunter;
pub mod report;

use std::path::Path;

use anyhow::Result;
use itertools::Itertools;
use log::{info, warn};
use regex::Regex;

use isocore::batch::{calculate_batch, BatchOutcome, CorrectionConfig};

use crate::formulas::read_formula_table;
use crate::masshunter::read_masshunter;

/// Read both input tables and correct every species.
///
/// Cell warnings from the export and unreadable composition rows are merged into the outcome.
pub fn correct_files(
    data: &Path,
    formulas: &Path,
    background: Option<&Regex>,
    config: &CorrectionConfig,
) -> Result<BatchOutcome> {
    let import = read_masshunter(data, background)?;
    let table = read_formula_table(formulas)?;

    info!("correcting {} species with the {} method", import.records.len(), config.method);

    let mut outcome = calculate_batch(&import.records, &table.formulas, config);

    let mut warnings = import.warnings;
    warnings.append(&mut outcome.warnings);
    outcome.warnings = warnings;

    // a species with an unreadable composition row is reported once, not also as missing
    let invalid: Vec<_> = table
        .invalid
        .into_iter()
        .filter(|failure| import.records.iter().any(|record| record.name == failure.species))
        .collect();
    outcome.failures.retain(|failure| !invalid.iter().any(|i| i.species == failure.species));
    outcome.failures.extend(invalid);
    outcome.failures.sort_by(|a, b| a.species.cmp(&b.species));

    if !outcome.failures.is_empty() {
        warn!("no labeling for {}", outcome.failures.iter().map(|f| &f.species).join(", "));
    }

    Ok(outcome)
}
