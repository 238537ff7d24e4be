use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use isocore::batch::{BatchOutcome, SpeciesFailure};
use isocore::data::labeling::LabelingSource;
use isocore::error::CorrectionWarning;

const FIXED_COLUMNS: [&str; 4] = ["Species", "Labelling Source", "Sample Name", "Labelling %"];

fn source_label(source: LabelingSource) -> &'static str {
    match source {
        LabelingSource::Background => "background",
        LabelingSource::Sample => "sample",
    }
}

/// Write the labeling report as CSV.
///
/// One row per species and sample, sorted by species then sample name. Degenerate results keep
/// their row with empty numeric cells.
pub fn write_report<W: Write>(writer: W, outcome: &BatchOutcome) -> Result<()> {
    let channels = outcome.max_result_length().saturating_sub(1);
    let width = FIXED_COLUMNS.len() + channels;

    let mut csv_writer = csv::Writer::from_writer(writer);

    let header: Vec<String> = FIXED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain((0..channels).map(|i| format!("m{}", i)))
        .collect();
    csv_writer.write_record(&header).context("writing report header")?;

    for (species, labeling) in &outcome.labelings {
        for (sample, source, result) in labeling.iter() {
            let mut row = vec![species.clone(), source_label(source).to_string(), sample.to_string()];

            if !result.degenerate {
                row.extend(result.to_vec().iter().map(|value| value.to_string()));
            }
            row.resize(width, String::new());

            csv_writer
                .write_record(&row)
                .with_context(|| format!("writing report row {}/{}", species, sample))?;
        }
    }

    csv_writer.flush().context("flushing report")?;
    Ok(())
}

#[derive(Serialize)]
struct Diagnostics<'a> {
    failures: &'a [SpeciesFailure],
    warnings: &'a [CorrectionWarning],
}

/// Write failed species and warnings as JSON.
pub fn write_diagnostics<W: Write>(writer: W, outcome: &BatchOutcome) -> Result<()> {
    let diagnostics = Diagnostics {
        failures: &outcome.failures,
        warnings: &outcome.warnings,
    };
    serde_json::to_writer_pretty(writer, &diagnostics).context("writing diagnostics")?;
    Ok(())
}
