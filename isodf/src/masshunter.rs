use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use regex::Regex;

use isocore::data::record::Record;
use isocore::error::{CorrectionError, CorrectionWarning, WarningKind};

static ISOTOPOLOGUE_COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"M\+?\d{1,2} Results").expect("isotopologue column pattern is valid"));

/// Sample name used when the export has no `Name` column.
pub const UNNAMED_SAMPLE: &str = "NotFound";

/// Species read from a MassHunter export together with the cells that had to be replaced.
#[derive(Debug, Default)]
pub struct MassHunterImport {
    pub records: Vec<Record>,
    pub warnings: Vec<CorrectionWarning>,
}

/// Read a MassHunter isotopologue export.
///
/// Samples whose name matches `background` are stored as background measurements.
pub fn read_masshunter(path: &Path, background: Option<&Regex>) -> Result<MassHunterImport> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_masshunter(file, background).with_context(|| format!("reading MassHunter export {}", path.display()))
}

pub fn parse_masshunter<R: Read>(reader: R, background: Option<&Regex>) -> Result<MassHunterImport> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for row in csv_reader.records() {
        let row = row.context("parsing CSV row")?;
        rows.push(row.iter().map(|cell| cell.to_string()).collect::<Vec<String>>());
    }

    records_from_rows(&rows, background)
}

/// Build species records from the rows of an export.
///
/// Row 0 names the isotopologue columns (`<species> M+1 Results`), row 1 holds the column
/// titles including `Name`, every following row is one sample.
pub fn records_from_rows(rows: &[Vec<String>], background: Option<&Regex>) -> Result<MassHunterImport> {
    if rows.len() < 2 {
        bail!("expected two header rows, found {}", rows.len());
    }

    let mut records: Vec<Record> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (column, cell) in rows[0].iter().enumerate() {
        let Some(found) = ISOTOPOLOGUE_COLUMN.find(cell) else {
            continue;
        };
        let species = cell.replace(&format!(" {}", found.as_str()), "");
        let species = Record::new(&species).name;

        let position = *index.entry(species.clone()).or_insert_with(|| {
            records.push(Record::new(&species));
            records.len() - 1
        });
        records[position].add_position(column);
    }

    if records.is_empty() {
        bail!("no `M+n Results` columns in the first header row");
    }

    let name_column = rows[1].iter().position(|cell| cell.trim() == "Name");
    if name_column.is_none() {
        warn!("no `Name` column, all samples are called {}", UNNAMED_SAMPLE);
    }

    let mut warnings = Vec::new();

    for (row_index, row) in rows.iter().enumerate().skip(2) {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let sample = name_column
            .and_then(|column| row.get(column))
            .map(|name| name.trim().to_string())
            .unwrap_or_else(|| UNNAMED_SAMPLE.to_string());
        let is_background = background.is_some_and(|pattern| pattern.is_match(&sample));

        for record in records.iter_mut() {
            let intensities: Vec<f64> = record
                .positions()
                .iter()
                .map(|&column| {
                    let cell = row.get(column).map(|c| c.trim()).unwrap_or("");
                    if cell.is_empty() {
                        return 0.0;
                    }
                    cell.parse::<f64>().unwrap_or_else(|_| {
                        let warning = CorrectionWarning::new(
                            &record.name,
                            &sample,
                            WarningKind::NonNumericCell { row: row_index + 1, column: column + 1, value: cell.to_string() },
                        );
                        warn!("{}", warning);
                        warnings.push(warning);
                        0.0
                    })
                })
                .collect();

            let added = if is_background {
                record.add_background(&sample, intensities)
            } else {
                record.add_sample(&sample, intensities)
            };

            match added {
                Ok(()) => {}
                Err(CorrectionError::DuplicateSample(_)) => {
                    let warning = CorrectionWarning::new(&record.name, &sample, WarningKind::DuplicateSample);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
                Err(e) => bail!("row {}: {}", row_index + 1, e),
            }
        }
    }

    info!("read {} species from {} sample rows", records.len(), rows.len() - 2);

    Ok(MassHunterImport { records, warnings })
}
