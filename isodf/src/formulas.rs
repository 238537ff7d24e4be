use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use isocore::batch::SpeciesFailure;
use isocore::chemistry::composition::{ElementalComposition, SpeciesFormula};
use isocore::error::CorrectionError;

/// Species formulas read from a composition table; rows that could not be read become failures.
#[derive(Debug, Default)]
pub struct FormulaTable {
    pub formulas: HashMap<String, SpeciesFormula>,
    pub invalid: Vec<SpeciesFailure>,
}

/// Read a composition table with rows `name, "C8 O2 N1 H26 Si2", tracer_atoms`.
pub fn read_formula_table(path: &Path) -> Result<FormulaTable> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_formula_table(file).with_context(|| format!("reading composition table {}", path.display()))
}

pub fn parse_formula_table<R: Read>(reader: R) -> Result<FormulaTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut table = FormulaTable::default();

    for row in csv_reader.records() {
        let row = row.context("parsing CSV row")?;
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        let name = row.get(0).unwrap_or("").trim_matches(|c| c == '"' || c == '\'').to_string();

        // the last row of a species wins, whether it parses or not
        let repeated = table.formulas.remove(&name).is_some() || table.invalid.iter().any(|f| f.species == name);
        table.invalid.retain(|failure| failure.species != name);
        if repeated {
            warn!("{}: composition given twice, using the last row", name);
        }

        match parse_formula_row(&row) {
            Ok(formula) => {
                table.formulas.insert(name, formula);
            }
            Err(error) => {
                warn!("{}: {}", name, error);
                table.invalid.push(SpeciesFailure { species: name, error });
            }
        }
    }

    info!("read {} species compositions, {} invalid", table.formulas.len(), table.invalid.len());
    Ok(table)
}

fn parse_formula_row(row: &csv::StringRecord) -> Result<SpeciesFormula, CorrectionError> {
    let (Some(formula), Some(tracer)) = (row.get(1), row.get(2)) else {
        return Err(CorrectionError::InvalidComposition(format!(
            "expected name, formula and tracer atom count, found {} columns",
            row.len()
        )));
    };

    let composition: ElementalComposition = formula.parse()?;
    let tracer_atoms = tracer
        .parse::<i64>()
        .ok()
        .and_then(|count| u32::try_from(count).ok())
        .ok_or_else(|| CorrectionError::InvalidComposition(format!("tracer atom count `{}` is not a non-negative integer", tracer)))?;

    Ok(SpeciesFormula::new(composition, tracer_atoms))
}
