use std::collections::{BTreeMap, HashMap};

use log::{error, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::algorithm::correction::CorrectionMethod;
use crate::algorithm::labeling::{apply_unlabelled, natural_reference, LabelingSolver};
use crate::chemistry::composition::SpeciesFormula;
use crate::data::labeling::{Labeling, LabelingSource, SampleLabeling};
use crate::data::record::Record;
use crate::error::{CorrectionError, CorrectionWarning, WarningKind};

/// Removal of unlabelled biomass from experimental samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnlabelledCorrection {
    /// unlabelled fraction f, 0 <= f < 1
    pub fraction: f64,
    /// sample whose corrected distribution is the unlabelled reference, `[1, 0, ...]` when unset
    #[serde(default)]
    pub reference_sample: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    pub method: CorrectionMethod,
    pub subtract_background: bool,
    pub unlabelled: Option<UnlabelledCorrection>,
    pub num_threads: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        CorrectionConfig {
            method: CorrectionMethod::Convolution,
            subtract_background: false,
            unlabelled: None,
            num_threads: 4,
        }
    }
}

/// A species that could not be corrected.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpeciesFailure {
    pub species: String,
    pub error: CorrectionError,
}

/// Results of a batch: successful species, failed species and collected warnings.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub labelings: BTreeMap<String, Labeling>,
    pub failures: Vec<SpeciesFailure>,
    pub warnings: Vec<CorrectionWarning>,
}

impl BatchOutcome {
    /// widest `[fractional labeling, m0, ...]` row over all species
    pub fn max_result_length(&self) -> usize {
        self.labelings.values().map(|l| l.max_result_length()).max().unwrap_or(0)
    }
}

fn channel_warning(record: &Record, sample: &str, channels: usize, found: usize) -> Option<CorrectionWarning> {
    (found != channels).then(|| {
        CorrectionWarning::new(&record.name, sample, WarningKind::ChannelCountMismatch { expected: channels, found })
    })
}

/// correct every background and experimental sample of one species
///
/// Arguments:
///
/// * `record` - measured intensities of the species
/// * `formula` - composition and tracer atom count of the species
/// * `config` - correction settings
///
/// Returns:
///
/// * `Result<(Labeling, Vec<CorrectionWarning>), CorrectionError>` - results keyed by sample name,
///   background results carry the `*` marker
pub fn calculate_labeling(
    record: &Record,
    formula: &SpeciesFormula,
    config: &CorrectionConfig,
) -> Result<(Labeling, Vec<CorrectionWarning>), CorrectionError> {
    let solver = LabelingSolver::for_formula(formula, config.method)?;
    let channels = solver.channels();

    let mut labeling = Labeling::new(&record.name);
    let mut warnings = Vec::new();

    let mut correct = |sample: &str, intensities: &[f64]| -> SampleLabeling {
        warnings.extend(channel_warning(record, sample, channels, intensities.len()));
        let result = solver.correct(intensities);
        if result.degenerate {
            warnings.push(CorrectionWarning::new(&record.name, sample, WarningKind::DegenerateIntensities));
        }
        result
    };

    let background: Vec<(String, SampleLabeling)> = record
        .background()
        .iter()
        .map(|(sample, intensities)| (sample.clone(), correct(sample, intensities)))
        .collect();

    let samples = if config.subtract_background {
        record.background_corrected_samples()
    } else {
        record.samples().clone()
    };

    let mut corrected: BTreeMap<String, SampleLabeling> = samples
        .iter()
        .map(|(sample, intensities)| (sample.clone(), correct(sample, intensities)))
        .collect();

    if let Some(unlabelled) = &config.unlabelled {
        let reference = match &unlabelled.reference_sample {
            Some(name) => match corrected.get(name) {
                Some(result) if !result.degenerate => result.mdv.clone(),
                _ => return Err(CorrectionError::MissingReferenceSample(name.clone())),
            },
            None => natural_reference(channels),
        };

        corrected = corrected
            .iter()
            .map(|(sample, result)| Ok((sample.clone(), apply_unlabelled(result, &reference, unlabelled.fraction)?)))
            .collect::<Result<_, CorrectionError>>()?;
    }

    for (sample, result) in background {
        labeling.insert(LabelingSource::Background, &sample, result)?;
    }
    for (sample, result) in corrected {
        labeling.insert(LabelingSource::Sample, &sample, result)?;
    }

    Ok((labeling, warnings))
}

/// correct a batch of species, one species' failure never stops the others
///
/// Arguments:
///
/// * `records` - measured species
/// * `formulas` - composition and tracer atom count per species name
/// * `config` - correction settings, `num_threads` sizes the worker pool
///
/// Returns:
///
/// * `BatchOutcome` - labelings of successful species, failures and warnings
pub fn calculate_batch(
    records: &[Record],
    formulas: &HashMap<String, SpeciesFormula>,
    config: &CorrectionConfig,
) -> BatchOutcome {
    let run = || -> Vec<Result<(Labeling, Vec<CorrectionWarning>), SpeciesFailure>> {
        records
            .par_iter()
            .map(|record| {
                let formula = formulas.get(&record.name).ok_or_else(|| SpeciesFailure {
                    species: record.name.clone(),
                    error: CorrectionError::MissingFormula(record.name.clone()),
                })?;
                calculate_labeling(record, formula, config).map_err(|error| SpeciesFailure {
                    species: record.name.clone(),
                    error,
                })
            })
            .collect()
    };

    let results = match ThreadPoolBuilder::new().num_threads(config.num_threads).build() {
        Ok(pool) => pool.install(run),
        Err(e) => {
            warn!("could not build a thread pool of {} threads ({}), using the global pool", config.num_threads, e);
            run()
        }
    };

    let mut outcome = BatchOutcome::default();

    for result in results {
        match result {
            Ok((labeling, warnings)) => {
                for warning in &warnings {
                    warn!("{}", warning);
                }
                outcome.warnings.extend(warnings);
                outcome.labelings.insert(labeling.species.clone(), labeling);
            }
            Err(failure) => {
                error!("{}: {}", failure.species, failure.error);
                outcome.failures.push(failure);
            }
        }
    }

    info!(
        "corrected {} species, {} failed, {} warnings",
        outcome.labelings.len(),
        outcome.failures.len(),
        outcome.warnings.len()
    );

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula() -> SpeciesFormula {
        SpeciesFormula::new("C8 O2 N1 H26 Si2".parse().unwrap(), 3)
    }

    fn record() -> Record {
        let mut record = Record::new("Val");
        record.add_sample("s1", vec![0.6228, 0.1517, 0.0749, 0.1507]).unwrap();
        record.add_sample("s2", vec![0.0, 0.0, 0.0, 0.0]).unwrap();
        record
    }

    #[test]
    fn test_calculate_labeling_samples() {
        let (labeling, warnings) = calculate_labeling(&record(), &formula(), &CorrectionConfig::default()).unwrap();
        assert_eq!(labeling.len(), 2);
        assert!((labeling.get("s1").unwrap().fractional_labeling - 0.196025).abs() < 1e-4);
        assert!(labeling.get("s2").unwrap().degenerate);
        assert_eq!(
            warnings,
            vec![CorrectionWarning::new("Val", "s2", WarningKind::DegenerateIntensities)]
        );
    }

    #[test]
    fn test_background_results_are_marked_and_subtracted() {
        let mut record = Record::new("Val");
        record.add_background("blank", vec![0.1, 0.0, 0.0, 0.0]).unwrap();
        record.add_sample("s1", vec![0.7228, 0.1517, 0.0749, 0.1507]).unwrap();

        let config = CorrectionConfig { subtract_background: true, ..Default::default() };
        let (labeling, _) = calculate_labeling(&record, &formula(), &config).unwrap();

        let background = labeling.get("blank*").unwrap();
        assert!(!background.degenerate);
        assert!((labeling.get("s1").unwrap().fractional_labeling - 0.196025).abs() < 1e-4);
        // the recorded intensities are not touched by subtraction
        assert_eq!(record.samples()["s1"][0], 0.7228);
    }

    #[test]
    fn test_background_ignored_without_subtraction() {
        let mut record = Record::new("Val");
        record.add_background("blank", vec![0.1, 0.0, 0.0, 0.0]).unwrap();
        record.add_sample("s1", vec![0.6228, 0.1517, 0.0749, 0.1507]).unwrap();

        let (with_background, _) = calculate_labeling(&record, &formula(), &CorrectionConfig::default()).unwrap();
        let (without_background, _) = calculate_labeling(&self::record(), &formula(), &CorrectionConfig::default()).unwrap();
        assert_eq!(with_background.get("s1"), without_background.get("s1"));
    }

    #[test]
    fn test_short_vectors_warn() {
        let mut record = Record::new("Val");
        record.add_sample("s1", vec![0.6, 0.4]).unwrap();
        let (_, warnings) = calculate_labeling(&record, &formula(), &CorrectionConfig::default()).unwrap();
        assert_eq!(
            warnings,
            vec![CorrectionWarning::new("Val", "s1", WarningKind::ChannelCountMismatch { expected: 4, found: 2 })]
        );
    }

    #[test]
    fn test_extra_channels_warn() {
        let mut record = Record::new("Val");
        record.add_sample("s1", vec![0.6228, 0.1517, 0.0749, 0.1507, 0.02, 0.01]).unwrap();
        let (labeling, warnings) = calculate_labeling(&record, &formula(), &CorrectionConfig::default()).unwrap();
        assert_eq!(
            warnings,
            vec![CorrectionWarning::new("Val", "s1", WarningKind::ChannelCountMismatch { expected: 4, found: 6 })]
        );
        assert!(warnings[0].to_string().contains("extra channels ignored"));
        assert_eq!(labeling.get("s1").unwrap().mdv.len(), 4);
    }

    #[test]
    fn test_collision_fails_species() {
        let mut record = Record::new("Val");
        record.add_background("s1", vec![0.6228, 0.1517, 0.0749, 0.1507]).unwrap();
        record.add_sample("s1*", vec![0.6228, 0.1517, 0.0749, 0.1507]).unwrap();
        let result = calculate_labeling(&record, &formula(), &CorrectionConfig::default());
        assert_eq!(result, Err(CorrectionError::SampleNameCollision("s1*".to_string())));
    }

    #[test]
    fn test_unlabelled_reference_sample() {
        let mut record = Record::new("Val");
        record.add_sample("s1", vec![0.6228, 0.1517, 0.0749, 0.1507]).unwrap();
        record.add_sample("unlabelled", vec![0.7699, 0.1521, 0.0674, 0.0088]).unwrap();

        let config = CorrectionConfig {
            unlabelled: Some(UnlabelledCorrection { fraction: 0.0, reference_sample: Some("unlabelled".to_string()) }),
            ..Default::default()
        };
        let (corrected, _) = calculate_labeling(&record, &formula(), &config).unwrap();
        let (plain, _) = calculate_labeling(&record, &formula(), &CorrectionConfig::default()).unwrap();
        assert_eq!(corrected.get("s1"), plain.get("s1"));

        let missing = CorrectionConfig {
            unlabelled: Some(UnlabelledCorrection { fraction: 0.1, reference_sample: Some("nope".to_string()) }),
            ..Default::default()
        };
        assert_eq!(
            calculate_labeling(&record, &formula(), &missing),
            Err(CorrectionError::MissingReferenceSample("nope".to_string()))
        );
    }

    #[test]
    fn test_natural_reference_raises_labeling() {
        let config = CorrectionConfig {
            unlabelled: Some(UnlabelledCorrection { fraction: 0.1, reference_sample: None }),
            ..Default::default()
        };
        let (corrected, _) = calculate_labeling(&record(), &formula(), &config).unwrap();
        let (plain, _) = calculate_labeling(&record(), &formula(), &CorrectionConfig::default()).unwrap();
        assert!(corrected.get("s1").unwrap().fractional_labeling > plain.get("s1").unwrap().fractional_labeling);
    }

    #[test]
    fn test_batch_isolates_failures() {
        let mut formulas = HashMap::new();
        formulas.insert("Val".to_string(), formula());
        formulas.insert("Bad".to_string(), SpeciesFormula::new("C0".parse().unwrap(), 2));

        let mut bad = Record::new("Bad");
        bad.add_sample("s1", vec![1.0, 0.0, 0.0]).unwrap();
        let mut orphan = Record::new("Orphan");
        orphan.add_sample("s1", vec![1.0, 0.0]).unwrap();

        let config = CorrectionConfig { num_threads: 2, ..Default::default() };
        let outcome = calculate_batch(&[record(), bad, orphan], &formulas, &config);

        assert_eq!(outcome.labelings.len(), 1);
        assert!(outcome.labelings.contains_key("Val"));
        assert_eq!(outcome.failures.len(), 2);
        assert!(outcome.failures.contains(&SpeciesFailure {
            species: "Bad".to_string(),
            error: CorrectionError::EmptyComposition
        }));
        assert!(outcome.failures.contains(&SpeciesFailure {
            species: "Orphan".to_string(),
            error: CorrectionError::MissingFormula("Orphan".to_string())
        }));
        assert_eq!(outcome.max_result_length(), 5);
    }
}
