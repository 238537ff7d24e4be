use serde::Serialize;
use thiserror::Error;

/// Failure of a single species' correction.
///
/// None of these abort a batch, the batch driver collects them per species.
#[derive(Clone, Debug, Error, PartialEq, Serialize)]
pub enum CorrectionError {
    #[error("unknown element `{0}`, only C, O, N, H and Si are modeled")]
    UnknownElement(String),

    #[error("invalid composition: {0}")]
    InvalidComposition(String),

    #[error("composition contains no modeled element with a positive count")]
    EmptyComposition,

    #[error("correction matrix of size {size} is not invertible")]
    SingularMatrix { size: usize },

    #[error("no elemental composition found for species `{0}`")]
    MissingFormula(String),

    #[error("sample `{0}` was already recorded for this species")]
    DuplicateSample(String),

    #[error("sample `{sample}` has {found} channels, species was recorded with {expected}")]
    InconsistentChannels {
        sample: String,
        expected: usize,
        found: usize,
    },

    #[error("result key `{0}` is produced by both a background and an experimental sample")]
    SampleNameCollision(String),

    #[error("unlabelled fraction {0} is outside [0, 1)")]
    InvalidUnlabelledFraction(f64),

    #[error("reference sample `{0}` is not present for this species")]
    MissingReferenceSample(String),
}

/// Non-fatal conditions reported next to the results.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum WarningKind {
    /// measured vector shorter than the channel count, padded with zeros
    ChannelCountMismatch { expected: usize, found: usize },
    /// raw cell could not be read as a number, 0.0 was used instead
    NonNumericCell { row: usize, column: usize, value: String },
    /// intensities summed to zero or the corrected vector could not be normalized
    DegenerateIntensities,
    /// a second row for an already seen sample was dropped
    DuplicateSample,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorrectionWarning {
    pub species: String,
    pub sample: String,
    pub kind: WarningKind,
}

impl CorrectionWarning {
    pub fn new(species: &str, sample: &str, kind: WarningKind) -> Self {
        CorrectionWarning {
            species: species.to_string(),
            sample: sample.to_string(),
            kind,
        }
    }
}

impl std::fmt::Display for CorrectionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            WarningKind::ChannelCountMismatch { expected, found } => write!(
                f,
                "{}/{}: {} channels measured, {} expected, {}",
                self.species,
                self.sample,
                found,
                expected,
                if found < expected { "padded with zeros" } else { "extra channels ignored" }
            ),
            WarningKind::NonNumericCell { row, column, value } => write!(
                f,
                "{}/{}: could not convert `{}` (row {}, column {}), using 0.0",
                self.species, self.sample, value, row, column
            ),
            WarningKind::DegenerateIntensities => write!(
                f,
                "{}/{}: degenerate intensity vector, no labeling computed",
                self.species, self.sample
            ),
            WarningKind::DuplicateSample => write!(
                f,
                "{}/{}: duplicate sample row dropped",
                self.species, self.sample
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, CorrectionError>;
