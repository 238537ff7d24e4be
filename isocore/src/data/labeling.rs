use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CorrectionError;

/// Suffix marking results that were computed from a background measurement.
pub const BACKGROUND_MARKER: &str = "*";

/// Corrected result of one sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleLabeling {
    /// mean fraction of labeled tracer positions, 0.0 for degenerate input
    pub fractional_labeling: f64,
    /// corrected mass distribution vector m0..m(N-1)
    pub mdv: Vec<f64>,
    /// set when the measured intensities could not be corrected
    pub degenerate: bool,
}

impl SampleLabeling {
    pub fn new(fractional_labeling: f64, mdv: Vec<f64>) -> Self {
        SampleLabeling { fractional_labeling, mdv, degenerate: false }
    }

    pub fn degenerate(channels: usize) -> Self {
        SampleLabeling {
            fractional_labeling: 0.0,
            mdv: vec![0.0; channels],
            degenerate: true,
        }
    }

    /// `[fractional labeling, m0, m1, ...]`
    pub fn to_vec(&self) -> Vec<f64> {
        std::iter::once(self.fractional_labeling).chain(self.mdv.iter().copied()).collect()
    }
}

/// Where a result came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelingSource {
    Background,
    Sample,
}

/// Labeling results of one species, keyed by sample name.
///
/// Background results carry [`BACKGROUND_MARKER`] on their key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Labeling {
    pub species: String,
    results: BTreeMap<String, (LabelingSource, SampleLabeling)>,
}

impl Labeling {
    pub fn new(species: &str) -> Self {
        Labeling {
            species: species.to_string(),
            results: BTreeMap::new(),
        }
    }

    pub fn background_key(sample: &str) -> String {
        format!("{}{}", sample, BACKGROUND_MARKER)
    }

    /// Insert a result. A key that is already taken is a collision and fails instead of
    /// overwriting.
    pub fn insert(&mut self, source: LabelingSource, sample: &str, labeling: SampleLabeling) -> Result<(), CorrectionError> {
        let key = match source {
            LabelingSource::Background => Labeling::background_key(sample),
            LabelingSource::Sample => sample.to_string(),
        };

        if self.results.contains_key(&key) {
            return Err(CorrectionError::SampleNameCollision(key));
        }
        self.results.insert(key, (source, labeling));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&SampleLabeling> {
        self.results.get(key).map(|(_, labeling)| labeling)
    }

    /// results in sample name order with their source
    pub fn iter(&self) -> impl Iterator<Item = (&str, LabelingSource, &SampleLabeling)> {
        self.results.iter().map(|(key, (source, labeling))| (key.as_str(), *source, labeling))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// widest `[fractional labeling, m0, ...]` row among the results
    pub fn max_result_length(&self) -> usize {
        self.results.values().map(|(_, r)| r.mdv.len() + 1).max().unwrap_or(0)
    }
}
