use std::collections::BTreeMap;

use itertools::{EitherOrBoth, Itertools};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::CorrectionError;

/// Measured isotopologue intensities of one molecular species.
///
/// Sample names are unique within each of the experimental and background sets, and every
/// vector of a species has the same channel count as the first one added.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    samples: BTreeMap<String, Vec<f64>>,
    background: BTreeMap<String, Vec<f64>>,
    positions: Vec<usize>,
    channels: Option<usize>,
}

impl Record {
    pub fn new(name: &str) -> Self {
        Record {
            name: name.trim().trim_matches(|c| c == '"' || c == '\'').to_string(),
            ..Default::default()
        }
    }

    /// remember a raw table column holding one of this species' isotopologues
    pub fn add_position(&mut self, position: usize) {
        self.positions.push(position);
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// add the intensities of an experimental sample, m0 first
    pub fn add_sample(&mut self, sample: &str, intensities: Vec<f64>) -> Result<(), CorrectionError> {
        self.check_channels(sample, &intensities)?;
        if self.samples.contains_key(sample) {
            return Err(CorrectionError::DuplicateSample(sample.to_string()));
        }
        self.samples.insert(sample.to_string(), intensities);
        Ok(())
    }

    /// add the intensities of a background measurement, m0 first
    pub fn add_background(&mut self, sample: &str, intensities: Vec<f64>) -> Result<(), CorrectionError> {
        self.check_channels(sample, &intensities)?;
        if self.background.contains_key(sample) {
            return Err(CorrectionError::DuplicateSample(sample.to_string()));
        }
        self.background.insert(sample.to_string(), intensities);
        Ok(())
    }

    fn check_channels(&mut self, sample: &str, intensities: &[f64]) -> Result<(), CorrectionError> {
        match self.channels {
            Some(expected) if expected != intensities.len() => Err(CorrectionError::InconsistentChannels {
                sample: sample.to_string(),
                expected,
                found: intensities.len(),
            }),
            Some(_) => Ok(()),
            None => {
                self.channels = Some(intensities.len());
                Ok(())
            }
        }
    }

    pub fn samples(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.samples
    }

    pub fn background(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.background
    }

    pub fn channels(&self) -> Option<usize> {
        self.channels
    }

    pub fn contains_sample(&self, sample: &str) -> bool {
        self.samples.contains_key(sample) || self.background.contains_key(sample)
    }

    /// element-wise mean of the background measurements
    ///
    /// Shorter vectors contribute zero at their missing trailing positions.
    ///
    /// Returns:
    ///
    /// * `Option<Vec<f64>>` - `None` when no background was recorded
    ///
    /// # Examples
    ///
    /// ```
    /// use isocore::data::record::Record;
    ///
    /// let mut record = Record::new("Ala");
    /// record.add_background("blank1", vec![2.0, 4.0]).unwrap();
    /// record.add_background("blank2", vec![4.0, 0.0]).unwrap();
    /// assert_eq!(record.average_background(), Some(vec![3.0, 2.0]));
    /// ```
    pub fn average_background(&self) -> Option<Vec<f64>> {
        if self.background.is_empty() {
            return None;
        }

        let total = self.background.values().fold(Vec::new(), |acc: Vec<f64>, intensities| {
            acc.iter()
                .zip_longest(intensities.iter())
                .map(|pair| match pair {
                    EitherOrBoth::Both(a, b) => a + b,
                    EitherOrBoth::Left(a) => *a,
                    EitherOrBoth::Right(b) => *b,
                })
                .collect()
        });

        let count = self.background.len() as f64;
        Some(total.into_iter().map(|value| value / count).collect())
    }

    /// experimental intensities with the mean background subtracted channel by channel
    ///
    /// Returns new vectors; the recorded intensities are left untouched. Without background the
    /// samples are returned as recorded.
    pub fn background_corrected_samples(&self) -> BTreeMap<String, Vec<f64>> {
        let Some(average) = self.average_background() else {
            debug!("{}: no background recorded, samples used as measured", self.name);
            return self.samples.clone();
        };

        self.samples
            .iter()
            .map(|(sample, intensities)| {
                let corrected = intensities
                    .iter()
                    .enumerate()
                    .map(|(channel, value)| value - average.get(channel).copied().unwrap_or(0.0))
                    .collect();
                (sample.clone(), corrected)
            })
            .collect()
    }
}
