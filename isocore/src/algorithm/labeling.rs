use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::algorithm::correction::{full_correction_matrix, CorrectionMethod};
use crate::chemistry::composition::SpeciesFormula;
use crate::data::labeling::SampleLabeling;
use crate::error::CorrectionError;

/// Inverted correction matrix of one species, applied to every sample of that species.
#[derive(Clone, Debug)]
pub struct LabelingSolver {
    inverse: DMatrix<f64>,
}

impl LabelingSolver {
    /// invert a composed correction matrix
    ///
    /// Arguments:
    ///
    /// * `correction` - square, lower-triangular correction matrix
    ///
    /// Returns:
    ///
    /// * `Result<LabelingSolver, CorrectionError>` - `InvalidComposition` for an empty, non-square
    ///   or zero-diagonal matrix, `SingularMatrix` when inversion fails anyway
    pub fn new(correction: DMatrix<f64>) -> Result<Self, CorrectionError> {
        let size = correction.nrows();
        if size == 0 || !correction.is_square() {
            return Err(CorrectionError::InvalidComposition(format!(
                "correction matrix must be square and non-empty, got {} x {}",
                correction.nrows(),
                correction.ncols()
            )));
        }

        if let Some(position) = correction.diagonal().iter().position(|d| *d <= 0.0 || !d.is_finite()) {
            return Err(CorrectionError::InvalidComposition(format!(
                "correction matrix diagonal entry {} is not positive",
                position
            )));
        }

        let inverse = correction
            .try_inverse()
            .ok_or(CorrectionError::SingularMatrix { size })?;

        Ok(LabelingSolver { inverse })
    }

    /// assemble and invert the correction matrix of a species
    ///
    /// # Examples
    ///
    /// ```
    /// use isocore::algorithm::correction::CorrectionMethod;
    /// use isocore::algorithm::labeling::LabelingSolver;
    /// use isocore::chemistry::composition::SpeciesFormula;
    ///
    /// let formula = SpeciesFormula::new("C8 O2 N1 H26 Si2".parse().unwrap(), 3);
    /// let solver = LabelingSolver::for_formula(&formula, CorrectionMethod::Convolution).unwrap();
    /// let labeling = solver.correct(&[0.6228, 0.1517, 0.0749, 0.1507]);
    /// assert!((labeling.fractional_labeling - 0.1959).abs() < 1e-4);
    /// ```
    pub fn for_formula(formula: &SpeciesFormula, method: CorrectionMethod) -> Result<Self, CorrectionError> {
        let correction = full_correction_matrix(&formula.composition, formula.channels(), method)?;
        LabelingSolver::new(correction)
    }

    pub fn channels(&self) -> usize {
        self.inverse.nrows()
    }

    pub fn inverse(&self) -> &DMatrix<f64> {
        &self.inverse
    }

    /// correct one measured intensity vector for natural isotope abundance
    ///
    /// Channels beyond N are ignored, missing channels count as zero. Input that sums to zero or
    /// cannot be normalized after correction yields a result flagged `degenerate`.
    pub fn correct(&self, intensities: &[f64]) -> SampleLabeling {
        let channels = self.channels();
        let normalized = normalize_intensities(intensities, channels);

        if normalized.iter().all(|v| *v == 0.0) {
            debug!("all-zero intensity vector, result is degenerate");
            return SampleLabeling::degenerate(channels);
        }

        let corrected = &self.inverse * DVector::from_vec(normalized);
        let total: f64 = corrected.iter().sum();

        if !total.is_finite() || total.abs() < f64::EPSILON {
            debug!("corrected distribution sums to {}, result is degenerate", total);
            return SampleLabeling::degenerate(channels);
        }

        let mdv: Vec<f64> = corrected.iter().map(|v| v / total).collect();
        let labeling = fractional_labeling(&mdv);
        SampleLabeling::new(labeling, mdv)
    }
}

/// scale the first `channels` intensities to sum to one
///
/// Arguments:
///
/// * `intensities` - raw measured intensities, m0 first
/// * `channels` - number of channels to keep
///
/// Returns:
///
/// * `Vec<f64>` - normalized vector of length `channels`, all zeros when the intensities sum to zero
///
/// # Examples
///
/// ```
/// use isocore::algorithm::labeling::normalize_intensities;
///
/// assert_eq!(normalize_intensities(&[2.0, 6.0, 100.0], 2), vec![0.25, 0.75]);
/// assert_eq!(normalize_intensities(&[1.0], 3), vec![1.0, 0.0, 0.0]);
/// assert_eq!(normalize_intensities(&[0.0, 0.0], 2), vec![0.0, 0.0]);
/// ```
pub fn normalize_intensities(intensities: &[f64], channels: usize) -> Vec<f64> {
    let window: Vec<f64> = (0..channels)
        .map(|channel| intensities.get(channel).copied().unwrap_or(0.0))
        .collect();
    let total: f64 = window.iter().sum();

    if total == 0.0 || !total.is_finite() {
        return vec![0.0; channels];
    }

    window.into_iter().map(|value| value / total).collect()
}

/// mean number of labeled positions divided by the maximum possible
///
/// Arguments:
///
/// * `mdv` - mass distribution vector m0..m(N-1)
///
/// Returns:
///
/// * `f64` - `sum(i * mdv[i]) / ((N - 1) * sum(mdv))`, 0.0 when N is 1 or the vector sums to zero
///
/// # Examples
///
/// ```
/// use isocore::algorithm::labeling::fractional_labeling;
///
/// assert_eq!(fractional_labeling(&[1.0, 0.0, 0.0]), 0.0);
/// assert_eq!(fractional_labeling(&[0.0, 0.0, 1.0]), 1.0);
/// assert_eq!(fractional_labeling(&[0.5, 0.0, 0.5]), 0.5);
/// ```
pub fn fractional_labeling(mdv: &[f64]) -> f64 {
    let max_index = mdv.len().saturating_sub(1) as f64;
    let numerator: f64 = mdv.iter().enumerate().map(|(i, v)| i as f64 * v).sum();
    let denominator: f64 = max_index * mdv.iter().sum::<f64>();

    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// remove the contribution of unlabelled biomass from a corrected distribution
///
/// Arguments:
///
/// * `mdva` - corrected mass distribution vector
/// * `reference` - distribution of the unlabelled material, missing channels count as zero
/// * `fraction` - unlabelled fraction f, 0 <= f < 1
///
/// Returns:
///
/// * `Result<Vec<f64>, CorrectionError>` - `(mdva - f * reference) / (1 - f)`
///
/// # Examples
///
/// ```
/// use isocore::algorithm::labeling::correct_unlabelled;
///
/// let corrected = correct_unlabelled(&[0.75, 0.25], &[1.0, 0.0], 0.5).unwrap();
/// assert_eq!(corrected, vec![0.5, 0.5]);
/// assert!(correct_unlabelled(&[0.6, 0.4], &[1.0, 0.0], 1.0).is_err());
/// ```
pub fn correct_unlabelled(mdva: &[f64], reference: &[f64], fraction: f64) -> Result<Vec<f64>, CorrectionError> {
    if !(0.0..1.0).contains(&fraction) {
        return Err(CorrectionError::InvalidUnlabelledFraction(fraction));
    }

    Ok(mdva
        .iter()
        .enumerate()
        .map(|(channel, value)| {
            let unlabelled = reference.get(channel).copied().unwrap_or(0.0);
            (value - fraction * unlabelled) / (1.0 - fraction)
        })
        .collect())
}

/// [`correct_unlabelled`] applied to a sample result, fractional labeling is recomputed
pub fn apply_unlabelled(labeling: &SampleLabeling, reference: &[f64], fraction: f64) -> Result<SampleLabeling, CorrectionError> {
    if labeling.degenerate {
        return Ok(labeling.clone());
    }
    let mdv = correct_unlabelled(&labeling.mdv, reference, fraction)?;
    let fractional = fractional_labeling(&mdv);
    Ok(SampleLabeling::new(fractional, mdv))
}

/// distribution of unlabelled material after natural abundance correction, `[1, 0, ...]`
pub fn natural_reference(channels: usize) -> Vec<f64> {
    (0..channels).map(|channel| if channel == 0 { 1.0 } else { 0.0 }).collect()
}
