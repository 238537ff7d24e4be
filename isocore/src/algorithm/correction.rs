use std::fmt;
use std::str::FromStr;

use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::algorithm::isotope::{convolve_pow_truncated, multinomial_probability};
use crate::chemistry::abundance::Element;
use crate::chemistry::composition::ElementalComposition;
use crate::error::CorrectionError;

/// Largest mass shift the combinatorial method resolves for three-isotope elements.
pub const MAX_COMBINATORIAL_SHIFT: usize = 3;

/// How the per-element correction matrix is computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionMethod {
    /// self-convolution of the abundance vector, tracks only the total mass shift
    #[default]
    Convolution,
    /// explicit multinomial terms, shifts above 3 are zero for O and Si
    Combinatorial,
}

impl FromStr for CorrectionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "convolution" | "cauchy" => Ok(CorrectionMethod::Convolution),
            "combinatorial" | "species" => Ok(CorrectionMethod::Combinatorial),
            other => Err(format!("unknown correction method `{}`, expected convolution or combinatorial", other)),
        }
    }
}

impl fmt::Display for CorrectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrectionMethod::Convolution => f.write_str("convolution"),
            CorrectionMethod::Combinatorial => f.write_str("combinatorial"),
        }
    }
}

/// correction matrix for a single element
///
/// Arguments:
///
/// * `element` - element to correct for
/// * `n` - number of atoms of the element in the molecule
/// * `channels` - isotopologue channel count N
/// * `method` - convolution or combinatorial construction
///
/// Returns:
///
/// * `Result<DMatrix<f64>, CorrectionError>` - lower-triangular N x N matrix, entry (i, j) is the
///   probability that natural isotopes move intensity from channel j to channel i
///
/// # Examples
///
/// ```
/// use isocore::algorithm::correction::{element_correction_matrix, CorrectionMethod};
/// use isocore::chemistry::abundance::Element;
///
/// let matrix = element_correction_matrix(Element::C, 3, 4, CorrectionMethod::Convolution).unwrap();
/// assert_eq!(matrix.nrows(), 4);
/// assert_eq!(matrix[(0, 1)], 0.0);
/// ```
pub fn element_correction_matrix(
    element: Element,
    n: u32,
    channels: usize,
    method: CorrectionMethod,
) -> Result<DMatrix<f64>, CorrectionError> {
    if channels < 1 {
        return Err(CorrectionError::InvalidComposition(
            "isotopologue channel count must be at least 1".to_string(),
        ));
    }

    let matrix = match method {
        CorrectionMethod::Convolution => convolution_matrix(element, n, channels),
        CorrectionMethod::Combinatorial => combinatorial_matrix(element, n, channels),
    };

    debug!("{} x{} correction matrix ({}): {}", element, n, method, matrix);
    Ok(matrix)
}

fn convolution_matrix(element: Element, n: u32, channels: usize) -> DMatrix<f64> {
    let distribution = convolve_pow_truncated(&element.isotope_abundances(), n, channels);

    DMatrix::from_fn(channels, channels, |i, j| {
        if j > i {
            0.0
        } else {
            distribution.get(i - j).copied().unwrap_or(0.0)
        }
    })
}

fn combinatorial_matrix(element: Element, n: u32, channels: usize) -> DMatrix<f64> {
    DMatrix::from_fn(channels, channels, |i, j| {
        if j > i {
            0.0
        } else {
            shift_probability(element, n, i - j)
        }
    })
}

/// probability that n atoms of the element shift the nominal mass by exactly `shift`
fn shift_probability(element: Element, n: u32, shift: usize) -> f64 {
    if element.isotope_count() == 2 {
        return match u32::try_from(shift) {
            Ok(m1) if m1 <= n => multinomial_probability(element, n - m1, m1, 0),
            _ => 0.0,
        };
    }

    // known approximation: larger shifts are possible once n > 1 but are not resolved
    if shift > MAX_COMBINATORIAL_SHIFT {
        return 0.0;
    }

    // every placement of m1 single-unit and m2 double-unit isotopes with m1 + 2 * m2 = shift
    (0..=shift / 2)
        .map(|m2| (shift - 2 * m2, m2))
        .filter(|&(m1, m2)| m1 + m2 <= n as usize)
        .map(|(m1, m2)| multinomial_probability(element, n - (m1 + m2) as u32, m1 as u32, m2 as u32))
        .sum()
}

/// full correction matrix for a molecule
///
/// Multiplies the element matrices left to right in the order C, O, N, H, Si, skipping
/// elements that are absent.
///
/// Arguments:
///
/// * `composition` - elemental composition of the molecule
/// * `channels` - isotopologue channel count N
/// * `method` - convolution or combinatorial construction
///
/// Returns:
///
/// * `Result<DMatrix<f64>, CorrectionError>` - composed N x N matrix, `EmptyComposition` when no
///   modeled element has a positive count
///
/// # Examples
///
/// ```
/// use isocore::algorithm::correction::{full_correction_matrix, CorrectionMethod};
/// use isocore::chemistry::composition::ElementalComposition;
///
/// let composition: ElementalComposition = "C8 O2 N1 H26 Si2".parse().unwrap();
/// let matrix = full_correction_matrix(&composition, 4, CorrectionMethod::Convolution).unwrap();
/// assert!((matrix[(0, 0)] - 0.77079057).abs() < 1e-6);
/// ```
pub fn full_correction_matrix(
    composition: &ElementalComposition,
    channels: usize,
    method: CorrectionMethod,
) -> Result<DMatrix<f64>, CorrectionError> {
    let present = composition.present_elements();
    if present.is_empty() {
        return Err(CorrectionError::EmptyComposition);
    }

    let mut result: Option<DMatrix<f64>> = None;

    for (element, count) in present {
        let matrix = element_correction_matrix(element, count, channels, method)?;
        result = match result {
            Some(accumulated) => Some(accumulated * matrix),
            None => Some(matrix),
        };
    }

    result.ok_or(CorrectionError::EmptyComposition)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_matrix_close(a: &DMatrix<f64>, b: &DMatrix<f64>, tolerance: f64) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < tolerance, "{} != {}", x, y);
        }
    }

    #[test]
    fn test_methods_agree_for_two_isotope_elements() {
        for element in [Element::C, Element::H, Element::N] {
            for n in 0..30 {
                for channels in [1, 2, 4, 7] {
                    let convolution = element_correction_matrix(element, n, channels, CorrectionMethod::Convolution).unwrap();
                    let combinatorial = element_correction_matrix(element, n, channels, CorrectionMethod::Combinatorial).unwrap();
                    assert_matrix_close(&convolution, &combinatorial, 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_methods_agree_up_to_shift_three_for_three_isotope_elements() {
        for element in [Element::O, Element::Si] {
            for n in 0..6 {
                let convolution = element_correction_matrix(element, n, 6, CorrectionMethod::Convolution).unwrap();
                let combinatorial = element_correction_matrix(element, n, 6, CorrectionMethod::Combinatorial).unwrap();
                for i in 0..6 {
                    for j in 0..=i {
                        if i - j <= MAX_COMBINATORIAL_SHIFT {
                            assert!((convolution[(i, j)] - combinatorial[(i, j)]).abs() < 1e-9);
                        } else {
                            assert_eq!(combinatorial[(i, j)], 0.0);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_matrices_are_lower_triangular() {
        for method in [CorrectionMethod::Convolution, CorrectionMethod::Combinatorial] {
            for element in Element::CORRECTION_ORDER {
                let matrix = element_correction_matrix(element, 5, 6, method).unwrap();
                for i in 0..6 {
                    for j in (i + 1)..6 {
                        assert_eq!(matrix[(i, j)], 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_columns_conserve_probability() {
        // columns hold the whole distribution when N - 1 - j >= n * max_shift
        for element in Element::CORRECTION_ORDER {
            let n = 3;
            let support = n as usize * (element.isotope_count() - 1);
            let channels = support + 4;
            let matrix = element_correction_matrix(element, n, channels, CorrectionMethod::Convolution).unwrap();
            for j in 0..(channels - support) {
                let column_sum: f64 = matrix.column(j).iter().sum();
                assert!((column_sum - 1.0).abs() < 1e-12, "{} column {} sums to {}", element, j, column_sum);
            }
        }
    }

    #[test]
    fn test_zero_atoms_is_identity() {
        let matrix = element_correction_matrix(Element::Si, 0, 3, CorrectionMethod::Combinatorial).unwrap();
        assert_eq!(matrix, DMatrix::identity(3, 3));
        let matrix = element_correction_matrix(Element::Si, 0, 3, CorrectionMethod::Convolution).unwrap();
        assert_eq!(matrix, DMatrix::identity(3, 3));
    }

    #[test]
    fn test_large_atom_count_is_bounded_by_channels() {
        let start = std::time::Instant::now();
        let matrix = element_correction_matrix(Element::C, 40000, 4, CorrectionMethod::Convolution).unwrap();
        let huge = element_correction_matrix(Element::H, u32::MAX, 4, CorrectionMethod::Convolution).unwrap();
        assert!(start.elapsed() < std::time::Duration::from_secs(1));

        assert_eq!(matrix.shape(), (4, 4));
        assert!(matrix[(0, 0)] > 0.0);
        let expected = element_correction_matrix(Element::C, 40000, 4, CorrectionMethod::Combinatorial).unwrap();
        assert!(((matrix[(1, 0)] - expected[(1, 0)]) / expected[(1, 0)]).abs() < 1e-6);
        assert!(huge.iter().all(|value| value.is_finite()));
    }

    #[test]
    fn test_zero_channels_rejected() {
        let result = element_correction_matrix(Element::C, 3, 0, CorrectionMethod::Convolution);
        assert!(matches!(result, Err(CorrectionError::InvalidComposition(_))));
    }

    #[test]
    fn test_empty_composition_rejected() {
        let composition: ElementalComposition = "C0 H0".parse().unwrap();
        let result = full_correction_matrix(&composition, 3, CorrectionMethod::Convolution);
        assert_eq!(result, Err(CorrectionError::EmptyComposition));
    }

    #[test]
    fn test_single_element_composition_equals_element_matrix() {
        let composition: ElementalComposition = "N2".parse().unwrap();
        let full = full_correction_matrix(&composition, 3, CorrectionMethod::Convolution).unwrap();
        let element = element_correction_matrix(Element::N, 2, 3, CorrectionMethod::Convolution).unwrap();
        assert_eq!(full, element);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("cauchy".parse::<CorrectionMethod>(), Ok(CorrectionMethod::Convolution));
        assert_eq!("Combinatorial".parse::<CorrectionMethod>(), Ok(CorrectionMethod::Combinatorial));
        assert_eq!("species".parse::<CorrectionMethod>(), Ok(CorrectionMethod::Combinatorial));
        assert!("exact".parse::<CorrectionMethod>().is_err());
    }
}
