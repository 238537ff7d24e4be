use statrs::function::factorial::ln_factorial;

use crate::chemistry::abundance::Element;

/// convolve two mass-shift distributions
///
/// Arguments:
///
/// * `dist_a` - first distribution, index is the mass shift in nominal units
/// * `dist_b` - second distribution, index is the mass shift in nominal units
///
/// Returns:
///
/// * `Vec<f64>` - distribution of the summed mass shift, length `a + b - 1`
///
/// # Examples
///
/// ```
/// use isocore::algorithm::isotope::convolve;
///
/// let result = convolve(&[0.5, 0.5], &[0.5, 0.5]);
/// assert_eq!(result, vec![0.25, 0.5, 0.25]);
/// ```
pub fn convolve(dist_a: &[f64], dist_b: &[f64]) -> Vec<f64> {
    convolve_truncated(dist_a, dist_b, usize::MAX)
}

/// convolve two distributions, keeping only the first `max_len` mass shifts
///
/// Shifts at or beyond `max_len` are never computed, so the cost is bounded by `max_len`
/// and not by the length of the inputs.
pub fn convolve_truncated(dist_a: &[f64], dist_b: &[f64], max_len: usize) -> Vec<f64> {
    if dist_a.is_empty() || dist_b.is_empty() || max_len == 0 {
        return Vec::new();
    }

    let len = (dist_a.len() + dist_b.len() - 1).min(max_len);
    let mut result = vec![0.0; len];

    for (shift_a, abundance_a) in dist_a.iter().take(len).enumerate() {
        for (shift_b, abundance_b) in dist_b.iter().take(len - shift_a).enumerate() {
            result[shift_a + shift_b] += abundance_a * abundance_b;
        }
    }

    result
}

/// convolve a distribution with itself so that it covers n atoms
///
/// Arguments:
///
/// * `dist` - single atom distribution
/// * `n` - number of atoms
///
/// Returns:
///
/// * `Vec<f64>` - distribution of the total mass shift over `n` atoms
///
/// # Examples
///
/// ```
/// use isocore::algorithm::isotope::convolve_pow;
///
/// let result = convolve_pow(&[0.5, 0.5], 2);
/// assert_eq!(result, vec![0.25, 0.5, 0.25]);
/// assert_eq!(convolve_pow(&[0.9, 0.1], 0), vec![1.0]);
/// ```
pub fn convolve_pow(dist: &[f64], n: u32) -> Vec<f64> {
    convolve_pow_truncated(dist, n, usize::MAX)
}

/// self-convolution over `n` atoms, keeping only the first `max_len` mass shifts
///
/// # Examples
///
/// ```
/// use isocore::algorithm::isotope::{convolve_pow, convolve_pow_truncated};
///
/// let full = convolve_pow(&[0.9, 0.1], 5);
/// assert_eq!(convolve_pow_truncated(&[0.9, 0.1], 5, 3), full[..3].to_vec());
/// ```
pub fn convolve_pow_truncated(dist: &[f64], n: u32, max_len: usize) -> Vec<f64> {
    if n == 0 || max_len == 0 {
        return vec![1.0]; // delta distribution
    }

    let mut result: Vec<f64> = dist.iter().copied().take(max_len).collect();
    if n == 1 {
        return result;
    }

    let mut power: u64 = 2;

    while power <= n as u64 {
        result = convolve_truncated(&result, &result, max_len); // square to reach the next power of 2
        power *= 2;
    }

    // fill in the remainder when n is not a power of 2
    let covered = (power / 2) as u32;
    if covered < n {
        result = convolve_truncated(&result, &convolve_pow_truncated(dist, n - covered, max_len), max_len);
    }

    result
}

/// probability that `m1` atoms carry the first heavy isotope, `m2` the second and `m0` none
///
/// Arguments:
///
/// * `element` - element the atoms belong to
/// * `m0` - atoms at the lightest isotope
/// * `m1` - atoms at the first heavy isotope
/// * `m2` - atoms at the second heavy isotope, ignored for two-isotope elements
///
/// Returns:
///
/// * `f64` - `n! / (m0! m1! m2!) * p0^m0 * p1^m1 * p2^m2`
///
/// # Examples
///
/// ```
/// use isocore::algorithm::isotope::multinomial_probability;
/// use isocore::chemistry::abundance::Element;
///
/// let p = multinomial_probability(Element::C, 0, 1, 0);
/// assert!((p - 0.01082).abs() < 1e-12);
/// ```
pub fn multinomial_probability(element: Element, m0: u32, m1: u32, m2: u32) -> f64 {
    let abundances = element.isotope_abundances();
    let m2 = if abundances.len() > 2 { m2 } else { 0 };

    // log space keeps n! finite for large atom counts
    let mut ln_probability = ln_factorial((m0 + m1 + m2) as u64)
        - ln_factorial(m0 as u64)
        - ln_factorial(m1 as u64)
        - ln_factorial(m2 as u64);

    for (count, abundance) in [m0, m1, m2].iter().zip(abundances.iter()) {
        if *count > 0 {
            ln_probability += *count as f64 * abundance.ln();
        }
    }

    ln_probability.exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_pow(dist: &[f64], n: u32) -> Vec<f64> {
        let mut result = dist.to_vec();
        for _ in 1..n {
            result = convolve(&result, dist);
        }
        result
    }

    #[test]
    fn test_convolve_pow_matches_repeated_convolution() {
        let oxygen = Element::O.isotope_abundances();
        for n in 1..12 {
            let fast = convolve_pow(&oxygen, n);
            let slow = naive_pow(&oxygen, n);
            assert_eq!(fast.len(), slow.len());
            for (a, b) in fast.iter().zip(slow.iter()) {
                assert!((a - b).abs() < 1e-14);
            }
        }
    }

    #[test]
    fn test_convolve_pow_conserves_probability() {
        let silicon = Element::Si.isotope_abundances();
        let result = convolve_pow(&silicon, 7);
        assert_eq!(result.len(), 15);
        assert!((result.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_truncated_prefix_matches_full() {
        let silicon = Element::Si.isotope_abundances();
        for n in [1, 2, 5, 13] {
            let full = convolve_pow(&silicon, n);
            for len in 1..6 {
                let truncated = convolve_pow_truncated(&silicon, n, len);
                assert_eq!(truncated.len(), len.min(full.len()));
                assert_eq!(truncated[..], full[..truncated.len()]);
            }
        }
        assert_eq!(convolve_truncated(&[0.5, 0.5], &[0.5, 0.5], 2), vec![0.25, 0.5]);
    }

    #[test]
    fn test_truncated_large_atom_count() {
        let carbon = Element::C.isotope_abundances();
        let result = convolve_pow_truncated(&carbon, u32::MAX, 4);
        assert_eq!(result.len(), 4);
        assert!(result.iter().all(|p| p.is_finite() && *p >= 0.0));
    }

    #[test]
    fn test_convolve_empty() {
        assert!(convolve(&[], &[1.0]).is_empty());
    }

    #[test]
    fn test_multinomial_binomial_case() {
        // 3 carbons, exactly one 13C
        let p = Element::C.isotope_abundances();
        let expected = 3.0 * p[0] * p[0] * p[1];
        assert!((multinomial_probability(Element::C, 2, 1, 0) - expected).abs() < 1e-14);
    }

    #[test]
    fn test_multinomial_ignores_m2_for_two_isotope_elements() {
        assert_eq!(
            multinomial_probability(Element::N, 2, 1, 5),
            multinomial_probability(Element::N, 2, 1, 0)
        );
    }

    #[test]
    fn test_multinomial_three_isotope_case() {
        let p = Element::O.isotope_abundances();
        let expected = 2.0 * p[1] * p[2];
        assert!((multinomial_probability(Element::O, 0, 1, 1) - expected).abs() < 1e-14);
    }
}
