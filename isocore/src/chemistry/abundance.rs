// Purpose: natural isotope abundances of the elements the correction models
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CorrectionError;

// Heavy isotope abundances, lightest isotope first is derived as 1 - sum(heavy).
const HEAVY_C: [f64; 1] = [0.01082];
const HEAVY_H: [f64; 1] = [0.000116];
const HEAVY_N: [f64; 1] = [0.00366];
const HEAVY_O: [f64; 2] = [0.00038, 0.00204];
const HEAVY_SI: [f64; 2] = [0.046832, 0.030872];

const MASS_NUMBERS_C: [u32; 2] = [12, 13];
const MASS_NUMBERS_H: [u32; 2] = [1, 2];
const MASS_NUMBERS_N: [u32; 2] = [14, 15];
const MASS_NUMBERS_O: [u32; 3] = [16, 17, 18];
const MASS_NUMBERS_SI: [u32; 3] = [28, 29, 30];

/// Elements whose natural abundance is corrected for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Element {
    C,
    O,
    N,
    H,
    Si,
}

impl Element {
    /// Order in which per-element matrices are multiplied.
    pub const CORRECTION_ORDER: [Element; 5] = [Element::C, Element::O, Element::N, Element::H, Element::Si];

    pub fn symbol(&self) -> &'static str {
        match self {
            Element::C => "C",
            Element::O => "O",
            Element::N => "N",
            Element::H => "H",
            Element::Si => "Si",
        }
    }

    fn heavy_abundances(&self) -> &'static [f64] {
        match self {
            Element::C => &HEAVY_C,
            Element::O => &HEAVY_O,
            Element::N => &HEAVY_N,
            Element::H => &HEAVY_H,
            Element::Si => &HEAVY_SI,
        }
    }

    /// natural abundance of every isotope of the element
    ///
    /// Returns:
    ///
    /// * `Vec<f64>` - probabilities, index 0 is the lightest isotope, summing to 1
    ///
    /// # Examples
    ///
    /// ```
    /// use isocore::chemistry::abundance::Element;
    ///
    /// let carbon = Element::C.isotope_abundances();
    /// assert_eq!(carbon.len(), 2);
    /// assert!((carbon.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    /// ```
    pub fn isotope_abundances(&self) -> Vec<f64> {
        let heavy = self.heavy_abundances();
        let lightest = 1.0 - heavy.iter().sum::<f64>();
        std::iter::once(lightest).chain(heavy.iter().copied()).collect()
    }

    pub fn isotope_mass_numbers(&self) -> &'static [u32] {
        match self {
            Element::C => &MASS_NUMBERS_C,
            Element::O => &MASS_NUMBERS_O,
            Element::N => &MASS_NUMBERS_N,
            Element::H => &MASS_NUMBERS_H,
            Element::Si => &MASS_NUMBERS_SI,
        }
    }

    pub fn isotope_count(&self) -> usize {
        self.heavy_abundances().len() + 1
    }
}

impl FromStr for Element {
    type Err = CorrectionError;

    fn from_str(symbol: &str) -> Result<Self, Self::Err> {
        match symbol {
            "C" => Ok(Element::C),
            "O" => Ok(Element::O),
            "N" => Ok(Element::N),
            "H" => Ok(Element::H),
            "Si" => Ok(Element::Si),
            other => Err(CorrectionError::UnknownElement(other.to_string())),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// natural isotope abundances looked up by element symbol
///
/// Arguments:
///
/// * `symbol` - element symbol, e.g. "Si"
///
/// Returns:
///
/// * `Result<Vec<f64>, CorrectionError>` - abundances, or `UnknownElement`
///
/// # Examples
///
/// ```
/// use isocore::chemistry::abundance::isotope_abundances;
///
/// assert_eq!(isotope_abundances("O").unwrap().len(), 3);
/// assert!(isotope_abundances("S").is_err());
/// ```
pub fn isotope_abundances(symbol: &str) -> Result<Vec<f64>, CorrectionError> {
    Ok(symbol.parse::<Element>()?.isotope_abundances())
}

/// isotope mass numbers looked up by element symbol
pub fn isotope_mass_numbers(symbol: &str) -> Result<&'static [u32], CorrectionError> {
    Ok(symbol.parse::<Element>()?.isotope_mass_numbers())
}
