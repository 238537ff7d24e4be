use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::chemistry::abundance::Element;
use crate::error::CorrectionError;

static ELEMENT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][a-z]?)(-?\d*)").expect("element token pattern is valid"));

/// Atom counts of the modeled elements in one molecular species.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementalComposition {
    counts: BTreeMap<Element, u32>,
}

impl ElementalComposition {
    pub fn new() -> Self {
        ElementalComposition { counts: BTreeMap::new() }
    }

    /// Build a composition from `(symbol, count)` pairs.
    ///
    /// Arguments:
    ///
    /// * `pairs` - element symbols and atom counts, repeated symbols are summed
    ///
    /// Returns:
    ///
    /// * `Result<ElementalComposition, CorrectionError>` - `UnknownElement` for unmodeled
    ///   symbols, `InvalidComposition` for negative counts
    ///
    /// # Examples
    ///
    /// ```
    /// use isocore::chemistry::composition::ElementalComposition;
    /// use isocore::chemistry::abundance::Element;
    ///
    /// let composition = ElementalComposition::from_pairs(&[("C", 8), ("H", 26), ("C", 1)]).unwrap();
    /// assert_eq!(composition.count(Element::C), 9);
    /// assert_eq!(composition.count(Element::Si), 0);
    /// ```
    pub fn from_pairs(pairs: &[(&str, i64)]) -> Result<Self, CorrectionError> {
        let mut composition = ElementalComposition::new();
        for &(symbol, count) in pairs {
            let element: Element = symbol.parse()?;
            composition.add(element, count)?;
        }
        Ok(composition)
    }

    pub fn add(&mut self, element: Element, count: i64) -> Result<(), CorrectionError> {
        let count = u32::try_from(count).map_err(|_| {
            CorrectionError::InvalidComposition(format!("atom count {} for {} is not a non-negative integer", count, element))
        })?;
        let total = self.counts.entry(element).or_insert(0);
        *total = total.checked_add(count).ok_or_else(|| {
            CorrectionError::InvalidComposition(format!("atom count for {} exceeds {}", element, u32::MAX))
        })?;
        Ok(())
    }

    pub fn count(&self, element: Element) -> u32 {
        self.counts.get(&element).copied().unwrap_or(0)
    }

    /// elements with a positive count, in correction order (C, O, N, H, Si)
    pub fn present_elements(&self) -> Vec<(Element, u32)> {
        Element::CORRECTION_ORDER
            .iter()
            .map(|&element| (element, self.count(element)))
            .filter(|&(_, count)| count > 0)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.present_elements().is_empty()
    }
}

impl FromStr for ElementalComposition {
    type Err = CorrectionError;

    /// Parses `Element<count>` tokens such as `C8 O2 N1 H26 Si2`; `C8H26` is accepted as well,
    /// a missing count means one atom.
    fn from_str(formula: &str) -> Result<Self, Self::Err> {
        let mut composition = ElementalComposition::new();

        for token in formula.split_whitespace() {
            let token = token.trim_matches(|c| c == '"' || c == '\'');
            let mut consumed = 0;

            for captures in ELEMENT_TOKEN.captures_iter(token) {
                let whole = &captures[0];
                if captures.get(0).map(|m| m.start()) != Some(consumed) {
                    break;
                }
                consumed += whole.len();

                let element: Element = captures[1].parse()?;
                let count = match &captures[2] {
                    "" => 1,
                    digits => digits.parse::<i64>().map_err(|_| {
                        CorrectionError::InvalidComposition(format!("cannot read atom count in `{}`", token))
                    })?,
                };
                composition.add(element, count)?;
            }

            if consumed != token.len() {
                return Err(CorrectionError::InvalidComposition(format!("cannot read formula token `{}`", token)));
            }
        }

        Ok(composition)
    }
}

/// Composition of a species together with the number of tracer-labelable atoms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesFormula {
    pub composition: ElementalComposition,
    pub tracer_atoms: u32,
}

impl SpeciesFormula {
    pub fn new(composition: ElementalComposition, tracer_atoms: u32) -> Self {
        SpeciesFormula { composition, tracer_atoms }
    }

    /// isotopologue channel count N, one more than the tracer atom count
    pub fn channels(&self) -> usize {
        self.tracer_atoms as usize + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spaced_tokens() {
        let composition: ElementalComposition = "C8 O2 N1 H26 Si2".parse().unwrap();
        assert_eq!(composition.count(Element::C), 8);
        assert_eq!(composition.count(Element::O), 2);
        assert_eq!(composition.count(Element::N), 1);
        assert_eq!(composition.count(Element::H), 26);
        assert_eq!(composition.count(Element::Si), 2);
    }

    #[test]
    fn test_parse_contiguous_and_implicit_count() {
        let composition: ElementalComposition = "C6H12O".parse().unwrap();
        assert_eq!(composition.count(Element::C), 6);
        assert_eq!(composition.count(Element::H), 12);
        assert_eq!(composition.count(Element::O), 1);
    }

    #[test]
    fn test_parse_quoted() {
        let composition: ElementalComposition = "\"C3 H7\"".parse().unwrap();
        assert_eq!(composition.count(Element::C), 3);
        assert_eq!(composition.count(Element::H), 7);
    }

    #[test]
    fn test_parse_unknown_element() {
        let result = "C3 S1".parse::<ElementalComposition>();
        assert_eq!(result, Err(CorrectionError::UnknownElement("S".to_string())));
    }

    #[test]
    fn test_parse_negative_count() {
        let result = "C-3".parse::<ElementalComposition>();
        assert!(matches!(result, Err(CorrectionError::InvalidComposition(_))));
    }

    #[test]
    fn test_repeated_symbol_overflow() {
        let result = "C4294967295 C1".parse::<ElementalComposition>();
        assert!(matches!(result, Err(CorrectionError::InvalidComposition(_))));

        let composition: ElementalComposition = "C4294967294 C1".parse().unwrap();
        assert_eq!(composition.count(Element::C), u32::MAX);
    }

    #[test]
    fn test_parse_garbage() {
        let result = "C3 12".parse::<ElementalComposition>();
        assert!(matches!(result, Err(CorrectionError::InvalidComposition(_))));
    }

    #[test]
    fn test_present_elements_in_correction_order() {
        let composition: ElementalComposition = "Si2 H26 C8 N0".parse().unwrap();
        let present: Vec<Element> = composition.present_elements().iter().map(|(e, _)| *e).collect();
        assert_eq!(present, vec![Element::C, Element::H, Element::Si]);
        assert!(!composition.is_empty());
        assert!("N0".parse::<ElementalComposition>().unwrap().is_empty());
    }

    #[test]
    fn test_species_channels() {
        let formula = SpeciesFormula::new("C3".parse().unwrap(), 3);
        assert_eq!(formula.channels(), 4);
    }
}
