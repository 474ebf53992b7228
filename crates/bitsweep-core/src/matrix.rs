//! Parameter matrix: the ordered set of configurations a sweep visits.
//!
//! A matrix is a bit-width range, a list of parameter names and a selection
//! policy. The `diagonal` policy sets every parameter to the same width; the
//! `product` policy walks the full Cartesian product of the range over all
//! names. Both yield configurations lazily, in ascending order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};

/// A half-open range of bit-widths, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitRange {
    /// First width in the range.
    pub start: u32,
    /// One past the last width in the range.
    pub end: u32,
}

impl BitRange {
    pub fn new(start: u32, end: u32) -> Self {
        BitRange { start, end }
    }

    /// Number of widths covered.
    pub fn width(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0
    }

    pub fn contains(&self, value: u32) -> bool {
        (self.start..self.end).contains(&value)
    }
}

impl fmt::Display for BitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl FromStr for BitRange {
    type Err = SweepError;

    /// Parse `START..END` (exclusive) or `START..=END` (inclusive).
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SweepError::InvalidRange {
            input: s.to_string(),
        };
        let (lo, hi, inclusive) = if let Some((lo, hi)) = s.split_once("..=") {
            (lo, hi, true)
        } else if let Some((lo, hi)) = s.split_once("..") {
            (lo, hi, false)
        } else {
            return Err(invalid());
        };
        let start: u32 = lo.trim().parse().map_err(|_| invalid())?;
        let mut end: u32 = hi.trim().parse().map_err(|_| invalid())?;
        if inclusive {
            end = end.checked_add(1).ok_or_else(invalid)?;
        }
        Ok(BitRange { start, end })
    }
}

/// How the range is spread over the parameter names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Every parameter takes the same value.
    #[default]
    Diagonal,
    /// Every combination of values across all parameters.
    Product,
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::Diagonal => write!(f, "diagonal"),
            SelectionPolicy::Product => write!(f, "product"),
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "diagonal" => Ok(SelectionPolicy::Diagonal),
            "product" => Ok(SelectionPolicy::Product),
            other => Err(SweepError::InvalidConfig {
                detail: format!("unknown selection policy '{other}' (expected diagonal or product)"),
            }),
        }
    }
}

/// One named compile-time parameter and its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub value: u32,
}

/// One point of the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    params: Vec<Parameter>,
    primary: usize,
}

impl Configuration {
    /// Build a configuration from ordered `(name, value)` pairs.
    ///
    /// `primary` indexes the parameter that names archives and sets the
    /// difficulty count.
    pub fn new(params: Vec<Parameter>, primary: usize) -> Result<Self> {
        if primary >= params.len() {
            return Err(SweepError::InvalidConfig {
                detail: format!(
                    "primary index {primary} out of bounds for {} parameters",
                    params.len()
                ),
            });
        }
        Ok(Configuration { params, primary })
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Look up a parameter value by name.
    pub fn value(&self, name: &str) -> Option<u32> {
        self.params.iter().find(|p| p.name == name).map(|p| p.value)
    }

    pub fn primary(&self) -> &Parameter {
        &self.params[self.primary]
    }

    pub fn primary_value(&self) -> u32 {
        self.primary().value
    }

    /// Number of archived copies this configuration gets.
    pub fn difficulty_levels(&self) -> u32 {
        self.primary_value()
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}={}", p.name, p.value)?;
        }
        Ok(())
    }
}

/// The finite, ordered set of configurations to sweep.
#[derive(Debug, Clone)]
pub struct ParameterMatrix {
    names: Vec<String>,
    primary: usize,
    range: BitRange,
    policy: SelectionPolicy,
    len: usize,
}

impl ParameterMatrix {
    pub fn new(
        names: Vec<String>,
        primary: usize,
        range: BitRange,
        policy: SelectionPolicy,
    ) -> Result<Self> {
        if names.is_empty() {
            return Err(SweepError::InvalidConfig {
                detail: "at least one parameter name is required".into(),
            });
        }
        if primary >= names.len() {
            return Err(SweepError::InvalidConfig {
                detail: format!("primary index {primary} out of bounds"),
            });
        }
        if range.start == 0 {
            return Err(SweepError::InvalidConfig {
                detail: "bit-widths must be positive".into(),
            });
        }
        if range.is_empty() {
            return Err(SweepError::InvalidConfig {
                detail: format!("bit range {range} is empty"),
            });
        }

        let width = range.width() as usize;
        let len = match policy {
            SelectionPolicy::Diagonal => width,
            SelectionPolicy::Product => u32::try_from(names.len())
                .ok()
                .and_then(|n| width.checked_pow(n))
                .ok_or_else(|| SweepError::InvalidConfig {
                    detail: format!(
                        "product of {range} over {} parameters is too large",
                        names.len()
                    ),
                })?,
        };

        Ok(ParameterMatrix {
            names,
            primary,
            range,
            policy,
            len,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn range(&self) -> BitRange {
        self.range
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Number of configurations.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The configuration at position `index` in sweep order.
    pub fn get(&self, index: usize) -> Option<Configuration> {
        if index >= self.len {
            return None;
        }
        let width = self.range.width() as usize;
        let values: Vec<u32> = match self.policy {
            SelectionPolicy::Diagonal => vec![self.range.start + index as u32; self.names.len()],
            SelectionPolicy::Product => {
                // Mixed radix, first name most significant.
                let mut rest = index;
                let mut digits = vec![0u32; self.names.len()];
                for slot in digits.iter_mut().rev() {
                    *slot = self.range.start + (rest % width) as u32;
                    rest /= width;
                }
                digits
            }
        };
        let params = self
            .names
            .iter()
            .zip(values)
            .map(|(name, value)| Parameter {
                name: name.clone(),
                value,
            })
            .collect();
        Some(Configuration {
            params,
            primary: self.primary,
        })
    }

    /// Iterate from the first configuration. Each call starts over.
    pub fn iter(&self) -> MatrixIter<'_> {
        MatrixIter {
            matrix: self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &'a ParameterMatrix {
    type Item = Configuration;
    type IntoIter = MatrixIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over a [`ParameterMatrix`].
#[derive(Debug, Clone)]
pub struct MatrixIter<'a> {
    matrix: &'a ParameterMatrix,
    next: usize,
}

impl Iterator for MatrixIter<'_> {
    type Item = Configuration;

    fn next(&mut self) -> Option<Configuration> {
        let config = self.matrix.get(self.next)?;
        self.next += 1;
        Some(config)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.matrix.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for MatrixIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["A".into(), "B".into(), "C".into()]
    }

    #[test]
    fn parse_exclusive_range() {
        let r: BitRange = "16..18".parse().unwrap();
        assert_eq!(r, BitRange::new(16, 18));
        assert_eq!(r.width(), 2);
    }

    #[test]
    fn parse_inclusive_range() {
        let r: BitRange = "16..=24".parse().unwrap();
        assert_eq!(r, BitRange::new(16, 25));
        assert!(r.contains(24));
        assert!(!r.contains(25));
    }

    #[test]
    fn reject_malformed_ranges() {
        assert!("16".parse::<BitRange>().is_err());
        assert!("a..b".parse::<BitRange>().is_err());
        assert!("1..=4294967295".parse::<BitRange>().is_err());
    }

    #[test]
    fn diagonal_is_ascending_and_equal() {
        let m = ParameterMatrix::new(names(), 2, BitRange::new(16, 18), SelectionPolicy::Diagonal)
            .unwrap();
        let configs: Vec<_> = m.iter().collect();
        assert_eq!(configs.len(), 2);
        for (config, v) in configs.iter().zip([16, 17]) {
            assert!(config.params().iter().all(|p| p.value == v));
            assert_eq!(config.difficulty_levels(), v);
        }
    }

    #[test]
    fn iteration_restarts() {
        let m = ParameterMatrix::new(names(), 2, BitRange::new(3, 6), SelectionPolicy::Diagonal)
            .unwrap();
        let first: Vec<_> = m.iter().collect();
        let second: Vec<_> = m.iter().collect();
        assert_eq!(first, second);
        assert_eq!(m.iter().len(), 3);
    }

    #[test]
    fn product_covers_every_combination_in_order() {
        let m = ParameterMatrix::new(names(), 2, BitRange::new(1, 3), SelectionPolicy::Product)
            .unwrap();
        assert_eq!(m.len(), 8);
        let rendered: Vec<String> = m.iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered[0], "A=1 B=1 C=1");
        assert_eq!(rendered[1], "A=1 B=1 C=2");
        assert_eq!(rendered[2], "A=1 B=2 C=1");
        assert_eq!(rendered[7], "A=2 B=2 C=2");
    }

    #[test]
    fn primary_selects_named_parameter() {
        let m = ParameterMatrix::new(names(), 0, BitRange::new(1, 3), SelectionPolicy::Product)
            .unwrap();
        let last = m.get(m.len() - 1).unwrap();
        assert_eq!(last.primary().name, "A");
        assert_eq!(last.value("C"), Some(2));
        assert!(m.get(m.len()).is_none());
    }

    #[test]
    fn reject_degenerate_matrices() {
        let diag = SelectionPolicy::Diagonal;
        assert!(ParameterMatrix::new(vec![], 0, BitRange::new(1, 2), diag).is_err());
        assert!(ParameterMatrix::new(names(), 3, BitRange::new(1, 2), diag).is_err());
        assert!(ParameterMatrix::new(names(), 0, BitRange::new(0, 2), diag).is_err());
        assert!(ParameterMatrix::new(names(), 0, BitRange::new(5, 5), diag).is_err());
    }

    #[test]
    fn policy_round_trips_through_text() {
        for policy in [SelectionPolicy::Diagonal, SelectionPolicy::Product] {
            assert_eq!(policy.to_string().parse::<SelectionPolicy>().unwrap(), policy);
        }
        assert!("random".parse::<SelectionPolicy>().is_err());
    }
}
