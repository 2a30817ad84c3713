//! Named parameter vectors.

use std::fmt;

use serde::Serialize;

use crate::errors::ConfigError;

/// An ordered, fixed set of named real-valued parameters.
///
/// The name set and order are fixed at construction; only the values change.
/// The same type is used for the shared optimisation state, for snapshots of
/// it and for the two candidate sets of a trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl ParameterVector {
    /// Build a vector from `(name, value)` pairs, rejecting duplicate or empty
    /// names and non-finite values.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        let mut values = Vec::new();

        for (name, value) in pairs {
            let name = name.into();
            if name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "initial_parameters",
                    "parameter names must not be empty",
                ));
            }
            if names.contains(&name) {
                return Err(ConfigError::invalid(
                    "initial_parameters",
                    format!("duplicate parameter name {name:?}"),
                ));
            }
            if !value.is_finite() {
                return Err(ConfigError::invalid(
                    "initial_parameters",
                    format!("{name} must be finite, got {value}"),
                ));
            }
            names.push(name);
            values.push(value);
        }

        if names.is_empty() {
            return Err(ConfigError::invalid(
                "initial_parameters",
                "at least one parameter is required",
            ));
        }

        Ok(Self { names, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Look up a value by parameter name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// A copy with the same names and new values.
    ///
    /// Returns `None` when `values` has a different length.
    pub fn with_values(&self, values: Vec<f64>) -> Option<Self> {
        (values.len() == self.values.len()).then(|| Self {
            names: self.names.clone(),
            values,
        })
    }

    /// Mutable access to the raw values. Length stays fixed.
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// One line of `name:value` pairs for the append-only progress record.
    pub fn to_record_line(&self) -> String {
        self.iter()
            .map(|(name, value)| format!("{name}:{value}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for ParameterVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{name:>16} = {value:<16}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParameterVector {
        ParameterVector::from_pairs([("PAWN_VALUE", 100.0), ("KNIGHT_VALUE", 325.0)]).unwrap()
    }

    #[test]
    fn test_preserves_insertion_order() {
        let v = sample();
        assert_eq!(v.names(), &["PAWN_VALUE".to_string(), "KNIGHT_VALUE".to_string()]);
        assert_eq!(v.values(), &[100.0, 325.0]);
        assert_eq!(v.get("KNIGHT_VALUE"), Some(325.0));
        assert_eq!(v.get("BISHOP_VALUE"), None);
    }

    #[test]
    fn test_rejects_duplicates_and_non_finite() {
        let dup = ParameterVector::from_pairs([("A", 1.0), ("A", 2.0)]);
        assert!(matches!(dup, Err(ConfigError::Invalid { .. })));

        let nan = ParameterVector::from_pairs([("A", f64::NAN)]);
        assert!(nan.is_err());

        let empty = ParameterVector::from_pairs(Vec::<(String, f64)>::new());
        assert!(empty.is_err());
    }

    #[test]
    fn test_with_values_keeps_names() {
        let v = sample();
        let w = v.with_values(vec![1.0, 2.0]).unwrap();
        assert_eq!(w.names(), v.names());
        assert_eq!(w.values(), &[1.0, 2.0]);
        assert!(v.with_values(vec![1.0]).is_none());
    }

    #[test]
    fn test_record_line_format() {
        let v = ParameterVector::from_pairs([("A", 100.0), ("B", 99.5)]).unwrap();
        assert_eq!(v.to_record_line(), "A:100,B:99.5");
    }

    #[test]
    fn test_display_is_one_line_per_parameter() {
        let text = sample().to_string();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("PAWN_VALUE"));
    }
}
