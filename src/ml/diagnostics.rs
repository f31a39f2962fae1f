// ============================================================
// Layer 5 — Parameter Diagnostics
// ============================================================
// Read-only introspection over the runtime's trainable
// parameters, for an operator chasing a diverged run:
//
//   find_nan       names of parameters holding a non-finite value
//   debug_session  global max / min scalar and which parameter
//                  produced each

use std::fmt;

use crate::domain::traits::NamedParameter;

pub fn find_nan(parameters: &[NamedParameter]) -> Vec<String> {
    parameters
        .iter()
        .filter(|p| p.values.iter().any(|v| !v.is_finite()))
        .map(|p| p.name.clone())
        .collect()
}

/// One extreme value and where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Extreme {
    pub value: f32,
    pub parameter: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange {
    pub max: Extreme,
    pub min: Extreme,
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max {:.6} in '{}', min {:.6} in '{}'",
            self.max.value, self.max.parameter, self.min.value, self.min.parameter
        )
    }
}

/// `None` when there is no scalar at all to look at.
pub fn debug_session(parameters: &[NamedParameter]) -> Option<ValueRange> {
    let mut range: Option<ValueRange> = None;

    for p in parameters {
        for &v in &p.values {
            match range.as_mut() {
                None => {
                    let e = Extreme { value: v, parameter: p.name.clone() };
                    range = Some(ValueRange { max: e.clone(), min: e });
                }
                Some(r) => {
                    if v > r.max.value {
                        r.max = Extreme { value: v, parameter: p.name.clone() };
                    }
                    if v < r.min.value {
                        r.min = Extreme { value: v, parameter: p.name.clone() };
                    }
                }
            }
        }
    }
    range
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Vec<NamedParameter> {
        vec![
            NamedParameter::new("encoder.0.query.weight", vec![0.1, -0.5, 0.3]),
            NamedParameter::new("decoder.0.output.bias", vec![2.5, 0.0]),
            NamedParameter::new("projection.weight", vec![-3.0, 1.0]),
        ]
    }

    #[test]
    fn test_find_nan_flags_non_finite_parameters() {
        let mut p = params();
        assert!(find_nan(&p).is_empty());
        p[1].values[0] = f32::NAN;
        p[2].values[1] = f32::INFINITY;
        assert_eq!(find_nan(&p), vec!["decoder.0.output.bias", "projection.weight"]);
    }

    #[test]
    fn test_debug_session_tracks_global_extremes() {
        let r = debug_session(&params()).unwrap();
        assert_eq!(r.max, Extreme { value: 2.5, parameter: "decoder.0.output.bias".into() });
        assert_eq!(r.min, Extreme { value: -3.0, parameter: "projection.weight".into() });
    }

    #[test]
    fn test_debug_session_on_nothing() {
        assert!(debug_session(&[]).is_none());
        assert!(debug_session(&[NamedParameter::new("empty", vec![])]).is_none());
    }
}
