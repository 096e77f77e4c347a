//! Parameter schemas and their validated form.
//!
//! Validation happens once, when an animation definition is resolved. The evaluators only ever
//! see a [`ParamSet`], which is guaranteed to contain a type-checked, range-checked and
//! default-filled value for every name in the model's schema, so lookups in the hot path never
//! fail and never re-check types.

use animator_api::persistence::{ParamMap, ParamValue, Position};
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub enum ParamKind {
    Float { min: f64, max: f64 },
    Int { min: i64, max: i64 },
    Bool,
    Position,
    Positions { min_len: usize },
    Choice { options: &'static [&'static str] },
}

#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: ParamValue,
}

impl ParamSpec {
    pub fn float(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Float { min, max },
            default: ParamValue::Float { value: default },
        }
    }

    pub fn int(name: &'static str, min: i64, max: i64, default: i64) -> Self {
        Self {
            name,
            kind: ParamKind::Int { min, max },
            default: ParamValue::Int { value: default },
        }
    }

    pub fn bool(name: &'static str, default: bool) -> Self {
        Self {
            name,
            kind: ParamKind::Bool,
            default: ParamValue::Bool { value: default },
        }
    }

    pub fn position(name: &'static str, default: Position) -> Self {
        Self {
            name,
            kind: ParamKind::Position,
            default: ParamValue::Position { value: default },
        }
    }

    pub fn positions(name: &'static str, min_len: usize, default: Vec<Position>) -> Self {
        Self {
            name,
            kind: ParamKind::Positions { min_len },
            default: ParamValue::Positions { value: default },
        }
    }

    pub fn choice(
        name: &'static str,
        options: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Choice { options },
            default: ParamValue::Choice {
                value: default.to_string(),
            },
        }
    }

    fn check(&self, value: &ParamValue) -> Result<(), String> {
        match (&self.kind, value) {
            (ParamKind::Float { min, max }, ParamValue::Float { value }) => {
                if !value.is_finite() {
                    return Err(format!("parameter `{}` must be finite", self.name));
                }
                if value < min || value > max {
                    return Err(format!(
                        "parameter `{}` must be in [{min}, {max}], got {value}",
                        self.name
                    ));
                }
                Ok(())
            }
            (ParamKind::Int { min, max }, ParamValue::Int { value }) => {
                if value < min || value > max {
                    return Err(format!(
                        "parameter `{}` must be in [{min}, {max}], got {value}",
                        self.name
                    ));
                }
                Ok(())
            }
            (ParamKind::Bool, ParamValue::Bool { .. }) => Ok(()),
            (ParamKind::Position, ParamValue::Position { value }) => {
                if !value.is_finite() {
                    return Err(format!("parameter `{}` must be finite", self.name));
                }
                Ok(())
            }
            (ParamKind::Positions { min_len }, ParamValue::Positions { value }) => {
                if value.len() < *min_len {
                    return Err(format!(
                        "parameter `{}` needs at least {min_len} positions, got {}",
                        self.name,
                        value.len()
                    ));
                }
                if value.iter().any(|p| !p.is_finite()) {
                    return Err(format!("parameter `{}` must be finite", self.name));
                }
                Ok(())
            }
            (ParamKind::Choice { options }, ParamValue::Choice { value }) => {
                if options.contains(&value.as_str()) {
                    Ok(())
                } else {
                    Err(format!(
                        "parameter `{}` must be one of {options:?}, got `{value}`",
                        self.name
                    ))
                }
            }
            _ => Err(format!("parameter `{}` has the wrong type", self.name)),
        }
    }
}

/// Validated, default-filled parameter values for one model.
#[derive(Clone, Debug)]
pub struct ParamSet {
    values: BTreeMap<&'static str, ParamValue>,
}

impl ParamSet {
    /// Checks `provided` against `specs` and fills in defaults.
    ///
    /// Unknown names, type mismatches and range violations are all rejected here; nothing is
    /// checked again at evaluation time.
    pub fn validate(specs: &[ParamSpec], provided: &ParamMap) -> Result<Self, String> {
        for name in provided.keys() {
            if !specs.iter().any(|s| s.name == name) {
                return Err(format!("unknown parameter `{name}`"));
            }
        }
        let mut values = BTreeMap::new();
        for spec in specs {
            let value = match provided.get(spec.name) {
                Some(v) => {
                    spec.check(v)?;
                    v.clone()
                }
                None => spec.default.clone(),
            };
            values.insert(spec.name, value);
        }
        Ok(Self { values })
    }

    pub fn f64(&self, name: &str) -> f64 {
        self.values
            .get(name)
            .and_then(ParamValue::as_f64)
            .unwrap_or_default()
    }

    pub fn i64(&self, name: &str) -> i64 {
        self.values
            .get(name)
            .and_then(ParamValue::as_i64)
            .unwrap_or_default()
    }

    pub fn bool(&self, name: &str) -> bool {
        self.values
            .get(name)
            .and_then(ParamValue::as_bool)
            .unwrap_or_default()
    }

    pub fn position(&self, name: &str) -> Position {
        self.values
            .get(name)
            .and_then(ParamValue::as_position)
            .unwrap_or(Position::ZERO)
    }

    pub fn positions(&self, name: &str) -> &[Position] {
        self.values
            .get(name)
            .and_then(ParamValue::as_positions)
            .unwrap_or(&[])
    }

    pub fn choice(&self, name: &str) -> &str {
        self.values
            .get(name)
            .and_then(ParamValue::as_choice)
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<ParamSpec> {
        vec![
            ParamSpec::float("radius", 0.0, 100.0, 1.0),
            ParamSpec::int("turns", 1, 10, 3),
            ParamSpec::position("center", Position::ZERO),
            ParamSpec::choice("plane", &["xy", "xz", "yz"], "xy"),
        ]
    }

    #[test]
    fn fills_defaults() {
        let set = ParamSet::validate(&specs(), &ParamMap::new()).unwrap();
        assert_eq!(set.f64("radius"), 1.0);
        assert_eq!(set.i64("turns"), 3);
        assert_eq!(set.position("center"), Position::ZERO);
        assert_eq!(set.choice("plane"), "xy");
    }

    #[test]
    fn rejects_unknown_name() {
        let mut provided = ParamMap::new();
        provided.insert("radiuss".into(), ParamValue::Float { value: 1.0 });
        let err = ParamSet::validate(&specs(), &provided).unwrap_err();
        assert!(err.contains("unknown parameter"));
    }

    #[test]
    fn rejects_out_of_range() {
        let mut provided = ParamMap::new();
        provided.insert("radius".into(), ParamValue::Float { value: 200.0 });
        assert!(ParamSet::validate(&specs(), &provided).is_err());
    }

    #[test]
    fn rejects_type_mismatch() {
        let mut provided = ParamMap::new();
        provided.insert("radius".into(), ParamValue::Bool { value: true });
        let err = ParamSet::validate(&specs(), &provided).unwrap_err();
        assert!(err.contains("wrong type"));
    }

    #[test]
    fn rejects_non_finite() {
        let mut provided = ParamMap::new();
        provided.insert("radius".into(), ParamValue::Float { value: f64::NAN });
        assert!(ParamSet::validate(&specs(), &provided).is_err());
    }

    #[test]
    fn rejects_bad_choice() {
        let mut provided = ParamMap::new();
        provided.insert(
            "plane".into(),
            ParamValue::Choice {
                value: "xw".into(),
            },
        );
        assert!(ParamSet::validate(&specs(), &provided).is_err());
    }
}
