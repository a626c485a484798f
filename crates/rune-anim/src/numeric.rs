//! Minimal CSS numeric values for timeline times.
//!
//! Only what the engine needs to report times with units: plain numbers,
//! percentages and times. Compound sums are representable but unsupported by
//! conversions, which warn and return `None` instead of failing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AnimationError, Result};

/// Unit of a [`CssUnitValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CssUnit {
    Number,
    Percent,
    Ms,
    S,
}

impl CssUnit {
    fn suffix(self) -> &'static str {
        match self {
            Self::Number => "",
            Self::Percent => "%",
            Self::Ms => "ms",
            Self::S => "s",
        }
    }

    fn category(self) -> UnitCategory {
        match self {
            Self::Number => UnitCategory::Number,
            Self::Percent => UnitCategory::Percent,
            Self::Ms | Self::S => UnitCategory::Time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitCategory {
    Number,
    Percent,
    Time,
}

/// A single number with a unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CssUnitValue {
    pub value: f64,
    pub unit: CssUnit,
}

impl CssUnitValue {
    pub fn new(value: f64, unit: CssUnit) -> Self {
        Self { value, unit }
    }

    pub fn number(value: f64) -> Self {
        Self::new(value, CssUnit::Number)
    }

    pub fn percent(value: f64) -> Self {
        Self::new(value, CssUnit::Percent)
    }

    pub fn ms(value: f64) -> Self {
        Self::new(value, CssUnit::Ms)
    }

    pub fn seconds(value: f64) -> Self {
        Self::new(value, CssUnit::S)
    }

    /// Value in milliseconds, or `None` with a warning for non-time units.
    pub fn to_millis(&self) -> Option<f64> {
        match self.unit {
            CssUnit::Ms => Some(self.value),
            CssUnit::S => Some(self.value * 1000.0),
            unit => {
                tracing::warn!(?unit, value = self.value, "cannot convert to milliseconds");
                None
            }
        }
    }

    /// Value in the canonical unit of its category, for comparisons.
    fn canonical(&self) -> f64 {
        match self.unit {
            CssUnit::S => self.value * 1000.0,
            _ => self.value,
        }
    }
}

impl fmt::Display for CssUnitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

/// A numeric value: one unit value or a sum of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CssNumericValue {
    Unit(CssUnitValue),
    Sum(Vec<CssUnitValue>),
}

impl CssNumericValue {
    /// Value in milliseconds. Sums and non-time units warn and yield `None`.
    pub fn to_millis(&self) -> Option<f64> {
        match self {
            Self::Unit(value) => value.to_millis(),
            Self::Sum(terms) => {
                tracing::warn!(terms = terms.len(), "compound numeric values are not supported");
                None
            }
        }
    }

    pub fn as_unit(&self) -> Option<&CssUnitValue> {
        match self {
            Self::Unit(value) => Some(value),
            Self::Sum(_) => None,
        }
    }

    /// The smallest of `values`.
    ///
    /// Fails with a Type error when the list is empty, contains a sum, or
    /// mixes incompatible units such as a raw number and a time.
    pub fn min(values: &[CssNumericValue]) -> Result<CssNumericValue> {
        Self::pick(values, |candidate, best| candidate < best)
    }

    /// The largest of `values`. Fails like [`CssNumericValue::min`].
    pub fn max(values: &[CssNumericValue]) -> Result<CssNumericValue> {
        Self::pick(values, |candidate, best| candidate > best)
    }

    fn pick(values: &[CssNumericValue], wins: impl Fn(f64, f64) -> bool) -> Result<CssNumericValue> {
        let mut units = values.iter().map(|v| {
            v.as_unit()
                .copied()
                .ok_or_else(|| AnimationError::type_error("cannot compare compound numeric values"))
        });
        let mut best = units
            .next()
            .ok_or_else(|| AnimationError::type_error("min/max needs at least one value"))??;
        for unit in units {
            let unit = unit?;
            if unit.unit.category() != best.unit.category() {
                return Err(AnimationError::type_error(format!(
                    "incompatible units: {} and {}",
                    best, unit
                )));
            }
            if wins(unit.canonical(), best.canonical()) {
                best = unit;
            }
        }
        Ok(CssNumericValue::Unit(best))
    }
}

impl From<CssUnitValue> for CssNumericValue {
    fn from(value: CssUnitValue) -> Self {
        Self::Unit(value)
    }
}

impl fmt::Display for CssNumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(value) => write!(f, "{value}"),
            Self::Sum(terms) => {
                f.write_str("calc(")?;
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" + ")?;
                    }
                    write!(f, "{term}")?;
                }
                f.write_str(")")
            }
        }
    }
}
