//! Easing functions for animation timing.
//!
//! This module implements the Web Animations timing functions:
//! - Linear
//! - Ease, EaseIn, EaseOut, EaseInOut (standard CSS curves)
//! - CubicBezier (custom bezier curves)
//! - Steps (stepped animations, every jump term)
//!
//! Easings are parsed from their CSS descriptor and print back to it, so an
//! [`EasingFunction`] round-trips through `EffectTiming::easing`.
//!
//! # Usage
//!
//! ```
//! use rune_anim::easing::EasingFunction;
//!
//! let ease: EasingFunction = "ease-in-out".parse().unwrap();
//! let progress = ease.evaluate(0.5, false);
//!
//! let steps: EasingFunction = "steps(5, jump-end)".parse().unwrap();
//! assert_eq!(steps.evaluate(0.29, false), 0.2);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors produced when an easing descriptor cannot be parsed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EasingError {
    /// The descriptor is not a known keyword or function.
    #[error("unrecognized easing `{0}`")]
    Unknown(String),

    /// A cubic-bezier with the wrong arity, a non-number, or x outside [0, 1].
    #[error("invalid cubic-bezier: {0}")]
    InvalidCubicBezier(String),

    /// A step count that is not a positive integer (or < 2 for jump-none).
    #[error("invalid step count `{0}`")]
    InvalidStepCount(String),

    /// A jump term that is not one of the six CSS keywords.
    #[error("unrecognized jump term `{0}`")]
    UnknownJumpTerm(String),
}

/// Position for stepped animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepPosition {
    /// CSS `jump-start`.
    JumpStart,
    /// CSS `jump-end`.
    JumpEnd,
    /// CSS `jump-none`: no jump at either end.
    JumpNone,
    /// CSS `jump-both`: jumps at both ends.
    JumpBoth,
    /// CSS `start`, same behavior as `jump-start`.
    Start,
    /// CSS `end`, same behavior as `jump-end`.
    #[default]
    End,
}

impl StepPosition {
    fn jumps_at_start(self) -> bool {
        matches!(self, Self::JumpStart | Self::Start | Self::JumpBoth)
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::JumpStart => "jump-start",
            Self::JumpEnd => "jump-end",
            Self::JumpNone => "jump-none",
            Self::JumpBoth => "jump-both",
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

impl FromStr for StepPosition {
    type Err = EasingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jump-start" => Ok(Self::JumpStart),
            "jump-end" => Ok(Self::JumpEnd),
            "jump-none" => Ok(Self::JumpNone),
            "jump-both" => Ok(Self::JumpBoth),
            "start" => Ok(Self::Start),
            "end" => Ok(Self::End),
            other => Err(EasingError::UnknownJumpTerm(other.to_string())),
        }
    }
}

/// Easing function for animation timing.
///
/// Easing functions map an input progress value to an eased output value.
/// Construct custom curves through [`EasingFunction::cubic_bezier`],
/// [`EasingFunction::steps`] or by parsing a descriptor; those paths validate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EasingFunction {
    /// Linear interpolation (no easing).
    #[default]
    Linear,

    /// CSS `ease`, equivalent to `cubic-bezier(0.25, 0.1, 0.25, 1)`.
    Ease,

    /// CSS `ease-in`, equivalent to `cubic-bezier(0.42, 0, 1, 1)`.
    EaseIn,

    /// CSS `ease-out`, equivalent to `cubic-bezier(0, 0, 0.58, 1)`.
    EaseOut,

    /// CSS `ease-in-out`, equivalent to `cubic-bezier(0.42, 0, 0.58, 1)`.
    EaseInOut,

    /// Custom cubic bezier curve; x values are in [0, 1].
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },

    /// Stepped animation with discrete jumps.
    Steps { count: u32, position: StepPosition },
}

impl EasingFunction {
    /// Evaluate the easing function at the given progress.
    ///
    /// `before_flag` only affects step easings: at an exact step boundary it
    /// selects the value on the earlier side of the discontinuity.
    pub fn evaluate(&self, progress: f64, before_flag: bool) -> f64 {
        match self {
            Self::Linear => progress,
            Self::Ease => cubic_bezier(0.25, 0.1, 0.25, 1.0, progress),
            Self::EaseIn => cubic_bezier(0.42, 0.0, 1.0, 1.0, progress),
            Self::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, progress),
            Self::EaseInOut => cubic_bezier(0.42, 0.0, 0.58, 1.0, progress),
            Self::CubicBezier { x1, y1, x2, y2 } => cubic_bezier(*x1, *y1, *x2, *y2, progress),
            Self::Steps { count, position } => stepped(*count, *position, progress, before_flag),
        }
    }

    /// Create a custom cubic bezier easing function.
    pub fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self, EasingError> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(EasingError::InvalidCubicBezier(
                "control points must be finite".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&x1) || !(0.0..=1.0).contains(&x2) {
            return Err(EasingError::InvalidCubicBezier(
                "x values must be in [0, 1]".to_string(),
            ));
        }
        Ok(Self::CubicBezier { x1, y1, x2, y2 })
    }

    /// Create a stepped easing function.
    pub fn steps(count: u32, position: StepPosition) -> Result<Self, EasingError> {
        let minimum = if position == StepPosition::JumpNone { 2 } else { 1 };
        if count < minimum {
            return Err(EasingError::InvalidStepCount(count.to_string()));
        }
        Ok(Self::Steps { count, position })
    }

    /// Whether this easing is a step function.
    pub fn is_stepped(&self) -> bool {
        matches!(self, Self::Steps { .. })
    }
}

impl FromStr for EasingFunction {
    type Err = EasingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let descriptor = s.trim().to_ascii_lowercase();
        match descriptor.as_str() {
            "linear" => return Ok(Self::Linear),
            "ease" => return Ok(Self::Ease),
            "ease-in" => return Ok(Self::EaseIn),
            "ease-out" => return Ok(Self::EaseOut),
            "ease-in-out" => return Ok(Self::EaseInOut),
            "step-start" => return Self::steps(1, StepPosition::Start),
            "step-end" => return Self::steps(1, StepPosition::End),
            _ => {}
        }

        let (name, args) = split_function(&descriptor)
            .ok_or_else(|| EasingError::Unknown(s.trim().to_string()))?;

        match name {
            "cubic-bezier" => {
                if args.len() != 4 {
                    return Err(EasingError::InvalidCubicBezier(format!(
                        "expected 4 arguments, found {}",
                        args.len()
                    )));
                }
                let mut points = [0.0; 4];
                for (slot, arg) in points.iter_mut().zip(&args) {
                    *slot = arg.parse::<f64>().map_err(|_| {
                        EasingError::InvalidCubicBezier(format!("`{arg}` is not a number"))
                    })?;
                }
                Self::cubic_bezier(points[0], points[1], points[2], points[3])
            }
            "steps" => {
                let (count_arg, position) = match args.as_slice() {
                    [count] => (*count, StepPosition::End),
                    [count, term] => (*count, term.parse::<StepPosition>()?),
                    _ => return Err(EasingError::Unknown(s.trim().to_string())),
                };
                let count = count_arg
                    .parse::<i64>()
                    .ok()
                    .filter(|n| *n > 0)
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| EasingError::InvalidStepCount(count_arg.to_string()))?;
                Self::steps(count, position)
            }
            _ => Err(EasingError::Unknown(s.trim().to_string())),
        }
    }
}

impl TryFrom<String> for EasingFunction {
    type Error = EasingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EasingFunction> for String {
    fn from(value: EasingFunction) -> Self {
        value.to_string()
    }
}

impl fmt::Display for EasingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => f.write_str("linear"),
            Self::Ease => f.write_str("ease"),
            Self::EaseIn => f.write_str("ease-in"),
            Self::EaseOut => f.write_str("ease-out"),
            Self::EaseInOut => f.write_str("ease-in-out"),
            Self::CubicBezier { x1, y1, x2, y2 } => {
                write!(f, "cubic-bezier({x1}, {y1}, {x2}, {y2})")
            }
            Self::Steps { count, position } => match position {
                StepPosition::End | StepPosition::JumpEnd => write!(f, "steps({count})"),
                other => write!(f, "steps({count}, {})", other.keyword()),
            },
        }
    }
}

/// Split `name(a, b, c)` into its name and trimmed arguments.
fn split_function(descriptor: &str) -> Option<(&str, Vec<&str>)> {
    let open = descriptor.find('(')?;
    let inner = descriptor[open + 1..].strip_suffix(')')?;
    let name = descriptor[..open].trim_end();
    let args = inner.split(',').map(str::trim).collect();
    Some((name, args))
}

/// Evaluate a cubic bezier curve at the given progress.
///
/// Newton-Raphson finds the curve parameter for the input progress, with a
/// bisection fallback when the derivative flattens out.
fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, progress: f64) -> f64 {
    if progress <= 0.0 {
        return 0.0;
    }
    if progress >= 1.0 {
        return 1.0;
    }
    if x1 == y1 && x2 == y2 {
        return progress;
    }

    let t = solve_bezier_x(x1, x2, progress);
    bezier_coordinate(y1, y2, t)
}

fn solve_bezier_x(x1: f64, x2: f64, target_x: f64) -> f64 {
    const EPSILON: f64 = 1e-7;

    let mut t = target_x;
    for _ in 0..8 {
        let x = bezier_coordinate(x1, x2, t) - target_x;
        if x.abs() < EPSILON {
            return t;
        }
        let dx = bezier_x_derivative(x1, x2, t);
        if dx.abs() < 1e-6 {
            break;
        }
        t -= x / dx;
    }

    // Bisection over the whole parameter range.
    let (mut lo, mut hi) = (0.0, 1.0);
    t = target_x;
    while lo < hi {
        let x = bezier_coordinate(x1, x2, t);
        if (x - target_x).abs() < EPSILON {
            break;
        }
        if target_x > x {
            lo = t;
        } else {
            hi = t;
        }
        let next = (hi - lo) * 0.5 + lo;
        if next == t {
            break;
        }
        t = next;
    }
    t
}

/// One coordinate of the curve at parameter t.
/// B(t) = 3(1-t)²t·p1 + 3(1-t)t²·p2 + t³
#[inline]
fn bezier_coordinate(p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * p1 + 3.0 * mt * t * t * p2 + t * t * t
}

/// dx/dt = 3(1-t)²·x1 + 6(1-t)t·(x2-x1) + 3t²·(1-x2)
#[inline]
fn bezier_x_derivative(x1: f64, x2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * x1 + 6.0 * mt * t * (x2 - x1) + 3.0 * t * t * (1.0 - x2)
}

fn stepped(steps: u32, position: StepPosition, progress: f64, before_flag: bool) -> f64 {
    let steps_f = f64::from(steps);
    let scaled = progress * steps_f;
    let mut current_step = scaled.floor();

    if position.jumps_at_start() {
        current_step += 1.0;
    }

    // At a transition point with the before flag set, drop back a step.
    if before_flag && scaled.rem_euclid(1.0) == 0.0 {
        current_step -= 1.0;
    }

    if progress >= 0.0 && current_step < 0.0 {
        current_step = 0.0;
    }

    let jumps = match position {
        StepPosition::JumpBoth => steps_f + 1.0,
        StepPosition::JumpNone => steps_f - 1.0,
        _ => steps_f,
    };

    if progress <= 1.0 && current_step > jumps {
        current_step = jumps;
    }

    current_step / jumps
}
