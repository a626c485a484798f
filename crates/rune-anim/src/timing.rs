//! Effect timing and the computed-timing model.
//!
//! [`EffectTiming`] holds the timing properties of an effect. [`AnimationEffect`]
//! owns one and derives a [`ComputedTiming`] snapshot for any local time:
//! phase, active time, overall progress, iteration progress, current iteration,
//! directed progress and finally the eased (transformed) progress.
//!
//! Nothing here is cached. Every query recomputes from the timing properties,
//! the local time and the playback direction of the owning animation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::easing::EasingFunction;
use crate::error::{AnimationError, Result};
use crate::types::Phase;

/// Iteration duration of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "DurationRepr", into = "DurationRepr")]
pub enum EffectDuration {
    /// `auto`, which resolves to zero for keyframe effects.
    #[default]
    Auto,
    /// Explicit duration in milliseconds.
    Millis(f64),
}

impl EffectDuration {
    /// The duration in milliseconds, with `auto` resolved to zero.
    pub fn resolve(self) -> f64 {
        match self {
            Self::Auto => 0.0,
            Self::Millis(ms) => ms,
        }
    }
}

impl From<f64> for EffectDuration {
    fn from(ms: f64) -> Self {
        Self::Millis(ms)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DurationRepr {
    Millis(f64),
    Keyword(String),
}

impl TryFrom<DurationRepr> for EffectDuration {
    type Error = String;

    fn try_from(repr: DurationRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            DurationRepr::Millis(ms) => Ok(Self::Millis(ms)),
            DurationRepr::Keyword(word) if word == "auto" => Ok(Self::Auto),
            DurationRepr::Keyword(word) => Err(format!("invalid duration `{word}`")),
        }
    }
}

impl From<EffectDuration> for DurationRepr {
    fn from(duration: EffectDuration) -> Self {
        match duration {
            EffectDuration::Auto => Self::Keyword("auto".to_string()),
            EffectDuration::Millis(ms) => Self::Millis(ms),
        }
    }
}

/// Direction of playback across iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackDirection {
    /// Every iteration plays forwards.
    #[default]
    Normal,
    /// Every iteration plays backwards.
    Reverse,
    /// Even iterations forwards, odd iterations backwards.
    Alternate,
    /// Even iterations backwards, odd iterations forwards.
    AlternateReverse,
}

/// Whether an effect applies outside its active interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    None,
    Forwards,
    Backwards,
    Both,
    /// Resolves to `none` for keyframe effects.
    #[default]
    Auto,
}

impl FillMode {
    /// `auto` resolved for keyframe effects.
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto => Self::None,
            other => other,
        }
    }

    /// Check if the fill applies before the active interval.
    pub fn applies_backwards(&self) -> bool {
        matches!(self, Self::Backwards | Self::Both)
    }

    /// Check if the fill applies after the active interval.
    pub fn applies_forwards(&self) -> bool {
        matches!(self, Self::Forwards | Self::Both)
    }
}

/// Direction of the current iteration once `direction` is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationDirection {
    Forwards,
    Reverse,
}

/// Timing properties of an animation effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EffectTiming {
    /// Delay before the active interval, in milliseconds.
    pub delay: f64,
    /// Delay after the active interval, in milliseconds.
    pub end_delay: f64,
    pub fill: FillMode,
    /// Offset into the iteration sequence at which the effect begins.
    pub iteration_start: f64,
    /// Number of iterations, possibly fractional or infinite.
    #[serde(with = "iteration_count")]
    pub iterations: f64,
    pub duration: EffectDuration,
    pub direction: PlaybackDirection,
    pub easing: EasingFunction,
}

impl Default for EffectTiming {
    fn default() -> Self {
        Self {
            delay: 0.0,
            end_delay: 0.0,
            fill: FillMode::Auto,
            iteration_start: 0.0,
            iterations: 1.0,
            duration: EffectDuration::Auto,
            direction: PlaybackDirection::Normal,
            easing: EasingFunction::Linear,
        }
    }
}

impl EffectTiming {
    /// Create timing with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration duration in milliseconds.
    pub fn duration_ms(mut self, duration: f64) -> Self {
        self.duration = EffectDuration::Millis(duration);
        self
    }

    /// Set the start delay in milliseconds.
    pub fn delay_ms(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    /// Set the end delay in milliseconds.
    pub fn end_delay_ms(mut self, end_delay: f64) -> Self {
        self.end_delay = end_delay;
        self
    }

    pub fn iterations(mut self, iterations: f64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn iteration_start(mut self, iteration_start: f64) -> Self {
        self.iteration_start = iteration_start;
        self
    }

    pub fn direction(mut self, direction: PlaybackDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn fill(mut self, fill: FillMode) -> Self {
        self.fill = fill;
        self
    }

    pub fn easing(mut self, easing: EasingFunction) -> Self {
        self.easing = easing;
        self
    }

    /// Check the invariants every stored timing must satisfy.
    pub fn validate(&self) -> Result<()> {
        if !self.iteration_start.is_finite() || self.iteration_start < 0.0 {
            return Err(AnimationError::type_error(
                "iterationStart must be a finite, non-negative number",
            ));
        }
        if self.iterations.is_nan() || self.iterations < 0.0 {
            return Err(AnimationError::type_error("iterations must be non-negative"));
        }
        if let EffectDuration::Millis(ms) = self.duration {
            if ms.is_nan() || ms < 0.0 {
                return Err(AnimationError::type_error("duration must be non-negative"));
            }
        }
        if !self.delay.is_finite() {
            return Err(AnimationError::type_error("delay must be finite"));
        }
        if !self.end_delay.is_finite() {
            return Err(AnimationError::type_error("endDelay must be finite"));
        }
        Ok(())
    }
}

impl From<f64> for EffectTiming {
    fn from(duration: f64) -> Self {
        Self::new().duration_ms(duration)
    }
}

/// Partial timing used by `update_timing`; unset members keep their value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionalEffectTiming {
    pub delay: Option<f64>,
    pub end_delay: Option<f64>,
    pub fill: Option<FillMode>,
    pub iteration_start: Option<f64>,
    #[serde(with = "optional_iteration_count")]
    pub iterations: Option<f64>,
    pub duration: Option<EffectDuration>,
    pub direction: Option<PlaybackDirection>,
    /// Easing descriptor, parsed on application.
    pub easing: Option<String>,
}

impl OptionalEffectTiming {
    /// Produce `base` with every set member replaced, validating the result.
    pub fn apply_to(&self, base: &EffectTiming) -> Result<EffectTiming> {
        let mut timing = base.clone();
        if let Some(delay) = self.delay {
            timing.delay = delay;
        }
        if let Some(end_delay) = self.end_delay {
            timing.end_delay = end_delay;
        }
        if let Some(fill) = self.fill {
            timing.fill = fill;
        }
        if let Some(iteration_start) = self.iteration_start {
            timing.iteration_start = iteration_start;
        }
        if let Some(iterations) = self.iterations {
            timing.iterations = iterations;
        }
        if let Some(duration) = self.duration {
            timing.duration = duration;
        }
        if let Some(direction) = self.direction {
            timing.direction = direction;
        }
        if let Some(easing) = &self.easing {
            timing.easing = easing.parse()?;
        }
        timing.validate()?;
        Ok(timing)
    }
}

/// Snapshot of an effect's timing at one local time.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedTiming {
    pub delay: f64,
    pub end_delay: f64,
    /// Fill with `auto` resolved.
    pub fill: FillMode,
    pub iteration_start: f64,
    pub iterations: f64,
    /// Iteration duration with `auto` resolved.
    pub duration: f64,
    pub direction: PlaybackDirection,
    pub easing: EasingFunction,
    pub end_time: f64,
    pub active_duration: f64,
    pub local_time: Option<f64>,
    pub phase: Phase,
    pub active_time: Option<f64>,
    /// Transformed progress.
    pub progress: Option<f64>,
    pub current_iteration: Option<f64>,
    /// Progress within the iteration before easing, after direction.
    pub directed_progress: Option<f64>,
    pub current_direction: Option<IterationDirection>,
}

/// Timing half of an animation effect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationEffect {
    timing: EffectTiming,
}

impl AnimationEffect {
    /// Create an effect, rejecting invalid timing.
    pub fn new(timing: EffectTiming) -> Result<Self> {
        timing.validate()?;
        Ok(Self { timing })
    }

    /// The specified timing.
    pub fn timing(&self) -> &EffectTiming {
        &self.timing
    }

    /// Merge `update` into the timing. On error the timing is untouched.
    pub fn update_timing(&mut self, update: &OptionalEffectTiming) -> Result<()> {
        self.timing = update.apply_to(&self.timing)?;
        Ok(())
    }

    pub fn active_duration(&self) -> f64 {
        let duration = self.timing.duration.resolve();
        let iterations = self.timing.iterations;
        if duration == 0.0 || iterations == 0.0 {
            0.0
        } else {
            duration * iterations
        }
    }

    pub fn end_time(&self) -> f64 {
        (self.timing.delay + self.active_duration() + self.timing.end_delay).max(0.0)
    }

    /// Phase at `local_time` for an animation playing at `playback_rate`.
    pub fn phase(&self, local_time: Option<f64>, playback_rate: f64) -> Phase {
        let Some(local) = local_time else {
            return Phase::Idle;
        };
        let end_time = self.end_time();
        let before_boundary = self.timing.delay.min(end_time).max(0.0);
        let after_boundary = (self.timing.delay + self.active_duration())
            .min(end_time)
            .max(0.0);
        let backwards = playback_rate < 0.0;

        if local < before_boundary || (backwards && local == before_boundary) {
            Phase::Before
        } else if local > after_boundary || (!backwards && local == after_boundary) {
            Phase::After
        } else {
            Phase::Active
        }
    }

    fn active_time(&self, local_time: Option<f64>, phase: Phase) -> Option<f64> {
        let local = local_time?;
        let delay = self.timing.delay;
        let fill = self.timing.fill.resolve();
        match phase {
            Phase::Idle => None,
            Phase::Before if fill.applies_backwards() => Some((local - delay).max(0.0)),
            Phase::Before => None,
            Phase::Active => Some(local - delay),
            Phase::After if fill.applies_forwards() => {
                Some((local - delay).max(0.0).min(self.active_duration()))
            }
            Phase::After => None,
        }
    }

    /// Compute the full timing snapshot.
    pub fn computed_timing(&self, local_time: Option<f64>, playback_rate: f64) -> ComputedTiming {
        let timing = &self.timing;
        let duration = timing.duration.resolve();
        let iterations = timing.iterations;
        let active_duration = self.active_duration();
        let phase = self.phase(local_time, playback_rate);
        let active_time = self.active_time(local_time, phase);

        let overall_progress = active_time.map(|active| {
            let progress = if duration == 0.0 {
                if phase == Phase::Before { 0.0 } else { iterations }
            } else {
                active / duration
            };
            progress + timing.iteration_start
        });

        let simple_progress = overall_progress.zip(active_time).map(|(overall, active)| {
            let mut progress = if overall.is_infinite() {
                timing.iteration_start % 1.0
            } else {
                overall % 1.0
            };
            if progress == 0.0
                && matches!(phase, Phase::Active | Phase::After)
                && active == active_duration
                && iterations != 0.0
            {
                progress = 1.0;
            }
            progress
        });

        let current_iteration = overall_progress.zip(simple_progress).map(|(overall, simple)| {
            if phase == Phase::After && iterations.is_infinite() {
                f64::INFINITY
            } else if simple == 1.0 {
                overall.floor() - 1.0
            } else {
                overall.floor()
            }
        });

        let current_direction = current_iteration.map(|iteration| {
            let d = match timing.direction {
                PlaybackDirection::Normal => return IterationDirection::Forwards,
                PlaybackDirection::Reverse => return IterationDirection::Reverse,
                PlaybackDirection::Alternate => iteration,
                PlaybackDirection::AlternateReverse => iteration + 1.0,
            };
            // An infinite iteration counts as even.
            if d.is_finite() && d % 2.0 != 0.0 {
                IterationDirection::Reverse
            } else {
                IterationDirection::Forwards
            }
        });

        let directed_progress = simple_progress.zip(current_direction).map(|(p, dir)| match dir {
            IterationDirection::Forwards => p,
            IterationDirection::Reverse => 1.0 - p,
        });

        let progress = directed_progress.zip(current_direction).map(|(p, dir)| {
            let going_forwards = dir == IterationDirection::Forwards;
            let before_flag = (phase == Phase::Before && going_forwards)
                || (phase == Phase::After && !going_forwards);
            timing.easing.evaluate(p, before_flag)
        });

        ComputedTiming {
            delay: timing.delay,
            end_delay: timing.end_delay,
            fill: timing.fill.resolve(),
            iteration_start: timing.iteration_start,
            iterations,
            duration,
            direction: timing.direction,
            easing: timing.easing,
            end_time: self.end_time(),
            active_duration,
            local_time,
            phase,
            active_time,
            progress,
            current_iteration,
            directed_progress,
            current_direction,
        }
    }
}

/// Iteration counts serialize infinity as `"Infinity"`.
mod iteration_count {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    pub(super) enum Repr {
        Number(f64),
        Keyword(String),
    }

    pub(super) fn from_repr(repr: Repr) -> std::result::Result<f64, String> {
        match repr {
            Repr::Number(n) => Ok(n),
            Repr::Keyword(word) if word == "Infinity" || word == "infinite" => Ok(f64::INFINITY),
            Repr::Keyword(word) => Err(format!("invalid iteration count `{word}`")),
        }
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if value.is_infinite() && *value > 0.0 {
            serializer.serialize_str("Infinity")
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
        from_repr(Repr::deserialize(deserializer)?).map_err(serde::de::Error::custom)
    }
}

mod optional_iteration_count {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<f64>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match value {
            Some(v) => iteration_count::serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<f64>, D::Error> {
        Option::<iteration_count::Repr>::deserialize(deserializer)?
            .map(iteration_count::from_repr)
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
