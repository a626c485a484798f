//! Keyframes and keyframe effects.
//!
//! This module contains:
//! - [`Keyframe`]: a set of property values at an optional offset
//! - [`ComputedKeyframe`]: a keyframe with its spaced offset resolved
//! - [`KeyframeEffect`]: the effect that owns keyframes and timing, and commits
//!   the nearest keyframe onto its style target
//!
//! Keyframes are committed whole. There is no interpolation between values:
//! at any progress the keyframe whose computed offset is nearest wins.
//!
//! # Usage
//!
//! ```ignore
//! use rune_anim::keyframes::{Keyframe, KeyframeEffect};
//! use rune_anim::timing::{EffectTiming, FillMode};
//!
//! let effect = KeyframeEffect::new(
//!     Some(target),
//!     vec![
//!         Keyframe::new().set("opacity", "0"),
//!         Keyframe::new().set("opacity", "1"),
//!     ],
//!     EffectTiming::new().duration_ms(300.0).fill(FillMode::Forwards),
//! )?;
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::animation::{Animation, AnimationWeak};
use crate::easing::EasingFunction;
use crate::error::{AnimationError, Result};
use crate::target::{TargetHandle, same_target};
use crate::timing::{
    AnimationEffect, ComputedTiming, EffectTiming, IterationDirection, OptionalEffectTiming,
};

/// How an effect's values combine with the underlying value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeOperation {
    #[default]
    Replace,
    Add,
    Accumulate,
    /// Keyframe-level only: defer to the effect's composite operation.
    Auto,
}

impl std::str::FromStr for CompositeOperation {
    type Err = AnimationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "replace" => Ok(Self::Replace),
            "add" => Ok(Self::Add),
            "accumulate" => Ok(Self::Accumulate),
            "auto" => Ok(Self::Auto),
            other => Err(AnimationError::type_error(format!(
                "invalid composite operation `{other}`"
            ))),
        }
    }
}

/// Property values at an optional offset.
///
/// A property mapped to `None` is removed from the target when the keyframe
/// is committed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keyframe {
    /// Position in [0, 1], or `None` to be spaced automatically.
    pub offset: Option<f64>,
    pub easing: EasingFunction,
    pub composite: CompositeOperation,
    pub properties: BTreeMap<String, Option<String>>,
}

impl Keyframe {
    /// Create a keyframe without an explicit offset.
    pub fn new() -> Self {
        Self {
            composite: CompositeOperation::Auto,
            ..Self::default()
        }
    }

    /// Create a keyframe at the given offset.
    pub fn at(offset: f64) -> Self {
        Self {
            offset: Some(offset),
            ..Self::new()
        }
    }

    /// Set a property value for this keyframe.
    pub fn set(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(property.into(), Some(value.into()));
        self
    }

    /// Mark a property for removal when this keyframe is committed.
    pub fn unset(mut self, property: impl Into<String>) -> Self {
        self.properties.insert(property.into(), None);
        self
    }

    pub fn with_easing(mut self, easing: EasingFunction) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_composite(mut self, composite: CompositeOperation) -> Self {
        self.composite = composite;
        self
    }

    /// Get a property value from this keyframe.
    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties.get(property).and_then(|v| v.as_deref())
    }
}

/// A keyframe with its spaced offset resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedKeyframe {
    pub offset: Option<f64>,
    pub computed_offset: f64,
    pub easing: EasingFunction,
    pub composite: CompositeOperation,
    #[serde(flatten)]
    pub properties: BTreeMap<String, Option<String>>,
}

/// Check offsets are in [0, 1] and non-decreasing.
pub fn validate_keyframes(keyframes: &[Keyframe]) -> Result<()> {
    let mut previous = f64::NEG_INFINITY;
    for keyframe in keyframes {
        let Some(offset) = keyframe.offset else {
            continue;
        };
        if !(0.0..=1.0).contains(&offset) {
            return Err(AnimationError::type_error(format!(
                "keyframe offset {offset} is outside [0, 1]"
            )));
        }
        if offset < previous {
            return Err(AnimationError::type_error(
                "keyframe offsets must be non-decreasing",
            ));
        }
        previous = offset;
    }
    Ok(())
}

/// Resolve the offset of every keyframe.
///
/// Explicit offsets are kept. Without one, the first keyframe of several sits
/// at 0 and the last at 1; runs in between are spread evenly between their
/// resolved neighbours.
pub fn compute_offsets(keyframes: &[Keyframe]) -> Vec<f64> {
    let count = keyframes.len();
    if count == 0 {
        return Vec::new();
    }

    let mut offsets: Vec<Option<f64>> = keyframes.iter().map(|k| k.offset).collect();
    if count > 1 && offsets[0].is_none() {
        offsets[0] = Some(0.0);
    }
    if offsets[count - 1].is_none() {
        offsets[count - 1] = Some(1.0);
    }

    let mut previous = 0;
    for index in 1..count {
        let Some(end) = offsets[index] else {
            continue;
        };
        let gap = index - previous;
        if gap > 1 {
            let start = offsets[previous].unwrap_or(0.0);
            for (step, slot) in offsets[previous + 1..index].iter_mut().enumerate() {
                *slot = Some(start + (end - start) * (step + 1) as f64 / gap as f64);
            }
        }
        previous = index;
    }

    offsets.into_iter().map(|o| o.unwrap_or(1.0)).collect()
}

/// Pair each keyframe with its computed offset.
pub fn compute_keyframes(keyframes: &[Keyframe]) -> Vec<ComputedKeyframe> {
    keyframes
        .iter()
        .zip(compute_offsets(keyframes))
        .map(|(keyframe, computed_offset)| ComputedKeyframe {
            offset: keyframe.offset,
            computed_offset,
            easing: keyframe.easing,
            composite: keyframe.composite,
            properties: keyframe.properties.clone(),
        })
        .collect()
}

/// Parse keyframes from JSON.
///
/// Accepts a list of keyframe objects, or a property-indexed object whose
/// values are lists spread evenly across [0, 1]. The result is validated.
pub fn parse_keyframes(json: &str) -> Result<Vec<Keyframe>> {
    let value: Value = serde_json::from_str(json)?;
    keyframes_from_value(&value)
}

/// Build keyframes from an already parsed JSON value.
pub fn keyframes_from_value(value: &Value) -> Result<Vec<Keyframe>> {
    let keyframes = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .map(keyframe_from_object)
            .collect::<Result<Vec<_>>>()?,
        Value::Object(map) => property_indexed(map)?,
        _ => {
            return Err(AnimationError::type_error(
                "keyframes must be a list or a property-indexed object",
            ));
        }
    };
    validate_keyframes(&keyframes)?;
    Ok(keyframes)
}

fn keyframe_from_object(value: &Value) -> Result<Keyframe> {
    let Value::Object(map) = value else {
        return Err(AnimationError::type_error("each keyframe must be an object"));
    };
    let mut keyframe = Keyframe::new();
    for (key, entry) in map {
        match key.as_str() {
            "offset" => keyframe.offset = optional_number(entry, "offset")?,
            "easing" => keyframe.easing = string_value(entry, "easing")?.parse()?,
            "composite" => keyframe.composite = string_value(entry, "composite")?.parse()?,
            property => {
                keyframe
                    .properties
                    .insert(property.to_string(), property_value(property, entry)?);
            }
        }
    }
    Ok(keyframe)
}

fn property_indexed(map: &Map<String, Value>) -> Result<Vec<Keyframe>> {
    let mut property_keyframes: Vec<(f64, String, Option<String>)> = Vec::new();
    for (key, entry) in map {
        if matches!(key.as_str(), "offset" | "easing" | "composite") {
            continue;
        }
        let values = as_list(entry);
        let count = values.len();
        for (index, value) in values.iter().enumerate() {
            let offset = if count == 1 {
                1.0
            } else {
                index as f64 / (count - 1) as f64
            };
            property_keyframes.push((offset, key.clone(), property_value(key, value)?));
        }
    }
    property_keyframes.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut keyframes: Vec<Keyframe> = Vec::new();
    for (offset, property, value) in property_keyframes {
        match keyframes.last_mut() {
            Some(last) if last.offset == Some(offset) => {
                last.properties.insert(property, value);
            }
            _ => {
                let mut keyframe = Keyframe::at(offset);
                keyframe.properties.insert(property, value);
                keyframes.push(keyframe);
            }
        }
    }

    if let Some(offsets) = map.get("offset") {
        for (keyframe, entry) in keyframes.iter_mut().zip(as_list(offsets)) {
            keyframe.offset = optional_number(entry, "offset")?;
        }
    }

    if let Some(easings) = map.get("easing") {
        let easings = as_list(easings)
            .iter()
            .map(|e| -> Result<EasingFunction> { Ok(string_value(e, "easing")?.parse()?) })
            .collect::<Result<Vec<_>>>()?;
        for (keyframe, easing) in keyframes.iter_mut().zip(easings.iter().cycle()) {
            keyframe.easing = *easing;
        }
    }

    if let Some(composites) = map.get("composite") {
        let composites = as_list(composites)
            .iter()
            .map(|c| -> Result<CompositeOperation> { string_value(c, "composite")?.parse() })
            .collect::<Result<Vec<_>>>()?;
        for (keyframe, composite) in keyframes.iter_mut().zip(composites.iter().cycle()) {
            keyframe.composite = *composite;
        }
    }

    Ok(keyframes)
}

fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn optional_number(value: &Value, field: &str) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| AnimationError::type_error(format!("{field} is not a finite number"))),
        _ => Err(AnimationError::type_error(format!("{field} must be a number or null"))),
    }
}

fn string_value<'a>(value: &'a Value, field: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| AnimationError::type_error(format!("{field} must be a string")))
}

fn property_value(property: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(AnimationError::type_error(format!(
            "value for `{property}` must be a string, number or null"
        ))),
    }
}

/// Validate and normalize a pseudo-element selector.
///
/// Accepts `::name` and the legacy single-colon forms of `before`, `after`,
/// `first-letter` and `first-line`, which normalize to `::`.
pub fn normalize_pseudo_element(selector: Option<&str>) -> Result<Option<String>> {
    let Some(selector) = selector else {
        return Ok(None);
    };
    if let Some(name) = selector.strip_prefix("::") {
        if !name.is_empty() && !name.starts_with(':') {
            return Ok(Some(selector.to_string()));
        }
    } else if let Some(name) = selector.strip_prefix(':') {
        if matches!(name, "before" | "after" | "first-letter" | "first-line") {
            return Ok(Some(format!("::{name}")));
        }
    }
    Err(AnimationError::type_error(format!(
        "invalid pseudo-element `{selector}`"
    )))
}

type StyleSnapshot = BTreeMap<String, Option<String>>;

struct EffectInner {
    effect: AnimationEffect,
    keyframes: Vec<Keyframe>,
    target: Option<TargetHandle>,
    composite: CompositeOperation,
    pseudo_element: Option<String>,
    owner: Option<AnimationWeak>,
    /// Pre-animation values of the animated properties, captured before the
    /// first write and dropped once restored.
    snapshot: Option<StyleSnapshot>,
}

/// Which stored values a commit writes.
enum Commit {
    Keyframe(usize),
    Snapshot,
}

impl EffectInner {
    fn animated_properties(&self) -> Vec<String> {
        let mut properties: Vec<String> = self
            .keyframes
            .iter()
            .flat_map(|k| k.properties.keys().cloned())
            .collect();
        properties.sort();
        properties.dedup();
        properties
    }

    fn capture_snapshot(&mut self) {
        let Some(target) = self.target.clone() else {
            return;
        };
        let properties = self.animated_properties();
        let snapshot = self.snapshot.get_or_insert_with(BTreeMap::new);
        let target = target.borrow();
        for property in properties {
            if !snapshot.contains_key(&property) {
                let value = target.get_property(&property);
                snapshot.insert(property, value);
            }
        }
    }

    fn write(target: &TargetHandle, values: &BTreeMap<String, Option<String>>) {
        let mut target = target.borrow_mut();
        for (property, value) in values {
            match value {
                Some(value) => target.set_property(property, value),
                None => target.remove_property(property),
            }
        }
    }

    fn nearest(&self, progress: f64, moving_forwards: bool) -> Option<Commit> {
        let offsets = compute_offsets(&self.keyframes);
        let mut best: Option<(f64, usize)> = None;
        for (index, offset) in offsets.iter().enumerate() {
            let distance = (offset - progress).abs();
            let better = match best {
                None => true,
                Some((d, _)) if moving_forwards => distance <= d,
                Some((d, _)) => distance < d,
            };
            if better {
                best = Some((distance, index));
            }
        }
        let (distance, index) = best?;

        // A lone keyframe has no second anchor: the pre-animation values hold
        // until progress lands exactly on its offset.
        if offsets.len() == 1 && distance != 0.0 {
            return Some(Commit::Snapshot);
        }
        Some(Commit::Keyframe(index))
    }

    fn commit(&mut self, progress: f64, moving_forwards: bool) {
        let Some(target) = self.target.clone() else {
            return;
        };
        let Some(choice) = self.nearest(progress, moving_forwards) else {
            return;
        };
        self.capture_snapshot();
        match choice {
            Commit::Keyframe(index) => Self::write(&target, &self.keyframes[index].properties),
            Commit::Snapshot => {
                if let Some(snapshot) = &self.snapshot {
                    Self::write(&target, snapshot);
                }
            }
        }
    }

    fn restore(&mut self) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        if let Some(target) = &self.target {
            Self::write(target, &snapshot);
        }
    }
}

/// Effect that commits keyframes onto a style target.
///
/// `KeyframeEffect` is a shared handle; clones refer to the same effect. An
/// effect is attached to at most one [`Animation`] at a time.
#[derive(Clone)]
pub struct KeyframeEffect {
    inner: Rc<RefCell<EffectInner>>,
}

impl KeyframeEffect {
    /// Create an effect, validating keyframes and timing.
    pub fn new(
        target: Option<TargetHandle>,
        keyframes: Vec<Keyframe>,
        timing: impl Into<EffectTiming>,
    ) -> Result<Self> {
        validate_keyframes(&keyframes)?;
        let effect = AnimationEffect::new(timing.into())?;
        Ok(Self {
            inner: Rc::new(RefCell::new(EffectInner {
                effect,
                keyframes,
                target,
                composite: CompositeOperation::Replace,
                pseudo_element: None,
                owner: None,
                snapshot: None,
            })),
        })
    }

    /// Create an effect from keyframes in JSON form.
    pub fn from_json(
        target: Option<TargetHandle>,
        keyframes: &str,
        timing: impl Into<EffectTiming>,
    ) -> Result<Self> {
        Self::new(target, parse_keyframes(keyframes)?, timing)
    }

    /// Whether both handles refer to the same effect.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn get_timing(&self) -> EffectTiming {
        self.inner.borrow().effect.timing().clone()
    }

    /// Merge `update` into the timing and refresh the owning animation.
    ///
    /// Invalid updates fail with a Type error and change nothing.
    pub fn update_timing(&self, update: &OptionalEffectTiming) -> Result<()> {
        self.inner.borrow_mut().effect.update_timing(update)?;
        if let Some(animation) = self.animation() {
            animation.effect_changed();
        }
        Ok(())
    }

    /// Computed timing at the owning animation's current time.
    pub fn get_computed_timing(&self) -> ComputedTiming {
        let (local_time, rate) = match self.animation() {
            Some(animation) => (animation.current_time(), animation.effective_playback_rate()),
            None => (None, 1.0),
        };
        self.computed_timing_at(local_time, rate)
    }

    pub fn get_keyframes(&self) -> Vec<ComputedKeyframe> {
        compute_keyframes(&self.inner.borrow().keyframes)
    }

    /// Replace the keyframes. Invalid keyframes fail with a Type error and
    /// leave the current ones in place.
    pub fn set_keyframes(&self, keyframes: Vec<Keyframe>) -> Result<()> {
        validate_keyframes(&keyframes)?;
        tracing::debug!(count = keyframes.len(), "keyframes replaced");
        self.inner.borrow_mut().keyframes = keyframes;
        if let Some(animation) = self.animation() {
            animation.effect_changed();
        }
        Ok(())
    }

    pub fn target(&self) -> Option<TargetHandle> {
        self.inner.borrow().target.clone()
    }

    /// Retarget the effect, restoring the previous target first.
    pub fn set_target(&self, target: Option<TargetHandle>) {
        {
            let mut inner = self.inner.borrow_mut();
            let unchanged = match (&inner.target, &target) {
                (Some(a), Some(b)) => same_target(a, b),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }
            inner.restore();
            tracing::debug!(has_target = target.is_some(), "effect retargeted");
            inner.target = target;
        }
        if let Some(animation) = self.animation() {
            animation.effect_changed();
        }
    }

    pub fn composite(&self) -> CompositeOperation {
        self.inner.borrow().composite
    }

    /// Store the composite operation. Values are committed whole regardless.
    pub fn set_composite(&self, composite: CompositeOperation) {
        self.inner.borrow_mut().composite = composite;
    }

    pub fn pseudo_element(&self) -> Option<String> {
        self.inner.borrow().pseudo_element.clone()
    }

    pub fn set_pseudo_element(&self, selector: Option<&str>) -> Result<()> {
        let normalized = normalize_pseudo_element(selector)?;
        self.inner.borrow_mut().pseudo_element = normalized;
        Ok(())
    }

    /// The animation this effect is attached to.
    pub fn animation(&self) -> Option<Animation> {
        let owner = self.inner.borrow().owner.clone();
        owner.as_ref().and_then(Animation::from_weak)
    }

    pub(crate) fn set_owner(&self, owner: Option<AnimationWeak>) {
        self.inner.borrow_mut().owner = owner;
    }

    /// Every property named by any keyframe, sorted.
    pub(crate) fn animated_properties(&self) -> Vec<String> {
        self.inner.borrow().animated_properties()
    }

    pub(crate) fn end_time(&self) -> f64 {
        self.inner.borrow().effect.end_time()
    }

    pub(crate) fn computed_timing_at(&self, local_time: Option<f64>, rate: f64) -> ComputedTiming {
        self.inner.borrow().effect.computed_timing(local_time, rate)
    }

    /// Commit the keyframe selected by `timing`, or restore the pre-animation
    /// values when the effect does not apply.
    pub(crate) fn apply(&self, timing: &ComputedTiming, playback_rate: f64) {
        let mut inner = self.inner.borrow_mut();
        match (timing.progress, timing.current_direction) {
            (Some(progress), Some(direction)) => {
                let moving_forwards =
                    (direction == IterationDirection::Forwards) == (playback_rate >= 0.0);
                inner.commit(progress, moving_forwards);
            }
            _ => inner.restore(),
        }
    }

    /// Restore the pre-animation values of the animated properties.
    pub(crate) fn restore(&self) {
        self.inner.borrow_mut().restore();
    }
}

impl fmt::Debug for KeyframeEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("KeyframeEffect")
            .field("timing", inner.effect.timing())
            .field("keyframes", &inner.keyframes.len())
            .field("has_target", &inner.target.is_some())
            .field("composite", &inner.composite)
            .field("pseudo_element", &inner.pseudo_element)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{InlineStyle, StyleTarget};
    use crate::timing::FillMode;
    use crate::types::Phase;

    fn unset() -> Keyframe {
        Keyframe::new()
    }

    fn offsets_of(offsets: &[Option<f64>]) -> Vec<f64> {
        let keyframes: Vec<Keyframe> = offsets
            .iter()
            .map(|o| Keyframe {
                offset: *o,
                ..Keyframe::new()
            })
            .collect();
        compute_offsets(&keyframes)
    }

    fn approx(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn test_keyframe_creation() {
        let kf = Keyframe::at(0.5)
            .set("opacity", "0.5")
            .unset("color")
            .with_easing(EasingFunction::EaseOut);

        assert_eq!(kf.offset, Some(0.5));
        assert_eq!(kf.get("opacity"), Some("0.5"));
        assert_eq!(kf.get("color"), None);
        assert_eq!(kf.properties.get("color"), Some(&None));
        assert_eq!(kf.easing, EasingFunction::EaseOut);
        assert_eq!(kf.composite, CompositeOperation::Auto);
    }

    #[test]
    fn test_spacing() {
        approx(
            &offsets_of(&[Some(0.0), Some(0.2), None, Some(0.9), None, None]),
            &[0.0, 0.2, 0.55, 0.9, 0.95, 1.0],
        );
        approx(
            &offsets_of(&[None, Some(0.5), Some(0.5), Some(0.5), None]),
            &[0.0, 0.5, 0.5, 0.5, 1.0],
        );
        approx(
            &offsets_of(&[None, None, Some(0.5), None, None]),
            &[0.0, 0.25, 0.5, 0.75, 1.0],
        );
        approx(&offsets_of(&[None]), &[1.0]);
        approx(&offsets_of(&[None, None, None]), &[0.0, 0.5, 1.0]);
        assert!(offsets_of(&[]).is_empty());
    }

    #[test]
    fn test_offset_validation() {
        let err = validate_keyframes(&[Keyframe::at(-0.1)]).unwrap_err();
        assert!(matches!(err, AnimationError::Type(_)));

        let err = validate_keyframes(&[Keyframe::at(0.5), Keyframe::at(0.4)]).unwrap_err();
        assert!(matches!(err, AnimationError::Type(_)));

        assert!(validate_keyframes(&[Keyframe::at(0.5), unset(), Keyframe::at(0.5)]).is_ok());
        assert!(validate_keyframes(&[Keyframe::at(f64::NAN)]).is_err());
        assert!(KeyframeEffect::new(None, vec![Keyframe::at(1.5)], 100.0).is_err());
    }

    #[test]
    fn test_parse_keyframe_list() {
        let keyframes = parse_keyframes(
            r#"[
                {"transform": "translateX(0)", "opacity": 0},
                {"offset": 0.25, "easing": "ease-in", "opacity": null},
                {"transform": "translateX(100px)", "composite": "add"}
            ]"#,
        )
        .unwrap();
        assert_eq!(keyframes.len(), 3);
        assert_eq!(keyframes[0].offset, None);
        assert_eq!(keyframes[0].get("opacity"), Some("0"));
        assert_eq!(keyframes[1].offset, Some(0.25));
        assert_eq!(keyframes[1].easing, EasingFunction::EaseIn);
        assert_eq!(keyframes[1].properties.get("opacity"), Some(&None));
        assert_eq!(keyframes[2].composite, CompositeOperation::Add);

        approx(&compute_offsets(&keyframes), &[0.0, 0.25, 1.0]);
    }

    #[test]
    fn test_parse_property_indexed() {
        let keyframes = parse_keyframes(
            r#"{
                "opacity": [0, 0.5, 1],
                "transform": ["none", "scale(2)"],
                "easing": ["ease-out", "linear"]
            }"#,
        )
        .unwrap();
        let offsets: Vec<_> = keyframes.iter().map(|k| k.offset).collect();
        assert_eq!(offsets, vec![Some(0.0), Some(0.5), Some(1.0)]);
        assert_eq!(keyframes[0].get("opacity"), Some("0"));
        assert_eq!(keyframes[0].get("transform"), Some("none"));
        assert_eq!(keyframes[1].get("transform"), None);
        assert_eq!(keyframes[2].get("transform"), Some("scale(2)"));
        assert_eq!(keyframes[0].easing, EasingFunction::EaseOut);
        assert_eq!(keyframes[1].easing, EasingFunction::Linear);
        // Easings repeat from the start.
        assert_eq!(keyframes[2].easing, EasingFunction::EaseOut);
    }

    #[test]
    fn test_parse_property_indexed_offsets() {
        let keyframes =
            parse_keyframes(r#"{"opacity": [0, 1, 0], "offset": [0, 0.8]}"#).unwrap();
        let offsets: Vec<_> = keyframes.iter().map(|k| k.offset).collect();
        assert_eq!(offsets, vec![Some(0.0), Some(0.8), Some(1.0)]);

        let single = parse_keyframes(r#"{"opacity": "1"}"#).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].offset, Some(1.0));
    }

    #[test]
    fn test_parse_errors() {
        for json in [
            r#"[{"offset": "half"}]"#,
            r#"[{"offset": 2}]"#,
            r#"[{"offset": 0.5}, {"offset": 0.4}]"#,
            r#"[{"easing": "bounce"}]"#,
            r#"[{"opacity": true}]"#,
            r#"[1, 2]"#,
            r#""opacity""#,
            r#"{"opacity": [0, 1], "composite": "blend"}"#,
            r#"[{"opacity": 1"#,
        ] {
            let err = parse_keyframes(json).unwrap_err();
            assert!(matches!(err, AnimationError::Type(_)), "{json}");
        }
        assert!(parse_keyframes("null").unwrap().is_empty());
    }

    #[test]
    fn test_pseudo_element() {
        assert_eq!(normalize_pseudo_element(None).unwrap(), None);
        assert_eq!(
            normalize_pseudo_element(Some("::marker")).unwrap().as_deref(),
            Some("::marker")
        );
        assert_eq!(
            normalize_pseudo_element(Some(":before")).unwrap().as_deref(),
            Some("::before")
        );
        assert_eq!(
            normalize_pseudo_element(Some(":first-line")).unwrap().as_deref(),
            Some("::first-line")
        );
        for bad in ["marker", ":marker", "::", ":::before", ""] {
            assert!(normalize_pseudo_element(Some(bad)).is_err(), "{bad}");
        }

        let effect = KeyframeEffect::new(None, vec![], 100.0).unwrap();
        effect.set_pseudo_element(Some(":after")).unwrap();
        assert_eq!(effect.pseudo_element().as_deref(), Some("::after"));
        assert!(effect.set_pseudo_element(Some("after")).is_err());
        assert_eq!(effect.pseudo_element().as_deref(), Some("::after"));
    }

    #[test]
    fn test_unattached_computed_timing() {
        let effect = KeyframeEffect::new(None, vec![], EffectTiming::new().duration_ms(100.0)).unwrap();
        let timing = effect.get_computed_timing();
        assert_eq!(timing.local_time, None);
        assert_eq!(timing.phase, Phase::Idle);
        assert_eq!(timing.end_time, 100.0);
        assert!(effect.animation().is_none());
    }

    #[test]
    fn test_update_timing_rejects_and_keeps() {
        let effect = KeyframeEffect::new(None, vec![], 100.0).unwrap();
        let err = effect
            .update_timing(&OptionalEffectTiming {
                iterations: Some(-2.0),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, AnimationError::Type(_)));
        assert_eq!(effect.get_timing().iterations, 1.0);
    }

    #[test]
    fn test_set_keyframes_validates() {
        let effect = KeyframeEffect::new(None, vec![Keyframe::new().set("opacity", "1")], 100.0).unwrap();
        assert!(effect.set_keyframes(vec![Keyframe::at(0.6), Keyframe::at(0.2)]).is_err());
        assert_eq!(effect.get_keyframes().len(), 1);

        effect
            .set_keyframes(vec![Keyframe::new().set("opacity", "0"), Keyframe::new().set("opacity", "1")])
            .unwrap();
        let computed = effect.get_keyframes();
        assert_eq!(computed[0].computed_offset, 0.0);
        assert_eq!(computed[1].computed_offset, 1.0);
    }

    fn effect_on(style: &Rc<RefCell<InlineStyle>>, keyframes: Vec<Keyframe>) -> KeyframeEffect {
        let target: TargetHandle = style.clone();
        KeyframeEffect::new(
            Some(target),
            keyframes,
            EffectTiming::new().duration_ms(100.0).fill(FillMode::Both),
        )
        .unwrap()
    }

    fn apply_at(effect: &KeyframeEffect, local_time: f64, rate: f64) {
        let timing = effect.computed_timing_at(Some(local_time), rate);
        effect.apply(&timing, rate);
    }

    #[test]
    fn test_commit_nearest_keyframe() {
        let style = InlineStyle::shared();
        let effect = effect_on(
            &style,
            vec![
                Keyframe::new().set("left", "0px"),
                Keyframe::new().set("left", "50px"),
                Keyframe::new().set("left", "100px"),
            ],
        );

        apply_at(&effect, 10.0, 1.0);
        assert_eq!(style.borrow().get("left"), Some("0px"));
        apply_at(&effect, 40.0, 1.0);
        assert_eq!(style.borrow().get("left"), Some("50px"));
        apply_at(&effect, 80.0, 1.0);
        assert_eq!(style.borrow().get("left"), Some("100px"));
    }

    #[test]
    fn test_commit_tie_breaks_by_direction() {
        let style = InlineStyle::shared();
        let effect = effect_on(
            &style,
            vec![Keyframe::new().set("left", "0px"), Keyframe::new().set("left", "100px")],
        );

        apply_at(&effect, 50.0, 1.0);
        assert_eq!(style.borrow().get("left"), Some("100px"));
        apply_at(&effect, 50.0, -1.0);
        assert_eq!(style.borrow().get("left"), Some("0px"));
    }

    #[test]
    fn test_single_keyframe_waits_for_its_offset() {
        let style = Rc::new(RefCell::new(InlineStyle::new().with("opacity", "0.3")));
        let effect = effect_on(&style, vec![Keyframe::new().set("opacity", "1")]);

        apply_at(&effect, 25.0, 1.0);
        assert_eq!(style.borrow().get("opacity"), Some("0.3"));
        apply_at(&effect, 50.0, 1.0);
        assert_eq!(style.borrow().get("opacity"), Some("0.3"));
        // Even close to the end the keyframe is not committed early.
        apply_at(&effect, 75.0, 1.0);
        assert_eq!(style.borrow().get("opacity"), Some("0.3"));
        apply_at(&effect, 99.0, 1.0);
        assert_eq!(style.borrow().get("opacity"), Some("0.3"));
        // The forwards fill holds progress at 1.
        apply_at(&effect, 100.0, 1.0);
        assert_eq!(style.borrow().get("opacity"), Some("1"));
        apply_at(&effect, 250.0, 1.0);
        assert_eq!(style.borrow().get("opacity"), Some("1"));

        effect.restore();
        assert_eq!(style.borrow().get("opacity"), Some("0.3"));
    }

    #[test]
    fn test_single_keyframe_at_zero_commits_only_at_start() {
        let style = InlineStyle::shared();
        let effect = effect_on(&style, vec![Keyframe::at(0.0).set("color", "red")]);

        apply_at(&effect, 0.0, 1.0);
        assert_eq!(style.borrow().get("color"), Some("red"));
        apply_at(&effect, 10.0, 1.0);
        assert_eq!(style.borrow().get("color"), None);
        apply_at(&effect, 90.0, 1.0);
        assert_eq!(style.borrow().get("color"), None);
    }

    #[test]
    fn test_null_value_removes_and_restore_reinstates() {
        let style = Rc::new(RefCell::new(
            InlineStyle::new().with("color", "blue").with("opacity", "0.5"),
        ));
        let effect = effect_on(
            &style,
            vec![
                Keyframe::new().unset("color").set("opacity", "0"),
                Keyframe::new().set("color", "green").set("opacity", "1"),
            ],
        );

        apply_at(&effect, 0.0, 1.0);
        assert_eq!(style.borrow().get("color"), None);
        assert_eq!(style.borrow().get("opacity"), Some("0"));

        effect.restore();
        assert_eq!(style.borrow().get("color"), Some("blue"));
        assert_eq!(style.borrow().get("opacity"), Some("0.5"));
    }

    #[test]
    fn test_unresolved_progress_restores() {
        let style = InlineStyle::shared();
        let target: TargetHandle = style.clone();
        let effect = KeyframeEffect::new(
            Some(target),
            vec![Keyframe::new().set("left", "0px"), Keyframe::new().set("left", "10px")],
            EffectTiming::new().duration_ms(100.0),
        )
        .unwrap();

        apply_at(&effect, 10.0, 1.0);
        assert_eq!(style.borrow().get("left"), Some("0px"));
        apply_at(&effect, 150.0, 1.0);
        assert_eq!(style.borrow().get_property("left"), None);
    }

    #[test]
    fn test_set_target_restores_previous() {
        let first = InlineStyle::shared();
        let second = InlineStyle::shared();
        let effect = effect_on(&first, vec![Keyframe::new().set("left", "5px"), Keyframe::new().set("left", "9px")]);

        apply_at(&effect, 0.0, 1.0);
        assert_eq!(first.borrow().get("left"), Some("5px"));

        let next: TargetHandle = second.clone();
        effect.set_target(Some(next));
        assert_eq!(first.borrow().get("left"), None);
        apply_at(&effect, 100.0, 1.0);
        assert_eq!(second.borrow().get("left"), Some("9px"));
    }
}
