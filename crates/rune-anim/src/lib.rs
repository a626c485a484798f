//! Web Animations timing engine for Rune.
//!
//! This crate provides:
//! - **Timelines**: document time, manual time, and scroll/view progress
//! - **Effects**: timing calculations and keyframe snapshots committed to a style target
//! - **Animations**: the play/pause/finish/cancel state machine with `ready` and `finished` handles
//! - **Easing**: CSS timing functions including `steps()` and `cubic-bezier()`
//! - **Events**: `finish`, `cancel` and `remove` notifications
//!
//! # Architecture
//!
//! ```text
//! AnimationManager
//!   ├── DocumentTimeline / ScrollTimeline / ViewTimeline
//!   └── Animation ── KeyframeEffect ── StyleTarget
//!         │
//!         └── Host (clock, frames, microtasks)
//! ```
//!
//! Everything is single-threaded: handles are `Rc`-based and the host drives
//! frames and microtasks cooperatively.

pub mod animation;
pub mod easing;
pub mod error;
pub mod events;
pub mod host;
pub mod keyframes;
pub mod manager;
pub mod numeric;
pub mod promise;
pub mod scroll;
pub mod target;
pub mod timeline;
pub mod timing;
pub mod types;

pub use animation::Animation;
pub use easing::{EasingError, EasingFunction, StepPosition};
pub use error::{AnimationError, Result};
pub use events::{AnimationPlaybackEvent, EventQueue, PlaybackEventKind};
pub use host::{FrameHandle, Host, ManualHost};
pub use keyframes::{CompositeOperation, ComputedKeyframe, Keyframe, KeyframeEffect};
pub use manager::{AnimateOptions, AnimationManager};
pub use numeric::{CssNumericValue, CssUnit, CssUnitValue};
pub use promise::{AnimationPromise, PromiseState};
pub use scroll::{
    ScrollAxis, ScrollContainer, ScrollSource, ScrollTimeline, SubjectBox, TimelineRegistry,
    ViewSubject, ViewTimeline,
};
pub use target::{InlineStyle, StyleTarget, TargetHandle};
pub use timeline::{AnimationTimeline, DocumentTimeline, ManualTimeline, TimelineHandle};
pub use timing::{
    AnimationEffect, ComputedTiming, EffectDuration, EffectTiming, FillMode, IterationDirection,
    OptionalEffectTiming, PlaybackDirection,
};
pub use types::{AnimationId, ElementId, Phase, PlayState, TimelineId};
