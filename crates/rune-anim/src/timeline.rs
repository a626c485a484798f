//! Timelines: pull-based time sources for animations.
//!
//! A timeline reports a `current_time` that is re-read on every query and may
//! be `None` while the timeline is inactive. Document timelines are
//! monotonic. Scroll and view timelines (see [`crate::scroll`]) are not, and
//! report progress in percent rather than milliseconds.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use rune_config::AnimationConfig;

use crate::host::Host;
use crate::types::TimelineId;

/// A source of time for animations.
pub trait AnimationTimeline {
    /// Identity used by the scroll registry and for sharing checks.
    fn id(&self) -> TimelineId;

    /// Current time, or `None` while inactive. Side-effect free.
    fn current_time(&self) -> Option<f64>;

    /// Whether time only ever moves forwards.
    fn is_monotonic(&self) -> bool {
        true
    }

    /// Whether the timeline currently has a resolved time.
    fn is_active(&self) -> bool {
        self.current_time().is_some()
    }
}

/// Shared timeline handle.
pub type TimelineHandle = Rc<dyn AnimationTimeline>;

/// Timeline that follows the host clock relative to an origin.
pub struct DocumentTimeline {
    id: TimelineId,
    host: Rc<dyn Host>,
    origin_time: f64,
}

impl DocumentTimeline {
    /// Timeline reading zero at host time `origin_time`.
    pub fn new(host: Rc<dyn Host>, origin_time: f64) -> Self {
        Self {
            id: TimelineId::new(),
            host,
            origin_time,
        }
    }

    /// Timeline with its origin taken from configuration.
    pub fn from_config(host: Rc<dyn Host>, config: &AnimationConfig) -> Self {
        Self::new(host, config.document_origin_ms)
    }

    pub fn origin_time(&self) -> f64 {
        self.origin_time
    }
}

impl AnimationTimeline for DocumentTimeline {
    fn id(&self) -> TimelineId {
        self.id
    }

    fn current_time(&self) -> Option<f64> {
        Some(self.host.now() - self.origin_time)
    }
}

impl fmt::Debug for DocumentTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentTimeline")
            .field("id", &self.id)
            .field("origin_time", &self.origin_time)
            .finish()
    }
}

/// Timeline whose time is set explicitly by its owner.
#[derive(Debug)]
pub struct ManualTimeline {
    id: TimelineId,
    time: Cell<Option<f64>>,
    monotonic: bool,
}

impl ManualTimeline {
    /// Monotonic timeline starting at `time`.
    pub fn new(time: Option<f64>) -> Self {
        Self {
            id: TimelineId::new(),
            time: Cell::new(time),
            monotonic: true,
        }
    }

    /// Non-monotonic timeline starting at `time`, reporting percentages.
    pub fn non_monotonic(time: Option<f64>) -> Self {
        Self {
            monotonic: false,
            ..Self::new(time)
        }
    }

    /// Set the time; `None` makes the timeline inactive.
    pub fn set_current_time(&self, time: Option<f64>) {
        self.time.set(time);
    }
}

impl AnimationTimeline for ManualTimeline {
    fn id(&self) -> TimelineId {
        self.id
    }

    fn current_time(&self) -> Option<f64> {
        self.time.get()
    }

    fn is_monotonic(&self) -> bool {
        self.monotonic
    }
}
