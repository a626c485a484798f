//! Animation playback events.
//!
//! This module provides the event type dispatched by animations (`finish`,
//! `cancel`, `remove`), per-animation listener lists, and an event queue the
//! [`AnimationManager`](crate::manager::AnimationManager) fills so hosts can
//! poll events after each frame.
//!
//! # Usage
//!
//! ```ignore
//! use rune_anim::events::PlaybackEventKind;
//!
//! animation.add_event_listener(PlaybackEventKind::Finish, |event| {
//!     println!("finished at {:?}", event.current_time);
//! });
//!
//! host.advance(1000.0);
//!
//! for event in manager.drain_events() {
//!     if event.kind == PlaybackEventKind::Cancel {
//!         println!("animation {:?} was cancelled", event.animation_id);
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::types::AnimationId;

/// Kind of playback event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEventKind {
    /// The animation entered the finished state.
    Finish,
    /// The animation was cancelled while not idle.
    Cancel,
    /// The animation was replaced and removed.
    Remove,
}

/// Event dispatched to playback listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationPlaybackEvent {
    pub kind: PlaybackEventKind,
    /// The animation that dispatched the event.
    pub animation_id: AnimationId,
    /// Current time of the animation when the event was created.
    pub current_time: Option<f64>,
    /// Time of the animation's timeline when the event was created.
    pub timeline_time: Option<f64>,
}

impl AnimationPlaybackEvent {
    pub fn new(
        kind: PlaybackEventKind,
        animation_id: AnimationId,
        current_time: Option<f64>,
        timeline_time: Option<f64>,
    ) -> Self {
        Self {
            kind,
            animation_id,
            current_time,
            timeline_time,
        }
    }
}

/// Callback invoked with a dispatched event.
pub type PlaybackListener = Rc<dyn Fn(&AnimationPlaybackEvent)>;

/// Listener list for one animation.
#[derive(Default, Clone)]
pub struct EventListeners {
    listeners: Vec<(PlaybackEventKind, PlaybackListener)>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: PlaybackEventKind, listener: PlaybackListener) {
        self.listeners.push((kind, listener));
    }

    /// Listeners registered for `kind`, in registration order.
    ///
    /// Callers collect these before dispatching so no borrow is held while a
    /// listener runs.
    pub fn for_kind(&self, kind: PlaybackEventKind) -> Vec<PlaybackListener> {
        self.listeners
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.listeners.iter().map(|(kind, _)| kind))
            .finish()
    }
}

/// Queue of playback events for polling.
#[derive(Debug, Default, Clone)]
pub struct EventQueue {
    events: VecDeque<AnimationPlaybackEvent>,
}

impl EventQueue {
    /// Create a new empty event queue.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: AnimationPlaybackEvent) {
        self.events.push_back(event);
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Pop the next event from the queue.
    pub fn pop(&mut self) -> Option<AnimationPlaybackEvent> {
        self.events.pop_front()
    }

    /// Drain all events from the queue, returning an iterator.
    pub fn drain(&mut self) -> impl Iterator<Item = AnimationPlaybackEvent> + '_ {
        self.events.drain(..)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
