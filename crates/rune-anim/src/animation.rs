//! The animation state machine.
//!
//! An [`Animation`] binds a [`KeyframeEffect`] to a timeline and tracks where
//! in the effect it currently is. Its current time is derived on every query
//! from either the hold time or the timeline time, start time and playback
//! rate. The play state is derived as well and never stored.
//!
//! State changes that have to wait for the timeline (starting or pausing)
//! are recorded as a pending task and completed from a host microtask, or on
//! a later frame while the timeline is inactive. Once running, the animation
//! requests one host frame at a time and commits its effect on each frame
//! until it stops running.
//!
//! # Usage
//!
//! ```ignore
//! use rune_anim::animation::Animation;
//!
//! let animation = Animation::new(host.clone(), Some(effect), Some(timeline));
//! animation.play()?;
//! host.advance(1000.0);
//! assert!(animation.finished().is_fulfilled());
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{AnimationError, Result};
use crate::events::{AnimationPlaybackEvent, EventListeners, EventQueue, PlaybackEventKind};
use crate::host::{FrameHandle, Host};
use crate::keyframes::KeyframeEffect;
use crate::numeric::CssUnitValue;
use crate::promise::{AnimationPromise, PromiseSlot};
use crate::timeline::TimelineHandle;
use crate::types::{AnimationId, Phase, PlayState};

pub(crate) type AnimationWeak = Weak<RefCell<AnimationInner>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Play,
    Pause,
}

#[derive(Debug, Clone, Copy)]
struct PendingTask {
    kind: TaskKind,
    token: u64,
}

pub(crate) struct AnimationInner {
    id: AnimationId,
    label: String,
    host: Rc<dyn Host>,
    effect: Option<KeyframeEffect>,
    timeline: Option<TimelineHandle>,
    playback_rate: f64,
    pending_playback_rate: Option<f64>,
    start_time: Option<f64>,
    hold_time: Option<f64>,
    previous_current_time: Option<f64>,
    pending_task: Option<PendingTask>,
    ready: PromiseSlot,
    finished: PromiseSlot,
    /// Token of the queued finish notification, if any.
    finish_notification: Option<u64>,
    frame: Option<FrameHandle>,
    previous_phase: Phase,
    tokens: u64,
    listeners: EventListeners,
    event_sink: Option<Rc<RefCell<EventQueue>>>,
    /// Events waiting to be dispatched once no borrow is held.
    outbox: Vec<AnimationPlaybackEvent>,
    self_weak: AnimationWeak,
}

impl AnimationInner {
    fn next_token(&mut self) -> u64 {
        self.tokens += 1;
        self.tokens
    }

    fn timeline_time(&self) -> Option<f64> {
        self.timeline.as_ref().and_then(|t| t.current_time())
    }

    fn has_non_monotonic_timeline(&self) -> bool {
        self.timeline.as_ref().is_some_and(|t| !t.is_monotonic())
    }

    fn current_time(&self) -> Option<f64> {
        self.current_time_with_hold(self.hold_time)
    }

    fn current_time_with_hold(&self, hold_time: Option<f64>) -> Option<f64> {
        if hold_time.is_some() {
            return hold_time;
        }
        let timeline_time = self.timeline_time()?;
        let start_time = self.start_time?;
        Some((timeline_time - start_time) * self.playback_rate)
    }

    fn effective_rate(&self) -> f64 {
        self.pending_playback_rate.unwrap_or(self.playback_rate)
    }

    fn effect_end(&self) -> f64 {
        self.effect.as_ref().map_or(0.0, KeyframeEffect::end_time)
    }

    fn has_pending(&self, kind: TaskKind) -> bool {
        self.pending_task.is_some_and(|task| task.kind == kind)
    }

    fn play_state(&self) -> PlayState {
        let current_time = self.current_time();
        if current_time.is_none() && self.start_time.is_none() && self.pending_task.is_none() {
            return PlayState::Idle;
        }
        if self.has_pending(TaskKind::Pause)
            || (self.start_time.is_none() && !self.has_pending(TaskKind::Play))
        {
            return PlayState::Paused;
        }
        if let Some(current) = current_time {
            let rate = self.effective_rate();
            if (rate > 0.0 && current >= self.effect_end()) || (rate < 0.0 && current <= 0.0) {
                return PlayState::Finished;
            }
        }
        PlayState::Running
    }

    fn apply_pending_playback_rate(&mut self) {
        if let Some(rate) = self.pending_playback_rate.take() {
            self.playback_rate = rate;
        }
    }

    fn silently_set_current_time(&mut self, seek_time: Option<f64>) -> Result<()> {
        let Some(seek_time) = seek_time else {
            if self.current_time().is_some() {
                return Err(AnimationError::type_error(
                    "current time cannot be set to an unresolved value",
                ));
            }
            return Ok(());
        };

        self.seek_to(seek_time);
        Ok(())
    }

    fn seek_to(&mut self, seek_time: f64) {
        let timeline_time = self.timeline_time();
        match timeline_time {
            Some(timeline_time)
                if self.hold_time.is_none()
                    && self.start_time.is_some()
                    && self.playback_rate != 0.0 =>
            {
                self.start_time = Some(timeline_time - seek_time / self.playback_rate);
            }
            _ => self.hold_time = Some(seek_time),
        }
        if timeline_time.is_none() {
            self.start_time = None;
        }
        self.previous_current_time = None;
    }

    fn set_current_time(&mut self, seek_time: Option<f64>) -> Result<()> {
        self.silently_set_current_time(seek_time)?;
        self.settle_seek(seek_time);
        Ok(())
    }

    /// A seek completes a pending pause at the new time.
    fn settle_seek(&mut self, seek_time: Option<f64>) {
        if self.has_pending(TaskKind::Pause) {
            self.hold_time = seek_time;
            self.apply_pending_playback_rate();
            self.start_time = None;
            self.pending_task = None;
            self.ready.current().resolve();
        }
        self.update_finished_state(true, false);
        self.apply_effect();
    }

    fn set_start_time(&mut self, new_start_time: Option<f64>) {
        if self.timeline_time().is_none() && new_start_time.is_some() {
            self.hold_time = None;
        }
        let previous_current_time = self.current_time();
        self.apply_pending_playback_rate();
        self.start_time = new_start_time;
        if new_start_time.is_some() {
            if self.playback_rate != 0.0 {
                self.hold_time = None;
            }
        } else {
            self.hold_time = previous_current_time;
        }
        if self.pending_task.take().is_some() {
            self.ready.current().resolve();
        }
        self.update_finished_state(true, false);
        self.apply_effect();
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.pending_playback_rate = None;
        let previous_time = self.current_time();
        self.playback_rate = rate;
        if let Some(time) = previous_time {
            self.seek_to(time);
            self.settle_seek(Some(time));
        }
    }

    fn schedule_task(&mut self, kind: TaskKind) {
        let token = self.next_token();
        self.pending_task = Some(PendingTask { kind, token });
        let weak = self.self_weak.clone();
        self.host.queue_microtask(Box::new(move || {
            if let Some(animation) = Animation::from_weak(&weak) {
                animation.run_task(token);
            }
        }));
    }

    /// Re-queue the pending task under a fresh token.
    fn reschedule_pending_task(&mut self) {
        if let Some(task) = self.pending_task {
            self.schedule_task(task.kind);
        }
    }

    fn reset_pending_tasks(&mut self) {
        if self.pending_task.take().is_none() {
            return;
        }
        self.apply_pending_playback_rate();
        self.ready.current().reject(AnimationError::Abort);
        self.ready.replace_resolved();
    }

    /// Complete the pending task identified by `token` if the timeline is
    /// ready. Returns whether it ran.
    fn run_pending_task(&mut self, token: u64) -> bool {
        let Some(task) = self.pending_task.filter(|task| task.token == token) else {
            return false;
        };
        let Some(ready_time) = self.timeline_time() else {
            self.schedule_frame();
            return false;
        };
        match task.kind {
            TaskKind::Play => self.play_task(ready_time),
            TaskKind::Pause => self.pause_task(ready_time),
        }
        self.pending_task = None;
        self.ready.current().resolve();
        tracing::debug!(
            animation = self.id.0,
            task = ?task.kind,
            ready_time,
            state = %self.play_state(),
            "pending task completed"
        );
        self.apply_effect();
        self.update_finished_state(false, false);
        true
    }

    fn play_task(&mut self, ready_time: f64) {
        if let Some(hold_time) = self.hold_time {
            self.apply_pending_playback_rate();
            self.start_time = Some(if self.playback_rate == 0.0 {
                ready_time
            } else {
                ready_time - hold_time / self.playback_rate
            });
            if self.playback_rate != 0.0 {
                self.hold_time = None;
            }
        } else if let (Some(start_time), Some(_)) = (self.start_time, self.pending_playback_rate) {
            let current_time_to_match = (ready_time - start_time) * self.playback_rate;
            self.apply_pending_playback_rate();
            if self.playback_rate == 0.0 {
                self.hold_time = Some(current_time_to_match);
                self.start_time = Some(ready_time);
            } else {
                self.start_time = Some(ready_time - current_time_to_match / self.playback_rate);
            }
        }
    }

    fn pause_task(&mut self, ready_time: f64) {
        if let (Some(start_time), None) = (self.start_time, self.hold_time) {
            self.hold_time = Some((ready_time - start_time) * self.playback_rate);
        }
        self.apply_pending_playback_rate();
        self.start_time = None;
    }

    fn play(&mut self, auto_rewind: bool) -> Result<()> {
        let aborted_pause = self.has_pending(TaskKind::Pause);
        let previous_current_time = self.current_time();
        let rate = self.effective_rate();
        let end = self.effect_end();

        let mut seek_time = None;
        if auto_rewind {
            if rate >= 0.0
                && previous_current_time.is_none_or(|current| current < 0.0 || current >= end)
            {
                seek_time = Some(0.0);
            } else if rate < 0.0
                && previous_current_time.is_none_or(|current| current <= 0.0 || current > end)
            {
                if end.is_infinite() {
                    return Err(AnimationError::invalid_state(
                        "cannot play backwards from an infinite end",
                    ));
                }
                seek_time = Some(end);
            }
        }
        if seek_time.is_none() && rate == 0.0 && previous_current_time.is_none() {
            seek_time = Some(0.0);
        }

        if let Some(seek) = seek_time {
            if self.has_non_monotonic_timeline() {
                self.start_time = Some(seek);
                self.hold_time = None;
                self.apply_pending_playback_rate();
            } else {
                self.hold_time = Some(seek);
            }
        }
        if self.hold_time.is_some() {
            self.start_time = None;
        }

        let had_pending_task = self.pending_task.take().is_some();

        if self.hold_time.is_none()
            && seek_time.is_none()
            && !aborted_pause
            && self.pending_playback_rate.is_none()
        {
            return Ok(());
        }

        if !had_pending_task {
            self.ready.renew();
        }
        self.schedule_task(TaskKind::Play);
        self.update_finished_state(false, false);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if self.has_pending(TaskKind::Pause) || self.play_state() == PlayState::Paused {
            return Ok(());
        }

        if self.current_time().is_none() {
            let seek_time = if self.playback_rate >= 0.0 {
                0.0
            } else {
                let end = self.effect_end();
                if end.is_infinite() {
                    return Err(AnimationError::invalid_state(
                        "cannot pause at an infinite end",
                    ));
                }
                end
            };
            if self.has_non_monotonic_timeline() {
                self.start_time = Some(seek_time);
            } else {
                self.hold_time = Some(seek_time);
            }
        }

        let had_pending_play = self.pending_task.take().is_some();
        if !had_pending_play {
            self.ready.renew();
        }
        self.schedule_task(TaskKind::Pause);
        self.update_finished_state(false, false);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let rate = self.effective_rate();
        let end = self.effect_end();
        if rate == 0.0 {
            return Err(AnimationError::invalid_state(
                "cannot finish an animation with a playback rate of zero",
            ));
        }
        if rate > 0.0 && end.is_infinite() {
            return Err(AnimationError::invalid_state(
                "cannot finish an animation with an infinite end",
            ));
        }

        self.apply_pending_playback_rate();
        let limit = if self.playback_rate > 0.0 { end } else { 0.0 };
        self.seek_to(limit);

        if self.start_time.is_none() {
            if let Some(timeline_time) = self.timeline_time() {
                self.start_time = Some(timeline_time - limit / self.playback_rate);
            }
        }

        if self.start_time.is_some() {
            if self.has_pending(TaskKind::Pause) {
                self.hold_time = None;
                self.pending_task = None;
                self.ready.current().resolve();
            } else if self.has_pending(TaskKind::Play) {
                self.pending_task = None;
                self.ready.current().resolve();
            }
        }

        self.apply_effect();
        self.update_finished_state(true, true);
        Ok(())
    }

    fn cancel(&mut self) {
        if self.play_state() != PlayState::Idle {
            self.reset_pending_tasks();
            self.finished.current().reject(AnimationError::Abort);
            self.finished.replace_pending();
            self.finish_notification = None;
            let event = AnimationPlaybackEvent::new(
                PlaybackEventKind::Cancel,
                self.id,
                None,
                self.timeline_time(),
            );
            self.outbox.push(event);
            tracing::debug!(animation = self.id.0, "animation cancelled");
        }
        self.hold_time = None;
        self.start_time = None;
        self.stop_frames();
        if let Some(effect) = &self.effect {
            effect.restore();
        }
        self.previous_phase = Phase::Idle;
    }

    fn update_playback_rate(&mut self, rate: f64) -> Result<()> {
        let previous_state = self.play_state();
        self.pending_playback_rate = Some(rate);
        if self.pending_task.is_some() {
            return Ok(());
        }
        match previous_state {
            PlayState::Idle | PlayState::Paused => {
                self.apply_pending_playback_rate();
                self.apply_effect();
            }
            PlayState::Finished => {
                let unconstrained = self.current_time_with_hold(None);
                if let (Some(timeline_time), Some(unconstrained)) =
                    (self.timeline_time(), unconstrained)
                {
                    self.start_time = Some(if rate == 0.0 {
                        timeline_time
                    } else {
                        timeline_time - unconstrained / rate
                    });
                }
                self.apply_pending_playback_rate();
                self.update_finished_state(false, false);
                self.apply_effect();
            }
            PlayState::Running => self.play(false)?,
        }
        Ok(())
    }

    fn update_finished_state(&mut self, did_seek: bool, synchronously_notify: bool) {
        let unconstrained = if did_seek {
            self.current_time()
        } else {
            self.current_time_with_hold(None)
        };

        if let (Some(unconstrained), Some(_), None) =
            (unconstrained, self.start_time, self.pending_task)
        {
            let end = self.effect_end();
            let rate = self.playback_rate;
            if rate > 0.0 && unconstrained >= end {
                self.hold_time = Some(if did_seek {
                    unconstrained
                } else {
                    self.previous_current_time.map_or(end, |previous| previous.max(end))
                });
            } else if rate < 0.0 && unconstrained <= 0.0 {
                self.hold_time = Some(if did_seek {
                    unconstrained
                } else {
                    self.previous_current_time.map_or(0.0, |previous| previous.min(0.0))
                });
            } else if rate != 0.0 {
                if let Some(timeline_time) = self.timeline_time() {
                    if did_seek {
                        if let Some(hold_time) = self.hold_time {
                            self.start_time = Some(timeline_time - hold_time / rate);
                        }
                    }
                    self.hold_time = None;
                }
            }
        }

        self.previous_current_time = self.current_time();
        let state = self.play_state();

        if state == PlayState::Finished {
            if self.finished.current().is_pending() {
                if synchronously_notify {
                    self.finish_notification = None;
                    self.finish_notification_steps();
                } else {
                    self.queue_finish_notification();
                }
            }
        } else {
            if !self.finished.current().is_pending() {
                self.finished.renew();
            }
            self.finish_notification = None;
        }

        if state == PlayState::Running {
            self.schedule_frame();
        }
    }

    fn queue_finish_notification(&mut self) {
        if self.finish_notification.is_some() {
            return;
        }
        let token = self.next_token();
        self.finish_notification = Some(token);
        let weak = self.self_weak.clone();
        self.host.queue_microtask(Box::new(move || {
            if let Some(animation) = Animation::from_weak(&weak) {
                animation.run_finish_notification(token);
            }
        }));
    }

    fn finish_notification_steps(&mut self) {
        if self.play_state() != PlayState::Finished {
            return;
        }
        if self.finished.current().resolve() {
            tracing::debug!(
                animation = self.id.0,
                current_time = ?self.current_time(),
                "animation finished"
            );
            let event = AnimationPlaybackEvent::new(
                PlaybackEventKind::Finish,
                self.id,
                self.current_time(),
                self.timeline_time(),
            );
            self.outbox.push(event);
        }
    }

    /// Commit the effect at the current time.
    fn apply_effect(&mut self) {
        let Some(effect) = self.effect.clone() else {
            return;
        };
        let timing = effect.computed_timing_at(self.current_time(), self.playback_rate);
        if timing.phase != self.previous_phase {
            tracing::debug!(
                animation = self.id.0,
                from = ?self.previous_phase,
                to = ?timing.phase,
                local_time = ?timing.local_time,
                "phase changed"
            );
            self.previous_phase = timing.phase;
        }
        effect.apply(&timing, self.playback_rate);
    }

    fn schedule_frame(&mut self) {
        if self.frame.is_some() {
            return;
        }
        let weak = self.self_weak.clone();
        let handle = self.host.request_frame(Box::new(move |time| {
            if let Some(animation) = Animation::from_weak(&weak) {
                animation.on_frame(time);
            }
        }));
        self.frame = Some(handle);
    }

    fn stop_frames(&mut self) {
        if let Some(handle) = self.frame.take() {
            self.host.cancel_frame(handle);
        }
    }

    /// One iteration of the frame loop.
    fn sample(&mut self) {
        if let Some(task) = self.pending_task {
            if self.run_pending_task(task.token) {
                return;
            }
        }
        self.update_finished_state(false, false);
        self.apply_effect();
        if self.pending_task.is_some() {
            self.schedule_frame();
        }
    }
}

/// Shared handle to an animation.
///
/// Clones refer to the same animation.
#[derive(Clone)]
pub struct Animation {
    inner: Rc<RefCell<AnimationInner>>,
}

impl Animation {
    /// Create an idle animation.
    pub fn new(
        host: Rc<dyn Host>,
        effect: Option<KeyframeEffect>,
        timeline: Option<TimelineHandle>,
    ) -> Self {
        let inner = Rc::new_cyclic(|weak| {
            RefCell::new(AnimationInner {
                id: AnimationId::new(),
                label: String::new(),
                host,
                effect: None,
                timeline,
                playback_rate: 1.0,
                pending_playback_rate: None,
                start_time: None,
                hold_time: None,
                previous_current_time: None,
                pending_task: None,
                ready: PromiseSlot::fulfilled(),
                finished: PromiseSlot::pending(),
                finish_notification: None,
                frame: None,
                previous_phase: Phase::Idle,
                tokens: 0,
                listeners: EventListeners::new(),
                event_sink: None,
                outbox: Vec::new(),
                self_weak: weak.clone(),
            })
        });
        let animation = Self { inner };
        if effect.is_some() {
            animation.set_effect(effect);
        }
        animation
    }

    pub(crate) fn from_weak(weak: &AnimationWeak) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn downgrade(&self) -> AnimationWeak {
        Rc::downgrade(&self.inner)
    }

    /// Whether both handles refer to the same animation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Process-unique identity.
    pub fn animation_id(&self) -> AnimationId {
        self.inner.borrow().id
    }

    /// User-assigned label.
    pub fn id(&self) -> String {
        self.inner.borrow().label.clone()
    }

    pub fn set_id(&self, label: impl Into<String>) {
        self.inner.borrow_mut().label = label.into();
    }

    pub fn current_time(&self) -> Option<f64> {
        self.inner.borrow().current_time()
    }

    /// Current time with units: percent on non-monotonic timelines,
    /// milliseconds otherwise.
    pub fn current_time_value(&self) -> Option<CssUnitValue> {
        let inner = self.inner.borrow();
        let time = inner.current_time()?;
        Some(if inner.has_non_monotonic_timeline() {
            CssUnitValue::percent(time)
        } else {
            CssUnitValue::ms(time)
        })
    }

    /// Seek to `time`.
    ///
    /// Setting `None` while the current time is resolved is a Type error.
    /// Seeking while a pause is pending completes the pause.
    pub fn set_current_time(&self, time: Option<f64>) -> Result<()> {
        let result = self.inner.borrow_mut().set_current_time(time);
        self.flush_events();
        result
    }

    pub fn start_time(&self) -> Option<f64> {
        self.inner.borrow().start_time
    }

    pub fn set_start_time(&self, time: Option<f64>) {
        self.inner.borrow_mut().set_start_time(time);
        self.flush_events();
    }

    pub fn playback_rate(&self) -> f64 {
        self.inner.borrow().playback_rate
    }

    /// Pending playback rate if one is waiting to apply, else the playback rate.
    pub fn effective_playback_rate(&self) -> f64 {
        self.inner.borrow().effective_rate()
    }

    /// Set the playback rate immediately, preserving the current time.
    pub fn set_playback_rate(&self, rate: f64) {
        self.inner.borrow_mut().set_playback_rate(rate);
        self.flush_events();
    }

    /// Change the playback rate without a jump in the current time.
    pub fn update_playback_rate(&self, rate: f64) -> Result<()> {
        let result = self.inner.borrow_mut().update_playback_rate(rate);
        self.flush_events();
        result
    }

    pub fn effect(&self) -> Option<KeyframeEffect> {
        self.inner.borrow().effect.clone()
    }

    /// Attach `effect`, detaching it from any other animation first.
    pub fn set_effect(&self, effect: Option<KeyframeEffect>) {
        let old = self.inner.borrow().effect.clone();
        match (&old, &effect) {
            (Some(a), Some(b)) if a.ptr_eq(b) => return,
            (None, None) => return,
            _ => {}
        }

        if let Some(new_effect) = &effect {
            if let Some(previous) = new_effect.animation() {
                if !previous.ptr_eq(self) {
                    tracing::debug!(
                        from = previous.animation_id().0,
                        to = self.animation_id().0,
                        "effect moved between animations"
                    );
                    previous.set_effect(None);
                }
            }
        }

        if let Some(old_effect) = &old {
            old_effect.set_owner(None);
            old_effect.restore();
        }
        if let Some(new_effect) = &effect {
            new_effect.set_owner(Some(self.downgrade()));
        }

        {
            let mut inner = self.inner.borrow_mut();
            inner.reschedule_pending_task();
            inner.effect = effect;
            inner.previous_phase = Phase::Idle;
            inner.update_finished_state(false, false);
            inner.apply_effect();
        }
        self.flush_events();
    }

    pub fn timeline(&self) -> Option<TimelineHandle> {
        self.inner.borrow().timeline.clone()
    }

    /// Switch timelines.
    ///
    /// A start time is kept, so the current time follows the new timeline.
    /// Moving a running animation onto a non-monotonic timeline aligns its
    /// start with the beginning of the scroll range.
    pub fn set_timeline(&self, timeline: Option<TimelineHandle>) {
        {
            let mut inner = self.inner.borrow_mut();
            let same = match (&inner.timeline, &timeline) {
                (Some(a), Some(b)) => a.id() == b.id(),
                (None, None) => true,
                _ => false,
            };
            if same {
                return;
            }
            let previous_state = inner.play_state();
            inner.timeline = timeline;

            if inner.has_non_monotonic_timeline()
                && matches!(previous_state, PlayState::Running | PlayState::Finished)
            {
                inner.apply_pending_playback_rate();
                let aligned = if inner.playback_rate >= 0.0 { 0.0 } else { inner.effect_end() };
                inner.start_time = Some(aligned);
            }
            if inner.start_time.is_some() {
                inner.hold_time = None;
            }
            inner.update_finished_state(false, false);
            inner.apply_effect();
        }
        self.flush_events();
    }

    pub fn play_state(&self) -> PlayState {
        self.inner.borrow().play_state()
    }

    /// Whether a play or pause task is waiting to complete.
    pub fn pending(&self) -> bool {
        self.inner.borrow().pending_task.is_some()
    }

    /// Handle that resolves once the pending task completes.
    pub fn ready(&self) -> AnimationPromise {
        self.inner.borrow().ready.current()
    }

    /// Handle that resolves when the animation next finishes.
    pub fn finished(&self) -> AnimationPromise {
        self.inner.borrow().finished.current()
    }

    /// Play, rewinding to the start (or the end when reversed) if the
    /// current time is outside the effect.
    pub fn play(&self) -> Result<()> {
        let result = self.inner.borrow_mut().play(true);
        tracing::debug!(animation = self.animation_id().0, ok = result.is_ok(), "play");
        self.flush_events();
        result
    }

    pub fn pause(&self) -> Result<()> {
        let result = self.inner.borrow_mut().pause();
        tracing::debug!(animation = self.animation_id().0, ok = result.is_ok(), "pause");
        self.flush_events();
        result
    }

    /// Jump to the end in the playback direction and finish synchronously.
    pub fn finish(&self) -> Result<()> {
        let result = self.inner.borrow_mut().finish();
        self.flush_events();
        result
    }

    /// Clear all time state and remove the effect's styles.
    ///
    /// Pending `ready` and the current `finished` handles reject with
    /// [`AnimationError::Abort`].
    pub fn cancel(&self) {
        self.inner.borrow_mut().cancel();
        self.flush_events();
    }

    /// Flip the playback direction and play.
    pub fn reverse(&self) -> Result<()> {
        let result = {
            let mut inner = self.inner.borrow_mut();
            if inner.timeline_time().is_none() {
                Err(AnimationError::invalid_state(
                    "cannot reverse an animation without an active timeline",
                ))
            } else {
                let original = inner.pending_playback_rate;
                inner.pending_playback_rate = Some(-inner.effective_rate());
                let played = inner.play(true);
                if played.is_err() {
                    inner.pending_playback_rate = original;
                }
                played
            }
        };
        self.flush_events();
        result
    }

    /// Register a listener for playback events of `kind`.
    pub fn add_event_listener(
        &self,
        kind: PlaybackEventKind,
        listener: impl Fn(&AnimationPlaybackEvent) + 'static,
    ) {
        self.inner.borrow_mut().listeners.add(kind, Rc::new(listener));
    }

    /// Forward dispatched events into `queue` as well.
    pub(crate) fn set_event_sink(&self, queue: Rc<RefCell<EventQueue>>) {
        self.inner.borrow_mut().event_sink = Some(queue);
    }

    /// Re-sample the timeline immediately, outside the frame loop.
    pub fn update(&self) {
        self.inner.borrow_mut().sample();
        self.flush_events();
    }

    /// Dispatch `remove` after the manager dropped this animation in favour
    /// of a newer one covering the same properties.
    pub(crate) fn dispatch_remove(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            let event = AnimationPlaybackEvent::new(
                PlaybackEventKind::Remove,
                inner.id,
                inner.current_time(),
                inner.timeline_time(),
            );
            inner.outbox.push(event);
        }
        self.flush_events();
    }

    /// Refresh after the effect's timing, keyframes or target changed.
    pub(crate) fn effect_changed(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.update_finished_state(false, false);
            inner.apply_effect();
        }
        self.flush_events();
    }

    fn on_frame(&self, time: f64) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.frame = None;
            tracing::trace!(animation = inner.id.0, time, "animation frame");
            inner.sample();
        }
        self.flush_events();
    }

    fn run_task(&self, token: u64) {
        self.inner.borrow_mut().run_pending_task(token);
        self.flush_events();
    }

    fn run_finish_notification(&self, token: u64) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.finish_notification != Some(token) {
                return;
            }
            inner.finish_notification = None;
            inner.finish_notification_steps();
        }
        self.flush_events();
    }

    /// Dispatch queued events with no borrow held.
    fn flush_events(&self) {
        let (events, listeners, sink) = {
            let mut inner = self.inner.borrow_mut();
            if inner.outbox.is_empty() {
                return;
            }
            (
                std::mem::take(&mut inner.outbox),
                inner.listeners.clone(),
                inner.event_sink.clone(),
            )
        };
        for event in events {
            if let Some(sink) = &sink {
                sink.borrow_mut().push(event.clone());
            }
            for listener in listeners.for_kind(event.kind) {
                listener(&event);
            }
        }
    }
}

impl fmt::Debug for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Animation")
            .field("id", &inner.id)
            .field("label", &inner.label)
            .field("play_state", &inner.play_state())
            .field("current_time", &inner.current_time())
            .field("start_time", &inner.start_time)
            .field("hold_time", &inner.hold_time)
            .field("playback_rate", &inner.playback_rate)
            .field("pending_playback_rate", &inner.pending_playback_rate)
            .field("pending_task", &inner.pending_task.map(|t| t.kind))
            .finish()
    }
}
