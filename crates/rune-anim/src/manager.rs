//! Animation manager for creating and tracking animations on a document.
//!
//! The `AnimationManager` is the document-level entry point. It handles:
//! - Building a keyframe effect and animation in one `animate` call
//! - Tracking live animations per target
//! - Routing scroll notifications to animations on scroll-driven timelines
//! - Dropping finished animations that a newer animation fully replaces
//! - Collecting playback events for polling
//!
//! # Usage
//!
//! ```ignore
//! use rune_anim::keyframes::Keyframe;
//! use rune_anim::manager::AnimationManager;
//!
//! let mut manager = AnimationManager::new(host.clone(), &config);
//!
//! let animation = manager.animate(
//!     target,
//!     vec![
//!         Keyframe::new().set("opacity", "0"),
//!         Keyframe::new().set("opacity", "1"),
//!     ],
//!     500.0,
//! )?;
//!
//! host.advance(600.0);
//! for event in manager.drain_events() {
//!     println!("{:?} {:?}", event.kind, event.animation_id);
//! }
//! ```

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use rune_config::RuneConfig;

use crate::animation::Animation;
use crate::error::Result;
use crate::events::{AnimationPlaybackEvent, EventQueue};
use crate::host::Host;
use crate::keyframes::{CompositeOperation, Keyframe, KeyframeEffect, parse_keyframes};
use crate::scroll::{
    ScrollAxis, ScrollSource, ScrollTimeline, TimelineRegistry, ViewSubject, ViewTimeline,
};
use crate::target::{TargetHandle, same_target};
use crate::timeline::{AnimationTimeline, DocumentTimeline, TimelineHandle};
use crate::timing::EffectTiming;
use crate::types::{ElementId, PlayState, TimelineId};

/// Options for [`AnimationManager::animate`].
#[derive(Clone, Default)]
pub struct AnimateOptions {
    pub timing: EffectTiming,
    /// Label stored as the animation's `id`.
    pub id: Option<String>,
    /// Timeline to bind; the document timeline when `None`.
    pub timeline: Option<TimelineHandle>,
    pub pseudo_element: Option<String>,
    pub composite: CompositeOperation,
}

impl AnimateOptions {
    pub fn new(timing: impl Into<EffectTiming>) -> Self {
        Self {
            timing: timing.into(),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn timeline(mut self, timeline: TimelineHandle) -> Self {
        self.timeline = Some(timeline);
        self
    }

    pub fn pseudo_element(mut self, selector: impl Into<String>) -> Self {
        self.pseudo_element = Some(selector.into());
        self
    }

    pub fn composite(mut self, composite: CompositeOperation) -> Self {
        self.composite = composite;
        self
    }
}

impl From<f64> for AnimateOptions {
    fn from(duration_ms: f64) -> Self {
        Self::new(duration_ms)
    }
}

impl From<EffectTiming> for AnimateOptions {
    fn from(timing: EffectTiming) -> Self {
        Self::new(timing)
    }
}

/// Document-level owner of animations and scroll timelines.
pub struct AnimationManager {
    host: Rc<dyn Host>,
    document_timeline: TimelineHandle,

    /// Animations created through this manager, oldest first.
    animations: Vec<Animation>,

    /// Which timelines observe which scrolled elements.
    registry: TimelineRegistry,

    /// Events dispatched by managed animations, in dispatch order.
    events: Rc<RefCell<EventQueue>>,
}

impl AnimationManager {
    /// Create a manager with a document timeline configured by `config`.
    pub fn new(host: Rc<dyn Host>, config: &RuneConfig) -> Self {
        let document_timeline: TimelineHandle =
            Rc::new(DocumentTimeline::from_config(host.clone(), &config.animation));
        Self {
            host,
            document_timeline,
            animations: Vec::new(),
            registry: TimelineRegistry::new(),
            events: Rc::new(RefCell::new(EventQueue::new())),
        }
    }

    pub fn document_timeline(&self) -> TimelineHandle {
        self.document_timeline.clone()
    }

    /// Create a keyframe effect on `target`, bind it to a new animation and
    /// play it.
    ///
    /// Invalid keyframes, timing or pseudo-element selectors fail before
    /// anything is created.
    pub fn animate(
        &mut self,
        target: TargetHandle,
        keyframes: Vec<Keyframe>,
        options: impl Into<AnimateOptions>,
    ) -> Result<Animation> {
        let options = options.into();
        let effect = KeyframeEffect::new(Some(target), keyframes, options.timing.clone())?;
        self.start(effect, options)
    }

    /// Like [`AnimationManager::animate`] with keyframes given as JSON, in
    /// either list or property-indexed form.
    pub fn animate_json(
        &mut self,
        target: TargetHandle,
        keyframes: &str,
        options: impl Into<AnimateOptions>,
    ) -> Result<Animation> {
        let keyframes = parse_keyframes(keyframes)?;
        self.animate(target, keyframes, options)
    }

    fn start(&mut self, effect: KeyframeEffect, options: AnimateOptions) -> Result<Animation> {
        effect.set_pseudo_element(options.pseudo_element.as_deref())?;
        effect.set_composite(options.composite);

        let timeline = options.timeline.unwrap_or_else(|| self.document_timeline.clone());
        let animation = Animation::new(self.host.clone(), Some(effect), Some(timeline));
        if let Some(id) = options.id {
            animation.set_id(id);
        }
        animation.set_event_sink(self.events.clone());
        animation.play()?;

        tracing::debug!(
            animation = animation.animation_id().0,
            label = %animation.id(),
            "animation started"
        );

        self.remove_replaced(&animation);
        self.prune();
        self.animations.push(animation.clone());
        Ok(animation)
    }

    /// Forget cancelled animations, and finished ones that no longer touch
    /// their target. An animation on a non-monotonic timeline is kept, since
    /// scrolling back can make it active again.
    fn prune(&mut self) {
        let before = self.animations.len();
        self.animations.retain(|animation| {
            if animation.play_state() == PlayState::Idle {
                return false;
            }
            if !animation.finished().is_fulfilled() {
                return true;
            }
            let monotonic = animation
                .timeline()
                .is_none_or(|timeline| timeline.is_monotonic());
            let contributes = animation
                .effect()
                .is_some_and(|effect| effect.get_computed_timing().progress.is_some());
            !monotonic || contributes
        });
        let dropped = before - self.animations.len();
        if dropped > 0 {
            tracing::trace!(dropped, "pruned animations");
        }
    }

    /// Drop finished animations whose every property `newer` also animates on
    /// the same target. Each dropped animation dispatches `remove`.
    fn remove_replaced(&mut self, newer: &Animation) {
        let Some(effect) = newer.effect() else {
            return;
        };
        let Some(target) = effect.target() else {
            return;
        };
        let covered: BTreeSet<String> = effect.animated_properties().into_iter().collect();

        let mut removed = Vec::new();
        self.animations.retain(|animation| {
            let replaced = animation.play_state() == PlayState::Finished
                && animation.effect().is_some_and(|old| {
                    old.target().is_some_and(|t| same_target(&t, &target))
                        && old
                            .animated_properties()
                            .iter()
                            .all(|property| covered.contains(property))
                });
            if replaced {
                removed.push(animation.clone());
            }
            !replaced
        });

        for animation in removed {
            tracing::debug!(animation = animation.animation_id().0, "animation replaced");
            animation.dispatch_remove();
        }
    }

    /// Live animations, oldest first.
    ///
    /// Cancelled animations and animations whose `finished` handle resolved
    /// are left out. Cancelled ones, and finished ones with nothing left to
    /// fill, are also forgotten.
    pub fn animations(&mut self) -> Vec<Animation> {
        self.prune();
        self.animations
            .iter()
            .filter(|animation| !animation.finished().is_fulfilled())
            .cloned()
            .collect()
    }

    /// Live animations whose effect targets `target`.
    pub fn animations_for(&mut self, target: &TargetHandle) -> Vec<Animation> {
        self.animations()
            .into_iter()
            .filter(|animation| {
                animation
                    .effect()
                    .and_then(|effect| effect.target())
                    .is_some_and(|t| same_target(&t, target))
            })
            .collect()
    }

    /// Cancel every animation targeting `target`. Returns how many were
    /// cancelled.
    pub fn cancel_animations_for(&mut self, target: &TargetHandle) -> usize {
        let matching = self.animations_for(target);
        for animation in &matching {
            animation.cancel();
        }
        self.prune();
        matching.len()
    }

    /// Total animations still held, including finished ones that fill.
    ///
    /// Storage is pruned when animations are started or listed.
    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    /// Create a scroll timeline for `source` and observe its element.
    pub fn scroll_timeline(
        &mut self,
        source: Rc<dyn ScrollSource>,
        axis: ScrollAxis,
    ) -> TimelineHandle {
        let element = source.element_id();
        let timeline: TimelineHandle = Rc::new(ScrollTimeline::new(source, axis));
        self.observe_scroll_timeline(element, &timeline);
        timeline
    }

    /// Create a view timeline for `subject` inside `source`, observing both.
    pub fn view_timeline(
        &mut self,
        source: Rc<dyn ScrollSource>,
        subject: Rc<dyn ViewSubject>,
        axis: ScrollAxis,
    ) -> TimelineHandle {
        let elements = [source.element_id(), subject.element_id()];
        let timeline: TimelineHandle = Rc::new(ViewTimeline::new(source, subject, axis));
        for element in elements {
            self.observe_scroll_timeline(element, &timeline);
        }
        timeline
    }

    /// Register `timeline` to be refreshed when `element` scrolls.
    ///
    /// The entry stays until [`AnimationManager::disconnect_timeline`] is
    /// called for the timeline.
    pub fn observe_scroll_timeline(&mut self, element: ElementId, timeline: &TimelineHandle) {
        tracing::debug!(%element, timeline = timeline.id().0, "observing scroll source");
        self.registry.observe(element, timeline.id());
    }

    /// Stop refreshing `timeline` on scroll. Returns whether it was observed.
    pub fn disconnect_timeline(&mut self, timeline: TimelineId) -> bool {
        self.registry.disconnect(timeline)
    }

    /// Re-sample every animation bound to a timeline observing `element`.
    ///
    /// Returns the number of animations refreshed.
    pub fn notify_scroll(&mut self, element: &ElementId) -> usize {
        let observers = self.registry.observers_of(element);
        if observers.is_empty() {
            return 0;
        }
        let affected: Vec<Animation> = self
            .animations
            .iter()
            .filter(|animation| {
                animation
                    .timeline()
                    .is_some_and(|timeline| observers.contains(&timeline.id()))
            })
            .cloned()
            .collect();
        tracing::trace!(%element, animations = affected.len(), "scroll notification");
        for animation in &affected {
            animation.update();
        }
        affected.len()
    }

    /// Take every event dispatched since the last drain.
    pub fn drain_events(&mut self) -> Vec<AnimationPlaybackEvent> {
        self.events.borrow_mut().drain().collect()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlaybackEventKind;
    use crate::host::ManualHost;
    use crate::scroll::{ScrollContainer, SubjectBox};
    use crate::target::InlineStyle;
    use crate::timing::FillMode;

    fn setup() -> (Rc<ManualHost>, AnimationManager) {
        let host = Rc::new(ManualHost::new());
        let manager = AnimationManager::new(host.clone(), &RuneConfig::default());
        (host, manager)
    }

    fn fade() -> Vec<Keyframe> {
        vec![
            Keyframe::new().set("opacity", "0"),
            Keyframe::new().set("opacity", "1"),
        ]
    }

    #[test]
    fn test_animate_plays_on_document_timeline() {
        let (host, mut manager) = setup();
        let style = InlineStyle::shared();

        let animation = manager
            .animate(style.clone(), fade(), AnimateOptions::new(500.0).id("fade-in"))
            .unwrap();
        assert_eq!(animation.id(), "fade-in");
        assert!(animation.pending());
        assert_eq!(
            animation.timeline().unwrap().id(),
            manager.document_timeline().id()
        );

        host.advance(100.0);
        assert_eq!(animation.play_state(), PlayState::Running);
        assert_eq!(style.borrow().get("opacity"), Some("0"));
        assert_eq!(manager.animations().len(), 1);
    }

    #[test]
    fn test_animate_rejects_bad_input() {
        let (_host, mut manager) = setup();
        let style = InlineStyle::shared();

        let bad_offsets = vec![
            Keyframe::at(0.5).set("opacity", "0"),
            Keyframe::at(0.4).set("opacity", "1"),
        ];
        assert!(manager.animate(style.clone(), bad_offsets, 100.0).is_err());

        let bad_pseudo = AnimateOptions::new(100.0).pseudo_element("not-a-pseudo");
        assert!(manager.animate(style, fade(), bad_pseudo).is_err());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_animate_json() {
        let (host, mut manager) = setup();
        let style = InlineStyle::shared();
        let animation = manager
            .animate_json(style.clone(), r#"{"opacity": ["0", "1"]}"#, 100.0)
            .unwrap();
        host.advance(90.0);
        assert_eq!(style.borrow().get("opacity"), Some("1"));
        assert_eq!(animation.effect().unwrap().get_keyframes().len(), 2);
    }

    #[test]
    fn test_finished_and_cancelled_are_dropped() {
        let (host, mut manager) = setup();
        let style = InlineStyle::shared();
        let short = manager.animate(style.clone(), fade(), 50.0).unwrap();
        let long = manager.animate(style.clone(), fade(), 1000.0).unwrap();
        let other = manager.animate(InlineStyle::shared(), fade(), 1000.0).unwrap();

        host.advance(100.0);
        assert!(short.finished().is_fulfilled());
        let live = manager.animations();
        assert_eq!(live.len(), 2);
        assert!(live[0].ptr_eq(&long));

        let target: TargetHandle = style.clone();
        assert_eq!(manager.animations_for(&target).len(), 1);
        assert_eq!(manager.cancel_animations_for(&target), 1);
        assert_eq!(long.play_state(), PlayState::Idle);

        let live = manager.animations();
        assert_eq!(live.len(), 1);
        assert!(live[0].ptr_eq(&other));
    }

    #[test]
    fn test_storage_shrinks_once_animations_stop_contributing() {
        let (host, mut manager) = setup();
        let style = InlineStyle::shared();
        for _ in 0..50 {
            manager.animate(InlineStyle::shared(), fade(), 10.0).unwrap();
        }
        let filling = manager
            .animate(style.clone(), fade(), EffectTiming::new().duration_ms(10.0).fill(FillMode::Forwards))
            .unwrap();
        assert_eq!(manager.len(), 51);

        host.advance(20.0);
        assert!(filling.finished().is_fulfilled());
        assert!(manager.animations().is_empty());
        // Only the animation still holding its end value is kept.
        assert_eq!(manager.len(), 1);
        assert_eq!(style.borrow().get("opacity"), Some("1"));

        // Starting more animations does not grow storage past the live set.
        for _ in 0..10 {
            manager.animate(InlineStyle::shared(), fade(), 10.0).unwrap();
            host.advance(20.0);
        }
        assert_eq!(manager.len(), 2);

        filling.cancel();
        assert!(manager.animations().is_empty());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_events_are_collected() {
        let (host, mut manager) = setup();
        let first = manager.animate(InlineStyle::shared(), fade(), 50.0).unwrap();
        let second = manager.animate(InlineStyle::shared(), fade(), 500.0).unwrap();

        host.advance(100.0);
        second.cancel();

        let events = manager.drain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, PlaybackEventKind::Finish);
        assert_eq!(events[0].animation_id, first.animation_id());
        assert_eq!(events[0].current_time, Some(50.0));
        assert_eq!(events[1].kind, PlaybackEventKind::Cancel);
        assert_eq!(events[1].animation_id, second.animation_id());
        assert!(!manager.has_pending_events());
    }

    #[test]
    fn test_replaced_filling_animation_is_removed() {
        let (host, mut manager) = setup();
        let style = InlineStyle::shared();
        let filling = EffectTiming::new().duration_ms(50.0).fill(FillMode::Forwards);

        let old = manager.animate(style.clone(), fade(), filling.clone()).unwrap();
        host.advance(100.0);
        assert_eq!(old.play_state(), PlayState::Finished);
        assert_eq!(manager.len(), 1);

        let removed = Rc::new(RefCell::new(0));
        let counter = removed.clone();
        old.add_event_listener(PlaybackEventKind::Remove, move |_| *counter.borrow_mut() += 1);

        // Different property: nothing is replaced.
        let width = vec![Keyframe::new().set("width", "10px")];
        manager.animate(style.clone(), width, filling.clone()).unwrap();
        assert_eq!(*removed.borrow(), 0);

        manager.animate(style.clone(), fade(), filling).unwrap();
        assert_eq!(*removed.borrow(), 1);
        assert_eq!(manager.len(), 2);
        assert!(
            manager
                .drain_events()
                .iter()
                .any(|e| e.kind == PlaybackEventKind::Remove && e.animation_id == old.animation_id())
        );
    }

    #[test]
    fn test_notify_scroll_refreshes_bound_animations() {
        let (host, mut manager) = setup();
        let scroller = Rc::new(ScrollContainer::new("scroller", (100.0, 1100.0), (100.0, 100.0)));
        let timeline = manager.scroll_timeline(scroller.clone(), ScrollAxis::Block);
        let style = InlineStyle::shared();

        let animation = manager
            .animate(style.clone(), fade(), AnimateOptions::new(100.0).timeline(timeline.clone()))
            .unwrap();
        host.run_microtasks();
        assert_eq!(style.borrow().get("opacity"), Some("0"));

        scroller.scroll_to(ScrollAxis::Block, 800.0);
        assert_eq!(manager.notify_scroll(&ElementId::new("scroller")), 1);
        assert_eq!(animation.current_time(), Some(80.0));
        assert_eq!(style.borrow().get("opacity"), Some("1"));

        assert_eq!(manager.notify_scroll(&ElementId::new("elsewhere")), 0);
        assert!(manager.disconnect_timeline(timeline.id()));
        assert_eq!(manager.notify_scroll(&ElementId::new("scroller")), 0);
    }

    #[test]
    fn test_view_timeline_observes_source_and_subject() {
        let (_host, mut manager) = setup();
        let scroller: Rc<dyn ScrollSource> =
            Rc::new(ScrollContainer::new("port", (100.0, 1000.0), (100.0, 200.0)));
        let subject: Rc<dyn ViewSubject> =
            Rc::new(SubjectBox::new("card", (0.0, 400.0), (100.0, 100.0)));
        let timeline = manager.view_timeline(scroller, subject, ScrollAxis::Block);

        manager
            .animate(InlineStyle::shared(), fade(), AnimateOptions::new(100.0).timeline(timeline))
            .unwrap();
        assert_eq!(manager.notify_scroll(&ElementId::new("port")), 1);
        assert_eq!(manager.notify_scroll(&ElementId::new("card")), 1);
    }
}
