//! Scroll-driven timelines.
//!
//! [`ScrollTimeline`] maps a scroll container's offset to progress in percent.
//! [`ViewTimeline`] maps a subject's visibility within the scroll port to
//! progress in percent. Both are non-monotonic: scrolling back moves time
//! back.
//!
//! Scroll positions are pulled from a [`ScrollSource`] on every read. There is
//! no scroll listener; the host reports scrolls to the
//! [`AnimationManager`](crate::manager::AnimationManager), which uses a
//! [`TimelineRegistry`] to find the timelines observing the scrolled element.

use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::timeline::AnimationTimeline;
use crate::types::{ElementId, TimelineId};

/// Scroll axis a timeline tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollAxis {
    /// Block axis; vertical in horizontal writing modes.
    #[default]
    Block,
    /// Inline axis; horizontal in horizontal writing modes.
    Inline,
    X,
    Y,
}

impl ScrollAxis {
    /// Whether the axis is horizontal, assuming a horizontal writing mode.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::Inline | Self::X)
    }
}

/// Geometry of a scroll container.
pub trait ScrollSource {
    fn element_id(&self) -> ElementId;

    /// Current scroll position along `axis`.
    fn scroll_offset(&self, axis: ScrollAxis) -> f64;

    /// Total scrollable content size along `axis`.
    fn scroll_size(&self, axis: ScrollAxis) -> f64;

    /// Visible size of the scroll port along `axis`.
    fn client_size(&self, axis: ScrollAxis) -> f64;
}

/// Geometry of an element tracked by a view timeline.
pub trait ViewSubject {
    fn element_id(&self) -> ElementId;

    /// Start edge of the subject in the source's scroll content coordinates.
    fn offset(&self, axis: ScrollAxis) -> f64;

    fn size(&self, axis: ScrollAxis) -> f64;
}

/// In-memory scroll container.
#[derive(Debug)]
pub struct ScrollContainer {
    id: ElementId,
    offset: Cell<(f64, f64)>,
    scroll_size: (f64, f64),
    client_size: (f64, f64),
}

impl ScrollContainer {
    /// Container with content of `scroll_size` seen through a `client_size`
    /// port, both as `(width, height)`.
    pub fn new(id: impl Into<String>, scroll_size: (f64, f64), client_size: (f64, f64)) -> Self {
        Self {
            id: ElementId::new(id),
            offset: Cell::new((0.0, 0.0)),
            scroll_size,
            client_size,
        }
    }

    /// Scroll to `offset` along `axis`.
    pub fn scroll_to(&self, axis: ScrollAxis, offset: f64) {
        let (x, y) = self.offset.get();
        if axis.is_horizontal() {
            self.offset.set((offset, y));
        } else {
            self.offset.set((x, offset));
        }
    }
}

fn pick(pair: (f64, f64), axis: ScrollAxis) -> f64 {
    if axis.is_horizontal() { pair.0 } else { pair.1 }
}

impl ScrollSource for ScrollContainer {
    fn element_id(&self) -> ElementId {
        self.id.clone()
    }

    fn scroll_offset(&self, axis: ScrollAxis) -> f64 {
        pick(self.offset.get(), axis)
    }

    fn scroll_size(&self, axis: ScrollAxis) -> f64 {
        pick(self.scroll_size, axis)
    }

    fn client_size(&self, axis: ScrollAxis) -> f64 {
        pick(self.client_size, axis)
    }
}

/// In-memory view subject.
#[derive(Debug, Clone)]
pub struct SubjectBox {
    id: ElementId,
    offset: (f64, f64),
    size: (f64, f64),
}

impl SubjectBox {
    pub fn new(id: impl Into<String>, offset: (f64, f64), size: (f64, f64)) -> Self {
        Self {
            id: ElementId::new(id),
            offset,
            size,
        }
    }
}

impl ViewSubject for SubjectBox {
    fn element_id(&self) -> ElementId {
        self.id.clone()
    }

    fn offset(&self, axis: ScrollAxis) -> f64 {
        pick(self.offset, axis)
    }

    fn size(&self, axis: ScrollAxis) -> f64 {
        pick(self.size, axis)
    }
}

fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// Timeline driven by the scroll position of a container.
pub struct ScrollTimeline {
    id: TimelineId,
    source: Rc<dyn ScrollSource>,
    axis: ScrollAxis,
}

impl ScrollTimeline {
    pub fn new(source: Rc<dyn ScrollSource>, axis: ScrollAxis) -> Self {
        Self {
            id: TimelineId::new(),
            source,
            axis,
        }
    }

    pub fn axis(&self) -> ScrollAxis {
        self.axis
    }

    /// Element whose scrolling drives this timeline.
    pub fn source_element(&self) -> ElementId {
        self.source.element_id()
    }
}

impl AnimationTimeline for ScrollTimeline {
    fn id(&self) -> TimelineId {
        self.id
    }

    fn current_time(&self) -> Option<f64> {
        let range = self.source.scroll_size(self.axis) - self.source.client_size(self.axis);
        if !(range > 0.0) {
            return None;
        }
        let offset = self.source.scroll_offset(self.axis);
        Some(clamp_percent(offset / range * 100.0))
    }

    fn is_monotonic(&self) -> bool {
        false
    }
}

impl fmt::Debug for ScrollTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollTimeline")
            .field("id", &self.id)
            .field("source", &self.source.element_id())
            .field("axis", &self.axis)
            .finish()
    }
}

/// Timeline driven by a subject crossing its scroll port.
///
/// Progress is 0 when the subject's start edge meets the port's end edge and
/// 100 when its end edge leaves the port's start edge.
pub struct ViewTimeline {
    id: TimelineId,
    source: Rc<dyn ScrollSource>,
    subject: Rc<dyn ViewSubject>,
    axis: ScrollAxis,
}

impl ViewTimeline {
    pub fn new(source: Rc<dyn ScrollSource>, subject: Rc<dyn ViewSubject>, axis: ScrollAxis) -> Self {
        Self {
            id: TimelineId::new(),
            source,
            subject,
            axis,
        }
    }

    pub fn axis(&self) -> ScrollAxis {
        self.axis
    }

    pub fn source_element(&self) -> ElementId {
        self.source.element_id()
    }

    pub fn subject_element(&self) -> ElementId {
        self.subject.element_id()
    }
}

impl AnimationTimeline for ViewTimeline {
    fn id(&self) -> TimelineId {
        self.id
    }

    fn current_time(&self) -> Option<f64> {
        let port_size = self.source.client_size(self.axis);
        let subject_size = self.subject.size(self.axis);
        let travel = port_size + subject_size;
        if !(travel > 0.0) {
            return None;
        }
        let port_end = self.source.scroll_offset(self.axis) + port_size;
        let subject_start = self.subject.offset(self.axis);
        Some(clamp_percent((port_end - subject_start) / travel * 100.0))
    }

    fn is_monotonic(&self) -> bool {
        false
    }
}

impl fmt::Debug for ViewTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewTimeline")
            .field("id", &self.id)
            .field("source", &self.source.element_id())
            .field("subject", &self.subject.element_id())
            .field("axis", &self.axis)
            .finish()
    }
}

/// Explicit mapping from scrolled elements to the timelines observing them.
///
/// Entries live until [`TimelineRegistry::disconnect`] is called; a timeline
/// that is dropped without disconnecting stays registered.
#[derive(Debug, Default)]
pub struct TimelineRegistry {
    observers: HashMap<ElementId, BTreeSet<TimelineId>>,
}

impl TimelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `timeline` as observing `element`.
    pub fn observe(&mut self, element: ElementId, timeline: TimelineId) {
        self.observers.entry(element).or_default().insert(timeline);
    }

    /// Remove `timeline` from every element it observes.
    ///
    /// Returns whether anything was removed.
    pub fn disconnect(&mut self, timeline: TimelineId) -> bool {
        let mut removed = false;
        self.observers.retain(|_, set| {
            removed |= set.remove(&timeline);
            !set.is_empty()
        });
        removed
    }

    /// Timelines observing `element`, in id order.
    pub fn observers_of(&self, element: &ElementId) -> Vec<TimelineId> {
        self.observers
            .get(element)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of observed elements.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> Rc<ScrollContainer> {
        Rc::new(ScrollContainer::new("scroller", (300.0, 1000.0), (300.0, 200.0)))
    }

    #[test]
    fn test_scroll_timeline_progress() {
        let source = container();
        let timeline = ScrollTimeline::new(source.clone(), ScrollAxis::Block);
        assert!(!timeline.is_monotonic());
        assert_eq!(timeline.current_time(), Some(0.0));

        source.scroll_to(ScrollAxis::Y, 400.0);
        assert_eq!(timeline.current_time(), Some(50.0));

        // Scrolling back moves time back.
        source.scroll_to(ScrollAxis::Block, 200.0);
        assert_eq!(timeline.current_time(), Some(25.0));

        source.scroll_to(ScrollAxis::Block, 5000.0);
        assert_eq!(timeline.current_time(), Some(100.0));
    }

    #[test]
    fn test_scroll_timeline_inactive_without_overflow() {
        let source = container();
        let timeline = ScrollTimeline::new(source, ScrollAxis::Inline);
        assert_eq!(timeline.current_time(), None);
        assert!(!timeline.is_active());
    }

    #[test]
    fn test_view_timeline_progress() {
        let source = container();
        let subject = Rc::new(SubjectBox::new("card", (0.0, 500.0), (300.0, 100.0)));
        let timeline = ViewTimeline::new(source.clone(), subject, ScrollAxis::Block);

        // Port end (200) has not reached the subject (500).
        assert_eq!(timeline.current_time(), Some(0.0));

        // Port end 500 + 150 = 650: 150 / 300 of the way through.
        source.scroll_to(ScrollAxis::Block, 450.0);
        assert_eq!(timeline.current_time(), Some(50.0));

        source.scroll_to(ScrollAxis::Block, 800.0);
        assert_eq!(timeline.current_time(), Some(100.0));
        assert_eq!(timeline.subject_element(), ElementId::new("card"));
    }

    #[test]
    fn test_view_timeline_inactive_for_empty_geometry() {
        let source = Rc::new(ScrollContainer::new("empty", (0.0, 0.0), (0.0, 0.0)));
        let subject = Rc::new(SubjectBox::new("dot", (0.0, 0.0), (0.0, 0.0)));
        let timeline = ViewTimeline::new(source, subject, ScrollAxis::Block);
        assert_eq!(timeline.current_time(), None);
    }

    #[test]
    fn test_registry_observe_and_disconnect() {
        let mut registry = TimelineRegistry::new();
        let scroller = ElementId::new("scroller");
        let a = TimelineId::new();
        let b = TimelineId::new();

        registry.observe(scroller.clone(), a);
        registry.observe(scroller.clone(), b);
        registry.observe(scroller.clone(), a);
        assert_eq!(registry.observers_of(&scroller), vec![a, b]);

        assert!(registry.disconnect(a));
        assert_eq!(registry.observers_of(&scroller), vec![b]);
        assert!(!registry.disconnect(a));

        registry.disconnect(b);
        assert!(registry.is_empty());
        assert!(registry.observers_of(&scroller).is_empty());
    }
}
