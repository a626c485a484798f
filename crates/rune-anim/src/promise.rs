//! Single-resolution handles for `ready` and `finished`.
//!
//! An [`AnimationPromise`] settles at most once, either fulfilled or rejected
//! with an [`AnimationError`]. It is a [`Future`], so async consumers can await
//! it, and it can also be inspected synchronously. Clones share state.
//!
//! Animations keep their current handle in a [`PromiseSlot`]; renewing the
//! slot swaps a settled handle for a fresh pending one while consumers that
//! hold the old handle keep observing its outcome.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::AnimationError;

/// Settlement state of a promise.
#[derive(Debug, Clone, PartialEq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected(AnimationError),
}

struct Shared {
    state: PromiseState,
    wakers: Vec<Waker>,
}

/// Shared single-resolution future.
#[derive(Clone)]
pub struct AnimationPromise {
    shared: Rc<RefCell<Shared>>,
}

impl AnimationPromise {
    /// Create a pending promise.
    pub fn new() -> Self {
        Self::with_state(PromiseState::Pending)
    }

    /// Create an already fulfilled promise.
    pub fn resolved() -> Self {
        Self::with_state(PromiseState::Fulfilled)
    }

    fn with_state(state: PromiseState) -> Self {
        Self {
            shared: Rc::new(RefCell::new(Shared {
                state,
                wakers: Vec::new(),
            })),
        }
    }

    pub fn state(&self) -> PromiseState {
        self.shared.borrow().state.clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.shared.borrow().state, PromiseState::Pending)
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self.shared.borrow().state, PromiseState::Fulfilled)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.shared.borrow().state, PromiseState::Rejected(_))
    }

    /// The outcome, or `None` while pending.
    pub fn result(&self) -> Option<Result<(), AnimationError>> {
        match &self.shared.borrow().state {
            PromiseState::Pending => None,
            PromiseState::Fulfilled => Some(Ok(())),
            PromiseState::Rejected(err) => Some(Err(err.clone())),
        }
    }

    /// Whether both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Fulfill the promise. Returns false if it had already settled.
    pub(crate) fn resolve(&self) -> bool {
        self.settle(PromiseState::Fulfilled)
    }

    /// Reject the promise. Returns false if it had already settled.
    pub(crate) fn reject(&self, error: AnimationError) -> bool {
        self.settle(PromiseState::Rejected(error))
    }

    fn settle(&self, state: PromiseState) -> bool {
        let wakers = {
            let mut shared = self.shared.borrow_mut();
            if !matches!(shared.state, PromiseState::Pending) {
                return false;
            }
            shared.state = state;
            std::mem::take(&mut shared.wakers)
        };
        for waker in wakers {
            waker.wake();
        }
        true
    }
}

impl Default for AnimationPromise {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AnimationPromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnimationPromise").field(&self.state()).finish()
    }
}

impl Future for AnimationPromise {
    type Output = Result<(), AnimationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.borrow_mut();
        match &shared.state {
            PromiseState::Fulfilled => Poll::Ready(Ok(())),
            PromiseState::Rejected(err) => Poll::Ready(Err(err.clone())),
            PromiseState::Pending => {
                if !shared.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    shared.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

/// Holder of an animation's current `ready` or `finished` handle.
#[derive(Debug, Clone, Default)]
pub struct PromiseSlot {
    current: AnimationPromise,
}

impl PromiseSlot {
    /// Slot holding a pending promise.
    pub fn pending() -> Self {
        Self {
            current: AnimationPromise::new(),
        }
    }

    /// Slot holding a fulfilled promise.
    pub fn fulfilled() -> Self {
        Self {
            current: AnimationPromise::resolved(),
        }
    }

    /// Handle to the current promise.
    pub fn current(&self) -> AnimationPromise {
        self.current.clone()
    }

    /// Replace a settled promise with a fresh pending one.
    ///
    /// No-op while the current promise is pending. Returns whether a new
    /// promise was installed.
    pub fn renew(&mut self) -> bool {
        if self.current.is_pending() {
            return false;
        }
        self.current = AnimationPromise::new();
        true
    }

    /// Replace the current promise with a fulfilled one.
    pub fn replace_resolved(&mut self) {
        self.current = AnimationPromise::resolved();
    }

    /// Replace the current promise with a pending one, even if unsettled.
    pub fn replace_pending(&mut self) {
        self.current = AnimationPromise::new();
    }
}
