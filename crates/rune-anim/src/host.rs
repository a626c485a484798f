//! Host environment seam: clock, frame scheduler and microtask queue.
//!
//! The engine never reads a wall clock or spins an event loop on its own. An
//! embedding provides a [`Host`]; [`ManualHost`] is the deterministic
//! implementation used by tests and headless drivers.
//!
//! Every host queue is released before a callback runs, so callbacks are free
//! to request frames or queue more microtasks.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;

use rune_config::{AnimationConfig, RuneConfig};

/// Callback run on an animation frame with the frame timestamp in ms.
pub type FrameCallback = Box<dyn FnOnce(f64)>;

/// Deferred continuation run after the current task completes.
pub type Microtask = Box<dyn FnOnce()>;

/// Handle for cancelling a frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Services the engine needs from its environment.
pub trait Host {
    /// Current host time in milliseconds.
    fn now(&self) -> f64;

    /// Run `callback` on the next frame.
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;

    /// Drop a frame request that has not run yet.
    fn cancel_frame(&self, handle: FrameHandle);

    fn queue_microtask(&self, task: Microtask);
}

/// Deterministic host driven by explicit `tick`/`advance` calls.
pub struct ManualHost {
    now: Cell<f64>,
    frame_interval: f64,
    max_frames_per_advance: u32,
    trace_frames: bool,
    next_handle: Cell<u64>,
    frames: RefCell<Vec<(FrameHandle, FrameCallback)>>,
    microtasks: RefCell<VecDeque<Microtask>>,
}

impl ManualHost {
    /// Create a host at time zero with the default configuration.
    pub fn new() -> Self {
        Self::from_config(&AnimationConfig::default())
    }

    /// Create a host at time zero using the configured frame interval.
    pub fn from_config(config: &AnimationConfig) -> Self {
        Self {
            now: Cell::new(0.0),
            frame_interval: config.effective_frame_interval(),
            max_frames_per_advance: config.max_frames_per_advance.max(1),
            trace_frames: false,
            next_handle: Cell::new(1),
            frames: RefCell::new(Vec::new()),
            microtasks: RefCell::new(VecDeque::new()),
        }
    }

    /// Create a host from the full configuration, honouring
    /// `diagnostics.trace_frames`.
    pub fn from_rune_config(config: &RuneConfig) -> Self {
        Self::from_config(&config.animation).with_frame_tracing(config.diagnostics.trace_frames)
    }

    /// Emit a trace event for every frame.
    pub fn with_frame_tracing(mut self, enabled: bool) -> Self {
        self.trace_frames = enabled;
        self
    }

    /// Start the clock at `now` instead of zero.
    pub fn starting_at(self, now: f64) -> Self {
        self.now.set(now);
        self
    }

    pub fn frame_interval(&self) -> f64 {
        self.frame_interval
    }

    pub fn traces_frames(&self) -> bool {
        self.trace_frames
    }

    /// Number of frame callbacks waiting for the next frame.
    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.borrow().len()
    }

    /// Run queued microtasks until the queue is empty, including any queued
    /// while draining.
    pub fn run_microtasks(&self) {
        loop {
            let task = self.microtasks.borrow_mut().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Advance the clock by `ms` and run one frame.
    pub fn tick(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
        self.run_frame();
    }

    /// Advance the clock by `ms`, running frames at the configured interval.
    ///
    /// The final frame lands exactly on the target time.
    pub fn advance(&self, ms: f64) {
        self.run_microtasks();
        if !(ms > 0.0) {
            return;
        }
        let target = self.now.get() + ms;
        let mut frames = 0;
        while self.now.get() < target {
            if frames >= self.max_frames_per_advance {
                tracing::warn!(
                    target_time = target,
                    frames,
                    "advance stopped at the frame limit"
                );
                break;
            }
            let next = self.now.get() + self.frame_interval;
            self.now.set(if next >= target { target } else { next });
            self.run_frame();
            frames += 1;
        }
    }

    /// Run `count` frames at the configured interval.
    pub fn advance_frames(&self, count: u32) {
        self.run_microtasks();
        for _ in 0..count {
            self.tick(self.frame_interval);
        }
    }

    fn run_frame(&self) {
        self.run_microtasks();
        let now = self.now.get();
        let callbacks = std::mem::take(&mut *self.frames.borrow_mut());
        if self.trace_frames {
            tracing::trace!(time = now, callbacks = callbacks.len(), "host frame");
        }
        for (_, callback) in callbacks {
            callback(now);
            self.run_microtasks();
        }
    }
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualHost")
            .field("now", &self.now.get())
            .field("frame_interval", &self.frame_interval)
            .field("trace_frames", &self.trace_frames)
            .field("pending_frames", &self.pending_frames())
            .field("pending_microtasks", &self.pending_microtasks())
            .finish()
    }
}

impl Host for ManualHost {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let handle = FrameHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        self.frames.borrow_mut().push((handle, callback));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.frames.borrow_mut().retain(|(h, _)| *h != handle);
    }

    fn queue_microtask(&self, task: Microtask) {
        self.microtasks.borrow_mut().push_back(task);
    }
}
