//! Frame scheduling for path playback.
//!
//! Playback advances once per host frame. The host hands out a
//! [`FrameToken`] when asked for a frame and later calls
//! [`MovePathEngine::on_frame`](super::MovePathEngine::on_frame) with it.
//! Tokens are never reused, so a frame that arrives after it was cancelled
//! is recognised as stale and ignored.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Handle for one requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(u64);

impl FrameToken {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// The host's "call me next frame" primitive plus its clock.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameToken;
    fn cancel_frame(&mut self, token: FrameToken);
    /// Monotonic time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

// ── Manual ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ManualInner {
    now: Duration,
    next_token: u64,
    pending: Vec<FrameToken>,
}

/// Hand-driven clock and frame queue for tests and headless hosts.
///
/// Clones share state: give one clone to the engine and drive the other.
///
/// ```ignore
/// let frames = ManualScheduler::new();
/// let mut engine = MovePathEngine::new(frames.clone(), bus, &config);
/// frames.advance(Duration::from_millis(16));
/// for token in frames.take_due() {
///     engine.on_frame(token, &mut orbat)?;
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    inner: Rc<RefCell<ManualInner>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, dt: Duration) {
        self.inner.borrow_mut().now += dt;
    }

    /// Drain every requested frame. All pending frames are due on the next
    /// host tick.
    pub fn take_due(&self) -> Vec<FrameToken> {
        std::mem::take(&mut self.inner.borrow_mut().pending)
    }

    /// Number of requested, not yet delivered or cancelled frames.
    pub fn pending(&self) -> usize {
        self.inner.borrow().pending.len()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameToken {
        let mut inner = self.inner.borrow_mut();
        inner.next_token += 1;
        let token = FrameToken(inner.next_token);
        inner.pending.push(token);
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        self.inner.borrow_mut().pending.retain(|t| *t != token);
    }

    fn now(&self) -> Duration {
        self.inner.borrow().now
    }
}

// ── Realtime ────────────────────────────────────────────────────────────

/// Wall-clock scheduler for a host loop that polls once per frame.
///
/// Holds a single pending slot: requesting a frame replaces any frame not
/// yet polled.
#[derive(Debug)]
pub struct RealtimeScheduler {
    startup: Instant,
    next_token: u64,
    pending: Option<FrameToken>,
}

impl RealtimeScheduler {
    pub fn new() -> Self {
        Self {
            startup: Instant::now(),
            next_token: 0,
            pending: None,
        }
    }

    /// Take the frame due this tick, if any.
    pub fn poll(&mut self) -> Option<FrameToken> {
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Default for RealtimeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler for RealtimeScheduler {
    fn request_frame(&mut self) -> FrameToken {
        self.next_token += 1;
        let token = FrameToken(self.next_token);
        self.pending = Some(token);
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        if self.pending == Some(token) {
            self.pending = None;
        }
    }

    fn now(&self) -> Duration {
        self.startup.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_tokens_are_unique() {
        let mut frames = ManualScheduler::new();
        let a = frames.request_frame();
        let b = frames.request_frame();
        assert_ne!(a, b);
        assert_eq!(frames.pending(), 2);
    }

    #[test]
    fn manual_cancel_and_drain() {
        let mut frames = ManualScheduler::new();
        let a = frames.request_frame();
        let b = frames.request_frame();
        frames.cancel_frame(a);
        assert_eq!(frames.take_due(), vec![b]);
        assert_eq!(frames.pending(), 0);
        assert!(frames.take_due().is_empty());
    }

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let frames = ManualScheduler::new();
        let mut handle = frames.clone();
        frames.advance(Duration::from_millis(250));
        assert_eq!(handle.now(), Duration::from_millis(250));
        handle.request_frame();
        assert_eq!(frames.pending(), 1);
    }

    #[test]
    fn realtime_single_slot() {
        let mut frames = RealtimeScheduler::new();
        let a = frames.request_frame();
        let b = frames.request_frame();
        frames.cancel_frame(a);
        assert!(frames.has_pending());
        assert_eq!(frames.poll(), Some(b));
        assert_eq!(frames.poll(), None);
        assert!(frames.now() >= Duration::ZERO);
    }
}
