//! Bounded event queue and dispatch coalescer.
//!
//! Producers run on the stack thread and never block beyond the short
//! critical section guarding the ring. The consumer is the host's drain pass,
//! which is only ever requested once at a time through the registered
//! dispatch-request callback.
//!
//! # Usage
//!
//! ```ignore
//! let queue = EventQueue::new();
//! queue.set_dispatch_request(Some(Arc::new(move || scheduler.schedule())));
//!
//! // stack thread
//! queue.enqueue(Event::app_signal(0x05, 0));
//!
//! // host drain pass
//! while let Some(event) = queue.pop() { /* ... */ }
//! queue.dispatch_complete();
//! ```

use super::event::Event;
use heapless::Deque;
use log::{debug, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

pub const EVENT_QUEUE_CAPACITY: usize = 16;

/// "Please run the drain loop soon." Returns `false` when the host could not
/// accept the job.
pub type DispatchRequest = Arc<dyn Fn() -> bool + Send + Sync>;

/// Monotonic counters, never reset for the life of the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventStats {
    pub enqueued: u32,
    pub dropped_queue_full: u32,
    pub dropped_schedule_fail: u32,
    pub dispatched: u32,
    pub max_depth: u32,
    pub depth: u32,
}

struct Inner {
    events: Deque<Event, EVENT_QUEUE_CAPACITY>,
    stats: EventStats,
    dispatch_pending: bool,
    request: Option<DispatchRequest>,
}

pub struct EventQueue {
    inner: Mutex<Inner>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: Deque::new(),
                stats: EventStats::default(),
                dispatch_pending: false,
                request: None,
            }),
        }
    }

    /// Replace the dispatch-request callback and re-evaluate immediately, so
    /// events queued before a consumer existed get drained.
    pub fn set_dispatch_request(&self, request: Option<DispatchRequest>) {
        self.inner.lock().request = request;
        self.request_dispatch_if_needed();
    }

    /// Append `event`. When full the new event is dropped and counted.
    ///
    /// Returns whether the event was queued.
    pub fn enqueue(&self, event: Event) -> bool {
        let queued = {
            let mut inner = self.inner.lock();
            match inner.events.push_back(event) {
                Ok(()) => {
                    let depth = inner.events.len() as u32;
                    inner.stats.enqueued += 1;
                    inner.stats.depth = depth;
                    if depth > inner.stats.max_depth {
                        inner.stats.max_depth = depth;
                    }
                    true
                }
                Err(_) => {
                    inner.stats.dropped_queue_full += 1;
                    false
                }
            }
        };

        if queued {
            self.request_dispatch_if_needed();
        } else {
            debug!("[Queue] full, dropping newest event");
        }
        queued
    }

    /// Ask the host for a drain pass unless one is already outstanding.
    pub fn request_dispatch_if_needed(&self) {
        let request = {
            let mut inner = self.inner.lock();
            if inner.events.is_empty() || inner.dispatch_pending {
                return;
            }
            let Some(request) = inner.request.clone() else {
                return;
            };
            inner.dispatch_pending = true;
            request
        };

        // The host may schedule synchronously; never call it under the lock.
        if !request() {
            self.schedule_failed();
        }
    }

    pub fn pop(&self) -> Option<Event> {
        let mut inner = self.inner.lock();
        let event = inner.events.pop_front()?;
        inner.stats.depth = inner.events.len() as u32;
        inner.stats.dispatched += 1;
        Some(event)
    }

    /// Called by the host exactly once per drain pass.
    pub fn dispatch_complete(&self) {
        let request = {
            let mut inner = self.inner.lock();
            if inner.events.is_empty() {
                inner.dispatch_pending = false;
                return;
            }
            match inner.request.clone() {
                Some(request) => request,
                None => {
                    inner.dispatch_pending = false;
                    return;
                }
            }
        };

        if !request() {
            self.schedule_failed();
        }
    }

    fn schedule_failed(&self) {
        let mut inner = self.inner.lock();
        inner.dispatch_pending = false;
        inner.stats.dropped_schedule_fail += 1;
        warn!(
            "[Queue] dispatch request rejected by host ({} events waiting)",
            inner.events.len()
        );
    }

    pub fn stats(&self) -> EventStats {
        self.inner.lock().stats
    }

    pub fn is_dispatch_pending(&self) -> bool {
        self.inner.lock().dispatch_pending
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
