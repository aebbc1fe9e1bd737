//! One host drain pass over the event queue.

use super::callbacks::{HostCallbacks, invoke_attr_callback};
use crate::events::{Event, EventQueue};
use log::{debug, error};
use serde::Serialize;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Events popped from the queue.
    pub popped: usize,
    /// Events handed to a registered callback.
    pub delivered: usize,
    /// Callback invocations that returned an error.
    pub callback_errors: usize,
}

impl DrainReport {
    pub fn merge(&mut self, other: DrainReport) {
        self.popped += other.popped;
        self.delivered += other.delivered;
        self.callback_errors += other.callback_errors;
    }
}

/// Pop every queued event, hand each to its callback slot, then report
/// completion to the queue exactly once.
///
/// The callback slots are read once at the start of the pass. Events whose
/// slot is empty are consumed without delivery.
pub fn drain_once(queue: &EventQueue, callbacks: &HostCallbacks) -> DrainReport {
    let signal_cb = callbacks.signal_callback();
    let attr_cb = callbacks.attribute_callback();
    let mut report = DrainReport::default();

    while let Some(event) = queue.pop() {
        report.popped += 1;
        let result = match (&event, &signal_cb, &attr_cb) {
            (Event::AppSignal(ev), Some(cb), _) => cb(ev.signal, ev.status),
            (Event::AttrSet(ev), _, Some(cb)) => invoke_attr_callback(cb, ev),
            _ => continue,
        };
        report.delivered += 1;
        if let Err(e) = result {
            report.callback_errors += 1;
            error!("[Host] callback failed for {event:?}: {e}");
        }
    }

    queue.dispatch_complete();
    if report.popped > 0 {
        debug!(
            "[Host] drain pass: {} popped, {} delivered",
            report.popped, report.delivered
        );
    }
    report
}
