//! Stack-to-host event bridge.
//!
//! Events produced on the stack thread are copied into a small bounded FIFO.
//! A coalescing dispatch request wakes the host at most once per need; the
//! host drains the queue and reports completion.

pub mod event;
pub mod queue;

pub use event::{AppSignalEvent, AttrSetEvent, AttrSource, Event};
pub use queue::{DispatchRequest, EVENT_QUEUE_CAPACITY, EventQueue, EventStats};
