//! Event records carried from the stack thread to the host.

use crate::zcl::AttrValue;
use serde::Serialize;

/// Top-level stack signal (commissioning, joins, leaves, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppSignalEvent {
    pub signal: u16,
    pub status: i32,
}

/// Remote node an attribute report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttrSource {
    pub short_addr: u16,
    pub endpoint: u8,
}

/// A local attribute write or a remote attribute report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttrSetEvent {
    /// Present only for reports received with a short source address.
    pub source: Option<AttrSource>,
    pub endpoint: u8,
    pub cluster_id: u16,
    pub attr_id: u16,
    pub status: i32,
    pub value: AttrValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    AppSignal(AppSignalEvent),
    AttrSet(AttrSetEvent),
}

impl Event {
    pub fn app_signal(signal: u16, status: i32) -> Self {
        Event::AppSignal(AppSignalEvent { signal, status })
    }
}
