//! Zigbee bridge library.
//!
//! This library sits between a Zigbee protocol stack running on its own thread
//! and a cooperative host scheduler: it composes the device's endpoints,
//! forwards stack events to host callbacks, and exposes ZDO discovery results
//! as snapshots.

pub mod bridge;
pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod events;
pub mod host;
pub mod network;
pub mod stack;
pub mod zcl;

pub use bridge::{BridgeOptions, ZigbeeBridge};
pub use error::{BridgeError, ErrorKind, Result};
pub use stack::{LoopbackStack, StackHandler, ZigbeeStack};
