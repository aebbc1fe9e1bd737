//! Zigbee Cluster Library identifiers and the attribute value codec.

pub mod attr_type;
pub mod ids;
pub mod value;

pub use attr_type::{AttrType, Width};
pub use value::{AttrValue, HostValue, RawScalar, ScalarSlot};
