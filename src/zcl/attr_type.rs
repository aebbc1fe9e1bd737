//! ZCL attribute data type tags.

use serde::{Deserialize, Serialize};
use strum::{Display, FromRepr};

/// Data type tags the bridge understands.
///
/// Only the scalar types listed here can cross the event bridge or be used
/// as custom attribute storage. `CharString` exists so the basic cluster's
/// identity strings can be described; it is never decoded into an
/// [`AttrValue`](super::AttrValue).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, FromRepr, Display, Serialize, Deserialize)]
#[repr(u8)]
pub enum AttrType {
    Bool = 0x10,
    Bitmap8 = 0x18,
    Bitmap16 = 0x19,
    Bitmap32 = 0x1B,
    U8 = 0x20,
    U16 = 0x21,
    U32 = 0x23,
    S8 = 0x28,
    S16 = 0x29,
    S32 = 0x2B,
    Enum8 = 0x30,
    Enum16 = 0x31,
    CharString = 0x42,
    UtcTime = 0xE2,
    ClusterId = 0xE8,
    AttributeId = 0xE9,
    BacnetOid = 0xEA,
}

/// Storage width and signedness shared by a group of type tags.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Width {
    Bool,
    U8,
    U16,
    U32,
    S8,
    S16,
    S32,
}

impl AttrType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Scalar width of this tag, `None` for non-scalar types.
    pub fn width(self) -> Option<Width> {
        use AttrType::*;
        match self {
            Bool => Some(Width::Bool),
            U8 | Bitmap8 | Enum8 => Some(Width::U8),
            U16 | Bitmap16 | Enum16 | ClusterId | AttributeId => Some(Width::U16),
            U32 | Bitmap32 | UtcTime | BacnetOid => Some(Width::U32),
            S8 => Some(Width::S8),
            S16 => Some(Width::S16),
            S32 => Some(Width::S32),
            CharString => None,
        }
    }
}

impl Width {
    /// Number of bytes a value of this width occupies on the wire.
    pub fn size(self) -> usize {
        match self {
            Width::Bool | Width::U8 | Width::S8 => 1,
            Width::U16 | Width::S16 => 2,
            Width::U32 | Width::S32 => 4,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Width::S8 | Width::S16 | Width::S32)
    }

    /// Inclusive range a host-supplied `i32` must fall in for this width.
    pub fn i32_range(self) -> (i64, i64) {
        match self {
            Width::Bool => (i32::MIN as i64, i32::MAX as i64),
            Width::U8 => (0, u8::MAX as i64),
            Width::U16 => (0, u16::MAX as i64),
            Width::U32 => (0, i32::MAX as i64),
            Width::S8 => (i8::MIN as i64, i8::MAX as i64),
            Width::S16 => (i16::MIN as i64, i16::MAX as i64),
            Width::S32 => (i32::MIN as i64, i32::MAX as i64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_repr_known_tags() {
        assert_eq!(AttrType::from_repr(0x10), Some(AttrType::Bool));
        assert_eq!(AttrType::from_repr(0x29), Some(AttrType::S16));
        assert_eq!(AttrType::from_repr(0xE8), Some(AttrType::ClusterId));
        assert_eq!(AttrType::from_repr(0x38), None);
    }

    #[test]
    fn test_widths() {
        assert_eq!(AttrType::ClusterId.width(), Some(Width::U16));
        assert_eq!(AttrType::UtcTime.width(), Some(Width::U32));
        assert_eq!(AttrType::Bitmap8.width(), Some(Width::U8));
        assert_eq!(AttrType::CharString.width(), None);
        assert_eq!(Width::S16.size(), 2);
        assert!(Width::S8.is_signed());
        assert!(!Width::U32.is_signed());
    }

    #[test]
    fn test_u32_range_is_non_negative_i32() {
        assert_eq!(Width::U32.i32_range(), (0, i32::MAX as i64));
    }
}
