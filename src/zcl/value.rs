//! Attribute value codec.
//!
//! The stack hands attribute data over as a type tag plus the raw little-endian
//! bytes of the value. [`AttrValue`] normalises that into three views (bool,
//! signed, unsigned) derived from the same bits, so callers read whichever view
//! fits. [`ScalarSlot`] is the typed storage behind custom attributes.

use super::attr_type::{AttrType, Width};
use crate::error::{BridgeError, Result};
use heapless::Vec as HVec;
use serde::{Deserialize, Serialize};

/// Raw little-endian encoding of a scalar attribute (at most 4 bytes).
pub type RawScalar = HVec<u8, 4>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrValue {
    pub zcl_type: u8,
    pub bool_value: bool,
    pub int_value: i32,
    pub uint_value: u32,
}

/// The single view a host sees for a decoded value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HostValue {
    Bool(bool),
    Unsigned(u32),
    Signed(i32),
}

fn scalar_type(zcl_type: u8) -> Result<(AttrType, Width)> {
    let ty = AttrType::from_repr(zcl_type).ok_or_else(|| {
        BridgeError::NotSupported(format!("attribute type 0x{zcl_type:02X}"))
    })?;
    let width = ty
        .width()
        .ok_or_else(|| BridgeError::NotSupported(format!("attribute type {ty}")))?;
    Ok((ty, width))
}

impl AttrValue {
    /// Decode raw stack bytes for `zcl_type`.
    pub fn decode(zcl_type: u8, raw: &[u8]) -> Result<Self> {
        let (_, width) = scalar_type(zcl_type)?;
        if raw.len() < width.size() {
            return Err(BridgeError::invalid_arg(format!(
                "attribute data is {} bytes, type 0x{zcl_type:02X} needs {}",
                raw.len(),
                width.size()
            )));
        }

        let value = match width {
            Width::Bool => {
                let v = raw[0] != 0;
                Self {
                    zcl_type,
                    bool_value: v,
                    int_value: v as i32,
                    uint_value: v as u32,
                }
            }
            Width::U8 => Self::from_unsigned(zcl_type, raw[0] as u32),
            Width::U16 => Self::from_unsigned(zcl_type, u16::from_le_bytes([raw[0], raw[1]]) as u32),
            Width::U32 => Self::from_unsigned(
                zcl_type,
                u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            ),
            Width::S8 => {
                let v = raw[0] as i8;
                Self::from_signed(zcl_type, v as i32, v as u8 as u32)
            }
            Width::S16 => {
                let v = i16::from_le_bytes([raw[0], raw[1]]);
                Self::from_signed(zcl_type, v as i32, v as u16 as u32)
            }
            Width::S32 => {
                let v = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
                Self::from_signed(zcl_type, v, v as u32)
            }
        };
        Ok(value)
    }

    /// Encode back into the raw little-endian bytes of the declared width.
    pub fn encode(&self) -> Result<RawScalar> {
        let (_, width) = scalar_type(self.zcl_type)?;
        let mut out = RawScalar::new();
        // at most 4 bytes, always fits
        let _ = match width {
            Width::Bool => out.extend_from_slice(&[self.bool_value as u8]),
            Width::U8 => out.extend_from_slice(&[self.uint_value as u8]),
            Width::S8 => out.extend_from_slice(&[self.int_value as i8 as u8]),
            Width::U16 => out.extend_from_slice(&(self.uint_value as u16).to_le_bytes()),
            Width::S16 => out.extend_from_slice(&(self.int_value as i16).to_le_bytes()),
            Width::U32 => out.extend_from_slice(&self.uint_value.to_le_bytes()),
            Width::S32 => out.extend_from_slice(&self.int_value.to_le_bytes()),
        };
        Ok(out)
    }

    /// Build a value from a host integer, range-checked against the type.
    pub fn from_i32(ty: AttrType, value: i32) -> Result<Self> {
        ScalarSlot::from_declared(ty, value)?.attr_value(ty)
    }

    pub fn from_bool(value: bool) -> Self {
        Self {
            zcl_type: AttrType::Bool.tag(),
            bool_value: value,
            int_value: value as i32,
            uint_value: value as u32,
        }
    }

    /// Build a value of declared type `ty` from host input.
    ///
    /// Integers must fit the width; any integer is accepted for `Bool`.
    pub fn from_host(ty: AttrType, value: HostValue) -> Result<Self> {
        let width = ty
            .width()
            .ok_or_else(|| BridgeError::NotSupported(format!("attribute type {ty}")))?;
        let v: i64 = match value {
            HostValue::Bool(b) => b as i64,
            HostValue::Unsigned(u) => u as i64,
            HostValue::Signed(s) => s as i64,
        };
        let (min, max) = match width {
            Width::Bool => return Ok(Self::from_bool(v != 0).with_type(ty.tag())),
            Width::U32 => (0, u32::MAX as i64),
            other => other.i32_range(),
        };
        if v < min || v > max {
            return Err(BridgeError::invalid_arg(format!(
                "value {v} out of range for {ty}"
            )));
        }
        let bits = v as u32;
        let raw = bits.to_le_bytes();
        Self::decode(ty.tag(), &raw[..width.size()])
    }

    /// Re-tag this value for `zcl_type`, keeping all three views.
    pub fn with_type(self, zcl_type: u8) -> Self {
        Self { zcl_type, ..self }
    }

    fn from_unsigned(zcl_type: u8, v: u32) -> Self {
        Self {
            zcl_type,
            bool_value: v != 0,
            int_value: v as i32,
            uint_value: v,
        }
    }

    fn from_signed(zcl_type: u8, v: i32, bits: u32) -> Self {
        Self {
            zcl_type,
            bool_value: v != 0,
            int_value: v,
            uint_value: bits,
        }
    }

    pub fn attr_type(&self) -> Option<AttrType> {
        AttrType::from_repr(self.zcl_type)
    }

    /// Pick the view matching the declared type. `None` for unknown tags.
    pub fn to_host(&self) -> Option<HostValue> {
        let width = self.attr_type()?.width()?;
        Some(if width == Width::Bool {
            HostValue::Bool(self.bool_value)
        } else if width.is_signed() {
            HostValue::Signed(self.int_value)
        } else {
            HostValue::Unsigned(self.uint_value)
        })
    }
}

/// Untyped host input. The stack's declared type is applied on write.
impl From<HostValue> for AttrValue {
    fn from(value: HostValue) -> Self {
        match value {
            HostValue::Bool(v) => Self::from_bool(v).with_type(0),
            HostValue::Unsigned(v) => Self::from_unsigned(0, v),
            HostValue::Signed(v) => Self::from_signed(0, v, v as u32),
        }
    }
}

/// Typed storage slot for a custom attribute's current value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarSlot {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    S8(i8),
    S16(i16),
    S32(i32),
}

impl ScalarSlot {
    /// Store `value` under the declared type, rejecting values that do not fit.
    pub fn from_declared(ty: AttrType, value: i32) -> Result<Self> {
        let width = ty
            .width()
            .ok_or_else(|| BridgeError::NotSupported(format!("custom attribute type {ty}")))?;
        let (min, max) = width.i32_range();
        let v = value as i64;
        if v < min || v > max {
            return Err(BridgeError::invalid_arg(format!(
                "value {value} out of range for {ty}"
            )));
        }
        Ok(match width {
            Width::Bool => ScalarSlot::Bool(value != 0),
            Width::U8 => ScalarSlot::U8(value as u8),
            Width::U16 => ScalarSlot::U16(value as u16),
            Width::U32 => ScalarSlot::U32(value as u32),
            Width::S8 => ScalarSlot::S8(value as i8),
            Width::S16 => ScalarSlot::S16(value as i16),
            Width::S32 => ScalarSlot::S32(value),
        })
    }

    /// Slot holding the natural zero of `ty`.
    pub fn zero(ty: AttrType) -> Result<Self> {
        Self::from_declared(ty, 0)
    }

    pub fn to_bytes(&self) -> RawScalar {
        let mut out = RawScalar::new();
        let _ = match *self {
            ScalarSlot::Bool(v) => out.extend_from_slice(&[v as u8]),
            ScalarSlot::U8(v) => out.extend_from_slice(&[v]),
            ScalarSlot::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            ScalarSlot::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
            ScalarSlot::S8(v) => out.extend_from_slice(&[v as u8]),
            ScalarSlot::S16(v) => out.extend_from_slice(&v.to_le_bytes()),
            ScalarSlot::S32(v) => out.extend_from_slice(&v.to_le_bytes()),
        };
        out
    }

    pub fn attr_value(&self, ty: AttrType) -> Result<AttrValue> {
        AttrValue::decode(ty.tag(), &self.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(ty: AttrType, value: i32) {
        let v = AttrValue::from_i32(ty, value).unwrap();
        let raw = v.encode().unwrap();
        assert_eq!(AttrValue::decode(ty.tag(), &raw).unwrap(), v, "{ty} {value}");
    }

    #[test]
    fn test_roundtrip_boundaries() {
        for (ty, lo, hi) in [
            (AttrType::U8, 0, 255),
            (AttrType::Enum16, 0, 65535),
            (AttrType::ClusterId, 0, 65535),
            (AttrType::U32, 0, i32::MAX),
            (AttrType::S8, -128, 127),
            (AttrType::S16, -32768, 32767),
            (AttrType::S32, i32::MIN, i32::MAX),
        ] {
            roundtrip(ty, lo);
            roundtrip(ty, hi);
        }
        roundtrip(AttrType::Bool, 0);
        roundtrip(AttrType::Bool, 1);
    }

    #[test]
    fn test_u32_wire_maximum_roundtrip() {
        let raw = u32::MAX.to_le_bytes();
        let v = AttrValue::decode(AttrType::U32.tag(), &raw).unwrap();
        assert_eq!(v.uint_value, u32::MAX);
        assert_eq!(v.encode().unwrap().as_slice(), &raw[..]);
        assert_eq!(AttrValue::decode(AttrType::U32.tag(), &v.encode().unwrap()).unwrap(), v);
        assert_eq!(v.to_host(), Some(HostValue::Unsigned(u32::MAX)));
    }

    #[test]
    fn test_decode_signed_views() {
        let v = AttrValue::decode(AttrType::S8.tag(), &[0xFF]).unwrap();
        assert_eq!(v.int_value, -1);
        assert_eq!(v.uint_value, 0xFF);
        assert!(v.bool_value);

        let v = AttrValue::decode(AttrType::S16.tag(), &(-2i16).to_le_bytes()).unwrap();
        assert_eq!(v.int_value, -2);
        assert_eq!(v.uint_value, 0xFFFE);
    }

    #[test]
    fn test_decode_u32_high_bit() {
        let v = AttrValue::decode(AttrType::UtcTime.tag(), &0xFFFF_FFFEu32.to_le_bytes()).unwrap();
        assert_eq!(v.uint_value, 0xFFFF_FFFE);
        assert_eq!(v.int_value, -2);
    }

    #[test]
    fn test_decode_zero_is_false() {
        let v = AttrValue::decode(AttrType::U16.tag(), &[0, 0]).unwrap();
        assert!(!v.bool_value);
    }

    #[test]
    fn test_decode_unsupported_tag() {
        let err = AttrValue::decode(0x42, b"abc").unwrap_err();
        assert!(matches!(err, BridgeError::NotSupported(_)));
        let err = AttrValue::decode(0x38, &[0, 0]).unwrap_err();
        assert!(matches!(err, BridgeError::NotSupported(_)));
    }

    #[test]
    fn test_decode_short_buffer() {
        let err = AttrValue::decode(AttrType::U32.tag(), &[1, 2]).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(_)));
    }

    #[test]
    fn test_slot_range_checks() {
        assert!(ScalarSlot::from_declared(AttrType::U8, 256).is_err());
        assert!(ScalarSlot::from_declared(AttrType::U8, -1).is_err());
        assert!(ScalarSlot::from_declared(AttrType::S16, -32769).is_err());
        assert!(ScalarSlot::from_declared(AttrType::U32, -1).is_err());
        assert_eq!(
            ScalarSlot::from_declared(AttrType::Bool, 7).unwrap(),
            ScalarSlot::Bool(true)
        );
        assert!(matches!(
            ScalarSlot::from_declared(AttrType::CharString, 0),
            Err(BridgeError::NotSupported(_))
        ));
    }

    #[test]
    fn test_host_view() {
        let v = AttrValue::from_i32(AttrType::S8, -5).unwrap();
        assert_eq!(v.to_host(), Some(HostValue::Signed(-5)));
        let v = AttrValue::from_i32(AttrType::Bitmap8, 0x81).unwrap();
        assert_eq!(v.to_host(), Some(HostValue::Unsigned(0x81)));
        assert_eq!(AttrValue::from_bool(true).to_host(), Some(HostValue::Bool(true)));
    }

    #[test]
    fn test_host_input_retyped_on_write() {
        let v = AttrValue::from(HostValue::Signed(-1)).with_type(AttrType::U8.tag());
        assert_eq!(v.encode().unwrap().as_slice(), &[0xFF]);
        let v = AttrValue::from(HostValue::Unsigned(300)).with_type(AttrType::U16.tag());
        assert_eq!(v.encode().unwrap().as_slice(), &300u16.to_le_bytes());
        let v = AttrValue::from(HostValue::Bool(true)).with_type(AttrType::Bool.tag());
        assert_eq!(v.encode().unwrap().as_slice(), &[1]);
    }

    #[test]
    fn test_from_host_checks_width() {
        let v = AttrValue::from_host(AttrType::S8, HostValue::Signed(-1)).unwrap();
        assert_eq!(v.int_value, -1);
        assert_eq!(v.uint_value, 0xFF);
        let v = AttrValue::from_host(AttrType::U32, HostValue::Unsigned(u32::MAX)).unwrap();
        assert_eq!(v.uint_value, u32::MAX);
        assert!(AttrValue::from_host(AttrType::U8, HostValue::Unsigned(256)).is_err());
        assert!(AttrValue::from_host(AttrType::U16, HostValue::Signed(-1)).is_err());
        let v = AttrValue::from_host(AttrType::Bool, HostValue::Unsigned(7)).unwrap();
        assert!(v.bool_value);
        assert!(matches!(
            AttrValue::from_host(AttrType::CharString, HostValue::Bool(true)),
            Err(BridgeError::NotSupported(_))
        ));
    }
}
