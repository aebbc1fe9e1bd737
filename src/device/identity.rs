//! Basic cluster identity (manufacturer, model, date code, build id, power source).

use crate::error::{BridgeError, Result};
use heapless::Vec as HVec;
use serde::{Serialize, Serializer};
use strum::{Display, FromRepr};

pub const MANUFACTURER_MAX: usize = 32;
pub const MODEL_MAX: usize = 32;
pub const DATE_CODE_MAX: usize = 16;
pub const SW_BUILD_ID_MAX: usize = 16;

/// Bounded ZCL character string, stored without its length prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PascalString<const N: usize>(HVec<u8, N>);

impl<const N: usize> PascalString<N> {
    pub fn new(value: &str) -> Result<Self> {
        Self::from_bytes(value.as_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        HVec::from_slice(bytes).map(Self).map_err(|_| {
            BridgeError::invalid_arg(format!("string of {} bytes exceeds {N}", bytes.len()))
        })
    }

    /// Parse a length-prefixed buffer as the stack stores it.
    pub fn from_pascal(buf: &[u8]) -> Result<Self> {
        let (&len, rest) = buf
            .split_first()
            .ok_or_else(|| BridgeError::invalid_arg("empty character string"))?;
        let body = rest
            .get(..len as usize)
            .ok_or_else(|| BridgeError::invalid_arg("truncated character string"))?;
        Self::from_bytes(body)
    }

    pub fn to_pascal(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() + 1);
        out.push(self.0.len() as u8);
        out.extend_from_slice(&self.0);
        out
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl<const N: usize> Serialize for PascalString<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string_lossy())
    }
}

/// Basic cluster power source enumeration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr, Display, Serialize)]
#[repr(u8)]
pub enum PowerSource {
    Unknown = 0x00,
    SinglePhaseMains = 0x01,
    ThreePhaseMains = 0x02,
    Battery = 0x03,
    DcSource = 0x04,
    EmergencyMainsConstant = 0x05,
    EmergencyMainsTransfer = 0x06,
}

impl PowerSource {
    pub fn from_u8(value: u8) -> Result<Self> {
        Self::from_repr(value)
            .ok_or_else(|| BridgeError::invalid_arg(format!("power source {value}")))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BasicIdentity {
    pub manufacturer: PascalString<MANUFACTURER_MAX>,
    pub model: PascalString<MODEL_MAX>,
    pub date_code: Option<PascalString<DATE_CODE_MAX>>,
    pub sw_build_id: Option<PascalString<SW_BUILD_ID_MAX>>,
    pub power_source: Option<PowerSource>,
}

impl BasicIdentity {
    /// Validate every field up front; nothing is stored on failure.
    pub fn parse(
        manufacturer: Option<&str>,
        model: Option<&str>,
        date_code: Option<&str>,
        sw_build_id: Option<&str>,
        power_source: Option<u8>,
    ) -> Result<Self> {
        let manufacturer =
            manufacturer.ok_or_else(|| BridgeError::invalid_arg("manufacturer is required"))?;
        let model = model.ok_or_else(|| BridgeError::invalid_arg("model is required"))?;
        Ok(Self {
            manufacturer: PascalString::new(manufacturer)?,
            model: PascalString::new(model)?,
            date_code: date_code.map(PascalString::new).transpose()?,
            sw_build_id: sw_build_id.map(PascalString::new).transpose()?,
            power_source: power_source.map(PowerSource::from_u8).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let id = BasicIdentity::parse(
            Some("Acme"),
            Some("Lamp-1"),
            Some("20260101"),
            Some("v1.2.3"),
            Some(1),
        )
        .unwrap();
        assert_eq!(id.manufacturer.as_bytes(), b"Acme");
        assert_eq!(id.power_source, Some(PowerSource::SinglePhaseMains));
    }

    #[test]
    fn test_manufacturer_one_over_max() {
        let long = "m".repeat(MANUFACTURER_MAX + 1);
        let err = BasicIdentity::parse(Some(&long), Some("x"), None, None, None).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(_)));
        let exact = "m".repeat(MANUFACTURER_MAX);
        assert!(BasicIdentity::parse(Some(&exact), Some("x"), None, None, None).is_ok());
    }

    #[test]
    fn test_required_fields() {
        assert!(BasicIdentity::parse(None, Some("x"), None, None, None).is_err());
        assert!(BasicIdentity::parse(Some("x"), None, None, None, None).is_err());
    }

    #[test]
    fn test_date_code_and_power_source_limits() {
        let long = "d".repeat(DATE_CODE_MAX + 1);
        assert!(BasicIdentity::parse(Some("a"), Some("b"), Some(&long), None, None).is_err());
        assert!(BasicIdentity::parse(Some("a"), Some("b"), None, None, Some(6)).is_ok());
        assert!(BasicIdentity::parse(Some("a"), Some("b"), None, None, Some(7)).is_err());
    }

    #[test]
    fn test_pascal_roundtrip() {
        let s = PascalString::<8>::new("abc").unwrap();
        let raw = s.to_pascal();
        assert_eq!(raw, vec![3, b'a', b'b', b'c']);
        assert_eq!(PascalString::<8>::from_pascal(&raw).unwrap(), s);
        assert!(PascalString::<8>::from_pascal(&[5, b'a']).is_err());
        assert!(PascalString::<2>::from_pascal(&raw).is_err());
    }
}
