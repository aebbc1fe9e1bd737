//! Network security settings held by the bridge between init and start.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NETWORK_KEY_LEN: usize = 16;

/// 128-bit network key. `Debug` never prints key material.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkKey(pub [u8; NETWORK_KEY_LEN]);

impl NetworkKey {
    pub fn as_bytes(&self) -> &[u8; NETWORK_KEY_LEN] {
        &self.0
    }

    /// Parse 32 hex digits, optionally separated by `:` or spaces.
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits: String = s
            .chars()
            .filter(|c| !matches!(c, ':' | ' ' | '-'))
            .collect();
        if digits.len() != NETWORK_KEY_LEN * 2 {
            return Err(BridgeError::invalid_arg(format!(
                "network key must be {} hex digits",
                NETWORK_KEY_LEN * 2
            )));
        }
        let mut key = [0u8; NETWORK_KEY_LEN];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| BridgeError::invalid_arg("network key is not hex"))?;
        }
        Ok(Self(key))
    }
}

impl fmt::Debug for NetworkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NetworkKey(..)")
    }
}

/// Install code sizes in bytes, each followed by a 2-byte CRC.
const INSTALL_CODE_LENGTHS: [usize; 4] = [6, 8, 12, 16];

/// Install code as the stack expects it (hex string with CRC).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallCode(String);

impl InstallCode {
    pub fn new(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.is_empty() {
            return Err(BridgeError::invalid_arg("install code is empty"));
        }
        if !code.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BridgeError::invalid_arg("install code is not hex"));
        }
        if !INSTALL_CODE_LENGTHS
            .iter()
            .any(|len| code.len() == (len + 2) * 2)
        {
            return Err(BridgeError::invalid_arg(format!(
                "install code of {} hex digits",
                code.len()
            )));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Security options remembered across init.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecurityConfig {
    pub install_code_policy: bool,
    pub network_security: bool,
    /// Key applied at init (or the last key set afterwards).
    pub network_key: Option<NetworkKey>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            install_code_policy: false,
            network_security: true,
            network_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_hex() {
        let key = NetworkKey::from_hex("00:11:22:33:44:55:66:77:88:99:AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(key.as_bytes()[0], 0x00);
        assert_eq!(key.as_bytes()[15], 0xFF);
        assert!(NetworkKey::from_hex("0011").is_err());
        assert!(NetworkKey::from_hex(&"zz".repeat(16)).is_err());
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = NetworkKey([0xAB; 16]);
        assert_eq!(format!("{key:?}"), "NetworkKey(..)");
    }

    #[test]
    fn test_install_code_validation() {
        assert!(InstallCode::new("").is_err());
        assert!(InstallCode::new("   ").is_err());
        assert!(InstallCode::new("83FED3407A93").is_err());
        assert!(InstallCode::new("83FED3407A939723A5C639B26916D505C3BZ").is_err());
        assert!(InstallCode::new("83FED3407A939723C3B5").is_ok());
        assert_eq!(InstallCode::new("83FED3407A939723A5C639B26916D505C3B5").unwrap().as_str().len(), 36);
    }

    #[test]
    fn test_defaults() {
        let cfg = SecurityConfig::default();
        assert!(cfg.network_security);
        assert!(!cfg.install_code_policy);
        assert!(cfg.network_key.is_none());
    }
}
