use crate::bridge::BridgeOptions;
use crate::device::{BasicIdentity, EndpointPreset};
use crate::error::Result;
use crate::network::Role;
use crate::zcl::ids::ALL_CHANNELS_MASK;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

pub fn load_dotenv_from(env_path: &Path) {
    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: called before the runtime and the stack thread exist
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            pairs.push((key, value));
        }
    }
    pairs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub device: DeviceConfig,
    pub tuning: BridgeTuning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub role: Role,
    /// Coordinator only: form a new network when factory new.
    pub form_network: bool,
    pub channel_mask: u32,
    pub pan_id: Option<u16>,
    pub extended_pan_id: Option<[u8; 8]>,
    /// Permit-join window opened after start, in seconds. 0 leaves it closed.
    pub permit_join_s: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub endpoint: u8,
    pub preset: EndpointPreset,
    pub manufacturer: String,
    pub model: String,
    pub date_code: Option<String>,
    pub sw_build_id: Option<String>,
    pub power_source: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeTuning {
    pub lock_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                role: Role::Coordinator,
                form_network: true,
                channel_mask: ALL_CHANNELS_MASK,
                pan_id: None,
                extended_pan_id: None,
                permit_join_s: 180,
            },
            device: DeviceConfig {
                endpoint: 1,
                preset: EndpointPreset::OnOffLight,
                manufacturer: "zigbee-bridge".to_string(),
                model: "loopback-light".to_string(),
                date_code: None,
                sw_build_id: Some(env!("CARGO_PKG_VERSION").to_string()),
                power_source: Some(1),
            },
            tuning: BridgeTuning {
                lock_timeout_ms: 5000,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from `lookup`, falling back to defaults for missing or
    /// unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(role) = lookup("ZB_ROLE")
            && let Some(r) = parse_logged("ZB_ROLE", &role, |s| s.parse::<Role>().ok())
        {
            config.network.role = r;
        }
        if let Some(form) = lookup("ZB_FORM_NETWORK")
            && let Some(f) = parse_logged("ZB_FORM_NETWORK", &form, parse_bool)
        {
            config.network.form_network = f;
        }
        if let Some(mask) = lookup("ZB_CHANNEL_MASK")
            && let Some(m) = parse_logged("ZB_CHANNEL_MASK", &mask, parse_u32)
        {
            config.network.channel_mask = m;
        }
        if let Some(pan) = lookup("ZB_PAN_ID")
            && let Some(p) = parse_logged("ZB_PAN_ID", &pan, |s| {
                parse_u32(s).and_then(|v| u16::try_from(v).ok())
            })
        {
            config.network.pan_id = Some(p);
        }
        if let Some(ext) = lookup("ZB_EXT_PAN_ID")
            && let Some(e) = parse_logged("ZB_EXT_PAN_ID", &ext, parse_ext_pan_id)
        {
            config.network.extended_pan_id = Some(e);
        }
        if let Some(join) = lookup("ZB_PERMIT_JOIN")
            && let Some(j) = parse_logged("ZB_PERMIT_JOIN", &join, |s| s.parse().ok())
        {
            config.network.permit_join_s = j;
        }

        // Device
        if let Some(ep) = lookup("ZB_ENDPOINT")
            && let Some(e) = parse_logged("ZB_ENDPOINT", &ep, |s| s.parse().ok())
        {
            config.device.endpoint = e;
        }
        if let Some(preset) = lookup("ZB_PRESET")
            && let Some(p) = parse_logged("ZB_PRESET", &preset, |s| s.parse().ok())
        {
            config.device.preset = p;
        }
        if let Some(manufacturer) = lookup("ZB_MANUFACTURER") {
            config.device.manufacturer = manufacturer;
        }
        if let Some(model) = lookup("ZB_MODEL") {
            config.device.model = model;
        }
        if let Some(date_code) = lookup("ZB_DATE_CODE") {
            config.device.date_code = Some(date_code);
        }
        if let Some(sw_build_id) = lookup("ZB_SW_BUILD_ID") {
            config.device.sw_build_id = Some(sw_build_id);
        }
        if let Some(power) = lookup("ZB_POWER_SOURCE")
            && let Some(p) = parse_logged("ZB_POWER_SOURCE", &power, |s| s.parse().ok())
        {
            config.device.power_source = Some(p);
        }

        if let Some(timeout) = lookup("ZB_LOCK_TIMEOUT_MS")
            && let Some(t) = parse_logged("ZB_LOCK_TIMEOUT_MS", &timeout, |s| s.parse().ok())
        {
            config.tuning.lock_timeout_ms = t;
        }

        config
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            lock_timeout: Duration::from_millis(self.tuning.lock_timeout_ms),
        }
    }

    /// Basic identity for the configured endpoint.
    pub fn identity(&self) -> Result<BasicIdentity> {
        BasicIdentity::parse(
            Some(&self.device.manufacturer),
            Some(&self.device.model),
            self.device.date_code.as_deref(),
            self.device.sw_build_id.as_deref(),
            self.device.power_source,
        )
    }
}

fn parse_logged<T>(key: &str, raw: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!("Ignoring invalid {key}={raw}");
    }
    parsed
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Decimal, or hex with a `0x` prefix.
fn parse_u32(s: &str) -> Option<u32> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// 16 hex digits, optionally `0x`-prefixed or `:`-separated.
pub fn parse_ext_pan_id(s: &str) -> Option<[u8; 8]> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let digits: String = s.chars().filter(|c| *c != ':').collect();
    if digits.len() != 16 {
        return None;
    }
    let mut out = [0u8; 8];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(digits.get(i * 2..i * 2 + 2)?, 16).ok()?;
    }
    Some(out)
}
