//! Well-known Zigbee identifiers used by the composition presets and the
//! command layer.
//!
//! Values follow the Zigbee Cluster Library and the Home Automation profile.

/// Home Automation application profile.
pub const PROFILE_HA: u16 = 0x0104;

/// Cluster ids (ZCL).
pub mod cluster {
    pub const BASIC: u16 = 0x0000;
    pub const POWER_CONFIG: u16 = 0x0001;
    pub const IDENTIFY: u16 = 0x0003;
    pub const GROUPS: u16 = 0x0004;
    pub const SCENES: u16 = 0x0005;
    pub const ON_OFF: u16 = 0x0006;
    pub const LEVEL_CONTROL: u16 = 0x0008;
    pub const OTA_UPGRADE: u16 = 0x0019;
    pub const DOOR_LOCK: u16 = 0x0101;
    pub const WINDOW_COVERING: u16 = 0x0102;
    pub const THERMOSTAT: u16 = 0x0201;
    pub const COLOR_CONTROL: u16 = 0x0300;
    pub const TEMPERATURE_MEASUREMENT: u16 = 0x0402;
    pub const PRESSURE_MEASUREMENT: u16 = 0x0403;
    pub const RELATIVE_HUMIDITY: u16 = 0x0405;
    pub const OCCUPANCY_SENSING: u16 = 0x0406;
    pub const IAS_ZONE: u16 = 0x0500;
    pub const METERING: u16 = 0x0702;
    pub const ELECTRICAL_MEASUREMENT: u16 = 0x0B04;

    /// First id of the manufacturer-specific range.
    pub const VENDOR_MIN: u16 = 0xFC00;
}

/// Home Automation device ids.
pub mod device {
    pub const ON_OFF_SWITCH: u16 = 0x0000;
    pub const MAINS_POWER_OUTLET: u16 = 0x0009;
    pub const DOOR_LOCK: u16 = 0x000A;
    pub const DOOR_LOCK_CONTROLLER: u16 = 0x000B;
    pub const SIMPLE_SENSOR: u16 = 0x000C;
    pub const ON_OFF_LIGHT: u16 = 0x0100;
    pub const DIMMABLE_LIGHT: u16 = 0x0101;
    pub const COLOR_DIMMABLE_LIGHT: u16 = 0x0102;
    pub const DIMMER_SWITCH: u16 = 0x0104;
    pub const WINDOW_COVERING: u16 = 0x0202;
    pub const THERMOSTAT: u16 = 0x0301;
    pub const TEMPERATURE_SENSOR: u16 = 0x0302;
    pub const IAS_ZONE: u16 = 0x0402;
}

/// Basic cluster attribute ids.
pub mod basic_attr {
    pub const ZCL_VERSION: u16 = 0x0000;
    pub const MANUFACTURER_NAME: u16 = 0x0004;
    pub const MODEL_IDENTIFIER: u16 = 0x0005;
    pub const DATE_CODE: u16 = 0x0006;
    pub const POWER_SOURCE: u16 = 0x0007;
    pub const SW_BUILD_ID: u16 = 0x4000;
}

/// IAS zone types.
pub mod zone_type {
    pub const MOTION_SENSOR: u16 = 0x000D;
    pub const CONTACT_SWITCH: u16 = 0x0015;
    pub const INVALID: u16 = 0xFFFF;
}

/// ZCL status codes.
pub mod status {
    pub const SUCCESS: u8 = 0x00;
    pub const FAILURE: u8 = 0x01;
    pub const UNSUPPORTED_ATTRIBUTE: u8 = 0x86;
    pub const INVALID_VALUE: u8 = 0x87;
    pub const READ_ONLY: u8 = 0x88;
}

/// Short address sentinels.
pub const SHORT_ADDR_COORDINATOR: u16 = 0x0000;
pub const SHORT_ADDR_BROADCAST: u16 = 0xFFFF;

/// Every 2.4 GHz channel (11..=26).
pub const ALL_CHANNELS_MASK: u32 = 0x07FF_F800;
