//! Endpoint presets.
//!
//! Each preset fixes the Home Automation device id and produces the cluster
//! shell a stack would create for that device type, with the mandatory
//! attributes and their default values.

use super::cluster::{ClusterDef, access};
use crate::error::{BridgeError, Result};
use crate::zcl::AttrType;
use crate::zcl::ids::{PROFILE_HA, cluster, device, zone_type};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::EnumString;

const RO: u8 = access::READ_ONLY;
const RW: u8 = access::READ_WRITE;
const RP: u8 = access::READ_ONLY | access::REPORTING;
const RWP: u8 = access::READ_WRITE | access::REPORTING;

/// Device type preset for a pending endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum EndpointPreset {
    /// Caller-chosen device id and profile; clusters: Basic + Identify.
    Generic,
    /// Device ID: 0x0100. Clusters: Basic, Identify, Groups, Scenes, OnOff.
    OnOffLight,
    /// Device ID: 0x0000. Clusters: Basic, Identify, OnOff (client).
    OnOffSwitch,
    /// Device ID: 0x0104. On/off switch plus LevelControl (client).
    DimmableSwitch,
    /// Device ID: 0x0101. On/off light plus LevelControl.
    DimmableLight,
    /// Device ID: 0x0102. Dimmable light plus ColorControl.
    ColorLight,
    /// Device ID: 0x0302. Clusters: Basic, Identify, TemperatureMeasurement.
    TemperatureSensor,
    /// Device ID: 0x000C. Clusters: Basic, Identify, RelativeHumidity.
    HumiditySensor,
    /// Device ID: 0x000C. Clusters: Basic, Identify, PressureMeasurement.
    PressureSensor,
    /// Device ID: 0x000C. Temperature, humidity and pressure on one endpoint.
    ClimateSensor,
    /// Device ID: 0x0009. Clusters: Basic, Identify, Groups, Scenes, OnOff.
    PowerOutlet,
    /// Device ID: 0x0009. Power outlet plus ElectricalMeasurement.
    PowerOutletMetering,
    /// Device ID: 0x000A. Clusters: Basic, Identify, Groups, Scenes, DoorLock.
    DoorLock,
    /// Device ID: 0x000B. Clusters: Basic, Identify, DoorLock (client).
    DoorLockController,
    /// Device ID: 0x0301. Clusters: Basic, Identify, Thermostat.
    Thermostat,
    /// Device ID: 0x000C. Clusters: Basic, Identify, OccupancySensing.
    OccupancySensor,
    /// Device ID: 0x0202. Clusters: Basic, Identify, Groups, Scenes, WindowCovering.
    WindowCovering,
    /// Device ID: 0x0402. Clusters: Basic, Identify, IasZone with the given zone type.
    #[strum(disabled)]
    IasZone { zone_type: u16 },
    /// IAS zone, contact switch zone type (0x0015).
    ContactSensor,
    /// IAS zone, motion sensor zone type (0x000D).
    MotionSensor,
}

impl EndpointPreset {
    /// Home Automation device id. `None` for [`EndpointPreset::Generic`].
    pub const fn device_id(self) -> Option<u16> {
        use EndpointPreset::*;
        Some(match self {
            Generic => return None,
            OnOffLight => device::ON_OFF_LIGHT,
            OnOffSwitch => device::ON_OFF_SWITCH,
            DimmableSwitch => device::DIMMER_SWITCH,
            DimmableLight => device::DIMMABLE_LIGHT,
            ColorLight => device::COLOR_DIMMABLE_LIGHT,
            TemperatureSensor => device::TEMPERATURE_SENSOR,
            HumiditySensor | PressureSensor | ClimateSensor | OccupancySensor => {
                device::SIMPLE_SENSOR
            }
            PowerOutlet | PowerOutletMetering => device::MAINS_POWER_OUTLET,
            DoorLock => device::DOOR_LOCK,
            DoorLockController => device::DOOR_LOCK_CONTROLLER,
            Thermostat => device::THERMOSTAT,
            WindowCovering => device::WINDOW_COVERING,
            IasZone { .. } | ContactSensor | MotionSensor => device::IAS_ZONE,
        })
    }

    /// Config-file name of the preset.
    pub const fn name(self) -> &'static str {
        use EndpointPreset::*;
        match self {
            Generic => "generic",
            OnOffLight => "on_off_light",
            OnOffSwitch => "on_off_switch",
            DimmableSwitch => "dimmable_switch",
            DimmableLight => "dimmable_light",
            ColorLight => "color_light",
            TemperatureSensor => "temperature_sensor",
            HumiditySensor => "humidity_sensor",
            PressureSensor => "pressure_sensor",
            ClimateSensor => "climate_sensor",
            PowerOutlet => "power_outlet",
            PowerOutletMetering => "power_outlet_metering",
            DoorLock => "door_lock",
            DoorLockController => "door_lock_controller",
            Thermostat => "thermostat",
            OccupancySensor => "occupancy_sensor",
            WindowCovering => "window_covering",
            IasZone { .. } => "ias_zone",
            ContactSensor => "contact_sensor",
            MotionSensor => "motion_sensor",
        }
    }

    /// Collapse the IAS aliases into their zone-typed form.
    pub const fn canonical(self) -> Self {
        match self {
            EndpointPreset::ContactSensor => EndpointPreset::IasZone {
                zone_type: zone_type::CONTACT_SWITCH,
            },
            EndpointPreset::MotionSensor => EndpointPreset::IasZone {
                zone_type: zone_type::MOTION_SENSOR,
            },
            other => other,
        }
    }

    pub fn validate(self) -> Result<()> {
        if let EndpointPreset::IasZone { zone_type: zt } = self
            && zt == zone_type::INVALID
        {
            return Err(BridgeError::invalid_arg("IAS zone type 0xFFFF"));
        }
        Ok(())
    }

    /// Cluster shell for this preset.
    pub fn clusters(self) -> Vec<ClusterDef> {
        use EndpointPreset::*;
        let mut list = vec![basic(), identify()];
        match self {
            Generic => {}
            OnOffLight | PowerOutlet => {
                list.extend([groups(), scenes(), on_off()]);
            }
            OnOffSwitch => {
                list.push(ClusterDef::client(cluster::ON_OFF));
            }
            DimmableSwitch => {
                list.push(ClusterDef::client(cluster::ON_OFF));
                list.push(ClusterDef::client(cluster::LEVEL_CONTROL));
            }
            DimmableLight => {
                list.extend([groups(), scenes(), on_off(), level()]);
            }
            ColorLight => {
                list.extend([groups(), scenes(), on_off(), level(), color()]);
            }
            TemperatureSensor => list.push(temperature()),
            HumiditySensor => list.push(humidity()),
            PressureSensor => list.push(pressure()),
            ClimateSensor => list.extend([temperature(), humidity(), pressure()]),
            PowerOutletMetering => {
                list.extend([groups(), scenes(), on_off(), electrical_measurement()]);
            }
            DoorLock => list.extend([groups(), scenes(), door_lock()]),
            DoorLockController => list.push(ClusterDef::client(cluster::DOOR_LOCK)),
            Thermostat => list.push(thermostat()),
            OccupancySensor => list.push(occupancy()),
            WindowCovering => list.extend([groups(), scenes(), window_covering()]),
            IasZone { zone_type } => list.push(ias_zone(zone_type)),
            ContactSensor | MotionSensor => return self.canonical().clusters(),
        }
        list
    }
}

impl fmt::Display for EndpointPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointPreset::IasZone { zone_type } => write!(f, "ias_zone(0x{zone_type:04X})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Basic cluster: ZCL version 8, power source unknown.
pub fn basic() -> ClusterDef {
    use crate::zcl::ids::basic_attr::*;
    ClusterDef::server(cluster::BASIC)
        .attr(ZCL_VERSION, AttrType::U8, RO, 0x08)
        .attr(POWER_SOURCE, AttrType::Enum8, RO, 0x00)
}

pub fn identify() -> ClusterDef {
    ClusterDef::server(cluster::IDENTIFY).attr(0x0000, AttrType::U16, RW, 0)
}

fn groups() -> ClusterDef {
    ClusterDef::server(cluster::GROUPS).attr(0x0000, AttrType::Bitmap8, RO, 0)
}

fn scenes() -> ClusterDef {
    ClusterDef::server(cluster::SCENES)
        .attr(0x0000, AttrType::U8, RO, 0)
        .attr(0x0001, AttrType::U8, RO, 0)
        .attr(0x0002, AttrType::U16, RO, 0)
        .attr(0x0003, AttrType::Bool, RO, 0)
        .attr(0x0004, AttrType::Bitmap8, RO, 0)
}

fn on_off() -> ClusterDef {
    ClusterDef::server(cluster::ON_OFF).attr(0x0000, AttrType::Bool, RWP | access::SCENE, 0)
}

fn level() -> ClusterDef {
    ClusterDef::server(cluster::LEVEL_CONTROL).attr(0x0000, AttrType::U8, RWP, 0xFF)
}

fn color() -> ClusterDef {
    ClusterDef::server(cluster::COLOR_CONTROL)
        .attr(0x0003, AttrType::U16, RP, 0x616B)
        .attr(0x0004, AttrType::U16, RP, 0x607D)
        .attr(0x0007, AttrType::U16, RP, 0x00FA)
        .attr(0x0008, AttrType::Enum8, RO, 0x01)
}

fn temperature() -> ClusterDef {
    ClusterDef::server(cluster::TEMPERATURE_MEASUREMENT)
        .attr(0x0000, AttrType::S16, RP, 0)
        .attr(0x0001, AttrType::S16, RO, -4000)
        .attr(0x0002, AttrType::S16, RO, 12500)
}

fn humidity() -> ClusterDef {
    ClusterDef::server(cluster::RELATIVE_HUMIDITY)
        .attr(0x0000, AttrType::U16, RP, 0)
        .attr(0x0001, AttrType::U16, RO, 0)
        .attr(0x0002, AttrType::U16, RO, 10000)
}

fn pressure() -> ClusterDef {
    ClusterDef::server(cluster::PRESSURE_MEASUREMENT)
        .attr(0x0000, AttrType::S16, RP, 0)
        .attr(0x0001, AttrType::S16, RO, 300)
        .attr(0x0002, AttrType::S16, RO, 1100)
}

fn electrical_measurement() -> ClusterDef {
    ClusterDef::server(cluster::ELECTRICAL_MEASUREMENT)
        .attr(0x0000, AttrType::Bitmap32, RO, 0)
        .attr(0x0505, AttrType::U16, RP, 0)
        .attr(0x0508, AttrType::U16, RP, 0)
        .attr(0x050B, AttrType::S16, RP, 0)
}

fn door_lock() -> ClusterDef {
    ClusterDef::server(cluster::DOOR_LOCK)
        .attr(0x0000, AttrType::Enum8, RP, 0)
        .attr(0x0001, AttrType::Enum8, RO, 0)
        .attr(0x0002, AttrType::Bool, RO, 0)
}

fn thermostat() -> ClusterDef {
    ClusterDef::server(cluster::THERMOSTAT)
        .attr(0x0000, AttrType::S16, RP, 0)
        .attr(0x0011, AttrType::S16, RW, 2600)
        .attr(0x0012, AttrType::S16, RW, 2000)
        .attr(0x001B, AttrType::Enum8, RW, 0x04)
        .attr(0x001C, AttrType::Enum8, RW, 0x01)
}

fn occupancy() -> ClusterDef {
    ClusterDef::server(cluster::OCCUPANCY_SENSING)
        .attr(0x0000, AttrType::Bitmap8, RP, 0)
        .attr(0x0001, AttrType::Enum8, RO, 0)
}

fn window_covering() -> ClusterDef {
    ClusterDef::server(cluster::WINDOW_COVERING)
        .attr(0x0000, AttrType::Enum8, RO, 0)
        .attr(0x0003, AttrType::U16, RP, 0)
        .attr(0x0004, AttrType::U16, RP, 0)
        .attr(0x0007, AttrType::Bitmap8, RO, 0x03)
        .attr(0x0008, AttrType::U8, RP, 0)
        .attr(0x0009, AttrType::U8, RP, 0)
        .attr(0x0017, AttrType::Bitmap8, RW, 0)
}

fn ias_zone(zone_type: u16) -> ClusterDef {
    ClusterDef::server(cluster::IAS_ZONE)
        .attr(0x0000, AttrType::Enum8, RO, 0)
        .attr(0x0001, AttrType::Enum16, RO, zone_type as i32)
        .attr(0x0002, AttrType::Bitmap16, RP, 0)
        .attr(0x0011, AttrType::U8, RW, 0xFF)
}

/// HA profile for every preset except [`EndpointPreset::Generic`].
pub const PRESET_PROFILE: u16 = PROFILE_HA;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::cluster::ClusterRole;
    use std::str::FromStr;

    fn ids(preset: EndpointPreset) -> Vec<(u16, ClusterRole)> {
        preset.clusters().iter().map(|c| (c.id, c.role)).collect()
    }

    #[test]
    fn test_generic_shell() {
        assert_eq!(
            ids(EndpointPreset::Generic),
            vec![(cluster::BASIC, ClusterRole::Server), (cluster::IDENTIFY, ClusterRole::Server)]
        );
        assert_eq!(EndpointPreset::Generic.device_id(), None);
    }

    #[test]
    fn test_dimmable_light_clusters() {
        let list = ids(EndpointPreset::DimmableLight);
        assert_eq!(list.len(), 6);
        assert!(list.contains(&(cluster::LEVEL_CONTROL, ClusterRole::Server)));
        assert!(list.contains(&(cluster::SCENES, ClusterRole::Server)));
    }

    #[test]
    fn test_dimmable_switch_uses_client_roles() {
        let list = ids(EndpointPreset::DimmableSwitch);
        assert!(list.contains(&(cluster::ON_OFF, ClusterRole::Client)));
        assert!(list.contains(&(cluster::LEVEL_CONTROL, ClusterRole::Client)));
    }

    #[test]
    fn test_climate_sensor_has_three_measurements() {
        let list = ids(EndpointPreset::ClimateSensor);
        for id in [
            cluster::TEMPERATURE_MEASUREMENT,
            cluster::RELATIVE_HUMIDITY,
            cluster::PRESSURE_MEASUREMENT,
        ] {
            assert!(list.contains(&(id, ClusterRole::Server)));
        }
    }

    #[test]
    fn test_metering_outlet_adds_electrical_measurement() {
        let list = ids(EndpointPreset::PowerOutletMetering);
        assert!(list.contains(&(cluster::ELECTRICAL_MEASUREMENT, ClusterRole::Server)));
        assert!(!ids(EndpointPreset::PowerOutlet)
            .contains(&(cluster::ELECTRICAL_MEASUREMENT, ClusterRole::Server)));
    }

    #[test]
    fn test_ias_aliases() {
        let contact = EndpointPreset::ContactSensor.clusters();
        let zone = contact.iter().find(|c| c.id == cluster::IAS_ZONE).unwrap();
        let ty = zone.attribute(0x0001).unwrap();
        assert_eq!(
            ty.data,
            crate::device::cluster::AttrData::Scalar(crate::zcl::ScalarSlot::U16(0x0015))
        );
        assert_eq!(EndpointPreset::MotionSensor.device_id(), Some(device::IAS_ZONE));
    }

    #[test]
    fn test_invalid_zone_type_rejected() {
        assert!(EndpointPreset::IasZone { zone_type: 0xFFFF }.validate().is_err());
        assert!(EndpointPreset::IasZone { zone_type: 0x002D }.validate().is_ok());
    }

    #[test]
    fn test_parse_from_str() {
        assert_eq!(
            EndpointPreset::from_str("dimmable_light").unwrap(),
            EndpointPreset::DimmableLight
        );
        assert_eq!(
            EndpointPreset::from_str("Contact_Sensor").unwrap(),
            EndpointPreset::ContactSensor
        );
        assert!(EndpointPreset::from_str("ias_zone").is_err());
        assert_eq!(EndpointPreset::PowerOutletMetering.to_string(), "power_outlet_metering");
        assert_eq!(
            EndpointPreset::IasZone { zone_type: 0x0028 }.to_string(),
            "ias_zone(0x0028)"
        );
    }

    #[test]
    fn test_every_preset_has_basic_and_identify() {
        for preset in [
            EndpointPreset::OnOffLight,
            EndpointPreset::ColorLight,
            EndpointPreset::Thermostat,
            EndpointPreset::WindowCovering,
            EndpointPreset::DoorLockController,
            EndpointPreset::OccupancySensor,
        ] {
            let list = ids(preset);
            assert_eq!(list[0], (cluster::BASIC, ClusterRole::Server));
            assert_eq!(list[1], (cluster::IDENTIFY, ClusterRole::Server));
        }
    }
}
