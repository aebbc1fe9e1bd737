//! Outgoing ZCL/ZDO request descriptions handed to the stack.

use crate::discovery::IeeeAddr;
use crate::error::{BridgeError, Result};
use crate::zcl::RawScalar;
use serde::Serialize;
use strum::{Display, FromRepr};

/// Unicast destination with source and destination endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CommandTarget {
    pub src_endpoint: u8,
    pub dst_short_addr: u16,
    pub dst_endpoint: u8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr, Display, Serialize)]
#[repr(u8)]
pub enum OnOffCommand {
    Off = 0,
    On = 1,
    Toggle = 2,
}

impl OnOffCommand {
    pub fn from_u8(cmd: u8) -> Result<Self> {
        Self::from_repr(cmd).ok_or_else(|| BridgeError::invalid_arg(format!("on/off command {cmd}")))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr, Display, Serialize)]
#[repr(u8)]
pub enum Direction {
    ToServer = 0,
    ToClient = 1,
}

impl Direction {
    pub fn from_u8(direction: u8) -> Result<Self> {
        Self::from_repr(direction)
            .ok_or_else(|| BridgeError::invalid_arg(format!("command direction {direction}")))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CustomCommand {
    pub profile_id: u16,
    pub cluster_id: u16,
    pub command_id: u16,
    pub direction: Direction,
    pub disable_default_response: bool,
    /// Manufacturer code, when the frame is manufacturer specific.
    pub manufacturer_code: Option<u16>,
    pub data_type: u8,
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZclCommand {
    OnOff(OnOffCommand),
    MoveToLevel {
        level: u8,
        transition_ds: u16,
        with_on_off: bool,
    },
    MoveToColor {
        x: u16,
        y: u16,
        transition_ds: u16,
    },
    MoveToColorTemperature {
        mireds: u16,
        transition_ds: u16,
    },
    DoorLock {
        lock: bool,
    },
    AddGroup {
        group_id: u16,
    },
    RemoveGroup {
        group_id: u16,
    },
    RemoveAllGroups,
    AddScene {
        group_id: u16,
        scene_id: u8,
        transition_ds: u16,
    },
    RemoveScene {
        group_id: u16,
        scene_id: u8,
    },
    RemoveAllScenes {
        group_id: u16,
    },
    RecallScene {
        group_id: u16,
        scene_id: u8,
    },
    Custom(CustomCommand),
}

/// Configure-reporting record for one attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportingConfig {
    pub target: CommandTarget,
    pub cluster_id: u16,
    pub attr_id: u16,
    pub attr_type: u8,
    pub min_interval_s: u16,
    pub max_interval_s: u16,
    /// Encoded threshold in the attribute's width; absent for discrete types.
    pub reportable_change: Option<RawScalar>,
}

/// ZDO bind/unbind request. The destination is always a 64-bit address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BindRequest {
    pub src_ieee_addr: IeeeAddr,
    pub src_endpoint: u8,
    pub cluster_id: u16,
    pub dst_ieee_addr: IeeeAddr,
    pub dst_endpoint: u8,
    /// Node the request is sent to.
    pub req_dst_short_addr: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_off_from_u8() {
        assert_eq!(OnOffCommand::from_u8(2).unwrap(), OnOffCommand::Toggle);
        assert!(matches!(
            OnOffCommand::from_u8(3),
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_direction_from_u8() {
        assert_eq!(Direction::from_u8(0).unwrap(), Direction::ToServer);
        assert_eq!(Direction::from_u8(1).unwrap(), Direction::ToClient);
        assert!(Direction::from_u8(2).is_err());
    }
}
