//! Top-level stack signal ids and the parameters the bridge looks at.

use serde::Serialize;
use strum::{Display, FromRepr};

/// Status value the stack reports for a successful signal.
pub const SIGNAL_STATUS_OK: i32 = 0;

/// Device-update status meaning the device left the network.
pub const DEVICE_UPDATE_LEFT: u8 = 0x02;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, FromRepr, Display, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum Signal {
    DefaultStart = 0x00,
    SkipStartup = 0x01,
    DeviceAnnce = 0x02,
    Leave = 0x03,
    Error = 0x04,
    DeviceFirstStart = 0x05,
    DeviceReboot = 0x06,
    TouchlinkNwkStarted = 0x07,
    TouchlinkNwkJoinedRouter = 0x08,
    Touchlink = 0x09,
    Steering = 0x0A,
    Formation = 0x0B,
    FindingAndBindingTargetFinished = 0x0C,
    FindingAndBindingInitiatorFinished = 0x0D,
    TouchlinkTarget = 0x0E,
    TouchlinkNwk = 0x0F,
    TouchlinkTargetFinished = 0x10,
    DeviceAssociated = 0x12,
    LeaveIndication = 0x13,
    GppCommissioning = 0x15,
    CanSleep = 0x16,
    ProductionConfigReady = 0x17,
    NoActiveLinksLeft = 0x18,
    DeviceAuthorized = 0x2F,
    DeviceUpdate = 0x30,
    PanidConflictDetected = 0x31,
    NwkStatusIndication = 0x32,
    TcRejoinDone = 0x35,
    PermitJoinStatus = 0x36,
    SteeringCancelled = 0x37,
    FormationCancelled = 0x38,
    GppModeChange = 0x3B,
    GppApproveCommissioning = 0x3D,
}

impl Signal {
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Signals after which the node decides whether to form or join.
    pub fn is_startup(self) -> bool {
        matches!(
            self,
            Signal::SkipStartup | Signal::DeviceFirstStart | Signal::DeviceReboot
        )
    }
}

/// Human-readable name for logging, falling back to the raw id.
pub fn signal_name(id: u16) -> String {
    match Signal::from_repr(id) {
        Some(sig) => sig.to_string(),
        None => format!("0x{id:02X}"),
    }
}

/// Signal parameters relevant to join/leave tracking.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignalParams {
    None,
    DeviceAnnounce { short_addr: u16 },
    DeviceUpdate { short_addr: u16, status: u8 },
    DeviceAuthorized { short_addr: u16 },
    LeaveIndication { short_addr: u16 },
}

/// Commissioning mode pushed to the stack after startup.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum CommissioningMode {
    Formation,
    Steering,
}
