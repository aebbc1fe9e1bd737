//! Network role, pre-start settings and the eventually-consistent view of
//! formed/joined state built from stack signals.

use super::signals::{
    CommissioningMode, DEVICE_UPDATE_LEFT, SIGNAL_STATUS_OK, Signal, SignalParams,
};
use crate::error::{BridgeError, Result};
use crate::zcl::ids::{ALL_CHANNELS_MASK, SHORT_ADDR_BROADCAST, SHORT_ADDR_COORDINATOR};
use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, FromRepr};

#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, FromRepr, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Role {
    #[default]
    Coordinator = 0,
    Router = 1,
    #[strum(to_string = "end_device", serialize = "ed")]
    EndDevice = 2,
}

pub fn valid_channel_mask(mask: u32) -> bool {
    mask != 0 && mask & !ALL_CHANNELS_MASK == 0
}

pub fn valid_pan_id(pan_id: u16) -> bool {
    pan_id != 0 && pan_id != 0xFFFF
}

/// Network parameters that can be set before init and are re-applied when
/// the stack comes up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub channel_mask: u32,
    pub pan_id: Option<u16>,
    pub extended_pan_id: Option<[u8; 8]>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            channel_mask: ALL_CHANNELS_MASK,
            pan_id: None,
            extended_pan_id: None,
        }
    }
}

impl NetworkSettings {
    pub fn set_channel_mask(&mut self, mask: u32) -> Result<()> {
        if !valid_channel_mask(mask) {
            return Err(BridgeError::invalid_arg(format!(
                "channel mask 0x{mask:08X} not within 0x{ALL_CHANNELS_MASK:08X}"
            )));
        }
        self.channel_mask = mask;
        Ok(())
    }

    pub fn set_pan_id(&mut self, pan_id: u16) -> Result<()> {
        if !valid_pan_id(pan_id) {
            return Err(BridgeError::invalid_arg(format!("PAN id 0x{pan_id:04X}")));
        }
        self.pan_id = Some(pan_id);
        Ok(())
    }
}

/// Runtime network information combined from the stack and the tracker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NetworkRuntime {
    pub channel: u8,
    pub pan_id: u16,
    pub extended_pan_id: [u8; 8],
    pub short_addr: u16,
    pub formed: bool,
    pub joined: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct TrackerState {
    formed: bool,
    joined: bool,
    last_joined: Option<u16>,
}

/// Formed/joined flags and the last joined short address.
///
/// Updated from the signal handler on the stack thread; read from the host.
#[derive(Debug, Default)]
pub struct NetworkTracker {
    state: Mutex<TrackerState>,
}

impl NetworkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        *self.state.lock() = TrackerState::default();
    }

    pub fn set_state(&self, formed: bool, joined: bool) {
        let mut state = self.state.lock();
        state.formed = formed;
        state.joined = joined;
    }

    pub fn set_joined(&self, joined: bool) {
        self.state.lock().joined = joined;
    }

    /// `(formed, joined)`
    pub fn flags(&self) -> (bool, bool) {
        let state = self.state.lock();
        (state.formed, state.joined)
    }

    pub fn last_joined(&self) -> Option<u16> {
        self.state.lock().last_joined
    }

    pub fn note_joined(&self, short_addr: u16) {
        if short_addr == SHORT_ADDR_COORDINATOR || short_addr == SHORT_ADDR_BROADCAST {
            return;
        }
        self.state.lock().last_joined = Some(short_addr);
        info!("[Signal] last joined short address 0x{short_addr:04X}");
    }

    pub fn note_left(&self, short_addr: u16) {
        let mut state = self.state.lock();
        if state.last_joined == Some(short_addr) {
            state.last_joined = None;
            info!("[Signal] last joined 0x{short_addr:04X} left, cleared");
        }
    }

    /// Fold one stack signal into the tracked state.
    ///
    /// Returns the commissioning mode to start when the signal ends startup.
    /// `factory_new` is only queried for startup signals.
    pub fn apply_signal(
        &self,
        signal: u16,
        status: i32,
        params: SignalParams,
        role: Role,
        form_network: bool,
        factory_new: impl FnOnce() -> bool,
    ) -> Option<CommissioningMode> {
        if status != SIGNAL_STATUS_OK {
            return None;
        }
        match params {
            SignalParams::DeviceAnnounce { short_addr }
            | SignalParams::DeviceAuthorized { short_addr } => self.note_joined(short_addr),
            SignalParams::DeviceUpdate { short_addr, status } if status == DEVICE_UPDATE_LEFT => {
                self.note_left(short_addr)
            }
            SignalParams::DeviceUpdate { short_addr, .. } => self.note_joined(short_addr),
            SignalParams::LeaveIndication { short_addr } => self.note_left(short_addr),
            SignalParams::None => {}
        }

        let signal = Signal::from_repr(signal)?;
        match signal {
            Signal::Formation => self.set_state(true, true),
            Signal::Steering if role == Role::Coordinator => self.set_state(true, true),
            Signal::Steering => self.set_joined(true),
            s if s.is_startup() => {
                if factory_new() {
                    self.set_state(false, false);
                } else if role == Role::Coordinator {
                    self.set_state(true, true);
                } else {
                    self.set_state(false, true);
                }
                let mode = if form_network && role == Role::Coordinator {
                    CommissioningMode::Formation
                } else {
                    CommissioningMode::Steering
                };
                debug!("[Signal] {signal} complete, commissioning via {mode}");
                return Some(mode);
            }
            _ => {}
        }
        None
    }
}
