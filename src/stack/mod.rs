//! Boundary to the Zigbee protocol stack.
//!
//! The stack is a black box with its own processing thread. The bridge drives
//! it through [`ZigbeeStack`] and receives asynchronous traffic through a
//! [`StackHandler`] it installs before start. Handler methods run on the
//! stack thread; they must only copy data out and return.

pub mod command;
pub mod loopback;

pub use command::{
    BindRequest, CommandTarget, CustomCommand, Direction, OnOffCommand, ReportingConfig,
    ZclCommand,
};
pub use loopback::{LoopbackStack, RemoteNode};

use crate::device::{ClusterRole, EndpointList};
use crate::discovery::{
    BindingTableResponse, IeeeAddr, NodeDescriptor, PowerDescriptorResponse,
    SimpleDescriptorResponse,
};
use crate::error::{BridgeError, Result};
use crate::network::{CommissioningMode, InstallCode, NetworkKey, Role, SignalParams};
use serde::Serialize;
use std::sync::Arc;

/// Aging timeout index for end devices (64 minutes).
pub const ED_AGING_TIMEOUT_64MIN: u8 = 6;
pub const ED_KEEP_ALIVE_MS: u32 = 3000;
pub const MAX_CHILDREN: u8 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NodeConfig {
    EndDevice { ed_timeout: u8, keep_alive_ms: u32 },
    Parent { max_children: u8 },
}

/// Parameters for [`ZigbeeStack::init`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StackConfig {
    pub role: Role,
    pub install_code_policy: bool,
    pub node: NodeConfig,
}

impl StackConfig {
    pub fn for_role(role: Role, install_code_policy: bool) -> Self {
        let node = match role {
            Role::EndDevice => NodeConfig::EndDevice {
                ed_timeout: ED_AGING_TIMEOUT_64MIN,
                keep_alive_ms: ED_KEEP_ALIVE_MS,
            },
            Role::Coordinator | Role::Router => NodeConfig::Parent {
                max_children: MAX_CHILDREN,
            },
        };
        Self {
            role,
            install_code_policy,
            node,
        }
    }
}

/// Heap figures reported by the stack's platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    pub free_bytes: u32,
    pub min_free_bytes: u32,
    pub largest_free_block: u32,
    pub internal_free_bytes: u32,
}

/// Address a ZCL frame came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceAddress {
    Short(u16),
    Ieee(IeeeAddr),
}

/// A write applied to a local attribute by a remote node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttrWriteMessage {
    pub status: u8,
    pub dst_endpoint: u8,
    pub cluster_id: u16,
    pub attr_id: u16,
    pub attr_type: u8,
    pub data: Vec<u8>,
}

/// An attribute report received from a remote node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttrReportMessage {
    pub status: u8,
    pub src_address: SourceAddress,
    pub src_endpoint: u8,
    pub dst_endpoint: u8,
    pub cluster_id: u16,
    pub attr_id: u16,
    pub attr_type: u8,
    pub data: Vec<u8>,
}

/// Callbacks the stack invokes from its own thread.
pub trait StackHandler: Send + Sync + 'static {
    /// Top-level application signal. `stack` is the stack delivering it, so
    /// the handler can query it or start commissioning.
    fn on_signal(&self, stack: &dyn ZigbeeStack, signal: u16, status: i32, params: SignalParams);

    fn on_attribute_write(&self, msg: &AttrWriteMessage);

    fn on_attribute_report(&self, msg: &AttrReportMessage);

    fn on_binding_table(&self, rsp: &BindingTableResponse);

    fn on_active_endpoints(&self, status: u8, endpoints: &[u8]);

    fn on_node_descriptor(&self, status: u8, addr: u16, desc: Option<&NodeDescriptor>);

    fn on_simple_descriptor(&self, status: u8, desc: Option<&SimpleDescriptorResponse>);

    fn on_power_descriptor(&self, rsp: &PowerDescriptorResponse);
}

/// Operations the bridge needs from a Zigbee stack.
///
/// Calls are made with the bridge's stack lock held, except
/// [`run`](ZigbeeStack::run) which is the body of the stack thread.
///
/// # Example
/// ```ignore
/// let stack = Arc::new(LoopbackStack::new());
/// let bridge = ZigbeeBridge::new(stack.clone(), BridgeOptions::default());
/// bridge.init(Role::Router)?;
/// ```
pub trait ZigbeeStack: Send + Sync + 'static {
    fn set_handler(&self, handler: Arc<dyn StackHandler>);

    fn init(&self, config: &StackConfig) -> Result<()>;

    // -- network settings --------------------------------------------------

    fn set_extended_pan_id(&self, ext_pan_id: [u8; 8]);
    fn set_pan_id(&self, pan_id: u16);
    fn set_primary_channel_mask(&self, mask: u32) -> Result<()>;

    fn enable_wifi_coex(&self) -> Result<()> {
        Err(BridgeError::NotSupported("Wi-Fi/802.15.4 coexistence".into()))
    }

    // -- security ----------------------------------------------------------

    fn set_install_code_policy(&self, enabled: bool) -> Result<()>;
    fn set_network_security(&self, enabled: bool) -> Result<()>;
    fn network_security_enabled(&self) -> bool;
    fn set_network_key(&self, key: &NetworkKey) -> Result<()>;
    fn primary_network_key(&self) -> Result<NetworkKey>;
    fn switch_network_key(&self, key: &NetworkKey, seq: u8) -> Result<()>;
    fn broadcast_network_key(&self, key: &NetworkKey, seq: u8) -> Result<()>;
    fn broadcast_network_key_switch(&self, seq: u8) -> Result<()>;
    fn add_install_code(&self, ieee_addr: &IeeeAddr, code: &InstallCode) -> Result<()>;
    fn set_local_install_code(&self, code: &InstallCode) -> Result<()>;
    fn remove_install_code(&self, ieee_addr: &IeeeAddr) -> Result<()>;
    fn remove_all_install_codes(&self) -> Result<()>;

    // -- lifecycle ---------------------------------------------------------

    /// Hand over the device's endpoint list. Called at most once.
    fn device_register(&self, endpoints: &EndpointList) -> Result<()>;
    fn start(&self) -> Result<()>;
    /// Stack main loop. Returns when the stack shuts down.
    fn run(&self);
    fn shutdown(&self) {}
    fn is_factory_new(&self) -> bool;
    fn start_commissioning(&self, mode: CommissioningMode) -> Result<()>;
    fn open_network(&self, duration_s: u8) -> Result<()>;

    // -- runtime info ------------------------------------------------------

    fn current_channel(&self) -> u8;
    fn pan_id(&self) -> u16;
    fn extended_pan_id(&self) -> [u8; 8];
    fn short_addr(&self) -> u16;
    fn ieee_addr(&self) -> IeeeAddr;
    fn heap_stats(&self) -> HeapStats;

    // -- local attributes --------------------------------------------------

    /// Declared type tag and raw bytes of a local attribute.
    fn read_attribute(
        &self,
        endpoint: u8,
        cluster_id: u16,
        role: ClusterRole,
        attr_id: u16,
    ) -> Result<(u8, Vec<u8>)>;

    /// Write raw bytes to a local attribute, returning the ZCL status.
    fn write_attribute(
        &self,
        endpoint: u8,
        cluster_id: u16,
        role: ClusterRole,
        attr_id: u16,
        data: &[u8],
        check: bool,
    ) -> Result<u8>;

    // -- requests ----------------------------------------------------------

    fn configure_reporting(&self, config: &ReportingConfig) -> Result<()>;

    /// Send a cluster command, returning the ZCL status of the submission.
    fn send_command(&self, target: &CommandTarget, command: &ZclCommand) -> Result<u8>;

    fn bind(&self, req: &BindRequest) -> Result<()>;
    fn unbind(&self, req: &BindRequest) -> Result<()>;

    fn request_binding_table(&self, dst_short_addr: u16, start_index: u8) -> Result<()>;
    fn request_active_endpoints(&self, dst_short_addr: u16) -> Result<()>;
    fn request_node_descriptor(&self, dst_short_addr: u16) -> Result<()>;
    fn request_simple_descriptor(&self, dst_short_addr: u16, endpoint: u8) -> Result<()>;
    fn request_power_descriptor(&self, dst_short_addr: u16) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_config_for_role() {
        let ed = StackConfig::for_role(Role::EndDevice, false);
        assert_eq!(
            ed.node,
            NodeConfig::EndDevice {
                ed_timeout: ED_AGING_TIMEOUT_64MIN,
                keep_alive_ms: 3000
            }
        );
        let zc = StackConfig::for_role(Role::Coordinator, true);
        assert_eq!(zc.node, NodeConfig::Parent { max_children: 10 });
        assert!(zc.install_code_policy);
    }
}
