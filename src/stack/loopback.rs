//! In-process Zigbee stack simulation.
//!
//! `LoopbackStack` keeps the registered endpoint list and local attribute
//! store, answers ZDO requests for itself and for any [`RemoteNode`]s it was
//! given, and delivers every response and signal from its own work loop the
//! way a real stack would. In manual mode the work loop does not run on a
//! thread; tests drive it with [`LoopbackStack::step`].

use super::command::{BindRequest, CommandTarget, ReportingConfig, ZclCommand};
use super::{
    AttrReportMessage, AttrWriteMessage, HeapStats, StackConfig, StackHandler, ZigbeeStack,
};
use crate::device::{ClusterRole, EndpointList, access};
use crate::discovery::{
    BindingRecord, BindingTableResponse, IeeeAddr, NodeDescriptor, PowerDescriptor,
    PowerDescriptorResponse, SimpleDescriptorResponse, bind_addr_mode,
};
use crate::error::{BridgeError, Result};
use crate::network::{
    CommissioningMode, InstallCode, NetworkKey, Role, Signal, SignalParams,
};
use crate::zcl::AttrType;
use crate::zcl::ids::{ALL_CHANNELS_MASK, status};
use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex, RwLock};
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// ZDO status codes used in simulated responses.
pub mod zdo_status {
    pub const SUCCESS: u8 = 0x00;
    pub const DEVICE_NOT_FOUND: u8 = 0x81;
    pub const INVALID_EP: u8 = 0x82;
}

const SIGNAL_FAIL: i32 = -1;
const ESPRESSIF_MANUFACTURER_CODE: u16 = 0x131B;
const HEAP_BUDGET: u32 = 320 * 1024;
const HEAP_BASE_USAGE: u32 = 24 * 1024;

/// A simulated neighbour that answers discovery requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteNode {
    pub short_addr: u16,
    pub ieee_addr: IeeeAddr,
    pub node_desc: NodeDescriptor,
    pub power_desc: PowerDescriptor,
    pub endpoints: Vec<SimpleDescriptorResponse>,
    pub bindings: Vec<BindingRecord>,
}

#[derive(Debug)]
enum Work {
    Signal {
        signal: u16,
        status: i32,
        params: SignalParams,
    },
    AttrWrite(AttrWriteMessage),
    AttrReport(AttrReportMessage),
    BindingTable {
        dst: u16,
        start_index: u8,
    },
    ActiveEndpoints {
        dst: u16,
    },
    NodeDesc {
        dst: u16,
    },
    SimpleDesc {
        dst: u16,
        endpoint: u8,
    },
    PowerDesc {
        dst: u16,
    },
}

#[derive(Debug, Clone)]
struct AttrSlot {
    attr_type: AttrType,
    access: u8,
    data: Vec<u8>,
}

type AttrKey = (u8, u16, ClusterRole, u16);

struct State {
    config: Option<StackConfig>,
    started: bool,
    factory_new: bool,
    formed: bool,
    channel_mask: u32,
    channel: u8,
    pan_id: u16,
    ext_pan_id: [u8; 8],
    short_addr: u16,
    ieee_addr: IeeeAddr,
    install_code_policy: bool,
    network_security: bool,
    network_key: NetworkKey,
    key_seq: u8,
    install_codes: HashMap<IeeeAddr, InstallCode>,
    local_install_code: Option<InstallCode>,
    endpoints: Option<EndpointList>,
    attributes: HashMap<AttrKey, AttrSlot>,
    own_bindings: Vec<BindingRecord>,
    remotes: Vec<RemoteNode>,
    permit_join_s: u8,
    sent_commands: Vec<(CommandTarget, ZclCommand)>,
    reporting: Vec<ReportingConfig>,
    forced_command_status: Option<u8>,
    min_free: u32,
}

pub struct LoopbackStack {
    state: Mutex<State>,
    work: Mutex<VecDeque<Work>>,
    wake: Condvar,
    shutdown: AtomicBool,
    handler: RwLock<Option<Arc<dyn StackHandler>>>,
    manual: bool,
}

impl Default for LoopbackStack {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackStack {
    /// Stack whose work loop runs inside [`ZigbeeStack::run`].
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Stack whose work loop only advances on [`LoopbackStack::step`].
    pub fn manual() -> Self {
        Self::build(true)
    }

    fn build(manual: bool) -> Self {
        let mut rng = rand::thread_rng();
        let ieee_addr: IeeeAddr = rng.r#gen();
        let mut network_key = [0u8; 16];
        rng.fill(&mut network_key);
        Self {
            state: Mutex::new(State {
                config: None,
                started: false,
                factory_new: true,
                formed: false,
                channel_mask: ALL_CHANNELS_MASK,
                channel: 0,
                pan_id: 0xFFFF,
                ext_pan_id: [0; 8],
                short_addr: 0xFFFF,
                ieee_addr,
                install_code_policy: false,
                network_security: true,
                network_key: NetworkKey(network_key),
                key_seq: 0,
                install_codes: HashMap::new(),
                local_install_code: None,
                endpoints: None,
                attributes: HashMap::new(),
                own_bindings: Vec::new(),
                remotes: Vec::new(),
                permit_join_s: 0,
                sent_commands: Vec::new(),
                reporting: Vec::new(),
                forced_command_status: None,
                min_free: HEAP_BUDGET - HEAP_BASE_USAGE,
            }),
            work: Mutex::new(VecDeque::new()),
            wake: Condvar::new(),
            shutdown: AtomicBool::new(false),
            handler: RwLock::new(None),
            manual,
        }
    }

    pub fn add_remote_node(&self, node: RemoteNode) {
        let mut state = self.state.lock();
        state.remotes.retain(|n| n.short_addr != node.short_addr);
        state.remotes.push(node);
    }

    /// Report `signal` as if the stack raised it.
    pub fn inject_signal(&self, signal: u16, status: i32, params: SignalParams) {
        self.push(Work::Signal {
            signal,
            status,
            params,
        });
    }

    /// Deliver an attribute report from a remote node.
    pub fn inject_report(&self, msg: AttrReportMessage) {
        self.push(Work::AttrReport(msg));
    }

    /// Apply a remote write to a local attribute and notify the handler.
    pub fn inject_write(&self, msg: AttrWriteMessage) -> Result<()> {
        {
            let mut state = self.state.lock();
            let key = state
                .attributes
                .keys()
                .find(|(ep, cl, _, at)| {
                    *ep == msg.dst_endpoint && *cl == msg.cluster_id && *at == msg.attr_id
                })
                .copied()
                .ok_or_else(|| {
                    BridgeError::not_found(format!(
                        "attribute 0x{:04X}/0x{:04X} on endpoint {}",
                        msg.cluster_id, msg.attr_id, msg.dst_endpoint
                    ))
                })?;
            if let Some(slot) = state.attributes.get_mut(&key) {
                slot.data = msg.data.clone();
            }
        }
        self.push(Work::AttrWrite(msg));
        Ok(())
    }

    /// Make the next command submission return `zcl_status`.
    pub fn fail_next_command(&self, zcl_status: u8) {
        self.state.lock().forced_command_status = Some(zcl_status);
    }

    pub fn set_factory_new(&self, factory_new: bool) {
        self.state.lock().factory_new = factory_new;
    }

    pub fn sent_commands(&self) -> Vec<(CommandTarget, ZclCommand)> {
        self.state.lock().sent_commands.clone()
    }

    pub fn reporting_configs(&self) -> Vec<ReportingConfig> {
        self.state.lock().reporting.clone()
    }

    pub fn registered_endpoints(&self) -> Option<EndpointList> {
        self.state.lock().endpoints.clone()
    }

    pub fn permit_join_duration(&self) -> u8 {
        self.state.lock().permit_join_s
    }

    pub fn install_policy(&self) -> bool {
        self.state.lock().install_code_policy
    }

    pub fn install_code_count(&self) -> usize {
        self.state.lock().install_codes.len()
    }

    pub fn channel_mask(&self) -> u32 {
        self.state.lock().channel_mask
    }

    /// Process every queued work item on the calling thread.
    pub fn step(&self) -> usize {
        let mut processed = 0;
        loop {
            // handlers may queue more work, so the queue lock is released first
            let Some(work) = self.work.lock().pop_front() else {
                break;
            };
            self.process(work);
            processed += 1;
        }
        processed
    }

    fn push(&self, work: Work) {
        self.work.lock().push_back(work);
        if !self.manual {
            self.wake.notify_one();
        }
    }

    fn signal(&self, signal: Signal, status: i32, params: SignalParams) {
        self.push(Work::Signal {
            signal: signal.id(),
            status,
            params,
        });
    }

    fn handler(&self) -> Option<Arc<dyn StackHandler>> {
        self.handler.read().clone()
    }

    fn require_started(&self) -> Result<()> {
        if self.state.lock().started {
            Ok(())
        } else {
            Err(BridgeError::Stack("stack not started".into()))
        }
    }

    fn process(&self, work: Work) {
        let Some(handler) = self.handler() else {
            debug!("[Stack] no handler installed, dropping {work:?}");
            return;
        };
        match work {
            Work::Signal {
                signal,
                status,
                params,
            } => handler.on_signal(self, signal, status, params),
            Work::AttrWrite(msg) => handler.on_attribute_write(&msg),
            Work::AttrReport(msg) => handler.on_attribute_report(&msg),
            Work::BindingTable { dst, start_index } => {
                let rsp = self.binding_table(dst, start_index);
                handler.on_binding_table(&rsp);
            }
            Work::ActiveEndpoints { dst } => {
                let (status, eps) = self.active_endpoints(dst);
                handler.on_active_endpoints(status, &eps);
            }
            Work::NodeDesc { dst } => {
                let (status, desc) = self.node_descriptor(dst);
                handler.on_node_descriptor(status, dst, desc.as_ref());
            }
            Work::SimpleDesc { dst, endpoint } => {
                let (status, desc) = self.simple_descriptor(dst, endpoint);
                handler.on_simple_descriptor(status, desc.as_ref());
            }
            Work::PowerDesc { dst } => {
                let rsp = self.power_descriptor(dst);
                handler.on_power_descriptor(&rsp);
            }
        }
    }

    fn active_endpoints(&self, dst: u16) -> (u8, Vec<u8>) {
        let state = self.state.lock();
        if dst == state.short_addr {
            let eps = state
                .endpoints
                .iter()
                .flatten()
                .map(|e| e.endpoint)
                .collect();
            return (zdo_status::SUCCESS, eps);
        }
        match state.remotes.iter().find(|n| n.short_addr == dst) {
            Some(node) => (
                zdo_status::SUCCESS,
                node.endpoints.iter().map(|e| e.endpoint).collect(),
            ),
            None => (zdo_status::DEVICE_NOT_FOUND, Vec::new()),
        }
    }

    fn node_descriptor(&self, dst: u16) -> (u8, Option<NodeDescriptor>) {
        let state = self.state.lock();
        if dst == state.short_addr {
            let role = state.config.map(|c| c.role).unwrap_or_default();
            let (logical_type, mac_flags) = match role {
                Role::Coordinator => (0x00, 0x8F),
                Role::Router => (0x01, 0x8E),
                Role::EndDevice => (0x02, 0x80),
            };
            return (
                zdo_status::SUCCESS,
                Some(NodeDescriptor {
                    node_desc_flags: logical_type,
                    mac_capability_flags: mac_flags,
                    manufacturer_code: ESPRESSIF_MANUFACTURER_CODE,
                    max_buf_size: 108,
                    max_incoming_transfer_size: 1613,
                    server_mask: if role == Role::Coordinator { 0x2C41 } else { 0x2C40 },
                    max_outgoing_transfer_size: 1613,
                    desc_capability_field: 0,
                }),
            );
        }
        match state.remotes.iter().find(|n| n.short_addr == dst) {
            Some(node) => (zdo_status::SUCCESS, Some(node.node_desc)),
            None => (zdo_status::DEVICE_NOT_FOUND, None),
        }
    }

    fn simple_descriptor(&self, dst: u16, endpoint: u8) -> (u8, Option<SimpleDescriptorResponse>) {
        let state = self.state.lock();
        if dst == state.short_addr {
            let desc = state
                .endpoints
                .iter()
                .flatten()
                .find(|e| e.endpoint == endpoint)
                .map(|e| SimpleDescriptorResponse {
                    endpoint: e.endpoint,
                    profile_id: e.profile_id,
                    device_id: e.device_id,
                    device_version: e.device_version,
                    input_clusters: e
                        .clusters
                        .iter()
                        .filter(|c| c.role == ClusterRole::Server)
                        .map(|c| c.id)
                        .collect(),
                    output_clusters: e
                        .clusters
                        .iter()
                        .filter(|c| c.role == ClusterRole::Client)
                        .map(|c| c.id)
                        .collect(),
                });
            return match desc {
                Some(desc) => (zdo_status::SUCCESS, Some(desc)),
                None => (zdo_status::INVALID_EP, None),
            };
        }
        match state.remotes.iter().find(|n| n.short_addr == dst) {
            Some(node) => match node.endpoints.iter().find(|e| e.endpoint == endpoint) {
                Some(desc) => (zdo_status::SUCCESS, Some(desc.clone())),
                None => (zdo_status::INVALID_EP, None),
            },
            None => (zdo_status::DEVICE_NOT_FOUND, None),
        }
    }

    fn power_descriptor(&self, dst: u16) -> PowerDescriptorResponse {
        let state = self.state.lock();
        let (status, desc) = if dst == state.short_addr {
            // receiver on when idle, mains powered, full
            let desc = PowerDescriptor {
                current_power_mode: 0,
                available_power_sources: 0x01,
                current_power_source: 0x01,
                current_power_source_level: 0x0C,
            };
            (zdo_status::SUCCESS, desc)
        } else {
            match state.remotes.iter().find(|n| n.short_addr == dst) {
                Some(node) => (zdo_status::SUCCESS, node.power_desc),
                None => (zdo_status::DEVICE_NOT_FOUND, PowerDescriptor::default()),
            }
        };
        PowerDescriptorResponse {
            status,
            nwk_addr_of_interest: dst,
            desc,
        }
    }

    fn binding_table(&self, dst: u16, start_index: u8) -> BindingTableResponse {
        let state = self.state.lock();
        let table = if dst == state.short_addr {
            Some(&state.own_bindings)
        } else {
            state
                .remotes
                .iter()
                .find(|n| n.short_addr == dst)
                .map(|n| &n.bindings)
        };
        match table {
            Some(records) => {
                let page: Vec<_> = records.iter().skip(start_index as usize).copied().collect();
                BindingTableResponse {
                    status: zdo_status::SUCCESS,
                    index: start_index,
                    total: records.len() as u8,
                    count: page.len() as u8,
                    records: page,
                }
            }
            None => BindingTableResponse {
                status: zdo_status::DEVICE_NOT_FOUND,
                index: start_index,
                total: 0,
                count: 0,
                records: Vec::new(),
            },
        }
    }

    fn bindings_for(state: &mut State, req_dst: u16) -> Option<&mut Vec<BindingRecord>> {
        if req_dst == state.short_addr {
            return Some(&mut state.own_bindings);
        }
        state
            .remotes
            .iter_mut()
            .find(|n| n.short_addr == req_dst)
            .map(|n| &mut n.bindings)
    }
}

fn record_from(req: &BindRequest) -> BindingRecord {
    BindingRecord {
        src_ieee_addr: req.src_ieee_addr,
        src_endpoint: req.src_endpoint,
        cluster_id: req.cluster_id,
        dst_addr_mode: bind_addr_mode::EXTENDED,
        dst_short_addr: 0,
        dst_ieee_addr: req.dst_ieee_addr,
        dst_endpoint: req.dst_endpoint,
    }
}

fn first_channel(mask: u32) -> u8 {
    (11..=26).find(|ch| mask & (1 << ch) != 0).unwrap_or(11)
}

impl ZigbeeStack for LoopbackStack {
    fn set_handler(&self, handler: Arc<dyn StackHandler>) {
        *self.handler.write() = Some(handler);
    }

    fn init(&self, config: &StackConfig) -> Result<()> {
        let mut state = self.state.lock();
        state.config = Some(*config);
        state.install_code_policy = config.install_code_policy;
        info!("[Stack] loopback initialised as {}", config.role);
        Ok(())
    }

    fn set_extended_pan_id(&self, ext_pan_id: [u8; 8]) {
        self.state.lock().ext_pan_id = ext_pan_id;
    }

    fn set_pan_id(&self, pan_id: u16) {
        self.state.lock().pan_id = pan_id;
    }

    fn set_primary_channel_mask(&self, mask: u32) -> Result<()> {
        self.state.lock().channel_mask = mask;
        Ok(())
    }

    fn set_install_code_policy(&self, enabled: bool) -> Result<()> {
        self.state.lock().install_code_policy = enabled;
        Ok(())
    }

    fn set_network_security(&self, enabled: bool) -> Result<()> {
        self.state.lock().network_security = enabled;
        Ok(())
    }

    fn network_security_enabled(&self) -> bool {
        self.state.lock().network_security
    }

    fn set_network_key(&self, key: &NetworkKey) -> Result<()> {
        self.state.lock().network_key = *key;
        Ok(())
    }

    fn primary_network_key(&self) -> Result<NetworkKey> {
        Ok(self.state.lock().network_key)
    }

    fn switch_network_key(&self, key: &NetworkKey, seq: u8) -> Result<()> {
        let mut state = self.state.lock();
        state.network_key = *key;
        state.key_seq = seq;
        Ok(())
    }

    fn broadcast_network_key(&self, _key: &NetworkKey, seq: u8) -> Result<()> {
        debug!("[Stack] broadcasting network key seq {seq}");
        Ok(())
    }

    fn broadcast_network_key_switch(&self, seq: u8) -> Result<()> {
        self.state.lock().key_seq = seq;
        Ok(())
    }

    fn add_install_code(&self, ieee_addr: &IeeeAddr, code: &InstallCode) -> Result<()> {
        self.state
            .lock()
            .install_codes
            .insert(*ieee_addr, code.clone());
        Ok(())
    }

    fn set_local_install_code(&self, code: &InstallCode) -> Result<()> {
        self.state.lock().local_install_code = Some(code.clone());
        Ok(())
    }

    fn remove_install_code(&self, ieee_addr: &IeeeAddr) -> Result<()> {
        self.state
            .lock()
            .install_codes
            .remove(ieee_addr)
            .map(|_| ())
            .ok_or_else(|| BridgeError::not_found("install code"))
    }

    fn remove_all_install_codes(&self) -> Result<()> {
        self.state.lock().install_codes.clear();
        Ok(())
    }

    fn device_register(&self, endpoints: &EndpointList) -> Result<()> {
        let mut state = self.state.lock();
        if state.endpoints.is_some() {
            return Err(BridgeError::invalid_state("device already registered"));
        }
        if endpoints.is_empty() {
            return Err(BridgeError::invalid_arg("empty endpoint list"));
        }
        let mut attr_count = 0u32;
        for ep in endpoints {
            for cluster in &ep.clusters {
                for attr in &cluster.attributes {
                    state.attributes.insert(
                        (ep.endpoint, cluster.id, cluster.role, attr.id),
                        AttrSlot {
                            attr_type: attr.attr_type,
                            access: attr.access,
                            data: attr.data.to_bytes(),
                        },
                    );
                    attr_count += 1;
                }
            }
        }
        let used = HEAP_BASE_USAGE + endpoints.len() as u32 * 512 + attr_count * 32;
        state.min_free = state.min_free.min(HEAP_BUDGET.saturating_sub(used));
        state.endpoints = Some(endpoints.clone());
        info!(
            "[Stack] registered {} endpoint(s), {attr_count} attribute(s)",
            endpoints.len()
        );
        Ok(())
    }

    fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.config.is_none() {
                return Err(BridgeError::Stack("start before init".into()));
            }
            state.started = true;
        }
        self.signal(Signal::SkipStartup, 0, SignalParams::None);
        Ok(())
    }

    fn run(&self) {
        if self.manual {
            return;
        }
        info!("[Stack] loopback work loop running");
        loop {
            let work = {
                let mut queue = self.work.lock();
                loop {
                    if self.shutdown.load(Ordering::SeqCst) {
                        info!("[Stack] loopback work loop stopped");
                        return;
                    }
                    if let Some(work) = queue.pop_front() {
                        break work;
                    }
                    self.wake.wait(&mut queue);
                }
            };
            self.process(work);
        }
    }

    fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _guard = self.work.lock();
        self.wake.notify_all();
    }

    fn is_factory_new(&self) -> bool {
        self.state.lock().factory_new
    }

    fn start_commissioning(&self, mode: CommissioningMode) -> Result<()> {
        let mut rng = rand::thread_rng();
        let (signal, ok) = {
            let mut state = self.state.lock();
            if !state.started {
                return Err(BridgeError::Stack("commissioning before start".into()));
            }
            let role = state.config.map(|c| c.role).unwrap_or_default();
            match mode {
                CommissioningMode::Formation if role != Role::Coordinator => {
                    warn!("[Stack] formation requested by a {role}");
                    (Signal::Formation, false)
                }
                CommissioningMode::Formation => {
                    state.channel = first_channel(state.channel_mask);
                    if state.pan_id == 0xFFFF {
                        state.pan_id = rng.gen_range(0x0001..0xFFFF);
                    }
                    if state.ext_pan_id == [0; 8] {
                        state.ext_pan_id = state.ieee_addr;
                    }
                    state.short_addr = 0x0000;
                    state.formed = true;
                    state.factory_new = false;
                    (Signal::Formation, true)
                }
                CommissioningMode::Steering if role == Role::Coordinator => {
                    (Signal::Steering, state.formed)
                }
                CommissioningMode::Steering => {
                    if state.factory_new {
                        state.channel = first_channel(state.channel_mask);
                        state.short_addr = rng.gen_range(0x0001..0xFFF8);
                        if state.pan_id == 0xFFFF {
                            state.pan_id = rng.gen_range(0x0001..0xFFFF);
                        }
                        state.factory_new = false;
                    }
                    (Signal::Steering, true)
                }
            }
        };
        debug!("[Stack] commissioning via {mode}: {}", if ok { "ok" } else { "failed" });
        self.signal(signal, if ok { 0 } else { SIGNAL_FAIL }, SignalParams::None);
        Ok(())
    }

    fn open_network(&self, duration_s: u8) -> Result<()> {
        self.require_started()?;
        self.state.lock().permit_join_s = duration_s;
        self.signal(Signal::PermitJoinStatus, 0, SignalParams::None);
        Ok(())
    }

    fn current_channel(&self) -> u8 {
        self.state.lock().channel
    }

    fn pan_id(&self) -> u16 {
        self.state.lock().pan_id
    }

    fn extended_pan_id(&self) -> [u8; 8] {
        self.state.lock().ext_pan_id
    }

    fn short_addr(&self) -> u16 {
        self.state.lock().short_addr
    }

    fn ieee_addr(&self) -> IeeeAddr {
        self.state.lock().ieee_addr
    }

    fn heap_stats(&self) -> HeapStats {
        let state = self.state.lock();
        let attrs = state.attributes.len() as u32;
        let eps = state.endpoints.as_ref().map_or(0, |l| l.len() as u32);
        let free = HEAP_BUDGET.saturating_sub(HEAP_BASE_USAGE + eps * 512 + attrs * 32);
        HeapStats {
            free_bytes: free,
            min_free_bytes: state.min_free.min(free),
            largest_free_block: free / 4 * 3,
            internal_free_bytes: free / 2,
        }
    }

    fn read_attribute(
        &self,
        endpoint: u8,
        cluster_id: u16,
        role: ClusterRole,
        attr_id: u16,
    ) -> Result<(u8, Vec<u8>)> {
        let state = self.state.lock();
        let slot = state
            .attributes
            .get(&(endpoint, cluster_id, role, attr_id))
            .ok_or_else(|| {
                BridgeError::not_found(format!(
                    "attribute 0x{cluster_id:04X}/0x{attr_id:04X} on endpoint {endpoint}"
                ))
            })?;
        Ok((slot.attr_type.tag(), slot.data.clone()))
    }

    fn write_attribute(
        &self,
        endpoint: u8,
        cluster_id: u16,
        role: ClusterRole,
        attr_id: u16,
        data: &[u8],
        check: bool,
    ) -> Result<u8> {
        let mut state = self.state.lock();
        let slot = state
            .attributes
            .get_mut(&(endpoint, cluster_id, role, attr_id))
            .ok_or_else(|| {
                BridgeError::not_found(format!(
                    "attribute 0x{cluster_id:04X}/0x{attr_id:04X} on endpoint {endpoint}"
                ))
            })?;
        if check && slot.access & access::WRITE_ONLY == 0 {
            return Ok(status::READ_ONLY);
        }
        if let Some(width) = slot.attr_type.width()
            && data.len() != width.size()
        {
            return Ok(status::INVALID_VALUE);
        }
        slot.data = data.to_vec();
        Ok(status::SUCCESS)
    }

    fn configure_reporting(&self, config: &ReportingConfig) -> Result<()> {
        self.require_started()?;
        self.state.lock().reporting.push(config.clone());
        Ok(())
    }

    fn send_command(&self, target: &CommandTarget, command: &ZclCommand) -> Result<u8> {
        self.require_started()?;
        let mut state = self.state.lock();
        if let Some(forced) = state.forced_command_status.take() {
            return Ok(forced);
        }
        state.sent_commands.push((*target, command.clone()));
        Ok(status::SUCCESS)
    }

    fn bind(&self, req: &BindRequest) -> Result<()> {
        self.require_started()?;
        let mut state = self.state.lock();
        if let Some(table) = Self::bindings_for(&mut state, req.req_dst_short_addr) {
            let record = record_from(req);
            if !table.contains(&record) {
                table.push(record);
            }
        }
        Ok(())
    }

    fn unbind(&self, req: &BindRequest) -> Result<()> {
        self.require_started()?;
        let mut state = self.state.lock();
        if let Some(table) = Self::bindings_for(&mut state, req.req_dst_short_addr) {
            let record = record_from(req);
            table.retain(|r| *r != record);
        }
        Ok(())
    }

    fn request_binding_table(&self, dst_short_addr: u16, start_index: u8) -> Result<()> {
        self.require_started()?;
        self.push(Work::BindingTable {
            dst: dst_short_addr,
            start_index,
        });
        Ok(())
    }

    fn request_active_endpoints(&self, dst_short_addr: u16) -> Result<()> {
        self.require_started()?;
        self.push(Work::ActiveEndpoints {
            dst: dst_short_addr,
        });
        Ok(())
    }

    fn request_node_descriptor(&self, dst_short_addr: u16) -> Result<()> {
        self.require_started()?;
        self.push(Work::NodeDesc {
            dst: dst_short_addr,
        });
        Ok(())
    }

    fn request_simple_descriptor(&self, dst_short_addr: u16, endpoint: u8) -> Result<()> {
        self.require_started()?;
        self.push(Work::SimpleDesc {
            dst: dst_short_addr,
            endpoint,
        });
        Ok(())
    }

    fn request_power_descriptor(&self, dst_short_addr: u16) -> Result<()> {
        self.require_started()?;
        self.push(Work::PowerDesc {
            dst: dst_short_addr,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{EndpointDescriptor, EndpointPreset};
    use crate::discovery::SimpleDescriptorResponse;

    #[derive(Default)]
    struct Recorder {
        signals: Mutex<Vec<(u16, i32)>>,
        active: Mutex<Vec<(u8, Vec<u8>)>>,
    }

    impl StackHandler for Recorder {
        fn on_signal(&self, _: &dyn ZigbeeStack, signal: u16, status: i32, _: SignalParams) {
            self.signals.lock().push((signal, status));
        }
        fn on_attribute_write(&self, _: &AttrWriteMessage) {}
        fn on_attribute_report(&self, _: &AttrReportMessage) {}
        fn on_binding_table(&self, _: &BindingTableResponse) {}
        fn on_active_endpoints(&self, status: u8, endpoints: &[u8]) {
            self.active.lock().push((status, endpoints.to_vec()));
        }
        fn on_node_descriptor(&self, _: u8, _: u16, _: Option<&NodeDescriptor>) {}
        fn on_simple_descriptor(&self, _: u8, _: Option<&SimpleDescriptorResponse>) {}
        fn on_power_descriptor(&self, _: &PowerDescriptorResponse) {}
    }

    fn light_list() -> EndpointList {
        vec![EndpointDescriptor {
            endpoint: 1,
            profile_id: 0x0104,
            device_id: 0x0100,
            device_version: 0,
            clusters: EndpointPreset::OnOffLight.clusters(),
        }]
    }

    fn started(role: Role) -> (LoopbackStack, Arc<Recorder>) {
        let stack = LoopbackStack::manual();
        let rec = Arc::new(Recorder::default());
        stack.set_handler(rec.clone());
        stack.init(&StackConfig::for_role(role, false)).unwrap();
        stack.device_register(&light_list()).unwrap();
        stack.start().unwrap();
        (stack, rec)
    }

    #[test]
    fn test_start_emits_skip_startup() {
        let (stack, rec) = started(Role::Coordinator);
        assert_eq!(stack.step(), 1);
        assert_eq!(rec.signals.lock().as_slice(), &[(Signal::SkipStartup.id(), 0)]);
    }

    #[test]
    fn test_formation_requires_coordinator() {
        let (stack, rec) = started(Role::Router);
        stack.step();
        stack.start_commissioning(CommissioningMode::Formation).unwrap();
        stack.step();
        assert_eq!(rec.signals.lock().last(), Some(&(Signal::Formation.id(), SIGNAL_FAIL)));
    }

    #[test]
    fn test_formation_assigns_network() {
        let (stack, _rec) = started(Role::Coordinator);
        stack.set_primary_channel_mask(1 << 15).unwrap();
        stack.start_commissioning(CommissioningMode::Formation).unwrap();
        assert_eq!(stack.current_channel(), 15);
        assert_eq!(stack.short_addr(), 0);
        assert!(!stack.is_factory_new());
        assert!(stack.pan_id() != 0xFFFF);
    }

    #[test]
    fn test_register_once() {
        let (stack, _rec) = started(Role::Router);
        assert!(matches!(
            stack.device_register(&light_list()),
            Err(BridgeError::InvalidState(_))
        ));
    }

    #[test]
    fn test_write_respects_access() {
        let (stack, _rec) = started(Role::Router);
        // on/off attribute is read/write/reportable in the preset
        assert_eq!(
            stack
                .write_attribute(1, 0x0006, ClusterRole::Server, 0x0000, &[1], true)
                .unwrap(),
            status::SUCCESS
        );
        // zcl version is read-only
        assert_eq!(
            stack
                .write_attribute(1, 0x0000, ClusterRole::Server, 0x0000, &[3], true)
                .unwrap(),
            status::READ_ONLY
        );
        assert!(stack
            .write_attribute(1, 0x0006, ClusterRole::Server, 0x7777, &[1], false)
            .is_err());
    }

    #[test]
    fn test_active_endpoints_remote_and_unknown() {
        let (stack, rec) = started(Role::Coordinator);
        stack.add_remote_node(RemoteNode {
            short_addr: 0x2000,
            endpoints: vec![SimpleDescriptorResponse {
                endpoint: 3,
                profile_id: 0x0104,
                device_id: 0x0302,
                device_version: 1,
                input_clusters: vec![0x0402],
                output_clusters: vec![],
            }],
            ..RemoteNode::default()
        });
        stack.request_active_endpoints(0x2000).unwrap();
        stack.request_active_endpoints(0x3000).unwrap();
        stack.step();
        let active = rec.active.lock();
        assert_eq!(active[0], (zdo_status::SUCCESS, vec![3]));
        assert_eq!(active[1], (zdo_status::DEVICE_NOT_FOUND, vec![]));
    }

    #[test]
    fn test_forced_command_status() {
        let (stack, _rec) = started(Role::Router);
        let target = CommandTarget {
            src_endpoint: 1,
            dst_short_addr: 0x1234,
            dst_endpoint: 1,
        };
        stack.fail_next_command(status::FAILURE);
        let cmd = ZclCommand::RemoveAllGroups;
        assert_eq!(stack.send_command(&target, &cmd).unwrap(), status::FAILURE);
        assert_eq!(stack.send_command(&target, &cmd).unwrap(), status::SUCCESS);
        assert_eq!(stack.sent_commands().len(), 1);
    }
}
