//! The bridge context.
//!
//! [`ZigbeeBridge`] owns every component: the device composer, network and
//! security settings, the event queue, the discovery stores and the network
//! tracker. It drives a [`ZigbeeStack`] and installs itself as the stack's
//! [`StackHandler`] at init.
//!
//! Lock order is stack lock, then composer. The stack thread only touches
//! [`BridgeShared`], never the composer or the stack lock.

use crate::device::{
    BasicIdentity, ClusterRole, Composer, EndpointDefinition, EndpointList, EndpointPreset,
    PascalString, PowerSource, valid_endpoint_id,
};
use crate::discovery::{
    ActiveEndpointsSnapshot, BindTableSnapshot, BindingTableResponse, DiscoveryStores, IeeeAddr,
    NodeDescSnapshot, NodeDescriptor, PowerDescSnapshot, PowerDescriptorResponse,
    SimpleDescSnapshot, SimpleDescriptor, SimpleDescriptorResponse,
};
use crate::error::{BridgeError, Result};
use crate::events::{AttrSetEvent, AttrSource, DispatchRequest, Event, EventQueue, EventStats};
use crate::host::{DrainReport, HostCallbacks, drain_once};
use crate::network::{
    InstallCode, NetworkKey, NetworkRuntime, NetworkSettings, NetworkTracker, Role,
    SecurityConfig, SignalParams, signal_name,
};
use crate::stack::{
    AttrReportMessage, AttrWriteMessage, BindRequest, CommandTarget, CustomCommand, HeapStats,
    OnOffCommand, ReportingConfig, SourceAddress, StackConfig, StackHandler, ZclCommand,
    ZigbeeStack,
};
use crate::zcl::ids::{SHORT_ADDR_BROADCAST, basic_attr, cluster, status};
use crate::zcl::{AttrType, AttrValue, HostValue, ScalarSlot};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Highest level accepted by move-to-level.
pub const LEVEL_MAX: u8 = 254;

#[derive(Debug, Clone, Copy)]
pub struct BridgeOptions {
    /// Bound on waiting for the stack lock.
    pub lock_timeout: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CommissioningPolicy {
    role: Role,
    form_network: bool,
}

/// State shared with the stack thread.
pub struct BridgeShared {
    queue: Arc<EventQueue>,
    tracker: NetworkTracker,
    discovery: DiscoveryStores,
    policy: RwLock<CommissioningPolicy>,
}

impl BridgeShared {
    fn new() -> Self {
        Self {
            queue: Arc::new(EventQueue::new()),
            tracker: NetworkTracker::new(),
            discovery: DiscoveryStores::new(),
            policy: RwLock::new(CommissioningPolicy::default()),
        }
    }

    fn enqueue_attr(
        &self,
        source: Option<AttrSource>,
        endpoint: u8,
        cluster_id: u16,
        attr_id: u16,
        zcl_type: u8,
        data: &[u8],
    ) {
        let value = match AttrValue::decode(zcl_type, data) {
            Ok(value) => value,
            Err(e) => {
                debug!(
                    "[Core] dropping attribute 0x{cluster_id:04X}/0x{attr_id:04X} on endpoint {endpoint}: {e}"
                );
                return;
            }
        };
        self.queue.enqueue(Event::AttrSet(AttrSetEvent {
            source,
            endpoint,
            cluster_id,
            attr_id,
            status: status::SUCCESS as i32,
            value,
        }));
    }
}

impl StackHandler for BridgeShared {
    fn on_signal(&self, stack: &dyn ZigbeeStack, signal: u16, status: i32, params: SignalParams) {
        info!("[Signal] {} status {status}", signal_name(signal));
        self.queue.enqueue(Event::app_signal(signal, status));

        let policy = *self.policy.read();
        let mode = self.tracker.apply_signal(
            signal,
            status,
            params,
            policy.role,
            policy.form_network,
            || stack.is_factory_new(),
        );
        if let Some(mode) = mode
            && let Err(e) = stack.start_commissioning(mode)
        {
            error!("[Signal] failed to start {mode}: {e}");
        }
    }

    fn on_attribute_write(&self, msg: &AttrWriteMessage) {
        if msg.status != status::SUCCESS {
            return;
        }
        self.enqueue_attr(
            None,
            msg.dst_endpoint,
            msg.cluster_id,
            msg.attr_id,
            msg.attr_type,
            &msg.data,
        );
    }

    fn on_attribute_report(&self, msg: &AttrReportMessage) {
        if msg.status != status::SUCCESS {
            return;
        }
        let source = match msg.src_address {
            SourceAddress::Short(short_addr) => Some(AttrSource {
                short_addr,
                endpoint: msg.src_endpoint,
            }),
            SourceAddress::Ieee(_) => None,
        };
        self.enqueue_attr(
            source,
            msg.src_endpoint,
            msg.cluster_id,
            msg.attr_id,
            msg.attr_type,
            &msg.data,
        );
    }

    fn on_binding_table(&self, rsp: &BindingTableResponse) {
        self.discovery.bind_table.store(BindTableSnapshot::from(rsp));
    }

    fn on_active_endpoints(&self, status: u8, endpoints: &[u8]) {
        self.discovery.active_endpoints.store_with(|addr| {
            ActiveEndpointsSnapshot::new(status, addr.unwrap_or(SHORT_ADDR_BROADCAST), endpoints)
        });
    }

    fn on_node_descriptor(&self, status: u8, addr: u16, desc: Option<&NodeDescriptor>) {
        self.discovery.node_desc.store(NodeDescSnapshot {
            status,
            addr,
            desc: desc.copied(),
        });
    }

    fn on_simple_descriptor(&self, status: u8, desc: Option<&SimpleDescriptorResponse>) {
        self.discovery.simple_desc.store_with(|addr| SimpleDescSnapshot {
            status,
            addr: addr.unwrap_or(SHORT_ADDR_BROADCAST),
            desc: desc.map(SimpleDescriptor::from),
        });
    }

    fn on_power_descriptor(&self, rsp: &PowerDescriptorResponse) {
        self.discovery.power_desc.store(PowerDescSnapshot::from(rsp));
    }
}

/// Host-facing entry point to the bridge.
///
/// # Example
/// ```ignore
/// let stack = Arc::new(LoopbackStack::new());
/// let bridge = ZigbeeBridge::new(stack, BridgeOptions::default());
/// bridge.init(Role::Router)?;
/// bridge.define_preset_endpoint(1, EndpointPreset::DimmableLight)?;
/// bridge.register_device()?;
/// bridge.start(false)?;
/// ```
pub struct ZigbeeBridge {
    stack: Arc<dyn ZigbeeStack>,
    shared: Arc<BridgeShared>,
    callbacks: Arc<HostCallbacks>,
    composer: Mutex<Composer>,
    settings: Mutex<NetworkSettings>,
    security: Mutex<SecurityConfig>,
    stack_lock: ReentrantMutex<()>,
    stack_thread: Mutex<Option<JoinHandle<()>>>,
    lock_timeout: Duration,
}

impl ZigbeeBridge {
    pub fn new(stack: Arc<dyn ZigbeeStack>, options: BridgeOptions) -> Self {
        Self {
            stack,
            shared: Arc::new(BridgeShared::new()),
            callbacks: Arc::new(HostCallbacks::new()),
            composer: Mutex::new(Composer::new()),
            settings: Mutex::new(NetworkSettings::default()),
            security: Mutex::new(SecurityConfig::default()),
            stack_lock: ReentrantMutex::new(()),
            stack_thread: Mutex::new(None),
            lock_timeout: options.lock_timeout,
        }
    }

    fn lock_stack(&self) -> Result<ReentrantMutexGuard<'_, ()>> {
        self.stack_lock.try_lock_for(self.lock_timeout).ok_or_else(|| {
            error!(
                "[Core] stack lock not acquired within {} ms",
                self.lock_timeout.as_millis()
            );
            BridgeError::Timeout(format!(
                "stack lock not acquired within {} ms",
                self.lock_timeout.as_millis()
            ))
        })
    }

    fn require_initialized(&self) -> Result<()> {
        if self.composer.lock().is_initialized() {
            Ok(())
        } else {
            Err(BridgeError::invalid_state("not initialised"))
        }
    }

    fn require_started(&self) -> Result<()> {
        if self.composer.lock().is_started() {
            Ok(())
        } else {
            Err(BridgeError::invalid_state("not started"))
        }
    }

    fn require_registered(&self) -> Result<()> {
        if self.composer.lock().is_registered() {
            Ok(())
        } else {
            Err(BridgeError::invalid_state("no device registered"))
        }
    }

    fn require_active(&self) -> Result<()> {
        let composer = self.composer.lock();
        if !composer.is_started() {
            return Err(BridgeError::invalid_state("not started"));
        }
        if !composer.is_registered() {
            return Err(BridgeError::invalid_state("no device registered"));
        }
        Ok(())
    }

    fn require_local_endpoint(&self, endpoint: u8) -> Result<()> {
        if self.composer.lock().is_local_endpoint(endpoint) {
            Ok(())
        } else {
            Err(BridgeError::not_found(format!(
                "endpoint {endpoint} is not a local endpoint"
            )))
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Bring up the stack in `role`. Calling again only updates the role.
    pub fn init(&self, role: Role) -> Result<()> {
        if self.composer.lock().is_initialized() {
            self.shared.policy.write().role = role;
            info!("[Core] already initialised, role now {role}");
            return Ok(());
        }

        let security = *self.security.lock();
        let settings = *self.settings.lock();
        self.stack.set_handler(self.shared.clone());
        self.stack
            .init(&StackConfig::for_role(role, security.install_code_policy))?;

        {
            let _stack = self.lock_stack()?;
            if let Some(ext_pan_id) = settings.extended_pan_id {
                self.stack.set_extended_pan_id(ext_pan_id);
            }
            if let Some(pan_id) = settings.pan_id {
                self.stack.set_pan_id(pan_id);
            }
            self.stack.set_primary_channel_mask(settings.channel_mask)?;
            self.stack
                .set_install_code_policy(security.install_code_policy)?;
            self.stack.set_network_security(security.network_security)?;
            if let Some(key) = &security.network_key {
                self.stack.set_network_key(key)?;
            }
        }

        self.shared.policy.write().role = role;
        self.composer.lock().mark_initialized();
        info!("[Core] initialised as {role}");
        Ok(())
    }

    /// Hand the registered device to the stack, start it and spawn the stack
    /// thread. `form_network` only matters for a coordinator.
    pub fn start(&self, form_network: bool) -> Result<()> {
        {
            let composer = self.composer.lock();
            if !composer.is_initialized() {
                return Err(BridgeError::invalid_state("not initialised"));
            }
            if composer.is_started() {
                return Ok(());
            }
        }

        self.shared.policy.write().form_network = form_network;
        self.shared.tracker.reset();
        self.shared.discovery.clear_all();

        {
            let _stack = self.lock_stack()?;
            let mut composer = self.composer.lock();
            if let Some(endpoints) = composer.uncommitted() {
                self.stack.device_register(endpoints)?;
                composer.mark_committed();
                info!(
                    "[Core] {} endpoint(s) handed to the stack",
                    composer.endpoints().len()
                );
            }
            self.stack.start().inspect_err(|e| {
                error!("[Core] stack start failed: {e}");
            })?;
        }

        {
            let mut thread = self.stack_thread.lock();
            if thread.is_none() {
                let stack = self.stack.clone();
                let handle = std::thread::Builder::new()
                    .name("zigbee-stack".into())
                    .spawn(move || stack.run())?;
                *thread = Some(handle);
            }
        }

        self.composer.lock().mark_started();
        info!("[Core] started (form_network: {form_network})");
        Ok(())
    }

    /// Stop the stack thread. The bridge cannot be restarted afterwards.
    pub fn shutdown(&self) {
        self.stack.shutdown();
        if let Some(handle) = self.stack_thread.lock().take()
            && handle.join().is_err()
        {
            error!("[Core] stack thread panicked");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.composer.lock().is_initialized()
    }

    pub fn is_started(&self) -> bool {
        self.composer.lock().is_started()
    }

    pub fn role(&self) -> Role {
        self.shared.policy.read().role
    }

    // ------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------

    pub fn define_endpoint(&self, endpoint: u8, device_id: u16, profile_id: u16) -> Result<()> {
        self.composer
            .lock()
            .define_endpoint(EndpointDefinition::generic(endpoint, device_id, profile_id))
    }

    pub fn define_preset_endpoint(&self, endpoint: u8, preset: EndpointPreset) -> Result<()> {
        self.composer
            .lock()
            .define_endpoint(EndpointDefinition::preset(endpoint, preset))
    }

    pub fn clear_custom_clusters(&self) -> Result<()> {
        self.composer.lock().clear_custom_clusters()
    }

    pub fn add_custom_cluster(&self, cluster_id: u16, role: u8) -> Result<()> {
        self.composer.lock().add_custom_cluster(cluster_id, role)
    }

    pub fn add_custom_attribute(
        &self,
        cluster_id: u16,
        attr_id: u16,
        attr_type: u8,
        access: u8,
        initial_value: i32,
    ) -> Result<()> {
        self.composer
            .lock()
            .add_custom_attribute(cluster_id, attr_id, attr_type, access, initial_value)
    }

    pub fn set_basic_identity(&self, endpoint: u8, identity: BasicIdentity) -> Result<()> {
        self.composer.lock().set_basic_identity(endpoint, identity)
    }

    /// Read the basic cluster identity of a local endpoint.
    ///
    /// Values come from the stack once the device is committed, otherwise
    /// from the endpoint list waiting to be committed.
    pub fn get_basic_identity(&self, endpoint: u8) -> Result<BasicIdentity> {
        self.require_registered()?;
        if !valid_endpoint_id(endpoint) {
            return Err(BridgeError::invalid_arg(format!("endpoint {endpoint}")));
        }
        let _stack = self.lock_stack()?;

        let manufacturer = self.read_basic(endpoint, basic_attr::MANUFACTURER_NAME)?;
        let model = self.read_basic(endpoint, basic_attr::MODEL_IDENTIFIER)?;
        let date_code = self.read_basic_optional(endpoint, basic_attr::DATE_CODE)?;
        let sw_build_id = self.read_basic_optional(endpoint, basic_attr::SW_BUILD_ID)?;

        let (tag, data) = self.read_basic_raw(endpoint, basic_attr::POWER_SOURCE)?;
        if tag != AttrType::Enum8.tag() && tag != AttrType::U8.tag() {
            return Err(BridgeError::invalid_arg(format!(
                "power source attribute has type 0x{tag:02X}"
            )));
        }
        let power_source = data
            .first()
            .copied()
            .map(PowerSource::from_u8)
            .transpose()?;

        Ok(BasicIdentity {
            manufacturer: PascalString::from_pascal(&manufacturer)?,
            model: PascalString::from_pascal(&model)?,
            date_code: date_code
                .map(|b| PascalString::from_pascal(&b))
                .transpose()?
                .filter(|s| !s.is_empty()),
            sw_build_id: sw_build_id
                .map(|b| PascalString::from_pascal(&b))
                .transpose()?
                .filter(|s| !s.is_empty()),
            power_source,
        })
    }

    fn read_basic_raw(&self, endpoint: u8, attr_id: u16) -> Result<(u8, Vec<u8>)> {
        let composer = self.composer.lock();
        if composer.is_committed() {
            return self
                .stack
                .read_attribute(endpoint, cluster::BASIC, ClusterRole::Server, attr_id);
        }
        composer
            .endpoints()
            .iter()
            .find(|e| e.endpoint == endpoint)
            .and_then(|e| e.cluster(cluster::BASIC, ClusterRole::Server))
            .and_then(|c| c.attribute(attr_id))
            .map(|a| (a.attr_type.tag(), a.data.to_bytes()))
            .ok_or_else(|| {
                BridgeError::not_found(format!(
                    "basic attribute 0x{attr_id:04X} on endpoint {endpoint}"
                ))
            })
    }

    fn read_basic(&self, endpoint: u8, attr_id: u16) -> Result<Vec<u8>> {
        self.read_basic_raw(endpoint, attr_id).map(|(_, data)| data)
    }

    fn read_basic_optional(&self, endpoint: u8, attr_id: u16) -> Result<Option<Vec<u8>>> {
        match self.read_basic(endpoint, attr_id) {
            Ok(data) => Ok(Some(data)),
            Err(BridgeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Commit the pending endpoint definition. Returns the endpoint id that
    /// was committed, or `None` when nothing was pending.
    pub fn register_device(&self) -> Result<Option<u8>> {
        let _stack = self.lock_stack()?;
        self.composer.lock().register_device()
    }

    /// Endpoint list as registered so far.
    pub fn endpoints(&self) -> EndpointList {
        self.composer.lock().endpoints().clone()
    }

    pub fn local_endpoints(&self) -> Vec<u8> {
        self.composer.lock().local_endpoints().to_vec()
    }

    // ------------------------------------------------------------------
    // Local attributes
    // ------------------------------------------------------------------

    pub fn get_attribute(
        &self,
        endpoint: u8,
        cluster_id: u16,
        role: ClusterRole,
        attr_id: u16,
    ) -> Result<AttrValue> {
        self.require_registered()?;
        self.require_local_endpoint(endpoint)?;
        let _stack = self.lock_stack()?;
        let (tag, data) = self
            .stack
            .read_attribute(endpoint, cluster_id, role, attr_id)?;
        AttrValue::decode(tag, &data)
    }

    /// Write a local attribute and queue an attribute event on success.
    pub fn set_attribute(
        &self,
        endpoint: u8,
        cluster_id: u16,
        role: ClusterRole,
        attr_id: u16,
        value: HostValue,
        check: bool,
    ) -> Result<()> {
        self.require_registered()?;
        self.require_local_endpoint(endpoint)?;
        let stored = {
            let _stack = self.lock_stack()?;
            let (tag, _) = self
                .stack
                .read_attribute(endpoint, cluster_id, role, attr_id)?;
            let ty = AttrType::from_repr(tag).ok_or_else(|| {
                BridgeError::NotSupported(format!("attribute type 0x{tag:02X}"))
            })?;
            let encoded = AttrValue::from_host(ty, value)?.encode()?;
            let zcl_status = self.stack.write_attribute(
                endpoint, cluster_id, role, attr_id, &encoded, check,
            )?;
            if zcl_status != status::SUCCESS {
                warn!(
                    "[Core] write 0x{cluster_id:04X}/0x{attr_id:04X} on endpoint {endpoint} rejected: 0x{zcl_status:02X}"
                );
                return Err(BridgeError::ProtocolStatus(zcl_status));
            }
            let (tag, data) = self
                .stack
                .read_attribute(endpoint, cluster_id, role, attr_id)?;
            AttrValue::decode(tag, &data)?
        };

        self.shared.queue.enqueue(Event::AttrSet(AttrSetEvent {
            source: None,
            endpoint,
            cluster_id,
            attr_id,
            status: status::SUCCESS as i32,
            value: stored,
        }));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    /// Configure attribute reporting on a remote node.
    ///
    /// Without `reportable_change`, analog types report on any change (a zero
    /// threshold) and discrete types carry no threshold.
    #[allow(clippy::too_many_arguments)]
    pub fn configure_reporting(
        &self,
        target: CommandTarget,
        cluster_id: u16,
        attr_id: u16,
        attr_type: u8,
        min_interval_s: u16,
        max_interval_s: u16,
        reportable_change: Option<i32>,
    ) -> Result<()> {
        self.require_active()?;
        validate_target(&target)?;
        let threshold = match (AttrType::from_repr(attr_type), reportable_change) {
            (Some(AttrType::Bool) | None, Some(_)) => {
                return Err(BridgeError::NotSupported(format!(
                    "reportable change for attribute type 0x{attr_type:02X}"
                )));
            }
            (Some(ty), Some(change)) => Some(ScalarSlot::from_declared(ty, change)?.to_bytes()),
            (Some(AttrType::Bool) | None, None) => None,
            (Some(ty), None) => ScalarSlot::zero(ty).ok().map(|zero| zero.to_bytes()),
        };

        let config = ReportingConfig {
            target,
            cluster_id,
            attr_id,
            attr_type,
            min_interval_s,
            max_interval_s,
            reportable_change: threshold,
        };
        let _stack = self.lock_stack()?;
        self.stack.configure_reporting(&config)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    fn send(&self, target: CommandTarget, command: ZclCommand) -> Result<()> {
        self.require_active()?;
        validate_target(&target)?;
        let _stack = self.lock_stack()?;
        let zcl_status = self.stack.send_command(&target, &command)?;
        if zcl_status != status::SUCCESS {
            return Err(BridgeError::Stack(format!(
                "command to 0x{:04X} rejected with status 0x{zcl_status:02X}",
                target.dst_short_addr
            )));
        }
        debug!(
            "[Core] command sent to 0x{:04X}/{}: {command:?}",
            target.dst_short_addr, target.dst_endpoint
        );
        Ok(())
    }

    /// `cmd`: 0 off, 1 on, 2 toggle.
    pub fn send_on_off(&self, target: CommandTarget, cmd: u8) -> Result<()> {
        let cmd = OnOffCommand::from_u8(cmd)?;
        self.send(target, ZclCommand::OnOff(cmd))
    }

    pub fn send_level(
        &self,
        target: CommandTarget,
        level: u8,
        transition_ds: u16,
        with_on_off: bool,
    ) -> Result<()> {
        if level > LEVEL_MAX {
            return Err(BridgeError::invalid_arg(format!(
                "level {level} above {LEVEL_MAX}"
            )));
        }
        self.send(
            target,
            ZclCommand::MoveToLevel {
                level,
                transition_ds,
                with_on_off,
            },
        )
    }

    pub fn send_color_move_to_xy(
        &self,
        target: CommandTarget,
        x: u16,
        y: u16,
        transition_ds: u16,
    ) -> Result<()> {
        self.send(target, ZclCommand::MoveToColor { x, y, transition_ds })
    }

    pub fn send_color_move_to_temperature(
        &self,
        target: CommandTarget,
        mireds: u16,
        transition_ds: u16,
    ) -> Result<()> {
        self.send(
            target,
            ZclCommand::MoveToColorTemperature {
                mireds,
                transition_ds,
            },
        )
    }

    pub fn send_lock_command(&self, target: CommandTarget, lock: bool) -> Result<()> {
        self.send(target, ZclCommand::DoorLock { lock })
    }

    pub fn send_group_add(&self, target: CommandTarget, group_id: u16) -> Result<()> {
        self.send(target, ZclCommand::AddGroup { group_id })
    }

    pub fn send_group_remove(&self, target: CommandTarget, group_id: u16) -> Result<()> {
        self.send(target, ZclCommand::RemoveGroup { group_id })
    }

    pub fn send_group_remove_all(&self, target: CommandTarget) -> Result<()> {
        self.send(target, ZclCommand::RemoveAllGroups)
    }

    pub fn send_scene_add(
        &self,
        target: CommandTarget,
        group_id: u16,
        scene_id: u8,
        transition_ds: u16,
    ) -> Result<()> {
        self.send(
            target,
            ZclCommand::AddScene {
                group_id,
                scene_id,
                transition_ds,
            },
        )
    }

    pub fn send_scene_remove(&self, target: CommandTarget, group_id: u16, scene_id: u8) -> Result<()> {
        self.send(target, ZclCommand::RemoveScene { group_id, scene_id })
    }

    pub fn send_scene_remove_all(&self, target: CommandTarget, group_id: u16) -> Result<()> {
        self.send(target, ZclCommand::RemoveAllScenes { group_id })
    }

    pub fn send_scene_recall(&self, target: CommandTarget, group_id: u16, scene_id: u8) -> Result<()> {
        self.send(target, ZclCommand::RecallScene { group_id, scene_id })
    }

    pub fn send_custom_command(&self, target: CommandTarget, command: CustomCommand) -> Result<()> {
        if command.cluster_id < cluster::VENDOR_MIN {
            return Err(BridgeError::invalid_arg(format!(
                "cluster 0x{:04X} is not in the vendor range",
                command.cluster_id
            )));
        }
        if command.profile_id == 0 {
            return Err(BridgeError::invalid_arg("profile id 0"));
        }
        self.send(target, ZclCommand::Custom(command))
    }

    pub fn send_bind(&self, req: BindRequest) -> Result<()> {
        self.bind_request(req, true)
    }

    pub fn send_unbind(&self, req: BindRequest) -> Result<()> {
        self.bind_request(req, false)
    }

    fn bind_request(&self, req: BindRequest, bind: bool) -> Result<()> {
        self.require_active()?;
        if !valid_endpoint_id(req.src_endpoint) || !valid_endpoint_id(req.dst_endpoint) {
            return Err(BridgeError::invalid_arg(format!(
                "bind endpoints {} -> {}",
                req.src_endpoint, req.dst_endpoint
            )));
        }
        if req.req_dst_short_addr == SHORT_ADDR_BROADCAST {
            return Err(BridgeError::invalid_arg("bind request to broadcast address"));
        }
        let _stack = self.lock_stack()?;
        if bind {
            self.stack.bind(&req)
        } else {
            self.stack.unbind(&req)
        }
    }

    // ------------------------------------------------------------------
    // OTA client controls
    // ------------------------------------------------------------------

    pub fn ota_client_control_supported(&self) -> bool {
        false
    }

    pub fn ota_client_query_interval_set(&self, endpoint: u8, interval_min: u16) -> Result<()> {
        self.require_active()?;
        if !valid_endpoint_id(endpoint) || interval_min == 0 {
            return Err(BridgeError::invalid_arg(format!(
                "OTA query interval {interval_min} min on endpoint {endpoint}"
            )));
        }
        Err(ota_unsupported())
    }

    pub fn ota_client_query_image_req(&self, server_endpoint: u8, server_addr: u16) -> Result<()> {
        self.require_active()?;
        if !valid_endpoint_id(server_endpoint) || server_addr == SHORT_ADDR_BROADCAST {
            return Err(BridgeError::invalid_arg(format!(
                "OTA server 0x{server_addr:04X}/{server_endpoint}"
            )));
        }
        Err(ota_unsupported())
    }

    pub fn ota_client_query_image_stop(&self) -> Result<()> {
        self.require_active()?;
        Err(ota_unsupported())
    }

    // ------------------------------------------------------------------
    // Security
    // ------------------------------------------------------------------

    pub fn set_install_code_policy(&self, enabled: bool) -> Result<()> {
        if self.is_initialized() {
            let _stack = self.lock_stack()?;
            self.stack.set_install_code_policy(enabled)?;
        }
        self.security.lock().install_code_policy = enabled;
        Ok(())
    }

    pub fn install_code_policy(&self) -> bool {
        self.security.lock().install_code_policy
    }

    pub fn set_network_security_enabled(&self, enabled: bool) -> Result<()> {
        if self.is_initialized() {
            let _stack = self.lock_stack()?;
            self.stack.set_network_security(enabled)?;
        }
        self.security.lock().network_security = enabled;
        Ok(())
    }

    pub fn network_security_enabled(&self) -> Result<bool> {
        if !self.is_initialized() {
            return Ok(self.security.lock().network_security);
        }
        let _stack = self.lock_stack()?;
        Ok(self.stack.network_security_enabled())
    }

    /// Set the network key. Before init it is remembered and applied at init.
    pub fn set_network_key(&self, key: NetworkKey) -> Result<()> {
        if self.is_initialized() {
            let _stack = self.lock_stack()?;
            self.stack.set_network_key(&key)?;
        }
        self.security.lock().network_key = Some(key);
        Ok(())
    }

    pub fn primary_network_key(&self) -> Result<NetworkKey> {
        self.require_started()?;
        let _stack = self.lock_stack()?;
        self.stack.primary_network_key()
    }

    pub fn switch_network_key(&self, key: NetworkKey, seq: u8) -> Result<()> {
        self.require_started()?;
        let _stack = self.lock_stack()?;
        self.stack.switch_network_key(&key, seq)
    }

    pub fn broadcast_network_key(&self, key: NetworkKey, seq: u8) -> Result<()> {
        self.require_started()?;
        let _stack = self.lock_stack()?;
        self.stack.broadcast_network_key(&key, seq)
    }

    pub fn broadcast_network_key_switch(&self, seq: u8) -> Result<()> {
        self.require_started()?;
        let _stack = self.lock_stack()?;
        self.stack.broadcast_network_key_switch(seq)
    }

    pub fn add_install_code(&self, ieee_addr: IeeeAddr, code: &str) -> Result<()> {
        self.require_initialized()?;
        let code = InstallCode::new(code)?;
        let _stack = self.lock_stack()?;
        self.stack.add_install_code(&ieee_addr, &code)
    }

    pub fn set_local_install_code(&self, code: &str) -> Result<()> {
        self.require_initialized()?;
        let code = InstallCode::new(code)?;
        let _stack = self.lock_stack()?;
        self.stack.set_local_install_code(&code)
    }

    pub fn remove_install_code(&self, ieee_addr: IeeeAddr) -> Result<()> {
        self.require_initialized()?;
        let _stack = self.lock_stack()?;
        self.stack.remove_install_code(&ieee_addr)
    }

    pub fn remove_all_install_codes(&self) -> Result<()> {
        self.require_initialized()?;
        let _stack = self.lock_stack()?;
        self.stack.remove_all_install_codes()
    }

    // ------------------------------------------------------------------
    // Network settings and runtime
    // ------------------------------------------------------------------

    pub fn set_primary_channel_mask(&self, mask: u32) -> Result<()> {
        self.settings.lock().set_channel_mask(mask)?;
        if self.is_initialized() {
            let _stack = self.lock_stack()?;
            self.stack.set_primary_channel_mask(mask)?;
        }
        Ok(())
    }

    pub fn set_pan_id(&self, pan_id: u16) -> Result<()> {
        self.settings.lock().set_pan_id(pan_id)?;
        if self.is_initialized() {
            let _stack = self.lock_stack()?;
            self.stack.set_pan_id(pan_id);
        }
        Ok(())
    }

    pub fn set_extended_pan_id(&self, ext_pan_id: [u8; 8]) -> Result<()> {
        self.settings.lock().extended_pan_id = Some(ext_pan_id);
        if self.is_initialized() {
            let _stack = self.lock_stack()?;
            self.stack.set_extended_pan_id(ext_pan_id);
        }
        Ok(())
    }

    pub fn network_settings(&self) -> NetworkSettings {
        *self.settings.lock()
    }

    pub fn enable_wifi_i154_coex(&self) -> Result<()> {
        self.stack.enable_wifi_coex()
    }

    pub fn permit_join(&self, duration_s: u8) -> Result<()> {
        self.require_started()?;
        let _stack = self.lock_stack()?;
        self.stack.open_network(duration_s)?;
        info!("[Core] permit join for {duration_s} s");
        Ok(())
    }

    pub fn start_network_steering(&self) -> Result<()> {
        self.require_started()?;
        let _stack = self.lock_stack()?;
        self.stack
            .start_commissioning(crate::network::CommissioningMode::Steering)
    }

    pub fn network_runtime(&self) -> Result<NetworkRuntime> {
        self.require_started()?;
        let (channel, pan_id, extended_pan_id, short_addr) = {
            let _stack = self.lock_stack()?;
            (
                self.stack.current_channel(),
                self.stack.pan_id(),
                self.stack.extended_pan_id(),
                self.stack.short_addr(),
            )
        };
        let (formed, joined) = self.shared.tracker.flags();
        Ok(NetworkRuntime {
            channel,
            pan_id,
            extended_pan_id,
            short_addr,
            formed,
            joined,
        })
    }

    pub fn short_addr(&self) -> Result<u16> {
        self.require_started()?;
        let _stack = self.lock_stack()?;
        Ok(self.stack.short_addr())
    }

    pub fn ieee_addr(&self) -> Result<IeeeAddr> {
        self.require_started()?;
        let _stack = self.lock_stack()?;
        Ok(self.stack.ieee_addr())
    }

    pub fn last_joined_short_addr(&self) -> Result<u16> {
        self.require_started()?;
        self.shared
            .tracker
            .last_joined()
            .ok_or_else(|| BridgeError::not_found("no device has joined"))
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    fn begin_discovery(&self, dst_short_addr: u16) -> Result<ReentrantMutexGuard<'_, ()>> {
        self.require_started()?;
        if dst_short_addr == SHORT_ADDR_BROADCAST {
            return Err(BridgeError::invalid_arg("discovery request to broadcast address"));
        }
        self.lock_stack()
    }

    pub fn request_binding_table(&self, dst_short_addr: u16, start_index: u8) -> Result<()> {
        let _stack = self.begin_discovery(dst_short_addr)?;
        self.shared.discovery.bind_table.begin_request(dst_short_addr);
        self.stack.request_binding_table(dst_short_addr, start_index)
    }

    pub fn request_active_endpoints(&self, dst_short_addr: u16) -> Result<()> {
        let _stack = self.begin_discovery(dst_short_addr)?;
        self.shared
            .discovery
            .active_endpoints
            .begin_request(dst_short_addr);
        self.stack.request_active_endpoints(dst_short_addr)
    }

    pub fn request_node_descriptor(&self, dst_short_addr: u16) -> Result<()> {
        let _stack = self.begin_discovery(dst_short_addr)?;
        self.shared.discovery.node_desc.begin_request(dst_short_addr);
        self.stack.request_node_descriptor(dst_short_addr)
    }

    pub fn request_simple_descriptor(&self, dst_short_addr: u16, endpoint: u8) -> Result<()> {
        if !valid_endpoint_id(endpoint) {
            return Err(BridgeError::invalid_arg(format!("endpoint {endpoint}")));
        }
        let _stack = self.begin_discovery(dst_short_addr)?;
        self.shared.discovery.simple_desc.begin_request(dst_short_addr);
        self.stack.request_simple_descriptor(dst_short_addr, endpoint)
    }

    pub fn request_power_descriptor(&self, dst_short_addr: u16) -> Result<()> {
        let _stack = self.begin_discovery(dst_short_addr)?;
        self.shared.discovery.power_desc.begin_request(dst_short_addr);
        self.stack.request_power_descriptor(dst_short_addr)
    }

    pub fn binding_table_snapshot(&self) -> Result<BindTableSnapshot> {
        self.require_started()?;
        self.shared.discovery.bind_table.get()
    }

    pub fn active_endpoints_snapshot(&self) -> Result<ActiveEndpointsSnapshot> {
        self.require_started()?;
        self.shared.discovery.active_endpoints.get()
    }

    pub fn node_descriptor_snapshot(&self) -> Result<NodeDescSnapshot> {
        self.require_started()?;
        self.shared.discovery.node_desc.get()
    }

    pub fn simple_descriptor_snapshot(&self) -> Result<SimpleDescSnapshot> {
        self.require_started()?;
        self.shared.discovery.simple_desc.get()
    }

    pub fn power_descriptor_snapshot(&self) -> Result<PowerDescSnapshot> {
        self.require_started()?;
        self.shared.discovery.power_desc.get()
    }

    // ------------------------------------------------------------------
    // Host side
    // ------------------------------------------------------------------

    pub fn callbacks(&self) -> &Arc<HostCallbacks> {
        &self.callbacks
    }

    pub fn event_queue(&self) -> &Arc<EventQueue> {
        &self.shared.queue
    }

    pub fn set_dispatch_request(&self, request: Option<DispatchRequest>) {
        self.shared.queue.set_dispatch_request(request);
    }

    /// One drain pass; the entry point the host scheduler runs.
    pub fn dispatch_events(&self) -> DrainReport {
        drain_once(&self.shared.queue, &self.callbacks)
    }

    pub fn event_stats(&self) -> EventStats {
        self.shared.queue.stats()
    }

    pub fn heap_stats(&self) -> HeapStats {
        self.stack.heap_stats()
    }
}

impl Drop for ZigbeeBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn validate_target(target: &CommandTarget) -> Result<()> {
    if !valid_endpoint_id(target.src_endpoint) || !valid_endpoint_id(target.dst_endpoint) {
        return Err(BridgeError::invalid_arg(format!(
            "endpoints {} -> {}",
            target.src_endpoint, target.dst_endpoint
        )));
    }
    Ok(())
}

fn ota_unsupported() -> BridgeError {
    BridgeError::NotSupported("OTA client controls".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Signal;
    use crate::stack::LoopbackStack;

    fn bridge() -> (Arc<LoopbackStack>, ZigbeeBridge) {
        let stack = Arc::new(LoopbackStack::manual());
        let bridge = ZigbeeBridge::new(stack.clone(), BridgeOptions::default());
        (stack, bridge)
    }

    #[test]
    fn test_define_before_init_rejected() {
        let (_stack, bridge) = bridge();
        assert!(matches!(
            bridge.define_preset_endpoint(1, EndpointPreset::OnOffLight),
            Err(BridgeError::InvalidState(_))
        ));
    }

    #[test]
    fn test_init_twice_updates_role() {
        let (_stack, bridge) = bridge();
        bridge.init(Role::Router).unwrap();
        bridge.init(Role::EndDevice).unwrap();
        assert_eq!(bridge.role(), Role::EndDevice);
    }

    #[test]
    fn test_start_requires_init() {
        let (_stack, bridge) = bridge();
        assert!(matches!(bridge.start(false), Err(BridgeError::InvalidState(_))));
    }

    #[test]
    fn test_pre_init_settings_applied() {
        let (stack, bridge) = bridge();
        bridge.set_primary_channel_mask(1 << 20).unwrap();
        bridge.set_pan_id(0x1A62).unwrap();
        bridge.set_install_code_policy(true).unwrap();
        bridge.init(Role::Coordinator).unwrap();
        assert_eq!(stack.channel_mask(), 1 << 20);
        assert_eq!(stack.pan_id(), 0x1A62);
        assert!(stack.install_policy());
    }

    #[test]
    fn test_invalid_network_settings() {
        let (_stack, bridge) = bridge();
        assert!(bridge.set_pan_id(0xFFFF).is_err());
        assert!(bridge.set_pan_id(0).is_err());
        assert!(bridge.set_primary_channel_mask(0).is_err());
        assert!(bridge.set_primary_channel_mask(1).is_err());
    }

    #[test]
    fn test_signal_before_start_is_queued() {
        let (_stack, bridge) = bridge();
        bridge.shared.on_signal(
            &*bridge.stack,
            Signal::DeviceAnnce.id(),
            0,
            SignalParams::DeviceAnnounce { short_addr: 0x4321 },
        );
        assert_eq!(bridge.event_stats().enqueued, 1);
        assert_eq!(bridge.shared.tracker.last_joined(), Some(0x4321));
    }

    #[test]
    fn test_report_source_only_for_short_address() {
        let (_stack, bridge) = bridge();
        let mut msg = AttrReportMessage {
            status: 0,
            src_address: SourceAddress::Short(0x2222),
            src_endpoint: 4,
            dst_endpoint: 1,
            cluster_id: 0x0402,
            attr_id: 0,
            attr_type: AttrType::S16.tag(),
            data: (-125i16).to_le_bytes().to_vec(),
        };
        bridge.shared.on_attribute_report(&msg);
        msg.src_address = SourceAddress::Ieee([1; 8]);
        bridge.shared.on_attribute_report(&msg);
        msg.status = 1;
        bridge.shared.on_attribute_report(&msg);

        let queue = bridge.event_queue();
        let Some(Event::AttrSet(first)) = queue.pop() else {
            panic!("expected attribute event");
        };
        assert_eq!(
            first.source,
            Some(AttrSource {
                short_addr: 0x2222,
                endpoint: 4
            })
        );
        assert_eq!(first.endpoint, 4);
        assert_eq!(first.value.int_value, -125);
        let Some(Event::AttrSet(second)) = queue.pop() else {
            panic!("expected attribute event");
        };
        assert_eq!(second.source, None);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_undecodable_write_dropped() {
        let (_stack, bridge) = bridge();
        bridge.shared.on_attribute_write(&AttrWriteMessage {
            status: 0,
            dst_endpoint: 1,
            cluster_id: 0x0000,
            attr_id: 0x0005,
            attr_type: AttrType::CharString.tag(),
            data: vec![1, b'x'],
        });
        assert_eq!(bridge.event_stats().enqueued, 0);
    }

    #[test]
    fn test_lock_timeout() {
        let stack = Arc::new(LoopbackStack::manual());
        let bridge = Arc::new(ZigbeeBridge::new(
            stack,
            BridgeOptions {
                lock_timeout: Duration::from_millis(20),
            },
        ));
        bridge.init(Role::Router).unwrap();
        let holder = bridge.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let t = std::thread::spawn(move || {
            let _guard = holder.stack_lock.lock();
            tx.send(()).unwrap();
            let _ = done_rx.recv();
        });
        rx.recv().unwrap();
        assert!(matches!(
            bridge.set_pan_id(0x1234),
            Err(BridgeError::Timeout(_))
        ));
        done_tx.send(()).unwrap();
        t.join().unwrap();
    }
}
