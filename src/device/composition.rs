//! Device composition and registration state machine.
//!
//! ```text
//! Uninitialized -> Initialized -> { EndpointPending <-> EndpointCommitted }* -> Started
//! ```
//!
//! One endpoint definition may be pending at a time. Registering it folds
//! the preset shell, the custom clusters and the basic identity into an
//! [`EndpointDescriptor`] appended to the device-wide [`EndpointList`]. The
//! list is handed to the stack once, at start. After start the composition is
//! read-only.

use super::cluster::{AttributeDef, ClusterRole, EndpointDescriptor, EndpointList, access};
use super::custom::CustomRegistry;
use super::identity::BasicIdentity;
use super::presets::{EndpointPreset, PRESET_PROFILE};
use crate::error::{BridgeError, Result};
use crate::zcl::AttrType;
use crate::zcl::ids::{basic_attr, cluster};
use heapless::Vec as HVec;
use log::{info, warn};

pub const LOCAL_ENDPOINT_MAX: usize = 24;

/// Valid application endpoint ids are 1..=239.
pub fn valid_endpoint_id(endpoint: u8) -> bool {
    (1..240).contains(&endpoint)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDefinition {
    pub endpoint: u8,
    pub device_id: u16,
    pub profile_id: u16,
    pub preset: EndpointPreset,
}

impl EndpointDefinition {
    /// Generic endpoint with caller-chosen device type and profile.
    pub fn generic(endpoint: u8, device_id: u16, profile_id: u16) -> Self {
        Self {
            endpoint,
            device_id,
            profile_id,
            preset: EndpointPreset::Generic,
        }
    }

    /// Endpoint described entirely by a preset (HA profile).
    pub fn preset(endpoint: u8, preset: EndpointPreset) -> Self {
        Self {
            endpoint,
            device_id: preset.device_id().unwrap_or_default(),
            profile_id: PRESET_PROFILE,
            preset,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !valid_endpoint_id(self.endpoint) {
            return Err(BridgeError::invalid_arg(format!(
                "endpoint {} outside 1..=239",
                self.endpoint
            )));
        }
        if self.profile_id == 0 {
            return Err(BridgeError::invalid_arg("profile id 0"));
        }
        self.preset.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Initialized,
    Started,
}

#[derive(Debug)]
pub struct Composer {
    phase: Phase,
    pending: Option<EndpointDefinition>,
    custom: CustomRegistry,
    identity: Option<(u8, BasicIdentity)>,
    endpoints: EndpointList,
    local_endpoints: HVec<u8, LOCAL_ENDPOINT_MAX>,
    registered: bool,
    committed: bool,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

impl Composer {
    pub fn new() -> Self {
        Self {
            phase: Phase::Uninitialized,
            pending: None,
            custom: CustomRegistry::new(),
            identity: None,
            endpoints: EndpointList::new(),
            local_endpoints: HVec::new(),
            registered: false,
            committed: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.phase != Phase::Uninitialized
    }

    pub fn is_started(&self) -> bool {
        self.phase == Phase::Started
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn mark_initialized(&mut self) {
        if self.phase == Phase::Uninitialized {
            self.phase = Phase::Initialized;
        }
    }

    pub fn mark_started(&mut self) {
        self.phase = Phase::Started;
    }

    fn ensure_mutable(&self) -> Result<()> {
        match self.phase {
            Phase::Uninitialized => Err(BridgeError::invalid_state("not initialised")),
            Phase::Started => Err(BridgeError::invalid_state("device already started")),
            Phase::Initialized => Ok(()),
        }
    }

    /// Stage `def` as the pending endpoint, replacing any unregistered one.
    pub fn define_endpoint(&mut self, def: EndpointDefinition) -> Result<()> {
        self.ensure_mutable()?;
        def.validate()?;
        if let Some(prev) = self.pending.replace(def) {
            warn!(
                "[Core] pending endpoint {} replaced by {} before registration",
                prev.endpoint, def.endpoint
            );
        }
        Ok(())
    }

    pub fn pending(&self) -> Option<&EndpointDefinition> {
        self.pending.as_ref()
    }

    pub fn clear_custom_clusters(&mut self) -> Result<()> {
        if self.is_started() {
            return Err(BridgeError::invalid_state("device already started"));
        }
        self.custom.clear();
        Ok(())
    }

    pub fn add_custom_cluster(&mut self, cluster_id: u16, role: u8) -> Result<()> {
        self.ensure_mutable()?;
        let role = ClusterRole::from_u8(role)?;
        self.custom.add_cluster(cluster_id, role)
    }

    pub fn add_custom_attribute(
        &mut self,
        cluster_id: u16,
        attr_id: u16,
        attr_type: u8,
        access: u8,
        initial_value: i32,
    ) -> Result<()> {
        self.ensure_mutable()?;
        self.custom
            .add_attribute(cluster_id, attr_id, attr_type, access, initial_value)
    }

    pub fn custom(&self) -> &CustomRegistry {
        &self.custom
    }

    /// Store `identity` as the single active identity, scoped to `endpoint`.
    pub fn set_basic_identity(&mut self, endpoint: u8, identity: BasicIdentity) -> Result<()> {
        self.ensure_mutable()?;
        if !valid_endpoint_id(endpoint) {
            return Err(BridgeError::invalid_arg(format!("endpoint {endpoint}")));
        }
        self.identity = Some((endpoint, identity));
        Ok(())
    }

    pub fn identity(&self) -> Option<(u8, &BasicIdentity)> {
        self.identity.as_ref().map(|(ep, id)| (*ep, id))
    }

    /// Fold the pending endpoint into the endpoint list.
    ///
    /// With nothing pending this succeeds only if a device was already
    /// registered. Returns the endpoint id that was committed, if any.
    pub fn register_device(&mut self) -> Result<Option<u8>> {
        self.ensure_mutable()?;
        let Some(def) = self.pending else {
            return if self.registered {
                Ok(None)
            } else {
                Err(BridgeError::invalid_state("no endpoint defined"))
            };
        };
        if self.endpoints.iter().any(|e| e.endpoint == def.endpoint) {
            return Err(BridgeError::invalid_arg(format!(
                "endpoint {} already registered",
                def.endpoint
            )));
        }

        let descriptor = self.build_descriptor(&def)?;
        self.endpoints.push(descriptor);
        if self.local_endpoints.push(def.endpoint).is_err() {
            warn!(
                "[Core] local endpoint table full, endpoint {} not tracked",
                def.endpoint
            );
        }
        self.pending = None;
        self.registered = true;
        self.committed = false;
        info!(
            "[Core] endpoint {} registered ({}, device 0x{:04X})",
            def.endpoint, def.preset, def.device_id
        );
        Ok(Some(def.endpoint))
    }

    fn build_descriptor(&self, def: &EndpointDefinition) -> Result<EndpointDescriptor> {
        let mut descriptor = EndpointDescriptor {
            endpoint: def.endpoint,
            profile_id: def.profile_id,
            device_id: def.device_id,
            device_version: 0,
            clusters: def.preset.clusters(),
        };
        descriptor.clusters.extend(self.custom.build_clusters());

        if let Some((endpoint, identity)) = &self.identity
            && *endpoint == def.endpoint
        {
            apply_identity(&mut descriptor, identity)?;
        }
        Ok(descriptor)
    }

    /// Endpoint list still waiting to be handed to the stack.
    pub fn uncommitted(&self) -> Option<&EndpointList> {
        (self.registered && !self.committed).then_some(&self.endpoints)
    }

    pub fn mark_committed(&mut self) {
        self.committed = true;
    }

    pub fn endpoints(&self) -> &EndpointList {
        &self.endpoints
    }

    pub fn is_local_endpoint(&self, endpoint: u8) -> bool {
        self.local_endpoints.contains(&endpoint)
    }

    pub fn local_endpoints(&self) -> &[u8] {
        &self.local_endpoints
    }
}

fn apply_identity(descriptor: &mut EndpointDescriptor, identity: &BasicIdentity) -> Result<()> {
    let basic = descriptor
        .cluster_mut(cluster::BASIC, ClusterRole::Server)
        .ok_or_else(|| BridgeError::not_found("basic cluster on identity endpoint"))?;

    let ro = access::READ_ONLY;
    basic.upsert(AttributeDef::text(
        basic_attr::MANUFACTURER_NAME,
        ro,
        identity.manufacturer.to_pascal(),
    ));
    basic.upsert(AttributeDef::text(
        basic_attr::MODEL_IDENTIFIER,
        ro,
        identity.model.to_pascal(),
    ));
    if let Some(date_code) = &identity.date_code {
        basic.upsert(AttributeDef::text(basic_attr::DATE_CODE, ro, date_code.to_pascal()));
    }
    if let Some(sw_build_id) = &identity.sw_build_id {
        basic.upsert(AttributeDef::text(
            basic_attr::SW_BUILD_ID,
            ro,
            sw_build_id.to_pascal(),
        ));
    }
    if let Some(power_source) = identity.power_source {
        basic.upsert(AttributeDef::scalar(
            basic_attr::POWER_SOURCE,
            AttrType::Enum8,
            ro,
            power_source as i32,
        )?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::cluster::AttrData;
    use crate::zcl::ids::{PROFILE_HA, device};

    fn initialised() -> Composer {
        let mut c = Composer::new();
        c.mark_initialized();
        c
    }

    #[test]
    fn test_define_requires_init() {
        let mut c = Composer::new();
        let err = c
            .define_endpoint(EndpointDefinition::preset(1, EndpointPreset::OnOffLight))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidState(_)));
    }

    #[test]
    fn test_endpoint_and_profile_validation() {
        let mut c = initialised();
        for ep in [0u8, 240, 255] {
            assert!(matches!(
                c.define_endpoint(EndpointDefinition::generic(ep, 0x0005, PROFILE_HA)),
                Err(BridgeError::InvalidArgument(_))
            ));
        }
        assert!(matches!(
            c.define_endpoint(EndpointDefinition::generic(1, 0x0005, 0)),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(c
            .define_endpoint(EndpointDefinition::generic(239, 0x0005, PROFILE_HA))
            .is_ok());
    }

    #[test]
    fn test_define_overwrites_pending() {
        let mut c = initialised();
        c.define_endpoint(EndpointDefinition::preset(1, EndpointPreset::OnOffLight))
            .unwrap();
        c.define_endpoint(EndpointDefinition::preset(2, EndpointPreset::Thermostat))
            .unwrap();
        assert_eq!(c.pending().unwrap().endpoint, 2);
        assert_eq!(c.pending().unwrap().device_id, device::THERMOSTAT);
    }

    #[test]
    fn test_register_with_custom_attributes() {
        let mut c = initialised();
        c.define_endpoint(EndpointDefinition::generic(10, 0x0007, PROFILE_HA))
            .unwrap();
        for attr in 0..3 {
            c.add_custom_attribute(0xFC42, attr, AttrType::U16.tag(), access::READ_WRITE, 100)
                .unwrap();
        }
        assert_eq!(c.register_device().unwrap(), Some(10));

        let ep = &c.endpoints()[0];
        let vendor: Vec<_> = ep.clusters.iter().filter(|c| c.id == 0xFC42).collect();
        assert_eq!(vendor.len(), 1);
        assert_eq!(vendor[0].role, ClusterRole::Server);
        assert_eq!(vendor[0].attributes.len(), 3);
        assert!(c.is_local_endpoint(10));
        assert!(c.pending().is_none());
    }

    #[test]
    fn test_register_idempotent_when_nothing_pending() {
        let mut c = initialised();
        assert!(matches!(c.register_device(), Err(BridgeError::InvalidState(_))));
        c.define_endpoint(EndpointDefinition::preset(1, EndpointPreset::OnOffLight))
            .unwrap();
        c.register_device().unwrap();
        assert_eq!(c.register_device().unwrap(), None);
        assert_eq!(c.endpoints().len(), 1);
    }

    #[test]
    fn test_multiple_endpoints_accumulate() {
        let mut c = initialised();
        c.define_endpoint(EndpointDefinition::preset(1, EndpointPreset::OnOffLight))
            .unwrap();
        c.register_device().unwrap();
        c.define_endpoint(EndpointDefinition::preset(2, EndpointPreset::TemperatureSensor))
            .unwrap();
        c.register_device().unwrap();
        assert_eq!(c.endpoints().len(), 2);
        assert_eq!(c.local_endpoints(), &[1, 2]);
        assert_eq!(c.uncommitted().map(|l| l.len()), Some(2));
        c.mark_committed();
        assert!(c.uncommitted().is_none());
    }

    #[test]
    fn test_duplicate_endpoint_rejected() {
        let mut c = initialised();
        c.define_endpoint(EndpointDefinition::preset(1, EndpointPreset::OnOffLight))
            .unwrap();
        c.register_device().unwrap();
        c.define_endpoint(EndpointDefinition::preset(1, EndpointPreset::DoorLock))
            .unwrap();
        assert!(matches!(c.register_device(), Err(BridgeError::InvalidArgument(_))));
    }

    #[test]
    fn test_identity_applied_only_to_matching_endpoint() {
        let mut c = initialised();
        let identity =
            BasicIdentity::parse(Some("Acme"), Some("Bulb"), None, Some("1.0"), Some(1)).unwrap();
        c.set_basic_identity(2, identity).unwrap();

        c.define_endpoint(EndpointDefinition::preset(1, EndpointPreset::OnOffLight))
            .unwrap();
        c.register_device().unwrap();
        c.define_endpoint(EndpointDefinition::preset(2, EndpointPreset::OnOffLight))
            .unwrap();
        c.register_device().unwrap();

        let basic1 = c.endpoints()[0].cluster(cluster::BASIC, ClusterRole::Server).unwrap();
        assert!(basic1.attribute(basic_attr::MANUFACTURER_NAME).is_none());

        let basic2 = c.endpoints()[1].cluster(cluster::BASIC, ClusterRole::Server).unwrap();
        assert_eq!(
            basic2.attribute(basic_attr::MANUFACTURER_NAME).unwrap().data,
            AttrData::Text(b"\x04Acme".to_vec())
        );
        assert!(basic2.attribute(basic_attr::DATE_CODE).is_none());
        assert_eq!(
            basic2.attribute(basic_attr::POWER_SOURCE).unwrap().data,
            AttrData::Scalar(crate::zcl::ScalarSlot::U8(1))
        );
    }

    #[test]
    fn test_started_is_read_only() {
        let mut c = initialised();
        c.define_endpoint(EndpointDefinition::preset(1, EndpointPreset::OnOffLight))
            .unwrap();
        c.register_device().unwrap();
        c.mark_started();
        assert!(matches!(
            c.define_endpoint(EndpointDefinition::preset(2, EndpointPreset::OnOffLight)),
            Err(BridgeError::InvalidState(_))
        ));
        assert!(matches!(
            c.add_custom_cluster(0xFC00, 1),
            Err(BridgeError::InvalidState(_))
        ));
        assert!(matches!(c.clear_custom_clusters(), Err(BridgeError::InvalidState(_))));
        assert!(matches!(c.register_device(), Err(BridgeError::InvalidState(_))));
    }

    #[test]
    fn test_clear_custom_allowed_before_init() {
        let mut c = Composer::new();
        assert!(c.clear_custom_clusters().is_ok());
    }

    #[test]
    fn test_invalid_role() {
        let mut c = initialised();
        assert!(matches!(
            c.add_custom_cluster(0xFC00, 3),
            Err(BridgeError::InvalidArgument(_))
        ));
    }
}
