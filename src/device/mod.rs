//! Device composition: endpoint presets, vendor registries, basic identity and
//! the registration state machine.

pub mod cluster;
pub mod composition;
pub mod custom;
pub mod identity;
pub mod presets;

pub use cluster::{
    AttrData, AttributeDef, ClusterDef, ClusterRole, EndpointDescriptor, EndpointList, access,
};
pub use composition::{Composer, EndpointDefinition, LOCAL_ENDPOINT_MAX, valid_endpoint_id};
pub use custom::{CUSTOM_ATTR_MAX, CUSTOM_CLUSTER_MAX, CustomRegistry};
pub use identity::{BasicIdentity, PascalString, PowerSource};
pub use presets::EndpointPreset;
