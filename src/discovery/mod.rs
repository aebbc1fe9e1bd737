//! ZDO discovery snapshots (binding table, active endpoints, node, simple
//! and power descriptors).

pub mod snapshot;
pub mod types;

pub use snapshot::SnapshotStore;
pub use types::{
    ActiveEndpointsSnapshot, BindTableEntry, BindTableSnapshot, BindingRecord,
    BindingTableResponse, IeeeAddr, NodeDescSnapshot, NodeDescriptor, PowerDescSnapshot,
    PowerDescriptor, PowerDescriptorResponse, SimpleDescSnapshot, SimpleDescriptor,
    SimpleDescriptorResponse, bind_addr_mode,
};

/// One store per discovery kind.
pub struct DiscoveryStores {
    pub bind_table: SnapshotStore<BindTableSnapshot>,
    pub active_endpoints: SnapshotStore<ActiveEndpointsSnapshot>,
    pub node_desc: SnapshotStore<NodeDescSnapshot>,
    pub simple_desc: SnapshotStore<SimpleDescSnapshot>,
    pub power_desc: SnapshotStore<PowerDescSnapshot>,
}

impl Default for DiscoveryStores {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryStores {
    pub fn new() -> Self {
        Self {
            bind_table: SnapshotStore::new("binding table"),
            active_endpoints: SnapshotStore::new("active endpoints"),
            node_desc: SnapshotStore::new("node descriptor"),
            simple_desc: SnapshotStore::new("simple descriptor"),
            power_desc: SnapshotStore::new("power descriptor"),
        }
    }

    pub fn clear_all(&self) {
        self.bind_table.clear();
        self.active_endpoints.clear();
        self.node_desc.clear();
        self.simple_desc.clear();
        self.power_desc.clear();
    }
}
