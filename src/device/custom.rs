//! Vendor-specific (custom) cluster and attribute registries.
//!
//! Tables are small and fixed: 6 clusters and 24 attributes, searched
//! linearly. Entry order carries no meaning.

use super::cluster::{AttrData, AttributeDef, ClusterDef, ClusterRole};
use crate::error::{BridgeError, Result};
use crate::zcl::ids::cluster::VENDOR_MIN;
use crate::zcl::{AttrType, ScalarSlot};
use heapless::Vec as HVec;
use log::debug;

pub const CUSTOM_CLUSTER_MAX: usize = 6;
pub const CUSTOM_ATTR_MAX: usize = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CustomCluster {
    pub cluster_id: u16,
    pub role: ClusterRole,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CustomAttribute {
    pub cluster_id: u16,
    pub attr_id: u16,
    pub attr_type: AttrType,
    pub access: u8,
    pub value: ScalarSlot,
}

#[derive(Debug, Default)]
pub struct CustomRegistry {
    clusters: HVec<CustomCluster, CUSTOM_CLUSTER_MAX>,
    attributes: HVec<CustomAttribute, CUSTOM_ATTR_MAX>,
}

pub fn is_vendor_cluster(cluster_id: u16) -> bool {
    cluster_id >= VENDOR_MIN
}

impl CustomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.clusters.clear();
        self.attributes.clear();
    }

    fn has_cluster(&self, cluster_id: u16, role: ClusterRole) -> bool {
        self.clusters
            .iter()
            .any(|c| c.cluster_id == cluster_id && c.role == role)
    }

    /// Declare a vendor cluster. Re-declaring the same (id, role) is a no-op.
    pub fn add_cluster(&mut self, cluster_id: u16, role: ClusterRole) -> Result<()> {
        if !is_vendor_cluster(cluster_id) {
            return Err(BridgeError::invalid_arg(format!(
                "cluster 0x{cluster_id:04X} is not in the vendor range"
            )));
        }
        if self.has_cluster(cluster_id, role) {
            return Ok(());
        }
        self.clusters
            .push(CustomCluster { cluster_id, role })
            .map_err(|_| BridgeError::NoMemory("custom cluster table full".into()))?;
        debug!("[Core] custom cluster 0x{cluster_id:04X} ({role}) declared");
        Ok(())
    }

    /// Declare or overwrite a vendor attribute.
    ///
    /// A cluster with no declaration in either role is created as a server.
    pub fn add_attribute(
        &mut self,
        cluster_id: u16,
        attr_id: u16,
        attr_type: u8,
        access: u8,
        initial_value: i32,
    ) -> Result<()> {
        if !is_vendor_cluster(cluster_id) {
            return Err(BridgeError::invalid_arg(format!(
                "cluster 0x{cluster_id:04X} is not in the vendor range"
            )));
        }
        if access == 0 {
            return Err(BridgeError::invalid_arg("attribute access flags are empty"));
        }
        let ty = AttrType::from_repr(attr_type).ok_or_else(|| {
            BridgeError::NotSupported(format!("custom attribute type 0x{attr_type:02X}"))
        })?;
        let value = ScalarSlot::from_declared(ty, initial_value)?;

        let existing = self
            .attributes
            .iter()
            .position(|a| a.cluster_id == cluster_id && a.attr_id == attr_id);
        if existing.is_none() && self.attributes.is_full() {
            return Err(BridgeError::NoMemory("custom attribute table full".into()));
        }

        if !self.has_cluster(cluster_id, ClusterRole::Server)
            && !self.has_cluster(cluster_id, ClusterRole::Client)
        {
            self.add_cluster(cluster_id, ClusterRole::Server)?;
        }

        let entry = CustomAttribute {
            cluster_id,
            attr_id,
            attr_type: ty,
            access,
            value,
        };
        match existing {
            Some(idx) => self.attributes[idx] = entry,
            None => {
                // capacity checked above
                let _ = self.attributes.push(entry);
            }
        }
        Ok(())
    }

    pub fn clusters(&self) -> &[CustomCluster] {
        &self.clusters
    }

    pub fn attributes(&self) -> &[CustomAttribute] {
        &self.attributes
    }

    /// Materialise every declared cluster with its attributes. Attributes
    /// are keyed by cluster id only, so a cluster declared in both roles
    /// carries them in both.
    pub fn build_clusters(&self) -> Vec<ClusterDef> {
        self.clusters
            .iter()
            .map(|c| {
                let mut def = ClusterDef::new(c.cluster_id, c.role);
                def.attributes = self
                    .attributes
                    .iter()
                    .filter(|a| a.cluster_id == c.cluster_id)
                    .map(|a| AttributeDef {
                        id: a.attr_id,
                        attr_type: a.attr_type,
                        access: a.access,
                        data: AttrData::Scalar(a.value),
                    })
                    .collect();
                def
            })
            .collect()
    }
}
