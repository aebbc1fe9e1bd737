//! ZDO discovery payloads: what the stack hands back and the bounded copies
//! kept in the snapshot stores.

use heapless::Vec as HVec;
use log::debug;
use serde::Serialize;

pub const BIND_TABLE_MAX_RECORDS: usize = 8;
pub const ACTIVE_EP_MAX_ENDPOINTS: usize = 16;
pub const SIMPLE_DESC_MAX_CLUSTERS: usize = 16;

/// Binding destination address modes (ZDO).
pub mod bind_addr_mode {
    pub const GROUP: u8 = 0x01;
    pub const EXTENDED: u8 = 0x03;
}

pub type IeeeAddr = [u8; 8];

// ---------------------------------------------------------------------------
// Stack-side responses
// ---------------------------------------------------------------------------

/// One binding table entry as reported by the remote node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingRecord {
    pub src_ieee_addr: IeeeAddr,
    pub src_endpoint: u8,
    pub cluster_id: u16,
    pub dst_addr_mode: u8,
    /// Meaningful when `dst_addr_mode` is [`bind_addr_mode::GROUP`].
    pub dst_short_addr: u16,
    /// Meaningful when `dst_addr_mode` is [`bind_addr_mode::EXTENDED`].
    pub dst_ieee_addr: IeeeAddr,
    pub dst_endpoint: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingTableResponse {
    pub status: u8,
    pub index: u8,
    pub total: u8,
    pub count: u8,
    pub records: Vec<BindingRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeDescriptor {
    pub node_desc_flags: u16,
    pub mac_capability_flags: u8,
    pub manufacturer_code: u16,
    pub max_buf_size: u8,
    pub max_incoming_transfer_size: u16,
    pub server_mask: u16,
    pub max_outgoing_transfer_size: u16,
    pub desc_capability_field: u8,
}

/// Simple descriptor as the stack reports it (unbounded cluster lists).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleDescriptorResponse {
    pub endpoint: u8,
    pub profile_id: u16,
    pub device_id: u16,
    pub device_version: u8,
    pub input_clusters: Vec<u16>,
    pub output_clusters: Vec<u16>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PowerDescriptor {
    pub current_power_mode: u8,
    pub available_power_sources: u8,
    pub current_power_source: u8,
    pub current_power_source_level: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerDescriptorResponse {
    pub status: u8,
    pub nwk_addr_of_interest: u16,
    pub desc: PowerDescriptor,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BindTableEntry {
    pub src_ieee_addr: IeeeAddr,
    pub src_endpoint: u8,
    pub cluster_id: u16,
    pub dst_addr_mode: u8,
    pub dst_short_addr: Option<u16>,
    pub dst_ieee_addr: Option<IeeeAddr>,
    pub dst_endpoint: Option<u8>,
}

impl From<&BindingRecord> for BindTableEntry {
    fn from(rec: &BindingRecord) -> Self {
        let extended = rec.dst_addr_mode == bind_addr_mode::EXTENDED;
        Self {
            src_ieee_addr: rec.src_ieee_addr,
            src_endpoint: rec.src_endpoint,
            cluster_id: rec.cluster_id,
            dst_addr_mode: rec.dst_addr_mode,
            dst_short_addr: (rec.dst_addr_mode == bind_addr_mode::GROUP)
                .then_some(rec.dst_short_addr),
            dst_ieee_addr: extended.then_some(rec.dst_ieee_addr),
            dst_endpoint: extended.then_some(rec.dst_endpoint),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindTableSnapshot {
    pub status: u8,
    pub index: u8,
    pub total: u8,
    pub count: u8,
    pub records: HVec<BindTableEntry, BIND_TABLE_MAX_RECORDS>,
}

impl From<&BindingTableResponse> for BindTableSnapshot {
    fn from(rsp: &BindingTableResponse) -> Self {
        let records: HVec<_, BIND_TABLE_MAX_RECORDS> = rsp
            .records
            .iter()
            .take(BIND_TABLE_MAX_RECORDS)
            .map(BindTableEntry::from)
            .collect();
        if rsp.records.len() > records.len() {
            debug!(
                "[ZDO] binding table truncated: {} of {} records kept",
                records.len(),
                rsp.records.len()
            );
        }
        Self {
            status: rsp.status,
            index: rsp.index,
            total: rsp.total,
            count: rsp.count,
            records,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveEndpointsSnapshot {
    pub status: u8,
    /// Address the request was sent to.
    pub addr: u16,
    pub endpoints: HVec<u8, ACTIVE_EP_MAX_ENDPOINTS>,
}

impl ActiveEndpointsSnapshot {
    pub fn new(status: u8, addr: u16, endpoints: &[u8]) -> Self {
        Self {
            status,
            addr,
            endpoints: endpoints.iter().copied().take(ACTIVE_EP_MAX_ENDPOINTS).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeDescSnapshot {
    pub status: u8,
    pub addr: u16,
    pub desc: Option<NodeDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimpleDescriptor {
    pub endpoint: u8,
    pub profile_id: u16,
    pub device_id: u16,
    /// Low nibble only.
    pub device_version: u8,
    pub input_clusters: HVec<u16, SIMPLE_DESC_MAX_CLUSTERS>,
    pub output_clusters: HVec<u16, SIMPLE_DESC_MAX_CLUSTERS>,
}

impl From<&SimpleDescriptorResponse> for SimpleDescriptor {
    fn from(rsp: &SimpleDescriptorResponse) -> Self {
        Self {
            endpoint: rsp.endpoint,
            profile_id: rsp.profile_id,
            device_id: rsp.device_id,
            device_version: rsp.device_version & 0x0F,
            input_clusters: rsp
                .input_clusters
                .iter()
                .copied()
                .take(SIMPLE_DESC_MAX_CLUSTERS)
                .collect(),
            output_clusters: rsp
                .output_clusters
                .iter()
                .copied()
                .take(SIMPLE_DESC_MAX_CLUSTERS)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimpleDescSnapshot {
    pub status: u8,
    /// Address the request was sent to; the response does not carry it.
    pub addr: u16,
    pub desc: Option<SimpleDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PowerDescSnapshot {
    pub status: u8,
    pub addr: u16,
    pub desc: Option<PowerDescriptor>,
}

impl From<&PowerDescriptorResponse> for PowerDescSnapshot {
    fn from(rsp: &PowerDescriptorResponse) -> Self {
        Self {
            status: rsp.status,
            addr: rsp.nwk_addr_of_interest,
            desc: Some(rsp.desc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(mode: u8) -> BindingRecord {
        BindingRecord {
            src_ieee_addr: [1; 8],
            src_endpoint: 1,
            cluster_id: 0x0006,
            dst_addr_mode: mode,
            dst_short_addr: 0x1234,
            dst_ieee_addr: [9; 8],
            dst_endpoint: 5,
        }
    }

    #[test]
    fn test_bind_entry_group_mode() {
        let entry = BindTableEntry::from(&record(bind_addr_mode::GROUP));
        assert_eq!(entry.dst_short_addr, Some(0x1234));
        assert_eq!(entry.dst_ieee_addr, None);
        assert_eq!(entry.dst_endpoint, None);
    }

    #[test]
    fn test_bind_entry_extended_mode() {
        let entry = BindTableEntry::from(&record(bind_addr_mode::EXTENDED));
        assert_eq!(entry.dst_short_addr, None);
        assert_eq!(entry.dst_ieee_addr, Some([9; 8]));
        assert_eq!(entry.dst_endpoint, Some(5));
    }

    #[test]
    fn test_bind_table_capped() {
        let rsp = BindingTableResponse {
            status: 0,
            index: 0,
            total: 12,
            count: 12,
            records: vec![record(bind_addr_mode::EXTENDED); 12],
        };
        let snap = BindTableSnapshot::from(&rsp);
        assert_eq!(snap.records.len(), BIND_TABLE_MAX_RECORDS);
        assert_eq!(snap.total, 12);
    }

    #[test]
    fn test_active_endpoints_capped() {
        let eps: Vec<u8> = (1..=20).collect();
        let snap = ActiveEndpointsSnapshot::new(0, 0x1111, &eps);
        assert_eq!(snap.endpoints.len(), ACTIVE_EP_MAX_ENDPOINTS);
        assert_eq!(snap.endpoints[15], 16);
    }

    #[test]
    fn test_simple_descriptor_masks_version_and_caps() {
        let rsp = SimpleDescriptorResponse {
            endpoint: 1,
            profile_id: 0x0104,
            device_id: 0x0100,
            device_version: 0xF3,
            input_clusters: (0..20).collect(),
            output_clusters: vec![0x0019],
        };
        let desc = SimpleDescriptor::from(&rsp);
        assert_eq!(desc.device_version, 0x03);
        assert_eq!(desc.input_clusters.len(), SIMPLE_DESC_MAX_CLUSTERS);
        assert_eq!(desc.output_clusters.as_slice(), &[0x0019]);
    }
}
