//! Endpoint/cluster/attribute descriptors handed to the stack at registration.
//!
//! This is the bridge's own representation of a stack "cluster list". It is
//! built up on the host side and passed to
//! [`ZigbeeStack::device_register`](crate::stack::ZigbeeStack::device_register)
//! exactly once.

use crate::error::{BridgeError, Result};
use crate::zcl::{AttrType, ScalarSlot};
use serde::Serialize;
use strum::{Display, FromRepr};

/// Attribute access flags.
pub mod access {
    pub const READ_ONLY: u8 = 0x01;
    pub const WRITE_ONLY: u8 = 0x02;
    pub const READ_WRITE: u8 = 0x03;
    pub const REPORTING: u8 = 0x04;
    pub const SCENE: u8 = 0x10;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, FromRepr, Display, Serialize)]
#[repr(u8)]
pub enum ClusterRole {
    Server = 1,
    Client = 2,
}

impl ClusterRole {
    pub fn from_u8(role: u8) -> Result<Self> {
        Self::from_repr(role)
            .ok_or_else(|| BridgeError::invalid_arg(format!("cluster role {role}")))
    }
}

/// Current value of an attribute as registered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrData {
    Scalar(ScalarSlot),
    /// Length-prefixed character string (first byte is the length).
    Text(Vec<u8>),
}

impl AttrData {
    /// Raw bytes as the stack stores them.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            AttrData::Scalar(slot) => slot.to_bytes().to_vec(),
            AttrData::Text(bytes) => bytes.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeDef {
    pub id: u16,
    pub attr_type: AttrType,
    pub access: u8,
    pub data: AttrData,
}

impl AttributeDef {
    pub fn scalar(id: u16, attr_type: AttrType, access: u8, value: i32) -> Result<Self> {
        Ok(Self {
            id,
            attr_type,
            access,
            data: AttrData::Scalar(ScalarSlot::from_declared(attr_type, value)?),
        })
    }

    pub fn text(id: u16, access: u8, pascal: Vec<u8>) -> Self {
        Self {
            id,
            attr_type: AttrType::CharString,
            access,
            data: AttrData::Text(pascal),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterDef {
    pub id: u16,
    pub role: ClusterRole,
    pub attributes: Vec<AttributeDef>,
}

impl ClusterDef {
    pub fn new(id: u16, role: ClusterRole) -> Self {
        Self {
            id,
            role,
            attributes: Vec::new(),
        }
    }

    pub fn server(id: u16) -> Self {
        Self::new(id, ClusterRole::Server)
    }

    pub fn client(id: u16) -> Self {
        Self::new(id, ClusterRole::Client)
    }

    /// Builder-style scalar attribute. Preset tables only use values that fit.
    pub(crate) fn attr(mut self, id: u16, attr_type: AttrType, access: u8, value: i32) -> Self {
        if let Ok(def) = AttributeDef::scalar(id, attr_type, access, value) {
            self.attributes.push(def);
        }
        self
    }

    pub fn attribute(&self, id: u16) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.id == id)
    }

    /// Replace an existing attribute with the same id or append it.
    pub fn upsert(&mut self, def: AttributeDef) {
        match self.attributes.iter_mut().find(|a| a.id == def.id) {
            Some(existing) => *existing = def,
            None => self.attributes.push(def),
        }
    }
}

/// One endpoint as handed to the stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub endpoint: u8,
    pub profile_id: u16,
    pub device_id: u16,
    pub device_version: u8,
    pub clusters: Vec<ClusterDef>,
}

impl EndpointDescriptor {
    pub fn cluster(&self, id: u16, role: ClusterRole) -> Option<&ClusterDef> {
        self.clusters.iter().find(|c| c.id == id && c.role == role)
    }

    pub fn cluster_mut(&mut self, id: u16, role: ClusterRole) -> Option<&mut ClusterDef> {
        self.clusters.iter_mut().find(|c| c.id == id && c.role == role)
    }
}

/// Device-wide endpoint list, grown one registration at a time.
pub type EndpointList = Vec<EndpointDescriptor>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_u8() {
        assert_eq!(ClusterRole::from_u8(1).unwrap(), ClusterRole::Server);
        assert_eq!(ClusterRole::from_u8(2).unwrap(), ClusterRole::Client);
        assert!(ClusterRole::from_u8(0).is_err());
        assert!(ClusterRole::from_u8(3).is_err());
    }

    #[test]
    fn test_upsert_replaces() {
        let mut cluster = ClusterDef::server(0xFC00).attr(1, AttrType::U8, access::READ_ONLY, 1);
        cluster.upsert(AttributeDef::scalar(1, AttrType::U16, access::READ_WRITE, 500).unwrap());
        cluster.upsert(AttributeDef::scalar(2, AttrType::Bool, access::READ_ONLY, 1).unwrap());
        assert_eq!(cluster.attributes.len(), 2);
        assert_eq!(cluster.attribute(1).unwrap().attr_type, AttrType::U16);
    }

    #[test]
    fn test_text_bytes() {
        let def = AttributeDef::text(5, access::READ_ONLY, vec![2, b'h', b'i']);
        assert_eq!(def.data.to_bytes(), vec![2, b'h', b'i']);
    }
}
