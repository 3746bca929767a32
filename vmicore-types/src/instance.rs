use crate::type_id::TypeId;
use serde::{Deserialize, Serialize};

/// Where an [`Instance`] came from (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceOrigin {
    Variable,
    Member,
    Dereference,
    RuleEngine,
}

/// Runtime triple: address, type, and the dotted name path that reached
/// it. Copy-on-read: instances don't own memory device state, they just
/// describe where to look and how to interpret what's found there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub address: u64,
    pub type_id: TypeId,
    pub name_path: String,
    pub origin: InstanceOrigin,
    pub bit_offset_size: Option<(u16, u16)>,
}

impl Instance {
    pub fn new(address: u64, type_id: TypeId, name_path: impl Into<String>, origin: InstanceOrigin) -> Self {
        Self {
            address,
            type_id,
            name_path: name_path.into(),
            origin,
            bit_offset_size: None,
        }
    }

    pub fn with_bits(mut self, bit_offset: u16, bit_size: u16) -> Self {
        self.bit_offset_size = Some((bit_offset, bit_size));
        self
    }

    pub fn child_path(&self, segment: &str) -> String {
        if self.name_path.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", self.name_path, segment)
        }
    }
}
