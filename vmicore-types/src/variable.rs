use crate::type_id::TypeId;
use serde::{Deserialize, Serialize};

/// A global or per-cpu variable in the catalog (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub type_id: TypeId,
    pub address: u64,
    pub file_index: u32,
    pub section: Option<String>,
    /// `Some(offsets)` for a per-cpu variable: one address offset per CPU,
    /// applied to `address` at root-enumeration time (SPEC_FULL.md item 3).
    pub percpu_offsets: Option<Vec<u64>>,
}

impl Variable {
    pub fn new(name: impl Into<String>, type_id: TypeId, address: u64, file_index: u32) -> Self {
        Self {
            name: name.into(),
            type_id,
            address,
            file_index,
            section: None,
            percpu_offsets: None,
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_percpu_offsets(mut self, offsets: Vec<u64>) -> Self {
        self.percpu_offsets = Some(offsets);
        self
    }

    pub fn is_percpu(&self) -> bool {
        self.percpu_offsets.is_some()
    }
}
