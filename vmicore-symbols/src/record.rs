use serde::{Deserialize, Serialize};

/// A type or variable as read from an external symbol source, still
/// addressed by file-local ids (spec.md §1: the DWARF reader itself is
/// out of scope; this crate only consumes its output stream).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SymbolRecord {
    Type {
        local_id: u32,
        name: Option<String>,
        kind: RawTypeKind,
    },
    Variable {
        local_id: u32,
        name: String,
        type_local_id: u32,
        address: u64,
        section: Option<String>,
    },
}

/// File-local mirror of `vmicore_types::TypeKind`: referenced types are
/// still local ids here, remapped to global `TypeId`s by
/// [`crate::remap::IdRemapper`] as each record is consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RawTypeKind {
    Void,
    Integer { signed: bool, width: u8 },
    Float { width: u8 },
    Enum { values: Vec<(String, i64)> },
    Pointer { target_local_id: u32 },
    Array { element_local_id: u32, length: Option<u32> },
    Typedef { target_local_id: u32 },
    Const { target_local_id: u32 },
    Volatile { target_local_id: u32 },
    Struct { members: Vec<RawMember> },
    Union { members: Vec<RawMember> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMember {
    pub name: String,
    pub type_local_id: u32,
    pub offset: u64,
    pub bits: Option<(u16, u16)>,
}
