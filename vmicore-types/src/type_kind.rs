use crate::hash::StructuralHash;
use crate::member::{Member, Param};
use crate::type_id::TypeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The tagged variant set from spec.md §3. `Struct`/`Union` carry members,
/// `FuncPointer`/`Function` carry params; everything else wraps a single
/// referenced `TypeId` or is a leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeKind {
    Void,
    Integer { signed: bool, width: u8 },
    Float { width: u8 },
    Enum { values: BTreeMap<String, i64> },
    Pointer { target: TypeId },
    Array { element: TypeId, length: Option<u32> },
    FuncPointer { params: Vec<TypeId>, returns: TypeId },
    Typedef { target: TypeId },
    Const { target: TypeId },
    Volatile { target: TypeId },
    Struct { members: Vec<Member> },
    Union { members: Vec<Member> },
    Function { low_pc: u64, high_pc: u64, params: Vec<Param> },
}

impl TypeKind {
    /// The single wrapped type for referencing kinds (pointer, typedef,
    /// const, volatile, array element); `None` for leaves and aggregates.
    pub fn referenced(&self) -> Option<TypeId> {
        match self {
            TypeKind::Pointer { target }
            | TypeKind::Typedef { target }
            | TypeKind::Const { target }
            | TypeKind::Volatile { target } => Some(*target),
            TypeKind::Array { element, .. } => Some(*element),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeKind::Pointer { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeKind::Array { .. })
    }

    /// Transparent for canonicalization purposes: typedef, const, volatile
    /// are stripped when resolving referencing chains; pointers and arrays
    /// are not (spec.md §4.A: "A void pointer is not dereferenced during
    /// canonicalization").
    pub fn is_transparent(&self) -> bool {
        matches!(
            self,
            TypeKind::Typedef { .. } | TypeKind::Const { .. } | TypeKind::Volatile { .. }
        )
    }

    pub fn members(&self) -> Option<&[Member]> {
        match self {
            TypeKind::Struct { members } | TypeKind::Union { members } => Some(members),
            _ => None,
        }
    }

    pub fn members_mut(&mut self) -> Option<&mut Vec<Member>> {
        match self {
            TypeKind::Struct { members } | TypeKind::Union { members } => Some(members),
            _ => None,
        }
    }

    pub fn kind_tag(&self) -> &'static str {
        match self {
            TypeKind::Void => "void",
            TypeKind::Integer { .. } => "integer",
            TypeKind::Float { .. } => "float",
            TypeKind::Enum { .. } => "enum",
            TypeKind::Pointer { .. } => "pointer",
            TypeKind::Array { .. } => "array",
            TypeKind::FuncPointer { .. } => "funcpointer",
            TypeKind::Typedef { .. } => "typedef",
            TypeKind::Const { .. } => "const",
            TypeKind::Volatile { .. } => "volatile",
            TypeKind::Struct { .. } => "struct",
            TypeKind::Union { .. } => "union",
            TypeKind::Function { .. } => "function",
        }
    }
}

/// A named, identified, structurally-hashed type living in a [`crate::Catalog`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Type {
    pub id: TypeId,
    pub name: Option<String>,
    pub kind: TypeKind,
    pub hash: StructuralHash,
}

impl Type {
    pub fn new(id: TypeId, name: Option<String>, kind: TypeKind, hash: StructuralHash) -> Self {
        Self { id, name, kind, hash }
    }
}
