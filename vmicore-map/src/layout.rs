use vmicore_types::{Catalog, TypeId, TypeKind};

/// Best-effort storage size of a type, used to bound reads and to decide
/// array element stride during expansion (spec.md §4.E.3). `None` for
/// types with no storage size of their own (functions, void).
pub fn type_size(catalog: &Catalog, type_id: TypeId) -> Option<u64> {
    let ty = catalog.by_id(type_id)?;
    match &ty.kind {
        TypeKind::Void => None,
        TypeKind::Integer { width, .. } => Some(u64::from(*width)),
        TypeKind::Float { width } => Some(u64::from(*width)),
        TypeKind::Enum { .. } => Some(4),
        TypeKind::Pointer { .. } | TypeKind::FuncPointer { .. } => Some(8),
        TypeKind::Array { element, length } => {
            let elem_size = type_size(catalog, *element)?;
            Some(elem_size * u64::from(length.unwrap_or(0)))
        }
        TypeKind::Typedef { target } | TypeKind::Const { target } | TypeKind::Volatile { target } => {
            type_size(catalog, *target)
        }
        TypeKind::Struct { members } | TypeKind::Union { members } => members
            .iter()
            .map(|m| {
                let member_size = type_size(catalog, m.type_id).unwrap_or(0);
                m.offset + member_size
            })
            .max(),
        TypeKind::Function { .. } => None,
    }
}

/// Whether a member/element of this resolved kind is a candidate
/// expansion position at all (spec.md §4.E.3: pointers, struct/union
/// members of aggregate type, arrays of aggregate type).
pub fn is_expandable(kind: &TypeKind) -> bool {
    matches!(kind, TypeKind::Pointer { .. } | TypeKind::Struct { .. } | TypeKind::Union { .. } | TypeKind::Array { .. })
}
