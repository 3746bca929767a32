use crate::error::SymbolError;
use crate::record::{RawMember, RawTypeKind, SymbolRecord};
use crate::remap::IdRemapper;
use vmicore_types::{Catalog, Member, TypeKind, Variable};

/// An external collaborator producing a stream of file-local symbol
/// records (spec.md §1: the DWARF reader is out of scope, only its output
/// is consumed). A test double or a real debuginfo reader both implement
/// this the same way.
pub trait SymbolSource {
    fn read_records(&mut self) -> Result<Vec<SymbolRecord>, SymbolError>;
}

fn raw_members_to_members(raw: &[RawMember], remap: &IdRemapper) -> Result<Vec<Member>, SymbolError> {
    raw.iter()
        .map(|m| {
            let type_id = remap
                .global_id(m.type_local_id)
                .ok_or(SymbolError::DanglingLocalId(m.type_local_id))?;
            let mut member = Member::new(m.name.clone(), type_id, m.offset);
            if let Some((bit_off, bit_size)) = m.bits {
                member = member.with_bitfield(bit_off, bit_size);
            }
            Ok(member)
        })
        .collect()
}

fn lower_kind(raw: &RawTypeKind, remap: &IdRemapper) -> Result<TypeKind, SymbolError> {
    let target = |local: u32| remap.global_id(local).ok_or(SymbolError::DanglingLocalId(local));
    Ok(match raw {
        RawTypeKind::Void => TypeKind::Void,
        RawTypeKind::Integer { signed, width } => TypeKind::Integer { signed: *signed, width: *width },
        RawTypeKind::Float { width } => TypeKind::Float { width: *width },
        RawTypeKind::Enum { values } => TypeKind::Enum { values: values.iter().cloned().collect() },
        RawTypeKind::Pointer { target_local_id } => TypeKind::Pointer { target: target(*target_local_id)? },
        RawTypeKind::Array { element_local_id, length } => {
            TypeKind::Array { element: target(*element_local_id)?, length: *length }
        }
        RawTypeKind::Typedef { target_local_id } => TypeKind::Typedef { target: target(*target_local_id)? },
        RawTypeKind::Const { target_local_id } => TypeKind::Const { target: target(*target_local_id)? },
        RawTypeKind::Volatile { target_local_id } => TypeKind::Volatile { target: target(*target_local_id)? },
        RawTypeKind::Struct { members } => TypeKind::Struct { members: raw_members_to_members(members, remap)? },
        RawTypeKind::Union { members } => TypeKind::Union { members: raw_members_to_members(members, remap)? },
    })
}

/// Consumes a record stream into `catalog`, remapping file-local ids to
/// global `TypeId`/`VarId`s along the way (spec.md §3).
///
/// Runs in two passes so forward references (a struct member pointing back
/// at its own struct, or at a struct declared later in the stream) resolve
/// correctly: the first pass reserves a global id for every `Type` record,
/// the second fills in each type's real shape now that every local id it
/// might reference already has one.
pub fn populate_catalog(
    records: &[SymbolRecord],
    catalog: &Catalog,
    file_index: u32,
) -> Result<(), SymbolError> {
    let mut remap = IdRemapper::new(file_index);

    for record in records {
        if let SymbolRecord::Type { local_id, .. } = record {
            let reserved = catalog.reserve_type_id();
            remap.bind(*local_id, reserved);
        }
    }

    for record in records {
        match record {
            SymbolRecord::Type { local_id, name, kind } => {
                let global_id = remap.global_id(*local_id).expect("bound in first pass");
                let lowered = lower_kind(kind, &remap)?;
                catalog.finalize_type(global_id, name.clone(), lowered);
            }
            SymbolRecord::Variable { name, type_local_id, address, section, .. } => {
                let type_id = remap.global_id(*type_local_id).ok_or_else(|| SymbolError::UnresolvedVariableType {
                    name: name.clone(),
                    type_local_id: *type_local_id,
                })?;
                let mut var = Variable::new(name.clone(), type_id, *address, file_index);
                if let Some(section) = section {
                    var = var.with_section(section.clone());
                }
                catalog.add_variable(var);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_self_referencing_struct() {
        let catalog = Catalog::new();
        let records = vec![
            SymbolRecord::Type {
                local_id: 1,
                name: Some("int".into()),
                kind: RawTypeKind::Integer { signed: true, width: 4 },
            },
            SymbolRecord::Type {
                local_id: 2,
                name: None,
                kind: RawTypeKind::Pointer { target_local_id: 3 },
            },
            SymbolRecord::Type {
                local_id: 3,
                name: Some("node".into()),
                kind: RawTypeKind::Struct {
                    members: vec![
                        RawMember { name: "value".into(), type_local_id: 1, offset: 0, bits: None },
                        RawMember { name: "next".into(), type_local_id: 2, offset: 8, bits: None },
                    ],
                },
            },
        ];

        populate_catalog(&records, &catalog, 0).unwrap();

        let node_ids = catalog.by_name("node");
        assert_eq!(node_ids.len(), 1);
        let node = catalog.by_id(node_ids[0]).unwrap();
        match node.kind {
            TypeKind::Struct { members } => assert_eq!(members.len(), 2),
            _ => panic!("expected struct"),
        }
    }

    #[test]
    fn variable_with_unresolved_type_errors() {
        let catalog = Catalog::new();
        let records = vec![SymbolRecord::Variable {
            local_id: 0,
            name: "foo".into(),
            type_local_id: 99,
            address: 0x1000,
            section: None,
        }];
        let err = populate_catalog(&records, &catalog, 0).unwrap_err();
        assert!(matches!(err, SymbolError::UnresolvedVariableType { .. }));
    }
}
