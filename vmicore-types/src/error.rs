use crate::type_id::TypeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown type id {0}")]
    UnknownType(TypeId),

    #[error("no type named {0:?}")]
    UnknownName(String),

    #[error("structural hash collision for {0:?} (this should be impossible by construction)")]
    HashCollision(TypeId),

    #[error("member index {member_index} out of range on type {owner}")]
    UnknownMember { owner: TypeId, member_index: u32 },

    #[error("param index {param_index} out of range on type {owner}")]
    UnknownParam { owner: TypeId, param_index: u32 },
}
