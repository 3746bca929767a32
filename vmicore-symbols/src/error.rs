use thiserror::Error;

#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("record references unknown local id {0}")]
    DanglingLocalId(u32),
    #[error("variable {name:?} references unresolved type {type_local_id}")]
    UnresolvedVariableType { name: String, type_local_id: u32 },
    #[error("symbol source error: {0}")]
    Source(String),
}
