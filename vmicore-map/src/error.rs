use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("memory device error: {0}")]
    Memory(#[from] vmicore_mem::MemoryError),
    #[error("catalog error: {0}")]
    Catalog(#[from] vmicore_types::CatalogError),
    #[error("persisted map malformed at line {line}: {message}")]
    Persist { line: usize, message: String },
}
