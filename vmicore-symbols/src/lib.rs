//! The external debuginfo symbol source, treated as a collaborator whose
//! own parsing is out of scope (spec.md §1): this crate only remaps its
//! file-local ids into a shared [`vmicore_types::Catalog`].

pub mod error;
pub mod json_source;
pub mod record;
pub mod remap;
pub mod source;

pub use error::SymbolError;
pub use json_source::JsonFileSymbolSource;
pub use record::{RawMember, RawTypeKind, SymbolRecord};
pub use remap::{DimensionKey, IdRemapper};
pub use source::{populate_catalog, SymbolSource};
