//! The raw kernel memory dump, treated as an external collaborator
//! (spec.md §1): a random-access device plus virtual-to-physical
//! translation, with no knowledge of types or the object graph.

pub mod device;
pub mod error;
pub mod v2p;

pub use device::{MappedDumpDevice, MemoryDevice};
pub use error::MemoryError;
pub use v2p::{LinearOffsetTranslator, VirtualToPhysical};
