//! The parallel memory map builder: walks from root variables and
//! function symbols through pointers, struct members, and array
//! elements, consulting the rule engine and a probabilistic fallback at
//! every step (spec component E).

pub mod builder;
pub mod candidate;
pub mod diff;
pub mod embed;
pub mod error;
pub mod layout;
pub mod node;
pub mod persist;
pub mod probability;
pub mod range_tree;
pub mod verifier;
pub mod worklist;

pub use builder::{BuilderConfig, BuildOutput, Conflict, MapBuilder};
pub use error::MapError;
pub use node::{MemoryMapNode, NodeId};
pub use range_tree::{MemoryRangeTree, RangeSummary};
