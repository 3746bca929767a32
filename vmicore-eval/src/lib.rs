//! Walks a C AST in post-order, assigns an `AstType` to every node, and
//! detects + propagates type-changing usages back into the type catalog
//! (spec component B).

pub mod declared;
pub mod details;
pub mod error;
pub mod evaluator;
pub mod sink;

pub use declared::DeclaredTypes;
pub use details::{ChangeSpan, SymbolKind, TypeEvalDetails};
pub use error::EvalError;
pub use evaluator::AstTypeEvaluator;
pub use sink::{CatalogTypeChangeSink, TypeChangeSink};
