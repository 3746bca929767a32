//! Owns the universe of C types, variables, and struct members: the Type
//! Catalog component (spec component A).

pub mod altref;
pub mod catalog;
pub mod error;
pub mod hash;
pub mod instance;
pub mod member;
pub mod type_id;
pub mod type_kind;
pub mod variable;

pub use altref::{AddrExpr, AltRefEntry, AltRefType, ReferencingRef};
pub use catalog::{Catalog, FoundTypes};
pub use error::CatalogError;
pub use hash::{Hasher32, StructuralHash};
pub use instance::{Instance, InstanceOrigin};
pub use member::{ConstFacts, Member, Param};
pub use type_id::{TypeId, VarId};
pub use type_kind::{Type, TypeKind};
pub use variable::Variable;
