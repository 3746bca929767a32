use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable integer id of a [`crate::Type`] in a [`crate::Catalog`].
///
/// Array dimensions need their own id: the pair `(origId, fileIndex,
/// arrayDimensionIndex)` deterministically maps to the internal id, so each
/// dimension of a multi-dimensional array owns a distinct [`TypeId`]. That
/// mapping lives in [`crate::remap::DimensionKey`], not here -- this type is
/// just the opaque handle callers pass around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable integer id of a [`crate::Variable`] in a [`crate::Catalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var#{}", self.0)
    }
}
