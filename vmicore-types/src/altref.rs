use crate::type_id::{TypeId, VarId};
use serde::{Deserialize, Serialize};

/// Minimal pointer-arithmetic IR stored alongside an [`AltRefEntry`].
///
/// The full C expression AST lives in the ast crate, which depends on this
/// crate for `TypeId`/`Catalog` lookups; `AltRefType` cannot store an
/// `AstExpression` without creating a cycle, so it carries this smaller,
/// self-contained expression shape instead. The ast crate provides a
/// lowering from `AstExpression` to `AddrExpr` at the point an alternate
/// type is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AddrExpr {
    /// The base address of the instance being reinterpreted.
    Base,
    Constant(i64),
    Add(Box<AddrExpr>, Box<AddrExpr>),
    Sub(Box<AddrExpr>, Box<AddrExpr>),
    /// `container_of`-style: subtract a member's offset within `of_type`.
    MemberOffset { of_type: TypeId, member: String },
}

impl AddrExpr {
    /// Evaluates against a base address; `None` if the expression touches
    /// a member whose offset can't be resolved from the given lookup.
    pub fn evaluate(&self, base: u64, offset_of: impl Fn(TypeId, &str) -> Option<u64> + Copy) -> Option<u64> {
        match self {
            AddrExpr::Base => Some(base),
            AddrExpr::Constant(c) => Some(base.wrapping_add_signed(*c)),
            AddrExpr::Add(a, b) => {
                let lhs = a.evaluate(base, offset_of)?;
                let rhs = b.evaluate(0, offset_of)?;
                Some(lhs.wrapping_add(rhs))
            }
            AddrExpr::Sub(a, b) => {
                let lhs = a.evaluate(base, offset_of)?;
                let rhs = b.evaluate(0, offset_of)?;
                Some(lhs.wrapping_sub(rhs))
            }
            AddrExpr::MemberOffset { of_type, member } => {
                let off = offset_of(*of_type, member)?;
                Some(base.wrapping_sub(off))
            }
        }
    }
}

/// One alternate-type candidate: the resulting type plus the address
/// expression that must be applied to materialise it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltRefEntry {
    pub target: TypeId,
    pub addr_expr: AddrExpr,
}

/// The ordered list of alternate-type candidates attached to a referencing
/// site (spec.md §3). Entries are probed most-specific first, so insertion
/// order is preserved and callers should not sort this list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AltRefType {
    entries: Vec<AltRefEntry>,
}

impl AltRefType {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the end, i.e. treats the new entry as least-specific
    /// unless the caller has already ordered its insertions.
    pub fn push(&mut self, entry: AltRefEntry) {
        self.entries.push(entry);
    }

    /// Inserts at the front: used when a newly-learned alternate should be
    /// probed before previously-known ones.
    pub fn push_front(&mut self, entry: AltRefEntry) {
        self.entries.insert(0, entry);
    }

    pub fn entries(&self) -> &[AltRefEntry] {
        &self.entries
    }

    pub fn contains(&self, entry: &AltRefEntry) -> bool {
        self.entries.iter().any(|e| e == entry)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every referencing site an `AltRefType` can be attached to (spec.md §3:
/// "pointer, typedef, const, volatile, member, variable, function
/// parameter").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferencingRef {
    Type(TypeId),
    Member { owner: TypeId, member_index: u32 },
    Variable(VarId),
    Param { owner: TypeId, param_index: u32 },
}
