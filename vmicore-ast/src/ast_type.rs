use serde::{Deserialize, Serialize};
use vmicore_types::{Catalog, FoundTypes, TypeId};

/// One link of the lexical type chain (spec.md §3). Lightweight compared to
/// a full `vmicore_types::Type`: it carries only what the C declarator
/// syntax spells out, and is the canonical form flow analysis compares
/// against (two `AstType`s compare equal iff they'd resolve to the same
/// catalog entry, without needing a catalog lookup to tell).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AstTypeKind {
    Void,
    Named(String),
    Pointer,
    Array(Option<u32>),
    Const,
    Volatile,
}

/// Linked chain of lexical type nodes, innermost first: `int * const *`
/// is `Pointer -> Const -> Pointer -> Named("int")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstType {
    pub kind: AstTypeKind,
    pub identifier: Option<String>,
    pub next: Option<Box<AstType>>,
}

impl AstType {
    pub fn leaf(kind: AstTypeKind) -> Self {
        Self { kind, identifier: None, next: None }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            kind: AstTypeKind::Named(name.into()),
            identifier: None,
            next: None,
        }
    }

    pub fn wrap(self, kind: AstTypeKind) -> Self {
        AstType { kind, identifier: None, next: Some(Box::new(self)) }
    }

    pub fn pointer_to(self) -> Self {
        self.wrap(AstTypeKind::Pointer)
    }

    /// Strips one pointer level. Fails on a non-pointer, non-array chain
    /// head (spec.md §4.B.2: unary `*p`).
    pub fn deref_one(&self) -> Option<&AstType> {
        match &self.kind {
            AstTypeKind::Pointer | AstTypeKind::Array(_) => self.next.as_deref(),
            _ => None,
        }
    }

    pub fn is_pointer_like(&self) -> bool {
        matches!(self.kind, AstTypeKind::Pointer | AstTypeKind::Array(_))
    }

    /// Strips `const`/`volatile` (but not pointers or arrays), mirroring
    /// the catalog's own canonicalization rule (spec.md §4.A, §4.B.3).
    pub fn canonical(&self) -> &AstType {
        match self.kind {
            AstTypeKind::Const | AstTypeKind::Volatile => {
                self.next.as_deref().map(AstType::canonical).unwrap_or(self)
            }
            _ => self,
        }
    }

    /// Resolves this lexical chain against a catalog, returning both the
    /// pointer-included and pointer-stripped candidate lists (spec.md
    /// §4.A). Lives here rather than on `Catalog` so the catalog crate
    /// does not need to depend on the AST crate: this function depends on
    /// `Catalog`, not the other way around.
    pub fn resolve(&self, catalog: &Catalog) -> FoundTypes {
        let mut found = FoundTypes::default();
        let canon = self.canonical();
        let Some(name) = canon.leaf_name() else {
            return found;
        };
        let ids = catalog.by_name(name);
        for id in ids {
            if canon.is_pointer_like() {
                found.with_pointer.push(id);
            } else {
                found.without_pointer.push(id);
            }
        }
        found
    }

    fn leaf_name(&self) -> Option<&str> {
        match &self.kind {
            AstTypeKind::Named(name) => Some(name.as_str()),
            _ => self.next.as_deref().and_then(AstType::leaf_name),
        }
    }
}

/// Longest-match lookup helper: walks an `AstType` chain against the
/// catalog one link at a time, preferring the deepest resolvable prefix.
/// `TypeId` results are returned innermost-first, matching the chain's own
/// ordering.
pub fn longest_match(chain: &AstType, catalog: &Catalog) -> Vec<TypeId> {
    let mut results = Vec::new();
    let mut cur = Some(chain);
    while let Some(node) = cur {
        let found = node.resolve(catalog);
        results.extend(found.with_pointer);
        results.extend(found.without_pointer);
        cur = node.next.as_deref();
    }
    results
}
