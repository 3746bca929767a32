use vmicore_ast::{AstType, ExprId, TransformStep};

/// What kind of declaration a primary expression's root symbol came from.
/// Drives the suppression rules in spec.md §4.B.3 item 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    GlobalVariable,
    LocalVariable,
    FunctionParam,
    FunctionReturn,
}

/// Which half of a transitive propagation chain an event represents
/// (spec.md §4.B.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSpan {
    /// The original, furthest-back declared type in the chain.
    First,
    /// The immediate predecessor carrier.
    Last,
}

/// Record carried along a type-change emission (spec.md §3).
#[derive(Debug, Clone)]
pub struct TypeEvalDetails {
    pub span: ChangeSpan,
    pub sym_name: String,
    pub sym_kind: SymbolKind,
    pub src_node: ExprId,
    pub root_node: ExprId,
    pub ctx_type: Option<String>,
    pub ctx_members: Vec<String>,
    pub target_type: AstType,
    /// The deref/addrof/member/index/call hops that produced `src_node`,
    /// distinguishing e.g. `p->m` from `(*p).m` (spec.md §4.B.2).
    pub transformations: Vec<TransformStep>,
}
