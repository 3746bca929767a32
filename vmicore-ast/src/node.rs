use serde::{Deserialize, Serialize};
use vmicore_diagnostics::SourceLoc;

macro_rules! node_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

node_id!(ExprId);
node_id!(StmtId);

/// One hop in the pointer-chain/member-access history that produced a
/// value (spec.md §4.B.2: `p->m` and `(*p).m` reduce to the same
/// `AstType` but their `transformations` differ).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformStep {
    Deref,
    AddrOf,
    Member(String),
    Index,
    Call,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    LogAnd,
    LogOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Designator {
    Field(String),
    Index(u32),
}

/// A field-sensitive C expression node. Identifiers resolve against the
/// catalog only when the evaluator walks the tree; the node itself just
/// carries the syntax plus the `transformations` history the evaluator
/// needs for type-change reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Ident {
        name: String,
        loc: SourceLoc,
    },
    IntLiteral {
        value: i64,
        loc: SourceLoc,
    },
    StringLiteral {
        value: String,
        loc: SourceLoc,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
        loc: SourceLoc,
    },
    Binary {
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
        loc: SourceLoc,
    },
    Assign {
        target: ExprId,
        value: ExprId,
        loc: SourceLoc,
    },
    Index {
        base: ExprId,
        index: ExprId,
        loc: SourceLoc,
    },
    Member {
        base: ExprId,
        member: String,
        /// `true` for `->`, `false` for `.`; both reduce to the same
        /// declared member type but record distinct `transformations`.
        via_pointer: bool,
        loc: SourceLoc,
    },
    Cast {
        target_type: String,
        operand: ExprId,
        loc: SourceLoc,
    },
    Call {
        callee: String,
        args: Vec<ExprId>,
        loc: SourceLoc,
    },
    Conditional {
        cond: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
        loc: SourceLoc,
    },
    SizeOf {
        of_type: String,
        loc: SourceLoc,
    },
    OffsetOf {
        of_type: String,
        member: String,
        loc: SourceLoc,
    },
    /// `({ stmt...; e; })` — GNU statement expression; type is the type
    /// of the trailing expression.
    StatementExpr {
        body: Vec<StmtId>,
        trailing: ExprId,
        loc: SourceLoc,
    },
    DesignatedInitializer {
        elements: Vec<(Option<Designator>, ExprId)>,
        loc: SourceLoc,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Deref,
    AddrOf,
    Neg,
    Not,
    BitNot,
}

impl Expr {
    pub fn loc(&self) -> SourceLoc {
        // SourceLoc owns a `String`, so this is a clone rather than a
        // copy; callers needing it repeatedly should cache the result.
        match self {
            Expr::Ident { loc, .. }
            | Expr::IntLiteral { loc, .. }
            | Expr::StringLiteral { loc, .. }
            | Expr::Unary { loc, .. }
            | Expr::Binary { loc, .. }
            | Expr::Assign { loc, .. }
            | Expr::Index { loc, .. }
            | Expr::Member { loc, .. }
            | Expr::Cast { loc, .. }
            | Expr::Call { loc, .. }
            | Expr::Conditional { loc, .. }
            | Expr::SizeOf { loc, .. }
            | Expr::OffsetOf { loc, .. }
            | Expr::StatementExpr { loc, .. }
            | Expr::DesignatedInitializer { loc, .. } => loc.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stmt {
    Expr(ExprId),
    Decl {
        name: String,
        declared_type: String,
        init: Option<ExprId>,
    },
    Return(Option<ExprId>),
    If {
        cond: ExprId,
        then_branch: Vec<StmtId>,
        else_branch: Vec<StmtId>,
    },
    Block(Vec<StmtId>),
}

/// A parsed function definition: the evaluator's per-symbol walk root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub return_type: String,
    pub params: Vec<(String, String)>,
    pub body: Vec<StmtId>,
}

/// One parsed C source file's worth of AST.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub file: String,
    pub functions: Vec<FunctionDef>,
}
