//! C syntax tree types and the lexical `AstType` chain consumed by the
//! type-flow evaluator (spec component B's shared representation).

pub mod arena;
pub mod ast_type;
pub mod node;

pub use arena::AstArena;
pub use ast_type::{longest_match, AstType, AstTypeKind};
pub use node::{
    BinOp, Designator, Expr, ExprId, FunctionDef, Stmt, StmtId, TransformStep, TranslationUnit,
    UnaryOp,
};
