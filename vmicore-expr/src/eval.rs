use crate::arithmetic::{safe_add, safe_div, safe_mul, safe_rem, safe_shl, safe_shr, safe_sub};
use crate::result::{ExpressionResult, ResultKind, SizeFlags};
use thiserror::Error;
use vmicore_ast::{arena::AstArena, BinOp, Expr, ExprId, UnaryOp};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] crate::arithmetic::ArithmeticError),
    #[error("expression is not a compile-time constant")]
    NotConstant,
    #[error("unknown identifier {0:?}")]
    UnknownIdentifier(String),
}

/// What kind of symbol a name resolves to, as far as the expression
/// evaluator needs to know. Lets this crate fold `Ident` nodes without
/// depending on the full type catalog or symbol table.
pub trait SymbolResolver {
    fn resolve(&self, name: &str) -> IdentKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind {
    EnumConstant(i64),
    Global,
    Local,
    Unknown,
}

/// Folds an AST subtree into the small result lattice of spec.md §4.C.
/// Returns `Runtime`/`Undefined`/`GlobalVar`/`LocalVar` rather than an
/// error for anything that is legitimately not a compile-time constant;
/// `Err` is reserved for malformed constant folding (overflow, div by
/// zero) of an expression that otherwise looked foldable.
pub fn evaluate(arena: &AstArena<'_>, id: ExprId, resolver: &impl SymbolResolver) -> Result<ExpressionResult, EvalError> {
    match arena.expr(id) {
        Expr::IntLiteral { value, .. } => Ok(ExpressionResult::constant_int(*value, SizeFlags::I64)),
        Expr::StringLiteral { value, .. } => Ok(ExpressionResult::constant_str(value.clone())),
        Expr::Ident { name, .. } => match resolver.resolve(name) {
            IdentKind::EnumConstant(v) => Ok(ExpressionResult::constant_int(v, SizeFlags::I64)),
            IdentKind::Global => Ok(ExpressionResult::global_var()),
            IdentKind::Local => Ok(ExpressionResult::local_var()),
            IdentKind::Unknown => Ok(ExpressionResult::undefined()),
        },
        Expr::Unary { op, operand, .. } => {
            let inner = evaluate(arena, *operand, resolver)?;
            match (op, inner.as_constant_int()) {
                (UnaryOp::Neg, Some(v)) => Ok(ExpressionResult::constant_int(
                    v.checked_neg().ok_or(crate::arithmetic::ArithmeticError::Overflow {
                        op: "neg",
                        lhs: v,
                        rhs: 0,
                    })?,
                    inner.size_flags,
                )),
                (UnaryOp::Not, Some(v)) => Ok(ExpressionResult::constant_int(i64::from(v == 0), inner.size_flags)),
                (UnaryOp::BitNot, Some(v)) => Ok(ExpressionResult::constant_int(!v, inner.size_flags)),
                // Deref/AddrOf never fold to an integer constant: they are
                // address computations, handled by the type evaluator, not
                // this component.
                _ => Ok(ExpressionResult::runtime()),
            }
        }
        Expr::Binary { op, lhs, rhs, .. } => {
            let l = evaluate(arena, *lhs, resolver)?;
            let r = evaluate(arena, *rhs, resolver)?;
            match (l.as_constant_int(), r.as_constant_int()) {
                (Some(a), Some(b)) => fold_binary(*op, a, b, l.size_flags.promote(r.size_flags)),
                _ => Ok(ExpressionResult::runtime()),
            }
        }
        Expr::Conditional { .. }
        | Expr::Index { .. }
        | Expr::Member { .. }
        | Expr::Assign { .. }
        | Expr::Cast { .. }
        | Expr::Call { .. }
        | Expr::StatementExpr { .. }
        | Expr::DesignatedInitializer { .. }
        | Expr::SizeOf { .. }
        | Expr::OffsetOf { .. } => Ok(ExpressionResult::runtime()),
    }
}

fn fold_binary(op: BinOp, a: i64, b: i64, size_flags: SizeFlags) -> Result<ExpressionResult, EvalError> {
    let v = match op {
        BinOp::Add => safe_add(a, b)?,
        BinOp::Sub => safe_sub(a, b)?,
        BinOp::Mul => safe_mul(a, b)?,
        BinOp::Div => safe_div(a, b)?,
        BinOp::Mod => safe_rem(a, b)?,
        BinOp::Shl => safe_shl(a, b)?,
        BinOp::Shr => safe_shr(a, b)?,
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::LogAnd => i64::from(a != 0 && b != 0),
        BinOp::LogOr => i64::from(a != 0 || b != 0),
        BinOp::Eq => i64::from(a == b),
        BinOp::Ne => i64::from(a != b),
        BinOp::Lt => i64::from(a < b),
        BinOp::Le => i64::from(a <= b),
        BinOp::Gt => i64::from(a > b),
        BinOp::Ge => i64::from(a >= b),
    };
    Ok(ExpressionResult::constant_int(v, size_flags))
}

/// `evaluate_int_expression` from spec.md §4.C: `None` when the result
/// depends on a missing type or runtime state, `Err` for a genuine
/// constant-folding failure.
pub fn evaluate_int_expression(
    arena: &AstArena<'_>,
    id: ExprId,
    resolver: &impl SymbolResolver,
) -> Result<Option<i64>, EvalError> {
    let result = evaluate(arena, id, resolver)?;
    match result.kind {
        ResultKind::Constant => Ok(result.as_constant_int()),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmicore_diagnostics::SourceLoc;

    struct NoSymbols;
    impl SymbolResolver for NoSymbols {
        fn resolve(&self, _name: &str) -> IdentKind {
            IdentKind::Unknown
        }
    }

    #[test]
    fn folds_simple_arithmetic() {
        let arena = AstArena::new();
        let a = arena.alloc_expr(Expr::IntLiteral { value: 3, loc: SourceLoc::unknown() });
        let b = arena.alloc_expr(Expr::IntLiteral { value: 4, loc: SourceLoc::unknown() });
        let sum = arena.alloc_expr(Expr::Binary { op: BinOp::Add, lhs: a, rhs: b, loc: SourceLoc::unknown() });
        let result = evaluate_int_expression(&arena, sum, &NoSymbols).unwrap();
        assert_eq!(result, Some(7));
    }

    #[test]
    fn runtime_dependent_expression_is_none() {
        let arena = AstArena::new();
        let ident = arena.alloc_expr(Expr::Ident { name: "x".into(), loc: SourceLoc::unknown() });
        let result = evaluate_int_expression(&arena, ident, &NoSymbols).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn division_by_zero_is_error() {
        let arena = AstArena::new();
        let a = arena.alloc_expr(Expr::IntLiteral { value: 1, loc: SourceLoc::unknown() });
        let zero = arena.alloc_expr(Expr::IntLiteral { value: 0, loc: SourceLoc::unknown() });
        let div = arena.alloc_expr(Expr::Binary { op: BinOp::Div, lhs: a, rhs: zero, loc: SourceLoc::unknown() });
        assert!(evaluate_int_expression(&arena, div, &NoSymbols).is_err());
    }
}
