use crate::eval::{evaluate, SymbolResolver};
use crate::result::ResultKind;
use vmicore_ast::{arena::AstArena, ExprId};
use vmicore_types::ConstFacts;

/// Magic-number capture (spec.md §4.C), invoked by the type evaluator at
/// each assignment whose left-hand side is a struct member: if the
/// right-hand side folds to a constant, record it; otherwise extinguish
/// any previously recorded values for that member.
pub fn capture_assignment(
    arena: &AstArena<'_>,
    rhs: ExprId,
    resolver: &impl SymbolResolver,
    facts: &mut ConstFacts,
) {
    let result = match evaluate(arena, rhs, resolver) {
        Ok(r) => r,
        Err(_) => {
            facts.mark_not_constant();
            return;
        }
    };
    match result.kind {
        ResultKind::Constant => {
            if let Some(v) = result.as_constant_int() {
                facts.record_int(v);
            } else if let Some(s) = result.as_constant_str() {
                facts.record_string(s.to_string());
            } else {
                facts.mark_not_constant();
            }
        }
        _ => facts.mark_not_constant(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmicore_ast::Expr;
    use vmicore_diagnostics::SourceLoc;

    struct NoSymbols;
    impl SymbolResolver for NoSymbols {
        fn resolve(&self, _name: &str) -> crate::eval::IdentKind {
            crate::eval::IdentKind::Unknown
        }
    }

    #[test]
    fn constant_rhs_is_recorded() {
        let arena = AstArena::new();
        let lit = arena.alloc_expr(Expr::IntLiteral { value: 0xdead_beefu32 as i64, loc: SourceLoc::unknown() });
        let mut facts = ConstFacts::default();
        capture_assignment(&arena, lit, &NoSymbols, &mut facts);
        assert!(facts.matches_int(0xdead_beefu32 as i64));
    }

    #[test]
    fn non_constant_rhs_extinguishes_facts() {
        let arena = AstArena::new();
        let lit = arena.alloc_expr(Expr::IntLiteral { value: 1, loc: SourceLoc::unknown() });
        let mut facts = ConstFacts::default();
        capture_assignment(&arena, lit, &NoSymbols, &mut facts);
        assert!(facts.matches_int(1));

        let ident = arena.alloc_expr(Expr::Ident { name: "runtime_val".into(), loc: SourceLoc::unknown() });
        capture_assignment(&arena, ident, &NoSymbols, &mut facts);
        assert!(facts.is_not_constant());
        assert!(!facts.matches_int(1));
    }
}
