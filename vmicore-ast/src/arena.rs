use crate::node::{Expr, ExprId, Stmt, StmtId};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU32, Ordering};
use typed_arena::Arena;

/// Arena-backed storage for one translation unit's expression and
/// statement nodes.
///
/// Nodes are allocated once and never moved or freed for the lifetime of
/// `'ast`, per `vex-ast`'s `AstArena` (one `typed_arena::Arena` per node
/// kind). Unlike the teacher's arena, allocation here also assigns each
/// node a stable [`ExprId`]/[`StmtId`] and records it in a side index, so
/// maps like the evaluator's `inter_links: node -> node` (spec.md §4.B.4)
/// can use a small `Copy` id as a key instead of hashing by node identity.
pub struct AstArena<'ast> {
    exprs: Arena<Expr>,
    stmts: Arena<Stmt>,
    expr_index: RefCell<Vec<&'ast Expr>>,
    stmt_index: RefCell<Vec<&'ast Stmt>>,
    next_expr_id: AtomicU32,
    next_stmt_id: AtomicU32,
}

impl<'ast> Default for AstArena<'ast> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'ast> AstArena<'ast> {
    pub fn new() -> Self {
        Self {
            exprs: Arena::new(),
            stmts: Arena::new(),
            expr_index: RefCell::new(Vec::new()),
            stmt_index: RefCell::new(Vec::new()),
            next_expr_id: AtomicU32::new(0),
            next_stmt_id: AtomicU32::new(0),
        }
    }

    pub fn alloc_expr(&'ast self, expr: Expr) -> ExprId {
        let id = ExprId(self.next_expr_id.fetch_add(1, Ordering::Relaxed));
        let allocated = self.exprs.alloc(expr);
        self.expr_index.borrow_mut().push(allocated);
        id
    }

    pub fn alloc_stmt(&'ast self, stmt: Stmt) -> StmtId {
        let id = StmtId(self.next_stmt_id.fetch_add(1, Ordering::Relaxed));
        let allocated = self.stmts.alloc(stmt);
        self.stmt_index.borrow_mut().push(allocated);
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        self.expr_index.borrow()[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        self.stmt_index.borrow()[id.index()]
    }

    pub fn expr_count(&self) -> usize {
        self.expr_index.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmicore_diagnostics::SourceLoc;

    #[test]
    fn alloc_assigns_sequential_ids() {
        let arena = AstArena::new();
        let a = arena.alloc_expr(Expr::IntLiteral { value: 1, loc: SourceLoc::unknown() });
        let b = arena.alloc_expr(Expr::IntLiteral { value: 2, loc: SourceLoc::unknown() });
        assert_eq!(a.0, 0);
        assert_eq!(b.0, 1);
        assert_eq!(arena.expr_count(), 2);
    }

    #[test]
    fn lookup_returns_allocated_node() {
        let arena = AstArena::new();
        let id = arena.alloc_expr(Expr::IntLiteral { value: 42, loc: SourceLoc::unknown() });
        match arena.expr(id) {
            Expr::IntLiteral { value, .. } => assert_eq!(*value, 42),
            _ => panic!("wrong node kind"),
        }
    }
}
