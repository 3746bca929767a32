use crate::declared::DeclaredTypes;
use crate::details::{ChangeSpan, SymbolKind, TypeEvalDetails};
use crate::error::EvalError;
use crate::sink::TypeChangeSink;
use std::collections::HashMap;
use vmicore_ast::{arena::AstArena, BinOp, Designator, Expr, ExprId, FunctionDef, Stmt, StmtId, TransformStep, TranslationUnit, UnaryOp};
use vmicore_ast::{AstType, AstTypeKind};
use vmicore_expr::eval::{IdentKind, SymbolResolver};
use vmicore_expr::magic::capture_assignment;
use vmicore_types::ConstFacts;

/// Walks a translation unit's AST, computing `type_of` for every
/// expression and emitting type-change events to a [`TypeChangeSink`]
/// (spec.md §4.B).
pub struct AstTypeEvaluator {
    declared: DeclaredTypes,
    locals: HashMap<String, (AstType, SymbolKind)>,
    /// Maps the right-hand side of an assignment to its left-hand side,
    /// rebuilt per translation unit (spec.md §4.B.4).
    inter_links: HashMap<ExprId, ExprId>,
    /// Every `return` expression reachable from each function, gathered
    /// once up front so a call site can be linked to the callee's return
    /// value regardless of walk order (spec.md §4.B.4: transitive
    /// propagation crosses function boundaries).
    return_exprs: HashMap<String, Vec<ExprId>>,
    /// Per-node transformation history (deref/addrof/member/index/call)
    /// used to distinguish `p->m` from `(*p).m` in a reported event
    /// (spec.md §4.B.2).
    transformations: HashMap<ExprId, Vec<TransformStep>>,
    /// Struct name a nested `DesignatedInitializer` element should resolve
    /// its members against, pushed/popped as the walk descends.
    designated_target: Vec<String>,
    current_function: String,
}

impl AstTypeEvaluator {
    pub fn new(declared: DeclaredTypes) -> Self {
        Self {
            declared,
            locals: HashMap::new(),
            inter_links: HashMap::new(),
            return_exprs: HashMap::new(),
            transformations: HashMap::new(),
            designated_target: Vec::new(),
            current_function: String::new(),
        }
    }

    pub fn walk_translation_unit(
        &mut self,
        arena: &AstArena<'_>,
        tu: &TranslationUnit,
        sink: &impl TypeChangeSink,
    ) -> Result<(), EvalError> {
        self.collect_return_exprs(arena, tu);
        for func in &tu.functions {
            // A fatal error in one function must not corrupt events
            // already emitted by prior functions in this unit; events are
            // pushed to the sink as we go, so an early return here simply
            // stops further processing without undoing anything.
            self.walk_function(arena, func, sink)?;
        }
        Ok(())
    }

    /// Gathers every `return` expression per function ahead of the main
    /// walk, so `Expr::Call` can link a call site to its callee's return
    /// value the first time it's seen, independent of declaration order.
    fn collect_return_exprs(&mut self, arena: &AstArena<'_>, tu: &TranslationUnit) {
        for func in &tu.functions {
            let mut exprs = Vec::new();
            for &stmt_id in &func.body {
                collect_returns_in_stmt(arena, stmt_id, &mut exprs);
            }
            self.return_exprs.insert(func.name.clone(), exprs);
        }
    }

    fn walk_function(&mut self, arena: &AstArena<'_>, func: &FunctionDef, sink: &impl TypeChangeSink) -> Result<(), EvalError> {
        self.current_function = func.name.clone();
        self.locals = self.declared.enter_function_scope();
        self.inter_links.clear();
        self.transformations.clear();
        self.designated_target.clear();

        for (name, type_name) in &func.params {
            self.locals.insert(name.clone(), (AstType::named(type_name.clone()), SymbolKind::FunctionParam));
        }

        for &stmt_id in &func.body {
            self.walk_stmt(arena, stmt_id, sink)?;
        }
        Ok(())
    }

    fn walk_stmt(&mut self, arena: &AstArena<'_>, stmt_id: StmtId, sink: &impl TypeChangeSink) -> Result<(), EvalError> {
        match arena.stmt(stmt_id).clone() {
            Stmt::Expr(e) => {
                self.type_of(arena, e, sink)?;
            }
            Stmt::Decl { name, declared_type, init } => {
                let decl_ty = AstType::named(declared_type.clone());
                if let Some(init_id) = init {
                    let init_ty = match arena.expr(init_id).clone() {
                        Expr::DesignatedInitializer { elements, .. } => {
                            self.type_of_designated_initializer(arena, &elements, &declared_type, sink)?
                        }
                        _ => self.type_of(arena, init_id, sink)?,
                    };
                    self.emit_if_changed(arena, init_id, init_id, &init_ty, &decl_ty, sink);
                }
                self.locals.insert(name, (decl_ty, SymbolKind::LocalVariable));
            }
            Stmt::Return(Some(e)) => {
                self.type_of(arena, e, sink)?;
            }
            Stmt::Return(None) => {}
            Stmt::If { cond, then_branch, else_branch } => {
                self.type_of(arena, cond, sink)?;
                for s in then_branch {
                    self.walk_stmt(arena, s, sink)?;
                }
                for s in else_branch {
                    self.walk_stmt(arena, s, sink)?;
                }
            }
            Stmt::Block(stmts) => {
                for s in stmts {
                    self.walk_stmt(arena, s, sink)?;
                }
            }
        }
        Ok(())
    }

    /// Core `type_of` dispatch implementing the operator semantics of
    /// spec.md §4.B.2.
    fn type_of(&mut self, arena: &AstArena<'_>, id: ExprId, sink: &impl TypeChangeSink) -> Result<AstType, EvalError> {
        let expr = arena.expr(id).clone();
        match expr {
            Expr::IntLiteral { .. } => Ok(AstType::named("int")),
            Expr::StringLiteral { .. } => Ok(AstType::named("char").pointer_to()),
            Expr::Ident { name, loc } => match self.locals.get(&name).cloned() {
                Some((ty, _)) => Ok(ty),
                None => {
                    let candidates: Vec<&str> = self.locals.keys().map(String::as_str).collect();
                    let suggestions = vmicore_diagnostics::find_similar_names(&name, &candidates, 3);
                    if !suggestions.is_empty() {
                        log::debug!("unresolved identifier {name:?}, did you mean: {}", suggestions.join(", "));
                    }
                    Err(EvalError::UnresolvedIdentifier { name, loc })
                }
            },
            Expr::Unary { op, operand, loc } => {
                let inner = self.type_of(arena, operand, sink)?;
                let result = match op {
                    UnaryOp::Deref => inner
                        .deref_one()
                        .cloned()
                        .ok_or(EvalError::ContradictoryOperands { op: "*", loc })?,
                    UnaryOp::AddrOf => inner.pointer_to(),
                    UnaryOp::Neg | UnaryOp::Not | UnaryOp::BitNot => inner,
                };
                if matches!(op, UnaryOp::Deref | UnaryOp::AddrOf) {
                    self.record_transform(operand, id, if op == UnaryOp::Deref { TransformStep::Deref } else { TransformStep::AddrOf });
                }
                Ok(result)
            }
            Expr::Binary { op, lhs, rhs, loc } => {
                let lt = self.type_of(arena, lhs, sink)?;
                let rt = self.type_of(arena, rhs, sink)?;
                binary_result_type(op, &lt, &rt, loc)
            }
            Expr::Assign { target, value, loc: _ } => {
                let target_ty = self.type_of(arena, target, sink)?;
                let value_ty = self.type_of(arena, value, sink)?;
                self.inter_links.insert(value, target);
                self.emit_if_changed(arena, value, target, &value_ty, &target_ty, sink);
                self.capture_member_assignment(arena, target, value, sink);
                Ok(target_ty)
            }
            Expr::Index { base, index, loc } => {
                self.type_of(arena, index, sink)?;
                let base_ty = self.type_of(arena, base, sink)?;
                let result = base_ty
                    .deref_one()
                    .cloned()
                    .ok_or(EvalError::ContradictoryOperands { op: "[]", loc })?;
                self.record_transform(base, id, TransformStep::Index);
                Ok(result)
            }
            Expr::Member { base, member, via_pointer, loc } => {
                let base_ty = self.type_of(arena, base, sink)?;
                let struct_ty = if via_pointer {
                    base_ty.deref_one().cloned().ok_or(EvalError::ContradictoryOperands { op: "->", loc })?
                } else {
                    base_ty.clone()
                };
                if via_pointer {
                    self.record_transform(base, id, TransformStep::Deref);
                    self.append_transform(id, TransformStep::Member(member.clone()));
                } else {
                    self.record_transform(base, id, TransformStep::Member(member.clone()));
                }
                let Some(type_name) = struct_ty.identifier.clone().or_else(|| named_leaf(&struct_ty)) else {
                    return Ok(AstType::named("int"));
                };
                match self.declared.member_type(&type_name, &member) {
                    Some(member_ty) => Ok(member_ty.clone()),
                    None => Ok(AstType::named("int")),
                }
            }
            Expr::Cast { target_type, operand, loc: _ } => {
                self.type_of(arena, operand, sink)?;
                Ok(AstType::named(target_type))
            }
            Expr::Call { callee, args, loc: _ } => {
                for a in args {
                    self.type_of(arena, a, sink)?;
                }
                self.transformations.insert(id, vec![TransformStep::Call]);
                // Links the call site to every return statement reachable
                // in the callee, so a type change carried by the returned
                // value keeps propagating across the function boundary
                // instead of stopping at the call (spec.md §4.B.4).
                if let Some(returns) = self.return_exprs.get(&callee).cloned() {
                    for ret_expr in returns {
                        self.inter_links.insert(ret_expr, id);
                    }
                }
                Ok(self.declared.function_return(&callee).cloned().unwrap_or_else(|| AstType::named("int")))
            }
            Expr::Conditional { cond, then_branch, else_branch, loc: _ } => {
                self.type_of(arena, cond, sink)?;
                let then_ty = self.type_of(arena, then_branch, sink)?;
                let else_ty = self.type_of(arena, else_branch, sink)?;
                if then_ty != else_ty {
                    self.emit_if_changed(arena, then_branch, then_branch, &then_ty, &else_ty, sink);
                }
                Ok(then_ty)
            }
            Expr::SizeOf { .. } | Expr::OffsetOf { .. } => Ok(AstType::named("unsigned long")),
            Expr::StatementExpr { body, trailing, loc: _ } => {
                for s in body {
                    self.walk_stmt(arena, s, sink)?;
                }
                self.type_of(arena, trailing, sink)
            }
            Expr::DesignatedInitializer { elements, loc: _ } => match self.designated_target.last().cloned() {
                Some(type_name) => self.type_of_designated_initializer(arena, &elements, &type_name, sink),
                None => {
                    for (_, value) in elements {
                        self.type_of(arena, value, sink)?;
                    }
                    Ok(AstType::named("int"))
                }
            },
        }
    }

    /// Records that `to` was reached from `from` by applying `step`,
    /// extending whatever transformation history `from` already carries
    /// (spec.md §4.B.2).
    fn record_transform(&mut self, from: ExprId, to: ExprId, step: TransformStep) {
        let mut steps = self.transformations.get(&from).cloned().unwrap_or_default();
        steps.push(step);
        self.transformations.insert(to, steps);
    }

    fn append_transform(&mut self, id: ExprId, step: TransformStep) {
        self.transformations.entry(id).or_default().push(step);
    }

    /// Walks a designated-initializer's elements in order against
    /// `type_name`'s declared members, honoring both `.field = v` and
    /// positional `[n] = v` designators and otherwise advancing through
    /// declaration order (spec.md §3).
    fn type_of_designated_initializer(
        &mut self,
        arena: &AstArena<'_>,
        elements: &[(Option<Designator>, ExprId)],
        type_name: &str,
        sink: &impl TypeChangeSink,
    ) -> Result<AstType, EvalError> {
        let mut index: usize = 0;
        for (designator, value_id) in elements {
            let member = match designator {
                Some(Designator::Field(name)) => {
                    if let Some(pos) = self.declared.member_index(type_name, name) {
                        index = pos;
                    }
                    self.declared.member_type(type_name, name).cloned()
                }
                Some(Designator::Index(n)) => {
                    index = *n as usize;
                    self.declared.member_at(type_name, index).map(|(_, ty)| ty.clone())
                }
                None => self.declared.member_at(type_name, index).map(|(_, ty)| ty.clone()),
            };

            let pushed_target = member
                .as_ref()
                .and_then(|ty| ty.identifier.clone().or_else(|| named_leaf(ty)));
            if let Some(nested) = &pushed_target {
                self.designated_target.push(nested.clone());
            }
            let value_ty = self.type_of(arena, *value_id, sink)?;
            if pushed_target.is_some() {
                self.designated_target.pop();
            }

            if let Some(member_ty) = &member {
                self.emit_if_changed(arena, *value_id, *value_id, &value_ty, member_ty, sink);
            }
            index += 1;
        }
        Ok(AstType::named(type_name.to_string()))
    }

    /// Folds an assignment's right-hand side into the target member's
    /// magic-number facts when the left-hand side is a struct member
    /// access (spec.md §4.C).
    fn capture_member_assignment(&self, arena: &AstArena<'_>, target: ExprId, value: ExprId, sink: &impl TypeChangeSink) {
        if !matches!(arena.expr(target), Expr::Member { .. }) {
            return;
        }
        let (_, ctx_type, path) = self.describe_origin(arena, target);
        let (Some(owner), Some(member)) = (ctx_type, path.last()) else {
            return;
        };
        let resolver = LocalsResolver { locals: &self.locals };
        let mut facts = ConstFacts::default();
        capture_assignment(arena, value, &resolver, &mut facts);
        sink.member_constant_assignment(&owner, member, &facts);
    }

    /// Detects and (if not suppressed) emits a type-change event per
    /// spec.md §4.B.3/§4.B.4, including transitive propagation through
    /// `inter_links`.
    fn emit_if_changed(
        &self,
        arena: &AstArena<'_>,
        src_node: ExprId,
        root_node: ExprId,
        src_ty: &AstType,
        dst_ty: &AstType,
        sink: &impl TypeChangeSink,
    ) {
        if src_ty.canonical() == dst_ty.canonical() {
            return;
        }
        // Ignore any pointer used as a void pointer target: nothing to
        // learn from widening to void*.
        if matches!(dst_ty.kind, AstTypeKind::Pointer) {
            if let Some(next) = &dst_ty.next {
                if matches!(next.kind, AstTypeKind::Void) {
                    return;
                }
            }
        }

        let chain = self.trace_origin(src_node);
        let mut emit = |span, node| {
            let (sym_name, ctx_type, ctx_members) = self.describe_origin(arena, node);
            let sym_kind = self
                .locals
                .get(&sym_name)
                .map(|(_, k)| *k)
                .unwrap_or(SymbolKind::LocalVariable);

            // Suppress: function params/locals of non-struct type used
            // without a member access chain carry nothing to learn.
            if matches!(sym_kind, SymbolKind::FunctionParam | SymbolKind::LocalVariable) && ctx_members.is_empty() {
                return;
            }

            let transformations = self.transformations.get(&node).cloned().unwrap_or_default();
            sink.primary_expression_type_change(&TypeEvalDetails {
                span,
                sym_name,
                sym_kind,
                src_node: node,
                root_node,
                ctx_type,
                ctx_members,
                target_type: dst_ty.clone(),
                transformations,
            });
        };

        if chain.len() >= 2 {
            emit(ChangeSpan::First, chain[0]);
            emit(ChangeSpan::Last, chain[chain.len() - 2]);
        } else {
            emit(ChangeSpan::Last, src_node);
        }
    }

    /// Walks `inter_links` backward from `node` to the earliest known
    /// source, by repeatedly finding the assignment that produced `node`'s
    /// current value (spec.md §4.B.4).
    fn trace_origin(&self, node: ExprId) -> Vec<ExprId> {
        let mut chain = vec![node];
        let mut cur = node;
        loop {
            let predecessor = self.inter_links.iter().find(|(_, &lhs)| lhs == cur).map(|(&rhs, _)| rhs);
            match predecessor {
                Some(prev) if prev != cur && !chain.contains(&prev) => {
                    chain.insert(0, prev);
                    cur = prev;
                }
                _ => break,
            }
        }
        chain
    }

    /// Resolves an lvalue/rvalue chain's declared type without emitting
    /// events or failing on an unresolved identifier. Used only to describe
    /// a node for reporting, never to drive control flow, so it stays
    /// read-only and total (returns `None` rather than an `EvalError`).
    fn pure_type_of(&self, arena: &AstArena<'_>, id: ExprId) -> Option<AstType> {
        match arena.expr(id) {
            Expr::Ident { name, .. } => self.locals.get(name).map(|(ty, _)| ty.clone()),
            Expr::Unary { op: UnaryOp::Deref, operand, .. } => self.pure_type_of(arena, *operand)?.deref_one().cloned(),
            Expr::Unary { op: UnaryOp::AddrOf, operand, .. } => Some(self.pure_type_of(arena, *operand)?.pointer_to()),
            Expr::Index { base, .. } => self.pure_type_of(arena, *base)?.deref_one().cloned(),
            Expr::Member { base, member, via_pointer, .. } => {
                let base_ty = self.pure_type_of(arena, *base)?;
                let struct_ty = if *via_pointer { base_ty.deref_one()?.clone() } else { base_ty };
                let type_name = struct_ty.identifier.clone().or_else(|| named_leaf(&struct_ty))?;
                self.declared.member_type(&type_name, member).cloned()
            }
            Expr::Cast { target_type, .. } => Some(AstType::named(target_type.clone())),
            _ => None,
        }
    }

    /// Describes the node a type-change event is reported against: the
    /// root variable name (spec.md §8 property 1: "sym = the base variable
    /// of inst"), and, for a member-access chain, the name of the struct
    /// that owns the first field hop off that root plus the dotted member
    /// path down to the leaf access (spec.md §4.B.1's alternate-type edges
    /// are keyed by that owning struct). A bare identifier's own ctx_type
    /// is its declared type (spec.md §8 scenario 1), not `None`.
    fn describe_origin(&self, arena: &AstArena<'_>, id: ExprId) -> (String, Option<String>, Vec<String>) {
        match arena.expr(id) {
            Expr::Ident { name, .. } => {
                let ctx = self.locals.get(name).and_then(|(ty, _)| named_leaf(ty));
                (name.clone(), ctx, Vec::new())
            }
            Expr::Member { base, member, via_pointer, .. } => {
                let (sym, ctx, mut path) = self.describe_origin(arena, *base);
                let ctx = ctx.or_else(|| {
                    let base_ty = self.pure_type_of(arena, *base)?;
                    let struct_ty = if *via_pointer { base_ty.deref_one()?.clone() } else { base_ty };
                    struct_ty.identifier.clone().or_else(|| named_leaf(&struct_ty))
                });
                path.push(member.clone());
                (sym, ctx, path)
            }
            Expr::Index { base, .. } => self.describe_origin(arena, *base),
            Expr::Unary { op: UnaryOp::Deref, operand, .. } => self.describe_origin(arena, *operand),
            _ => (String::new(), None, Vec::new()),
        }
    }
}

fn named_leaf(ty: &AstType) -> Option<String> {
    match &ty.kind {
        AstTypeKind::Named(n) => Some(n.clone()),
        _ => ty.next.as_deref().and_then(named_leaf),
    }
}

/// Recursively gathers every `return e;` expression reachable from
/// `stmt_id`, descending into `if`/block nesting.
fn collect_returns_in_stmt(arena: &AstArena<'_>, stmt_id: StmtId, out: &mut Vec<ExprId>) {
    match arena.stmt(stmt_id) {
        Stmt::Return(Some(e)) => out.push(*e),
        Stmt::Return(None) | Stmt::Expr(_) | Stmt::Decl { .. } => {}
        Stmt::If { then_branch, else_branch, .. } => {
            for &s in then_branch {
                collect_returns_in_stmt(arena, s, out);
            }
            for &s in else_branch {
                collect_returns_in_stmt(arena, s, out);
            }
        }
        Stmt::Block(stmts) => {
            for &s in stmts {
                collect_returns_in_stmt(arena, s, out);
            }
        }
    }
}

/// Adapts the evaluator's local symbol table to the expression
/// evaluator's narrower `SymbolResolver` view, for magic-number folding.
struct LocalsResolver<'a> {
    locals: &'a HashMap<String, (AstType, SymbolKind)>,
}

impl<'a> SymbolResolver for LocalsResolver<'a> {
    fn resolve(&self, name: &str) -> IdentKind {
        match self.locals.get(name) {
            Some((_, SymbolKind::GlobalVariable)) => IdentKind::Global,
            Some((_, SymbolKind::LocalVariable | SymbolKind::FunctionParam | SymbolKind::FunctionReturn)) => IdentKind::Local,
            None => IdentKind::Unknown,
        }
    }
}

fn binary_result_type(op: BinOp, lhs: &AstType, rhs: &AstType, loc: vmicore_diagnostics::SourceLoc) -> Result<AstType, EvalError> {
    let l_ptr = lhs.is_pointer_like();
    let r_ptr = rhs.is_pointer_like();
    match op {
        BinOp::Add => {
            if l_ptr && !r_ptr {
                Ok(lhs.clone())
            } else if r_ptr && !l_ptr {
                Ok(rhs.clone())
            } else if l_ptr && r_ptr {
                Err(EvalError::ContradictoryOperands { op: "+", loc })
            } else {
                Ok(lhs.clone())
            }
        }
        BinOp::Sub => {
            if l_ptr && r_ptr {
                Ok(AstType::named("long"))
            } else if l_ptr && !r_ptr {
                Ok(lhs.clone())
            } else {
                Ok(lhs.clone())
            }
        }
        BinOp::Mul | BinOp::Mod | BinOp::Shl | BinOp::Shr => {
            if l_ptr || r_ptr {
                Err(EvalError::ContradictoryOperands { op: "arith", loc })
            } else {
                Ok(lhs.clone())
            }
        }
        BinOp::Div | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => Ok(lhs.clone()),
        BinOp::LogAnd
        | BinOp::LogOr
        | BinOp::Eq
        | BinOp::Ne
        | BinOp::Lt
        | BinOp::Le
        | BinOp::Gt
        | BinOp::Ge => Ok(AstType::named("int")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use vmicore_diagnostics::SourceLoc;

    #[derive(Default)]
    struct RecordingSink {
        events: RefCell<Vec<String>>,
        details: RefCell<Vec<TypeEvalDetails>>,
    }
    impl TypeChangeSink for RecordingSink {
        fn primary_expression_type_change(&self, details: &TypeEvalDetails) {
            self.events.borrow_mut().push(details.sym_name.clone());
            self.details.borrow_mut().push(details.clone());
        }
    }

    impl RecordingSink {
        fn last(&self, span: ChangeSpan) -> TypeEvalDetails {
            self.details
                .borrow()
                .iter()
                .rev()
                .find(|d| d.span == span)
                .cloned()
                .unwrap_or_else(|| panic!("no {span:?} event recorded"))
        }
    }

    fn loc() -> SourceLoc {
        SourceLoc::unknown()
    }

    #[test]
    fn assignment_with_same_type_emits_nothing() {
        let arena = AstArena::new();
        let mut declared = DeclaredTypes::new();
        declared.declare_symbol("x", AstType::named("int"), SymbolKind::GlobalVariable);
        declared.declare_symbol("y", AstType::named("int"), SymbolKind::GlobalVariable);

        let x = arena.alloc_expr(Expr::Ident { name: "x".into(), loc: loc() });
        let y = arena.alloc_expr(Expr::Ident { name: "y".into(), loc: loc() });
        let assign = arena.alloc_expr(Expr::Assign { target: x, value: y, loc: loc() });
        let stmt = arena.alloc_stmt(Stmt::Expr(assign));

        let tu = TranslationUnit {
            file: "t.c".into(),
            functions: vec![FunctionDef { name: "f".into(), return_type: "void".into(), params: vec![], body: vec![stmt] }],
        };

        let mut evaluator = AstTypeEvaluator::new(declared);
        let sink = RecordingSink::default();
        evaluator.walk_translation_unit(&arena, &tu, &sink).unwrap();
        assert!(sink.events.borrow().is_empty());
    }

    #[test]
    fn unresolved_identifier_is_fatal() {
        let arena = AstArena::new();
        let declared = DeclaredTypes::new();
        let x = arena.alloc_expr(Expr::Ident { name: "unknown_var".into(), loc: loc() });
        let stmt = arena.alloc_stmt(Stmt::Expr(x));
        let tu = TranslationUnit {
            file: "t.c".into(),
            functions: vec![FunctionDef { name: "f".into(), return_type: "void".into(), params: vec![], body: vec![stmt] }],
        };
        let mut evaluator = AstTypeEvaluator::new(declared);
        let sink = RecordingSink::default();
        assert!(evaluator.walk_translation_unit(&arena, &tu, &sink).is_err());
    }

    #[test]
    fn plain_global_reassignment_reports_value_symbol_with_its_declared_type_as_context() {
        let arena = AstArena::new();
        let mut declared = DeclaredTypes::new();
        declared.declare_symbol("h", AstType::named("list_head").pointer_to(), SymbolKind::GlobalVariable);
        declared.declare_symbol("m", AstType::named("module").pointer_to(), SymbolKind::GlobalVariable);

        let h = arena.alloc_expr(Expr::Ident { name: "h".into(), loc: loc() });
        let m = arena.alloc_expr(Expr::Ident { name: "m".into(), loc: loc() });
        let assign = arena.alloc_expr(Expr::Assign { target: h, value: m, loc: loc() });
        let stmt = arena.alloc_stmt(Stmt::Expr(assign));
        let tu = TranslationUnit {
            file: "t.c".into(),
            functions: vec![FunctionDef { name: "f".into(), return_type: "void".into(), params: vec![], body: vec![stmt] }],
        };

        let mut evaluator = AstTypeEvaluator::new(declared);
        let sink = RecordingSink::default();
        evaluator.walk_translation_unit(&arena, &tu, &sink).unwrap();

        let last = sink.last(ChangeSpan::Last);
        assert_eq!(last.sym_name, "m");
        assert_eq!(last.ctx_type.as_deref(), Some("module"));
        assert!(last.ctx_members.is_empty());
        assert_eq!(last.target_type, AstType::named("list_head").pointer_to());
    }

    #[test]
    fn member_access_through_a_pointer_reports_owning_struct_and_field() {
        let arena = AstArena::new();
        let mut declared = DeclaredTypes::new();
        declared.declare_struct(
            "list_head",
            vec![
                ("next".into(), AstType::named("list_head").pointer_to()),
                ("prev".into(), AstType::named("list_head").pointer_to()),
            ],
        );
        declared.declare_symbol("h", AstType::named("list_head").pointer_to(), SymbolKind::GlobalVariable);
        declared.declare_symbol("m", AstType::named("module").pointer_to(), SymbolKind::GlobalVariable);

        let h = arena.alloc_expr(Expr::Ident { name: "h".into(), loc: loc() });
        let h_next = arena.alloc_expr(Expr::Member { base: h, member: "next".into(), via_pointer: true, loc: loc() });
        let m = arena.alloc_expr(Expr::Ident { name: "m".into(), loc: loc() });
        let assign = arena.alloc_expr(Expr::Assign { target: m, value: h_next, loc: loc() });
        let stmt = arena.alloc_stmt(Stmt::Expr(assign));
        let tu = TranslationUnit {
            file: "t.c".into(),
            functions: vec![FunctionDef { name: "f".into(), return_type: "void".into(), params: vec![], body: vec![stmt] }],
        };

        let mut evaluator = AstTypeEvaluator::new(declared);
        let sink = RecordingSink::default();
        evaluator.walk_translation_unit(&arena, &tu, &sink).unwrap();

        let last = sink.last(ChangeSpan::Last);
        assert_eq!(last.sym_name, "h");
        assert_eq!(last.ctx_type.as_deref(), Some("list_head"));
        assert_eq!(last.ctx_members, vec!["next".to_string()]);
        assert_eq!(last.target_type, AstType::named("module").pointer_to());
    }

    #[test]
    fn member_access_through_an_array_element_reports_the_full_dotted_path() {
        let arena = AstArena::new();
        let mut declared = DeclaredTypes::new();
        declared.declare_struct("foo", vec![("next".into(), AstType::named("foo").pointer_to())]);
        declared.declare_struct("bar", vec![("f".into(), AstType::named("foo").wrap(AstTypeKind::Array(Some(4))))]);
        declared.declare_symbol("b", AstType::named("bar"), SymbolKind::GlobalVariable);
        declared.declare_symbol("m", AstType::named("module").pointer_to(), SymbolKind::GlobalVariable);

        let b = arena.alloc_expr(Expr::Ident { name: "b".into(), loc: loc() });
        let b_f = arena.alloc_expr(Expr::Member { base: b, member: "f".into(), via_pointer: false, loc: loc() });
        let zero = arena.alloc_expr(Expr::IntLiteral { value: 0, loc: loc() });
        let b_f_0 = arena.alloc_expr(Expr::Index { base: b_f, index: zero, loc: loc() });
        let b_f_0_next = arena.alloc_expr(Expr::Member { base: b_f_0, member: "next".into(), via_pointer: false, loc: loc() });
        let m = arena.alloc_expr(Expr::Ident { name: "m".into(), loc: loc() });
        let assign = arena.alloc_expr(Expr::Assign { target: m, value: b_f_0_next, loc: loc() });
        let stmt = arena.alloc_stmt(Stmt::Expr(assign));
        let tu = TranslationUnit {
            file: "t.c".into(),
            functions: vec![FunctionDef { name: "f".into(), return_type: "void".into(), params: vec![], body: vec![stmt] }],
        };

        let mut evaluator = AstTypeEvaluator::new(declared);
        let sink = RecordingSink::default();
        evaluator.walk_translation_unit(&arena, &tu, &sink).unwrap();

        let last = sink.last(ChangeSpan::Last);
        assert_eq!(last.sym_name, "b");
        assert_eq!(last.ctx_type.as_deref(), Some("bar"));
        assert_eq!(last.ctx_members, vec!["f".to_string(), "next".to_string()]);
    }

    #[test]
    fn multiplying_two_pointers_is_a_type_error() {
        let arena = AstArena::new();
        let mut declared = DeclaredTypes::new();
        declared.declare_symbol("p", AstType::named("char").pointer_to(), SymbolKind::GlobalVariable);
        declared.declare_symbol("i", AstType::named("int").pointer_to(), SymbolKind::GlobalVariable);

        let p = arena.alloc_expr(Expr::Ident { name: "p".into(), loc: loc() });
        let i = arena.alloc_expr(Expr::Ident { name: "i".into(), loc: loc() });
        let mul = arena.alloc_expr(Expr::Binary { op: BinOp::Mul, lhs: p, rhs: i, loc: loc() });
        let p2 = arena.alloc_expr(Expr::Ident { name: "p".into(), loc: loc() });
        let assign = arena.alloc_expr(Expr::Assign { target: p2, value: mul, loc: loc() });
        let stmt = arena.alloc_stmt(Stmt::Expr(assign));
        let tu = TranslationUnit {
            file: "t.c".into(),
            functions: vec![FunctionDef { name: "f".into(), return_type: "void".into(), params: vec![], body: vec![stmt] }],
        };

        let mut evaluator = AstTypeEvaluator::new(declared);
        let sink = RecordingSink::default();
        assert!(evaluator.walk_translation_unit(&arena, &tu, &sink).is_err());
    }

    #[test]
    fn deref_of_non_pointer_is_fatal() {
        let arena = AstArena::new();
        let mut declared = DeclaredTypes::new();
        declared.declare_symbol("x", AstType::named("int"), SymbolKind::GlobalVariable);
        let x = arena.alloc_expr(Expr::Ident { name: "x".into(), loc: loc() });
        let deref = arena.alloc_expr(Expr::Unary { op: UnaryOp::Deref, operand: x, loc: loc() });
        let stmt = arena.alloc_stmt(Stmt::Expr(deref));
        let tu = TranslationUnit {
            file: "t.c".into(),
            functions: vec![FunctionDef { name: "f".into(), return_type: "void".into(), params: vec![], body: vec![stmt] }],
        };
        let mut evaluator = AstTypeEvaluator::new(declared);
        let sink = RecordingSink::default();
        assert!(evaluator.walk_translation_unit(&arena, &tu, &sink).is_err());
    }

    #[test]
    fn arrow_and_deref_dot_access_record_the_same_transformation_chain() {
        let arena = AstArena::new();
        let mut declared = DeclaredTypes::new();
        declared.declare_struct("list_head", vec![("next".into(), AstType::named("list_head").pointer_to())]);
        declared.declare_symbol("h", AstType::named("list_head").pointer_to(), SymbolKind::GlobalVariable);
        declared.declare_symbol("m", AstType::named("module").pointer_to(), SymbolKind::GlobalVariable);

        let h1 = arena.alloc_expr(Expr::Ident { name: "h".into(), loc: loc() });
        let arrow = arena.alloc_expr(Expr::Member { base: h1, member: "next".into(), via_pointer: true, loc: loc() });
        let m1 = arena.alloc_expr(Expr::Ident { name: "m".into(), loc: loc() });
        let assign1 = arena.alloc_expr(Expr::Assign { target: m1, value: arrow, loc: loc() });
        let stmt1 = arena.alloc_stmt(Stmt::Expr(assign1));
        let tu1 = TranslationUnit {
            file: "t.c".into(),
            functions: vec![FunctionDef { name: "f".into(), return_type: "void".into(), params: vec![], body: vec![stmt1] }],
        };
        let mut evaluator1 = AstTypeEvaluator::new(declared.clone());
        let sink1 = RecordingSink::default();
        evaluator1.walk_translation_unit(&arena, &tu1, &sink1).unwrap();
        let arrow_transforms = sink1.last(ChangeSpan::Last).transformations;

        let h2 = arena.alloc_expr(Expr::Ident { name: "h".into(), loc: loc() });
        let deref = arena.alloc_expr(Expr::Unary { op: UnaryOp::Deref, operand: h2, loc: loc() });
        let dot = arena.alloc_expr(Expr::Member { base: deref, member: "next".into(), via_pointer: false, loc: loc() });
        let m2 = arena.alloc_expr(Expr::Ident { name: "m".into(), loc: loc() });
        let assign2 = arena.alloc_expr(Expr::Assign { target: m2, value: dot, loc: loc() });
        let stmt2 = arena.alloc_stmt(Stmt::Expr(assign2));
        let tu2 = TranslationUnit {
            file: "t.c".into(),
            functions: vec![FunctionDef { name: "f".into(), return_type: "void".into(), params: vec![], body: vec![stmt2] }],
        };
        let mut evaluator2 = AstTypeEvaluator::new(declared);
        let sink2 = RecordingSink::default();
        evaluator2.walk_translation_unit(&arena, &tu2, &sink2).unwrap();
        let dot_transforms = sink2.last(ChangeSpan::Last).transformations;

        assert_eq!(arrow_transforms, dot_transforms);
        assert_eq!(arrow_transforms, vec![TransformStep::Deref, TransformStep::Member("next".into())]);
    }

    #[test]
    fn designated_initializer_resolves_member_types_in_declaration_order() {
        let arena = AstArena::new();
        let mut declared = DeclaredTypes::new();
        declared.declare_struct(
            "pair",
            vec![
                ("count".into(), AstType::named("int")),
                ("owner".into(), AstType::named("module").pointer_to()),
            ],
        );
        declared.declare_symbol("h", AstType::named("list_head").pointer_to(), SymbolKind::GlobalVariable);

        let zero = arena.alloc_expr(Expr::IntLiteral { value: 0, loc: loc() });
        let h = arena.alloc_expr(Expr::Ident { name: "h".into(), loc: loc() });
        let init = arena.alloc_expr(Expr::DesignatedInitializer { elements: vec![(None, zero), (None, h)], loc: loc() });
        let stmt = arena.alloc_stmt(Stmt::Decl { name: "p".into(), declared_type: "pair".into(), init: Some(init) });
        let tu = TranslationUnit {
            file: "t.c".into(),
            functions: vec![FunctionDef { name: "f".into(), return_type: "void".into(), params: vec![], body: vec![stmt] }],
        };

        let mut evaluator = AstTypeEvaluator::new(declared);
        let sink = RecordingSink::default();
        evaluator.walk_translation_unit(&arena, &tu, &sink).unwrap();

        let last = sink.last(ChangeSpan::Last);
        assert_eq!(last.sym_name, "h");
        assert_eq!(last.target_type, AstType::named("module").pointer_to());
    }

    #[test]
    fn call_result_type_change_propagates_back_to_the_callees_return_expression() {
        let arena = AstArena::new();
        let mut declared = DeclaredTypes::new();
        declared.declare_symbol("h", AstType::named("list_head").pointer_to(), SymbolKind::GlobalVariable);
        declared.declare_symbol("m", AstType::named("module").pointer_to(), SymbolKind::GlobalVariable);
        declared.declare_function_return("get_h", AstType::named("list_head").pointer_to());

        let h = arena.alloc_expr(Expr::Ident { name: "h".into(), loc: loc() });
        let ret_stmt = arena.alloc_stmt(Stmt::Return(Some(h)));

        let call = arena.alloc_expr(Expr::Call { callee: "get_h".into(), args: vec![], loc: loc() });
        let m = arena.alloc_expr(Expr::Ident { name: "m".into(), loc: loc() });
        let assign = arena.alloc_expr(Expr::Assign { target: m, value: call, loc: loc() });
        let assign_stmt = arena.alloc_stmt(Stmt::Expr(assign));

        let tu = TranslationUnit {
            file: "t.c".into(),
            functions: vec![
                FunctionDef { name: "get_h".into(), return_type: "list_head*".into(), params: vec![], body: vec![ret_stmt] },
                FunctionDef { name: "caller".into(), return_type: "void".into(), params: vec![], body: vec![assign_stmt] },
            ],
        };

        let mut evaluator = AstTypeEvaluator::new(declared);
        let sink = RecordingSink::default();
        evaluator.walk_translation_unit(&arena, &tu, &sink).unwrap();

        let first = sink.last(ChangeSpan::First);
        assert_eq!(first.sym_name, "h");
    }

    #[test]
    fn member_assignment_with_a_constant_rhs_folds_into_the_sink() {
        #[derive(Default)]
        struct FactsSink {
            captured: RefCell<Vec<(String, String, i64)>>,
        }
        impl TypeChangeSink for FactsSink {
            fn primary_expression_type_change(&self, _details: &TypeEvalDetails) {}
            fn member_constant_assignment(&self, owner: &str, member: &str, facts: &ConstFacts) {
                if let Some(&v) = facts.ints().iter().next() {
                    self.captured.borrow_mut().push((owner.to_string(), member.to_string(), v));
                }
            }
        }

        let arena = AstArena::new();
        let mut declared = DeclaredTypes::new();
        declared.declare_struct("opts", vec![("flags".into(), AstType::named("int"))]);
        declared.declare_symbol("o", AstType::named("opts"), SymbolKind::GlobalVariable);

        let o = arena.alloc_expr(Expr::Ident { name: "o".into(), loc: loc() });
        let target = arena.alloc_expr(Expr::Member { base: o, member: "flags".into(), via_pointer: false, loc: loc() });
        let val = arena.alloc_expr(Expr::IntLiteral { value: 7, loc: loc() });
        let assign = arena.alloc_expr(Expr::Assign { target, value: val, loc: loc() });
        let stmt = arena.alloc_stmt(Stmt::Expr(assign));
        let tu = TranslationUnit {
            file: "t.c".into(),
            functions: vec![FunctionDef { name: "f".into(), return_type: "void".into(), params: vec![], body: vec![stmt] }],
        };

        let mut evaluator = AstTypeEvaluator::new(declared);
        let sink = FactsSink::default();
        evaluator.walk_translation_unit(&arena, &tu, &sink).unwrap();

        let captured = sink.captured.borrow();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0], ("opts".to_string(), "flags".to_string(), 7));
    }
}
