use crate::details::SymbolKind;
use std::collections::HashMap;
use vmicore_ast::AstType;

/// Declared-type environment fed to [`crate::evaluator::AstTypeEvaluator`]:
/// globals and struct member layouts come from the catalog ahead of time;
/// locals and params are added as the walk enters each function.
#[derive(Debug, Clone, Default)]
pub struct DeclaredTypes {
    symbols: HashMap<String, (AstType, SymbolKind)>,
    struct_members: HashMap<String, Vec<(String, AstType)>>,
    function_returns: HashMap<String, AstType>,
}

impl DeclaredTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_symbol(&mut self, name: impl Into<String>, ty: AstType, kind: SymbolKind) {
        self.symbols.insert(name.into(), (ty, kind));
    }

    pub fn symbol(&self, name: &str) -> Option<&(AstType, SymbolKind)> {
        self.symbols.get(name)
    }

    pub fn declare_struct(&mut self, type_name: impl Into<String>, members: Vec<(String, AstType)>) {
        self.struct_members.insert(type_name.into(), members);
    }

    pub fn member_type(&self, type_name: &str, member: &str) -> Option<&AstType> {
        self.struct_members
            .get(type_name)?
            .iter()
            .find(|(name, _)| name == member)
            .map(|(_, ty)| ty)
    }

    /// Declaration-order index of `member` within `type_name`, used to
    /// resume positional designated-initializer elements after a `.field=`
    /// designator.
    pub fn member_index(&self, type_name: &str, member: &str) -> Option<usize> {
        self.struct_members.get(type_name)?.iter().position(|(name, _)| name == member)
    }

    /// The `(name, type)` pair declared at `index` within `type_name`, in
    /// declaration order.
    pub fn member_at(&self, type_name: &str, index: usize) -> Option<&(String, AstType)> {
        self.struct_members.get(type_name)?.get(index)
    }

    pub fn declare_function_return(&mut self, name: impl Into<String>, ty: AstType) {
        self.function_returns.insert(name.into(), ty);
    }

    pub fn function_return(&self, name: &str) -> Option<&AstType> {
        self.function_returns.get(name)
    }

    /// Forgets locals; globals and struct/function tables are unaffected.
    /// Called on function entry so each function starts with a clean
    /// local scope (mirrors scoped symbol-table save/restore).
    pub fn enter_function_scope(&self) -> HashMap<String, (AstType, SymbolKind)> {
        self.symbols
            .iter()
            .filter(|(_, (_, kind))| *kind == SymbolKind::GlobalVariable)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
