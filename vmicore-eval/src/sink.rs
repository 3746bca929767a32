use crate::details::{SymbolKind, TypeEvalDetails};
use vmicore_types::{AddrExpr, Catalog, ConstFacts, ReferencingRef};

/// Receives type-change events from [`crate::evaluator::AstTypeEvaluator`].
/// Kept as a trait rather than a base class to reimplement (per DESIGN
/// NOTES: capability traits over class hierarchy) so tests can observe
/// emitted events without a live catalog.
pub trait TypeChangeSink {
    fn primary_expression_type_change(&self, details: &TypeEvalDetails);

    /// Folds a constant observed assigned into a struct member (spec.md
    /// §4.C). Default no-op: sinks that only care about type-change
    /// events don't need to implement this.
    fn member_constant_assignment(&self, _owner_type_name: &str, _member: &str, _facts: &ConstFacts) {}
}

/// Merges type-change events back into a [`Catalog`] as alternate-type
/// edges (spec.md §4.B.1).
pub struct CatalogTypeChangeSink<'a> {
    catalog: &'a Catalog,
}

impl<'a> CatalogTypeChangeSink<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Resolves a type-change event to the exact referencing site it was
    /// observed at (spec.md §3): the struct member the chain walked
    /// through if there was one, otherwise the bare variable itself.
    fn site_for(&self, details: &TypeEvalDetails) -> Option<ReferencingRef> {
        match details.ctx_members.last() {
            Some(member_name) => {
                let ctx_type_name = details.ctx_type.as_deref()?;
                let &owner = self.catalog.by_name(ctx_type_name).first()?;
                let ty = self.catalog.by_id(owner)?;
                let members = ty.kind.members()?;
                let member_index = members.iter().position(|m| &m.name == member_name)? as u32;
                Some(ReferencingRef::Member { owner, member_index })
            }
            None => {
                let var_id = self.catalog.var_by_name(&details.sym_name)?;
                Some(ReferencingRef::Variable(var_id))
            }
        }
    }
}

impl<'a> TypeChangeSink for CatalogTypeChangeSink<'a> {
    fn primary_expression_type_change(&self, details: &TypeEvalDetails) {
        // Ignore usages of a pointer as a plain integer: nothing learned.
        if !details.target_type.is_pointer_like() {
            return;
        }
        if matches!(details.sym_kind, SymbolKind::FunctionReturn) {
            return;
        }
        let found = details.target_type.resolve(self.catalog);
        let Some(&target) = found.with_pointer.first().or(found.without_pointer.first()) else {
            log::debug!("no catalog type for alternate target of {}", details.sym_name);
            return;
        };

        let Some(site) = self.site_for(details) else {
            log::debug!("no referencing site resolved for {}", details.sym_name);
            return;
        };

        self.catalog.add_alternate_type(site, target, AddrExpr::Base);
    }

    fn member_constant_assignment(&self, owner_type_name: &str, member: &str, facts: &ConstFacts) {
        let Some(&owner) = self.catalog.by_name(owner_type_name).first() else {
            return;
        };
        let Some(ty) = self.catalog.by_id(owner) else {
            return;
        };
        let Some(members) = ty.kind.members() else {
            return;
        };
        let Some(member_index) = members.iter().position(|m| m.name == member) else {
            return;
        };
        self.catalog.merge_member_facts(owner, member_index as u32, facts);
    }
}
