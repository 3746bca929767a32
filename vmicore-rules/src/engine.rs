use crate::error::RuleEngineError;
use crate::rule::{ActionKind, MatchContext, Rule, RuleFile};
use crate::scripthost::ScriptHost;
use std::collections::HashMap;
use vmicore_diagnostics::{Diagnostic, DiagnosticEngine};
use vmicore_types::{Instance, InstanceOrigin, TypeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Match { new_address: u64, new_type_name: String },
    Ambiguous,
    DefaultHandler,
    Defer,
    NoMatch,
}

/// Declarative pattern-match rules applied to candidate instances during
/// map construction (spec.md §4.D). Rules are indexed by target `TypeId`
/// for O(1) candidate lookup; a catch-all bucket (`wildcard`) holds rules
/// whose filter names only a type by string or matches on something else
/// entirely, resolved lazily since the type may not exist in the catalog
/// at rule-load time.
pub struct RuleEngine {
    by_type: HashMap<TypeId, Vec<Rule>>,
    wildcard: Vec<Rule>,
}

impl RuleEngine {
    pub fn load(xml: &str, resolve_type: impl Fn(&str) -> Option<TypeId>) -> Result<Self, RuleEngineError> {
        let file: RuleFile = quick_xml::de::from_str(xml)?;
        let mut by_type: HashMap<TypeId, Vec<Rule>> = HashMap::new();
        let mut wildcard = Vec::new();

        for rule in file.rules {
            let indexed_type = rule
                .filter
                .type_id
                .map(TypeId)
                .or_else(|| rule.filter.type_name.as_deref().and_then(&resolve_type));
            match indexed_type {
                Some(id) => by_type.entry(id).or_default().push(rule),
                None => wildcard.push(rule),
            }
        }

        for rules in by_type.values_mut() {
            rules.sort_by_key(|r| std::cmp::Reverse(r.priority));
        }
        wildcard.sort_by_key(|r| std::cmp::Reverse(r.priority));

        Ok(Self { by_type, wildcard })
    }

    fn candidates(&self, type_id: Option<TypeId>) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = type_id.and_then(|id| self.by_type.get(&id)).into_iter().flatten().collect();
        rules.extend(self.wildcard.iter());
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority));
        rules
    }

    /// Applies the highest-priority matching rule to `inst`. Rule actions
    /// never throw into the caller: script exceptions are caught and
    /// reported to `diagnostics` as warnings carrying the rule's id.
    pub fn apply(
        &self,
        inst: &Instance,
        ctx: &MatchContext,
        resolve_type: impl Fn(&str) -> Option<TypeId>,
        resolve_offset: impl Fn(TypeId, &str) -> Option<u64> + Copy,
        host: &impl ScriptHost,
        diagnostics: &mut DiagnosticEngine,
    ) -> MatchResult {
        let candidates = self.candidates(ctx.type_id);
        if candidates.is_empty() {
            return MatchResult::NoMatch;
        }

        let Some(member_path) = &ctx.member_path else {
            return self.apply_matching(&candidates, inst, ctx, resolve_type, resolve_offset, host, diagnostics);
        };

        if candidates.iter().any(|r| r.filter.path_is_proper_prefix(member_path)) {
            return MatchResult::Defer;
        }

        self.apply_matching(&candidates, inst, ctx, resolve_type, resolve_offset, host, diagnostics)
    }

    fn apply_matching(
        &self,
        candidates: &[&Rule],
        inst: &Instance,
        ctx: &MatchContext,
        resolve_type: impl Fn(&str) -> Option<TypeId>,
        resolve_offset: impl Fn(TypeId, &str) -> Option<u64> + Copy,
        host: &impl ScriptHost,
        diagnostics: &mut DiagnosticEngine,
    ) -> MatchResult {
        let matching: Vec<&Rule> = candidates.iter().copied().filter(|r| r.filter.matches(ctx)).collect();
        let Some(&top) = matching.first() else {
            return MatchResult::NoMatch;
        };

        let same_priority: Vec<&Rule> = matching.iter().copied().take_while(|r| r.priority == top.priority).collect();

        let results: Vec<Option<(u64, String)>> = same_priority
            .iter()
            .map(|&r| self.run_action(r, inst, &resolve_type, resolve_offset, host, diagnostics))
            .collect();

        let resolved: Vec<&(u64, String)> = results.iter().filter_map(|r| r.as_ref()).collect();
        match resolved.len() {
            0 => MatchResult::DefaultHandler,
            1 => MatchResult::Match { new_address: resolved[0].0, new_type_name: resolved[0].1.clone() },
            _ => {
                let distinct = resolved.windows(2).any(|w| w[0] != w[1]);
                if distinct {
                    MatchResult::Ambiguous
                } else {
                    MatchResult::Match { new_address: resolved[0].0, new_type_name: resolved[0].1.clone() }
                }
            }
        }
    }

    fn run_action(
        &self,
        rule: &Rule,
        inst: &Instance,
        resolve_type: &impl Fn(&str) -> Option<TypeId>,
        resolve_offset: impl Fn(TypeId, &str) -> Option<u64> + Copy,
        host: &impl ScriptHost,
        diagnostics: &mut DiagnosticEngine,
    ) -> Option<(u64, String)> {
        match &rule.action {
            ActionKind::Expression { target_type, addr_expr } => {
                let expr = addr_expr.lower(resolve_type);
                expr.evaluate(inst.address, resolve_offset).map(|addr| (addr, target_type.clone()))
            }
            ActionKind::InlineScript { source } => match host.invoke_inline(source, inst) {
                Ok(Some(new_inst)) => Some((new_inst.address, new_inst.type_id.to_string())),
                Ok(None) => None,
                Err(message) => {
                    diagnostics.emit(Diagnostic::warning(
                        vmicore_diagnostics::ErrorKind::Rule,
                        format!("rule {:?}: {message}", rule.id),
                        vmicore_diagnostics::SourceLoc::unknown(),
                    ));
                    None
                }
            },
            ActionKind::ScriptFileFunction { file, function } => match host.invoke_file_function(file, function, inst) {
                Ok(Some(new_inst)) => Some((new_inst.address, new_inst.type_id.to_string())),
                Ok(None) => None,
                Err(message) => {
                    diagnostics.emit(Diagnostic::warning(
                        vmicore_diagnostics::ErrorKind::Rule,
                        format!("rule {:?}: {message}", rule.id),
                        vmicore_diagnostics::SourceLoc::unknown(),
                    ));
                    None
                }
            },
        }
    }
}

/// Helper for constructing an [`Instance`] from a rule-engine match
/// result once the caller has resolved `new_type_name` to a `TypeId`.
pub fn instance_from_match(address: u64, type_id: TypeId, name_path: &str) -> Instance {
    Instance::new(address, type_id, name_path, InstanceOrigin::RuleEngine)
}
