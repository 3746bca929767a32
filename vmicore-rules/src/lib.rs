//! Declarative pattern-match rules (filters + priority + actions) applied
//! to candidate instances during map construction (spec component D).

pub mod engine;
pub mod error;
pub mod rule;
pub mod scripthost;

pub use engine::{instance_from_match, MatchResult, RuleEngine};
pub use error::RuleEngineError;
pub use rule::{ActionKind, CompiledAddrExpr, MatchContext, Rule, RuleFile, RuleFilter};
pub use scripthost::{NoOpScriptHost, ScriptHost};

#[cfg(test)]
mod tests {
    use super::*;
    use vmicore_diagnostics::DiagnosticEngine;
    use vmicore_types::{Instance, InstanceOrigin, TypeId};

    const SAMPLE_RULES: &str = r#"
        <rules>
            <rule id="r1" priority="10">
                <filter>
                    <typeId>3</typeId>
                </filter>
                <action kind="Expression">
                    <target_type>task_struct</target_type>
                    <addr_expr>Base</addr_expr>
                </action>
            </rule>
        </rules>
    "#;

    #[test]
    fn load_indexes_by_type_id() {
        let engine = RuleEngine::load(SAMPLE_RULES, |_| None).unwrap();
        let ctx = MatchContext { type_id: Some(TypeId(3)), ..Default::default() };
        let inst = Instance::new(0x1000, TypeId(3), "root", InstanceOrigin::Variable);
        let mut diagnostics = DiagnosticEngine::new();
        let result = engine.apply(&inst, &ctx, |_| None, |_, _| None, &NoOpScriptHost, &mut diagnostics);
        assert_eq!(
            result,
            MatchResult::Match { new_address: 0x1000, new_type_name: "task_struct".to_string() }
        );
    }

    #[test]
    fn no_candidates_is_no_match() {
        let engine = RuleEngine::load(SAMPLE_RULES, |_| None).unwrap();
        let ctx = MatchContext { type_id: Some(TypeId(99)), ..Default::default() };
        let inst = Instance::new(0x1000, TypeId(99), "root", InstanceOrigin::Variable);
        let mut diagnostics = DiagnosticEngine::new();
        let result = engine.apply(&inst, &ctx, |_| None, |_, _| None, &NoOpScriptHost, &mut diagnostics);
        assert_eq!(result, MatchResult::NoMatch);
    }
}
