use serde::Deserialize;
use vmicore_types::{AddrExpr, TypeId};

/// A conjunction of match criteria (spec.md §4.D). Every `Some` field
/// must match; `None` fields are wildcards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleFilter {
    #[serde(rename = "typeName", default)]
    pub type_name: Option<String>,
    #[serde(rename = "typeId", default)]
    pub type_id: Option<u32>,
    #[serde(rename = "memberPath", default)]
    pub member_path: Option<String>,
    #[serde(rename = "variableName", default)]
    pub variable_name: Option<String>,
    #[serde(rename = "symbolFileGlob", default)]
    pub symbol_file_glob: Option<String>,
    #[serde(rename = "osVersionMin", default)]
    pub os_version_min: Option<String>,
    #[serde(rename = "osVersionMax", default)]
    pub os_version_max: Option<String>,
}

/// Facts about the instance being matched, gathered by the caller before
/// calling [`crate::engine::RuleEngine::apply`].
#[derive(Debug, Clone, Default)]
pub struct MatchContext {
    pub type_name: Option<String>,
    pub type_id: Option<TypeId>,
    pub member_path: Option<String>,
    pub variable_name: Option<String>,
    pub symbol_file: Option<String>,
    pub os_version: Option<String>,
}

impl RuleFilter {
    pub fn matches(&self, ctx: &MatchContext) -> bool {
        if let Some(name) = &self.type_name {
            if ctx.type_name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(id) = self.type_id {
            if ctx.type_id.map(|t| t.0) != Some(id) {
                return false;
            }
        }
        if let Some(path) = &self.member_path {
            match &ctx.member_path {
                Some(actual) if actual == path => {}
                _ => return false,
            }
        }
        if let Some(name) = &self.variable_name {
            if ctx.variable_name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(glob) = &self.symbol_file_glob {
            match &ctx.symbol_file {
                Some(file) if glob_match(glob, file) => {}
                _ => return false,
            }
        }
        if self.os_version_min.is_some() || self.os_version_max.is_some() {
            let Some(version) = &ctx.os_version else { return false };
            if let Some(min) = &self.os_version_min {
                if version.as_str() < min.as_str() {
                    return false;
                }
            }
            if let Some(max) = &self.os_version_max {
                if version.as_str() > max.as_str() {
                    return false;
                }
            }
        }
        true
    }

    /// `true` if `path` is a proper prefix of this filter's required
    /// member chain -- the engine should `Defer` rather than reject
    /// (spec.md §4.D).
    pub fn path_is_proper_prefix(&self, path: &str) -> bool {
        match &self.member_path {
            Some(required) => required.starts_with(path) && required != path,
            None => false,
        }
    }
}

fn glob_match(glob: &str, text: &str) -> bool {
    match glob.split_once('*') {
        None => glob == text,
        Some((prefix, suffix)) => text.starts_with(prefix) && text.ends_with(suffix) && text.len() >= prefix.len() + suffix.len(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind")]
pub enum ActionKind {
    /// A C-like expression over the source instance, compiled ahead of
    /// time to an [`AddrExpr`] plus a target type name.
    Expression { target_type: String, addr_expr: CompiledAddrExpr },
    /// A fragment of scripting-language source, wrapped in a dedicated
    /// function and invoked per matching instance.
    InlineScript { source: String },
    /// A named function in an external script file, loaded once per
    /// session.
    ScriptFileFunction { file: String, function: String },
}

/// Serializable mirror of [`AddrExpr`] for the XML rule format: the
/// catalog type doesn't implement `serde::Deserialize` for
/// `quick-xml`'s attribute-heavy style, so rule files spell out a small
/// constant/member-offset grammar that lowers to `AddrExpr` at load time.
#[derive(Debug, Clone, Deserialize)]
pub enum CompiledAddrExpr {
    Base,
    ConstantOffset(i64),
    MemberOffset { of_type: String, member: String },
}

impl CompiledAddrExpr {
    pub fn lower(&self, resolve_type: impl Fn(&str) -> Option<TypeId>) -> AddrExpr {
        match self {
            CompiledAddrExpr::Base => AddrExpr::Base,
            CompiledAddrExpr::ConstantOffset(c) => AddrExpr::Constant(*c),
            CompiledAddrExpr::MemberOffset { of_type, member } => match resolve_type(of_type) {
                Some(of_type) => AddrExpr::MemberOffset { of_type, member: member.clone() },
                None => AddrExpr::Base,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@priority")]
    pub priority: i32,
    pub filter: RuleFilter,
    pub action: ActionKind,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename = "rules")]
pub struct RuleFile {
    #[serde(rename = "rule", default)]
    pub rules: Vec<Rule>,
}
