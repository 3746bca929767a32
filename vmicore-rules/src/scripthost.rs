use vmicore_types::Instance;

/// The scripting host rule actions call into. Out of scope per spec.md
/// §1 ("specified only through their interface"); this crate only
/// defines the contract and a no-op default for embeddings that don't
/// wire up a real host.
pub trait ScriptHost {
    fn invoke_inline(&self, source: &str, inst: &Instance) -> Result<Option<Instance>, String>;
    fn invoke_file_function(&self, file: &str, function: &str, inst: &Instance) -> Result<Option<Instance>, String>;
}

pub struct NoOpScriptHost;

impl ScriptHost for NoOpScriptHost {
    fn invoke_inline(&self, _source: &str, _inst: &Instance) -> Result<Option<Instance>, String> {
        Err("no scripting host configured".to_string())
    }

    fn invoke_file_function(&self, _file: &str, _function: &str, _inst: &Instance) -> Result<Option<Instance>, String> {
        Err("no scripting host configured".to_string())
    }
}
