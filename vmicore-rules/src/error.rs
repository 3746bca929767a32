use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleEngineError {
    #[error("failed to parse rule file: {0}")]
    Parse(#[from] quick_xml::de::DeError),

    #[error("rule {0:?} has no matching action kind")]
    MissingAction(String),
}
