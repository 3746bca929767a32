use thiserror::Error;
use vmicore_diagnostics::SourceLoc;

/// A fatal failure of the per-translation-unit walk (spec.md §4.B.5). The
/// walk aborts the current unit but does not roll back catalog mutations
/// already merged from earlier, successfully processed expressions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("{loc}: unknown AST node kind")]
    UnknownNodeKind { loc: SourceLoc },

    #[error("{loc}: unresolved identifier {name:?}")]
    UnresolvedIdentifier { name: String, loc: SourceLoc },

    #[error("{loc}: contradictory operand types for operator {op}")]
    ContradictoryOperands { op: &'static str, loc: SourceLoc },
}
