use std::fmt;

/// The error-kind taxonomy from spec.md §7, shared across crates so that
/// diagnostics from unrelated subsystems can be aggregated and reported
/// uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rule or expression parse failure.
    Syntax,
    /// Undefined AST node type, operator on incompatible operands,
    /// unresolved type in the catalog.
    Type,
    /// Expression could not be folded to a constant when one was required.
    Evaluation,
    /// Failed virtual-to-physical translation or read past end of dump.
    Memory,
    /// Runtime failure in a rule action.
    Rule,
    /// Internal id collision, structural-hash mismatch on update.
    Catalog,
    /// Operation interrupted via the cooperative cancellation flag.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Syntax => "E-SYNTAX",
            ErrorKind::Type => "E-TYPE",
            ErrorKind::Evaluation => "E-EVAL",
            ErrorKind::Memory => "E-MEM",
            ErrorKind::Rule => "E-RULE",
            ErrorKind::Catalog => "E-CATALOG",
            ErrorKind::Cancelled => "E-CANCELLED",
        };
        write!(f, "{s}")
    }
}
