//! Shared diagnostic reporting used by every other `vmicore` crate.
//!
//! Mirrors the error-kind taxonomy of the introspection framework's design
//! (`SyntaxError`, `TypeError`, `EvaluationError`, `MemoryError`,
//! `RuleError`, `CatalogError`, `Cancelled`): each owning crate raises its
//! own `thiserror` error type, but every error that should be visible to a
//! user is also turned into a [`Diagnostic`] and collected in a
//! [`DiagnosticEngine`] so that warnings/errors from unrelated subsystems
//! (the AST evaluator aborting one translation unit, a rule being disabled,
//! a dropped memory-read candidate) end up in one aggregate report.

use colored::Colorize;
use std::fmt;

pub mod error_kind;
pub use error_kind::ErrorKind;

/// A `file:line:column` source location. Used both for C source positions
/// (AST evaluator) and for rule-file positions (rule engine).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl SourceLoc {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
            column: 0,
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "{}", "error".red().bold()),
            Severity::Warning => write!(f, "{}", "warning".yellow().bold()),
            Severity::Note => write!(f, "{}", "note".cyan().bold()),
        }
    }
}

/// A single reported problem, attributable to an error kind and a location.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
    pub loc: SourceLoc,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, kind: ErrorKind, message: String, loc: SourceLoc) -> Self {
        Self {
            severity,
            kind,
            message,
            loc,
            notes: Vec::new(),
        }
    }

    pub fn error(kind: ErrorKind, message: String, loc: SourceLoc) -> Self {
        Self::new(Severity::Error, kind, message, loc)
    }

    pub fn warning(kind: ErrorKind, message: String, loc: SourceLoc) -> Self {
        Self::new(Severity::Warning, kind, message, loc)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {}[{}]: {}",
            self.loc,
            self.severity,
            self.kind,
            self.message
        )?;
        for note in &self.notes {
            writeln!(f, "  {} {}", "=".cyan().bold(), note)?;
        }
        Ok(())
    }
}

/// Accumulates diagnostics across a whole run (symbol parsing, AST
/// evaluation of many translation units, rule loading, map building) and
/// prints the `N warnings, M errors` summary spec.md §7 requires at
/// shutdown.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Note => {}
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn print_all(&self) {
        for diag in &self.diagnostics {
            eprint!("{diag}");
        }
    }

    /// Print the end-of-run summary (spec.md §7: "aggregate counts (N
    /// warnings, M errors) are printed at shutdown").
    pub fn print_summary(&self) {
        if self.error_count > 0 {
            eprintln!(
                "{}: {} error{} emitted",
                "error".red().bold(),
                self.error_count,
                if self.error_count == 1 { "" } else { "s" }
            );
        }
        if self.warning_count > 0 {
            eprintln!(
                "{}: {} warning{} emitted",
                "warning".yellow().bold(),
                self.warning_count,
                if self.warning_count == 1 { "" } else { "s" }
            );
        }
    }

    /// Merge another engine's diagnostics in. Used when translation units
    /// are evaluated in parallel and each keeps a private engine.
    pub fn merge(&mut self, other: DiagnosticEngine) {
        for diag in other.diagnostics {
            self.emit(diag);
        }
    }
}

/// Find the closest known names to `target` by edit distance, for
/// "did you mean" style suggestions (ambiguous catalog lookups, unknown
/// rule filter keys).
pub fn find_similar_names<'a>(target: &str, candidates: &[&'a str], max: usize) -> Vec<&'a str> {
    let mut scored: Vec<(f64, &str)> = candidates
        .iter()
        .map(|c| (strsim::jaro_winkler(target, c), *c))
        .filter(|(score, _)| *score > 0.7)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(max).map(|(_, c)| c).collect()
}
