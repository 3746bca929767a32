//! Folds integer/address-arithmetic AST subexpressions into a small
//! result lattice; consumed by the type evaluator and the rule engine
//! (spec component C).

pub mod arithmetic;
pub mod eval;
pub mod magic;
pub mod result;

pub use arithmetic::ArithmeticError;
pub use eval::{evaluate, evaluate_int_expression, EvalError, IdentKind, SymbolResolver};
pub use magic::capture_assignment;
pub use result::{ExpressionResult, ResultKind, ResultValue, SizeFlags};
