use thiserror::Error;

/// Raised by checked folding of a constant subexpression; distinct from
/// "not a constant at all" (`ExpressionResult::Runtime`/`Undefined`),
/// which is not an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("overflow evaluating {op}({lhs}, {rhs})")]
    Overflow { op: &'static str, lhs: i64, rhs: i64 },
    #[error("division by zero")]
    DivByZero,
}

/// Checked 64-bit C-promotion arithmetic, generalized from Rust-level
/// checked-cast helpers to the operators the expression evaluator folds
/// (spec.md §4.C: `+ - * / % << >> & | ^ && ||`).
pub trait CheckedArithmetic: Sized {
    fn checked_op(op: &'static str, lhs: i64, rhs: i64, f: impl FnOnce(i64, i64) -> Option<i64>) -> Result<i64, ArithmeticError> {
        f(lhs, rhs).ok_or(ArithmeticError::Overflow { op, lhs, rhs })
    }
}

pub fn safe_add(lhs: i64, rhs: i64) -> Result<i64, ArithmeticError> {
    lhs.checked_add(rhs).ok_or(ArithmeticError::Overflow { op: "+", lhs, rhs })
}

pub fn safe_sub(lhs: i64, rhs: i64) -> Result<i64, ArithmeticError> {
    lhs.checked_sub(rhs).ok_or(ArithmeticError::Overflow { op: "-", lhs, rhs })
}

pub fn safe_mul(lhs: i64, rhs: i64) -> Result<i64, ArithmeticError> {
    lhs.checked_mul(rhs).ok_or(ArithmeticError::Overflow { op: "*", lhs, rhs })
}

pub fn safe_div(lhs: i64, rhs: i64) -> Result<i64, ArithmeticError> {
    if rhs == 0 {
        return Err(ArithmeticError::DivByZero);
    }
    lhs.checked_div(rhs).ok_or(ArithmeticError::Overflow { op: "/", lhs, rhs })
}

pub fn safe_rem(lhs: i64, rhs: i64) -> Result<i64, ArithmeticError> {
    if rhs == 0 {
        return Err(ArithmeticError::DivByZero);
    }
    lhs.checked_rem(rhs).ok_or(ArithmeticError::Overflow { op: "%", lhs, rhs })
}

pub fn safe_shl(lhs: i64, rhs: i64) -> Result<i64, ArithmeticError> {
    u32::try_from(rhs)
        .ok()
        .and_then(|r| lhs.checked_shl(r))
        .ok_or(ArithmeticError::Overflow { op: "<<", lhs, rhs })
}

pub fn safe_shr(lhs: i64, rhs: i64) -> Result<i64, ArithmeticError> {
    u32::try_from(rhs)
        .ok()
        .and_then(|r| lhs.checked_shr(r))
        .ok_or(ArithmeticError::Overflow { op: ">>", lhs, rhs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_overflow_is_reported() {
        assert!(safe_add(i64::MAX, 1).is_err());
    }

    #[test]
    fn div_by_zero_is_reported() {
        assert_eq!(safe_div(10, 0), Err(ArithmeticError::DivByZero));
    }

    #[test]
    fn normal_ops_succeed() {
        assert_eq!(safe_add(2, 3).unwrap(), 5);
        assert_eq!(safe_mul(4, 5).unwrap(), 20);
    }
}
