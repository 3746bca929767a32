/// Which promotion width/signedness an integer result was folded at
/// (spec.md §4.C: "promoted to 64-bit signed or unsigned by the usual C
/// promotion rules, tracked in size_flags").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeFlags {
    pub width: u8,
    pub signed: bool,
}

impl SizeFlags {
    pub const I64: SizeFlags = SizeFlags { width: 64, signed: true };
    pub const U64: SizeFlags = SizeFlags { width: 64, signed: false };

    /// Usual-arithmetic-conversions-style promotion: wider wins; on equal
    /// width, unsigned wins.
    pub fn promote(self, other: SizeFlags) -> SizeFlags {
        if self.width != other.width {
            if self.width > other.width { self } else { other }
        } else if !self.signed || !other.signed {
            SizeFlags { width: self.width, signed: false }
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Int(i64),
    Str(String),
    None,
}

/// The small result lattice expressions fold into (spec.md §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Constant,
    Runtime,
    Undefined,
    GlobalVar,
    LocalVar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionResult {
    pub kind: ResultKind,
    pub size_flags: SizeFlags,
    pub value: ResultValue,
}

impl ExpressionResult {
    pub fn constant_int(value: i64, size_flags: SizeFlags) -> Self {
        Self { kind: ResultKind::Constant, size_flags, value: ResultValue::Int(value) }
    }

    pub fn constant_str(value: String) -> Self {
        Self {
            kind: ResultKind::Constant,
            size_flags: SizeFlags::I64,
            value: ResultValue::Str(value),
        }
    }

    pub fn runtime() -> Self {
        Self { kind: ResultKind::Runtime, size_flags: SizeFlags::I64, value: ResultValue::None }
    }

    pub fn undefined() -> Self {
        Self { kind: ResultKind::Undefined, size_flags: SizeFlags::I64, value: ResultValue::None }
    }

    pub fn global_var() -> Self {
        Self { kind: ResultKind::GlobalVar, size_flags: SizeFlags::I64, value: ResultValue::None }
    }

    pub fn local_var() -> Self {
        Self { kind: ResultKind::LocalVar, size_flags: SizeFlags::I64, value: ResultValue::None }
    }

    pub fn as_constant_int(&self) -> Option<i64> {
        match (self.kind, &self.value) {
            (ResultKind::Constant, ResultValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_constant_str(&self) -> Option<&str> {
        match (self.kind, &self.value) {
            (ResultKind::Constant, ResultValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}
