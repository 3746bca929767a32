use crate::type_id::TypeId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A member of a struct or union. Carries the learned "magic number" facts
/// that Component C's constant folding attaches to assignments against this
/// member (spec.md §3, §4.C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub type_id: TypeId,
    pub offset: u64,
    /// `Some((bit_offset, bit_size))` for bitfields.
    pub bits: Option<(u16, u16)>,
    /// Constant values observed assigned into this member across every
    /// function the evaluator has walked, accumulated in place as new
    /// translation units are processed.
    pub const_facts: ConstFacts,
}

impl Member {
    pub fn new(name: impl Into<String>, type_id: TypeId, offset: u64) -> Self {
        Self {
            name: name.into(),
            type_id,
            offset,
            bits: None,
            const_facts: ConstFacts::default(),
        }
    }

    pub fn with_bitfield(mut self, bit_offset: u16, bit_size: u16) -> Self {
        self.bits = Some((bit_offset, bit_size));
        self
    }

    pub fn is_bitfield(&self) -> bool {
        self.bits.is_some()
    }
}

/// A function or function-pointer parameter. Modeled separately from
/// [`Member`] per `examples/original_source/trunk/insightd/funcparam.cpp`
/// (SPEC_FULL.md item 4): parameters are referencing sites in their own
/// right, distinct from struct members, so `AltRefType` can be attached to
/// them individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: Option<String>,
    pub type_id: TypeId,
}

impl Param {
    pub fn new(name: Option<String>, type_id: TypeId) -> Self {
        Self { name, type_id }
    }
}

/// Learned constant-value facts about a [`Member`]: the set of observed
/// constant integer and string values an assignment ever stored into it,
/// extinguished the moment a non-constant assignment is observed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstFacts {
    ints: HashSet<i64>,
    strings: HashSet<String>,
    not_constant: bool,
}

impl ConstFacts {
    pub fn record_int(&mut self, value: i64) {
        if self.not_constant {
            return;
        }
        self.ints.insert(value);
    }

    pub fn record_string(&mut self, value: String) {
        if self.not_constant {
            return;
        }
        self.strings.insert(value);
    }

    /// Extinguishes both the int and string sets (spec.md §3: "a
    /// *not-constant* flag that extinguishes both sets once set").
    pub fn mark_not_constant(&mut self) {
        self.not_constant = true;
        self.ints.clear();
        self.strings.clear();
    }

    pub fn is_not_constant(&self) -> bool {
        self.not_constant
    }

    pub fn ints(&self) -> &HashSet<i64> {
        &self.ints
    }

    pub fn strings(&self) -> &HashSet<String> {
        &self.strings
    }

    pub fn matches_int(&self, value: i64) -> bool {
        !self.not_constant && self.ints.contains(&value)
    }

    pub fn matches_string(&self, value: &str) -> bool {
        !self.not_constant && self.strings.contains(value)
    }

    /// Folds another observation of the same member's facts into this one,
    /// e.g. when a second translation unit assigns into the same struct
    /// member. Not-constant is sticky across the merge.
    pub fn merge_from(&mut self, other: &ConstFacts) {
        if other.not_constant {
            self.mark_not_constant();
            return;
        }
        if self.not_constant {
            return;
        }
        self.ints.extend(other.ints.iter().copied());
        self.strings.extend(other.strings.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_constant_extinguishes_both_sets() {
        let mut facts = ConstFacts::default();
        facts.record_int(42);
        facts.record_string("magic".to_string());
        facts.mark_not_constant();
        assert!(facts.ints().is_empty());
        assert!(facts.strings().is_empty());
        facts.record_int(7);
        assert!(facts.ints().is_empty());
    }

    #[test]
    fn records_accumulate_until_extinguished() {
        let mut facts = ConstFacts::default();
        facts.record_int(1);
        facts.record_int(2);
        assert!(facts.matches_int(1));
        assert!(facts.matches_int(2));
        assert!(!facts.matches_int(3));
    }

    #[test]
    fn merge_from_unions_constant_sets() {
        let mut a = ConstFacts::default();
        a.record_int(1);
        let mut b = ConstFacts::default();
        b.record_int(2);
        a.merge_from(&b);
        assert!(a.matches_int(1));
        assert!(a.matches_int(2));
    }

    #[test]
    fn merge_from_propagates_not_constant() {
        let mut a = ConstFacts::default();
        a.record_int(1);
        let mut b = ConstFacts::default();
        b.mark_not_constant();
        a.merge_from(&b);
        assert!(a.is_not_constant());
        assert!(a.ints().is_empty());
    }
}
