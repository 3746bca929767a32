/// Outcome of comparing the declared-type candidate `c0` against a set
/// of alternate-type candidates (spec.md §4.E.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Keep,
    Replace(usize),
    Siblings(Vec<usize>),
}

/// Default separation spec.md §4.E.5 uses in its examples; exposed as a
/// `BuilderConfig` knob rather than hardwired, since the spec only fixes
/// the comparison rule, not the exact margin.
pub const DEFAULT_REPLACEMENT_MARGIN: f64 = 0.1;

/// `alternates[i]` is the probability of the i-th alternate candidate;
/// `p0` is the declared-type candidate's probability.
pub fn select_candidate(p0: f64, alternates: &[f64], margin: f64) -> Selection {
    if alternates.is_empty() {
        return Selection::Keep;
    }
    let max_p = alternates.iter().copied().fold(f64::MIN, f64::max);
    if max_p - p0 <= margin {
        return Selection::Keep;
    }
    let winners: Vec<usize> = alternates
        .iter()
        .enumerate()
        .filter(|(_, &p)| max_p - p <= margin)
        .map(|(i, _)| i)
        .collect();
    match winners.as_slice() {
        [single] => Selection::Replace(*single),
        _ => Selection::Siblings(winners),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_declared_type_when_no_alternate_clears_margin() {
        assert_eq!(select_candidate(0.9, &[0.92], DEFAULT_REPLACEMENT_MARGIN), Selection::Keep);
    }

    #[test]
    fn replaces_with_unique_clear_winner() {
        assert_eq!(select_candidate(0.5, &[0.95], DEFAULT_REPLACEMENT_MARGIN), Selection::Replace(0));
    }

    #[test]
    fn emits_siblings_when_alternates_are_close() {
        assert_eq!(select_candidate(0.3, &[0.9, 0.88], DEFAULT_REPLACEMENT_MARGIN), Selection::Siblings(vec![0, 1]));
    }
}
