use super::int_histogram::IntHistogram;
use crate::storage::Op;

// Highest value `fold` can produce: four bytes of 0xff.
const MAX_FOLDED: i32 = 255 * (31 * 31 * 31 + 31 * 31 + 31 + 1);

/// Histogram over string values, built by folding each string onto a
/// deterministic bounded integer and delegating to an `IntHistogram`.
///
/// The folding is a base-31 polynomial over the first four bytes, so
/// equality estimates behave like the integer case; range comparisons are
/// not semantically meaningful for strings and are best-effort only.
pub struct StringHistogram {
    inner: IntHistogram,
}

impl StringHistogram {
    pub fn new(buckets: usize) -> Self {
        Self {
            inner: IntHistogram::new(buckets, 0, MAX_FOLDED),
        }
    }

    fn fold(s: &str) -> i32 {
        let mut v: i32 = 0;
        for b in s.bytes().take(4) {
            v = v * 31 + b as i32;
        }
        v
    }

    /// Record one string value.
    pub fn add_value(&mut self, s: &str) {
        self.inner.add_value(Self::fold(s));
    }

    /// Estimated fraction of recorded strings satisfying `value op s`.
    pub fn estimate_selectivity(&self, op: Op, s: &str) -> f64 {
        self.inner.estimate_selectivity(op, Self::fold(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_is_bounded() {
        assert_eq!(StringHistogram::fold(""), 0);
        let max = String::from_utf8_lossy(&[0xffu8; 8]).to_string();
        assert!(StringHistogram::fold("zzzz") <= MAX_FOLDED);
        assert!(StringHistogram::fold(&max) <= MAX_FOLDED);
        assert!(StringHistogram::fold("only first four bytes matter") >= 0);
    }

    #[test]
    fn test_equality_estimates() {
        let mut hist = StringHistogram::new(100);
        for _ in 0..50 {
            hist.add_value("common");
        }
        for s in ["alpha", "beta", "gamma", "delta", "epsilon"] {
            hist.add_value(s);
        }

        let common = hist.estimate_selectivity(Op::Equals, "common");
        let rare = hist.estimate_selectivity(Op::Equals, "alpha");
        assert!(common > rare);
        assert!((0.0..=1.0).contains(&common));
        assert!((0.0..=1.0).contains(&rare));
    }

    #[test]
    fn test_absent_string_scores_low() {
        let mut hist = StringHistogram::new(100);
        for s in ["aa", "bb", "cc"] {
            hist.add_value(s);
        }
        let sel = hist.estimate_selectivity(Op::Equals, "zzzz");
        assert!(sel < 0.01);
    }

    #[test]
    fn test_estimates_are_probabilities() {
        let mut hist = StringHistogram::new(100);
        for s in ["x", "y", "z", "xx", "yy"] {
            hist.add_value(s);
        }
        for op in [Op::Equals, Op::NotEquals, Op::Like] {
            let sel = hist.estimate_selectivity(op, "x");
            assert!((0.0..=1.0).contains(&sel));
        }
    }
}
