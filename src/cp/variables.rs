//! CP variable types.
//!
//! Variables are owned by a [`CpModel`](super::CpModel) and addressed by
//! typed indices. Interval variables do not own a start variable; they
//! reference one, so several optional intervals can share a start time.

use serde::{Deserialize, Serialize};

/// Index of a boolean variable within a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoolVarId(pub usize);

/// Index of an integer variable within a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntVarId(pub usize);

/// Index of an interval variable within a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntervalId(pub usize);

impl BoolVarId {
    /// The positive literal of this variable.
    pub fn lit(self) -> Literal {
        Literal::positive(self)
    }

    /// The negated literal of this variable.
    pub fn not(self) -> Literal {
        Literal::negative(self)
    }
}

/// A boolean variable or its negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    /// Underlying variable.
    pub var: BoolVarId,
    /// Whether the literal is the negation of `var`.
    pub negated: bool,
}

impl Literal {
    /// `var`
    pub fn positive(var: BoolVarId) -> Self {
        Self {
            var,
            negated: false,
        }
    }

    /// `¬var`
    pub fn negative(var: BoolVarId) -> Self {
        Self { var, negated: true }
    }

    /// The opposite literal.
    pub fn not(self) -> Self {
        Self {
            var: self.var,
            negated: !self.negated,
        }
    }

    /// Truth value of this literal given a value of its variable.
    #[inline]
    pub fn eval(self, var_value: bool) -> bool {
        var_value != self.negated
    }
}

impl From<BoolVarId> for Literal {
    fn from(var: BoolVarId) -> Self {
        Literal::positive(var)
    }
}

/// A finite set of integer values, kept sorted and deduplicated.
///
/// Domains may contain holes, which is how opening windows restrict
/// start times without extra constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    values: Vec<i64>,
}

impl Domain {
    /// The empty domain.
    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    /// Builds a domain from arbitrary values.
    pub fn from_values(values: impl IntoIterator<Item = i64>) -> Self {
        let mut values: Vec<i64> = values.into_iter().collect();
        values.sort_unstable();
        values.dedup();
        Self { values }
    }

    /// Builds a domain from inclusive `[lo, hi]` ranges.
    pub fn from_ranges(ranges: &[(i64, i64)]) -> Self {
        Self::from_values(ranges.iter().flat_map(|&(lo, hi)| lo..=hi))
    }

    /// Single-value domain.
    pub fn fixed(value: i64) -> Self {
        Self {
            values: vec![value],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether `value` belongs to the domain.
    pub fn contains(&self, value: i64) -> bool {
        self.values.binary_search(&value).is_ok()
    }

    pub fn min(&self) -> Option<i64> {
        self.values.first().copied()
    }

    pub fn max(&self) -> Option<i64> {
        self.values.last().copied()
    }

    /// Values in ascending order.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Keeps the values accepted by `keep`.
    pub fn filter(&self, mut keep: impl FnMut(i64) -> bool) -> Self {
        Self {
            values: self.values.iter().copied().filter(|&v| keep(v)).collect(),
        }
    }
}

/// A boolean decision variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoolVar {
    /// Variable name (diagnostics only).
    pub name: String,
    /// Fixed value, if any.
    pub fixed: Option<bool>,
}

impl BoolVar {
    /// Creates a new boolean variable.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixed: None,
        }
    }

    /// Creates a fixed boolean variable.
    pub fn fixed(name: impl Into<String>, value: bool) -> Self {
        Self {
            name: name.into(),
            fixed: Some(value),
        }
    }
}

/// An integer decision variable over an explicit [`Domain`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntVar {
    /// Variable name (diagnostics only).
    pub name: String,
    /// Admissible values.
    pub domain: Domain,
}

impl IntVar {
    pub fn new(name: impl Into<String>, domain: Domain) -> Self {
        Self {
            name: name.into(),
            domain,
        }
    }

    /// Whether this variable is fixed to a single value.
    pub fn is_fixed(&self) -> bool {
        self.domain.len() == 1
    }
}

/// A fixed-size interval `[start, start + size)`.
///
/// The interval is optional when it carries a presence literal: it only
/// takes part in constraints when that literal is true.
///
/// # Examples
///
/// ```
/// use u_timetable::cp::{BoolVarId, IntVarId, IntervalVar};
///
/// let iv = IntervalVar::new("lesson", IntVarId(0), 60).as_optional(BoolVarId(3).lit());
/// assert!(iv.is_optional());
/// assert_eq!(iv.end_for(540), 600);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalVar {
    /// Variable name.
    pub name: String,
    /// Start variable.
    pub start: IntVarId,
    /// Fixed size.
    pub size: i64,
    /// Presence literal (for optional intervals).
    pub presence: Option<Literal>,
}

impl IntervalVar {
    /// Creates an always-present fixed-size interval.
    pub fn new(name: impl Into<String>, start: IntVarId, size: i64) -> Self {
        Self {
            name: name.into(),
            start,
            size,
            presence: None,
        }
    }

    /// Makes this interval optional with a presence literal.
    pub fn as_optional(mut self, presence: Literal) -> Self {
        self.presence = Some(presence);
        self
    }

    pub fn is_optional(&self) -> bool {
        self.presence.is_some()
    }

    /// End time for a given start value.
    #[inline]
    pub fn end_for(&self, start: i64) -> i64 {
        start + self.size
    }
}
