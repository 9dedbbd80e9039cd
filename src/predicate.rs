//! Refinement predicates and the invariant checker (spec.md §4.5).
//!
//! `Predicate` is data only; [`check`] is the checker itself, dispatching on
//! the variant. Grounded on the teacher's split between a closed tag enum
//! (`ExcType`) and the logic that interprets it (`exception_private.rs`),
//! generalized here from "classify an error" to "decide a verdict".

use std::cmp::Ordering;

use crate::error::EngineError;
use crate::value::{Binder, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Direction {
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Parity {
    Even,
    Odd,
}

/// One refinement predicate, per the taxonomy in spec.md §4.5.
#[derive(Debug, Clone)]
pub enum Predicate {
    IntRange { min: i64, max: i64 },
    Positive { strict: bool },
    Negative { strict: bool },
    GreaterThan { threshold: f64 },
    GreaterEqualThan { threshold: f64 },
    DivisibleBy { divisor: i64 },
    Parity(Parity),

    SizeRange { min: usize, max: usize },
    SizeEquals { n: usize },
    NonEmpty,

    Sorted(SortOrder),
    UniqueElements,
    /// The `original` array is a logical snapshot captured when the
    /// predicate was built (spec.md §3).
    IsPermutationOf { original: Vec<Binder> },

    Not(Box<Predicate>),
    RangeSatisfies { from: usize, to: usize, inner: Box<Predicate> },
    AllElementsSatisfy { inner: Box<Predicate> },

    Monotonic { direction: Direction, strict: bool },
    SizeMonotonic { direction: Direction, strict: bool },

    AllWeightsNonNegative,
    NoNegativeCycles,

    DistanceToSelfZero,
    TriangleInequality,

    /// `other` is a logical snapshot of the comparison set (spec.md §3).
    SubsetOf { other: Vec<Binder> },
    DisjointFrom { other: Vec<Binder> },
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        fn binders_eq(a: &[Binder], b: &[Binder]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.key_eq(y))
        }
        match (self, other) {
            (Self::IntRange { min: a1, max: a2 }, Self::IntRange { min: b1, max: b2 }) => a1 == b1 && a2 == b2,
            (Self::Positive { strict: a }, Self::Positive { strict: b }) => a == b,
            (Self::Negative { strict: a }, Self::Negative { strict: b }) => a == b,
            (Self::GreaterThan { threshold: a }, Self::GreaterThan { threshold: b }) => a == b,
            (Self::GreaterEqualThan { threshold: a }, Self::GreaterEqualThan { threshold: b }) => a == b,
            (Self::DivisibleBy { divisor: a }, Self::DivisibleBy { divisor: b }) => a == b,
            (Self::Parity(a), Self::Parity(b)) => a == b,
            (Self::SizeRange { min: a1, max: a2 }, Self::SizeRange { min: b1, max: b2 }) => a1 == b1 && a2 == b2,
            (Self::SizeEquals { n: a }, Self::SizeEquals { n: b }) => a == b,
            (Self::NonEmpty, Self::NonEmpty)
            | (Self::UniqueElements, Self::UniqueElements)
            | (Self::AllWeightsNonNegative, Self::AllWeightsNonNegative)
            | (Self::NoNegativeCycles, Self::NoNegativeCycles)
            | (Self::DistanceToSelfZero, Self::DistanceToSelfZero)
            | (Self::TriangleInequality, Self::TriangleInequality) => true,
            (Self::Sorted(a), Self::Sorted(b)) => a == b,
            (Self::IsPermutationOf { original: a }, Self::IsPermutationOf { original: b }) => binders_eq(a, b),
            (Self::Not(a), Self::Not(b)) => a == b,
            (
                Self::RangeSatisfies { from: f1, to: t1, inner: i1 },
                Self::RangeSatisfies { from: f2, to: t2, inner: i2 },
            ) => f1 == f2 && t1 == t2 && i1 == i2,
            (Self::AllElementsSatisfy { inner: a }, Self::AllElementsSatisfy { inner: b }) => a == b,
            (Self::Monotonic { direction: d1, strict: s1 }, Self::Monotonic { direction: d2, strict: s2 }) => {
                d1 == d2 && s1 == s2
            }
            (
                Self::SizeMonotonic { direction: d1, strict: s1 },
                Self::SizeMonotonic { direction: d2, strict: s2 },
            ) => d1 == d2 && s1 == s2,
            (Self::SubsetOf { other: a }, Self::SubsetOf { other: b })
            | (Self::DisjointFrom { other: a }, Self::DisjointFrom { other: b }) => binders_eq(a, b),
            _ => false,
        }
    }
}

/// A single point-in-time scalar view, as cached by [`crate::tracker::VariableSnapshot`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarSnapshot {
    pub numeric: Option<f64>,
    pub array_len: Option<usize>,
    pub collection_size: Option<usize>,
}

/// Everything `check` needs to decide one verdict: the live binder (for
/// structural/content forms, which can only ever see the current, aliased
/// state of a container — spec.md §9 "Snapshot aliasing"), this point's
/// cached scalars (for numeric/size forms), and the full scalar history
/// (for temporal forms, which are "checked against the whole history"
/// regardless of which point is nominally being filtered — spec.md §4.6).
pub struct CheckContext<'a> {
    pub binder: &'a Binder,
    pub scalar: ScalarSnapshot,
    pub history: &'a [ScalarSnapshot],
}

impl<'a> CheckContext<'a> {
    /// Builds a context with no recorded history — used for a direct
    /// `|- @pred(...)` check outside of a loop (spec.md §4.5: "creates a
    /// singleton history with the current value").
    #[must_use]
    pub fn standalone(binder: &'a Binder) -> Self {
        Self { binder, scalar: scalar_view(binder), history: &[] }
    }
}

pub(crate) fn scalar_view(binder: &Binder) -> ScalarSnapshot {
    ScalarSnapshot {
        numeric: binder.as_f64(),
        array_len: match &binder.value {
            Value::Array(a) => Some(a.borrow().len()),
            _ => None,
        },
        collection_size: match &binder.value {
            Value::Set(s) => Some(s.borrow().size()),
            Value::Map(m) => Some(m.borrow().size()),
            Value::Heap(h) => Some(h.borrow().size()),
            Value::HeapMap(h) => Some(h.borrow().size()),
            _ => None,
        },
    }
}

/// Evaluates `predicate` against `ctx`.
pub fn check(predicate: &Predicate, ctx: &CheckContext<'_>) -> Result<bool, EngineError> {
    let current = ctx.binder;
    match predicate {
        Predicate::IntRange { min, max } => {
            let n = require_numeric(ctx)?;
            Ok(n >= *min as f64 && n <= *max as f64)
        }
        Predicate::Positive { strict } => {
            let n = require_numeric(ctx)?;
            Ok(if *strict { n > 0.0 } else { n >= 0.0 })
        }
        Predicate::Negative { strict } => {
            let n = require_numeric(ctx)?;
            Ok(if *strict { n < 0.0 } else { n <= 0.0 })
        }
        Predicate::GreaterThan { threshold } => Ok(require_numeric(ctx)? > *threshold),
        Predicate::GreaterEqualThan { threshold } => Ok(require_numeric(ctx)? >= *threshold),
        Predicate::DivisibleBy { divisor } => {
            let Value::Int(i) = current.value else {
                return Err(EngineError::type_error("divisible_by requires an int"));
            };
            if *divisor == 0 {
                return Err(EngineError::type_error("divisible_by divisor must be non-zero"));
            }
            Ok(i % divisor == 0)
        }
        Predicate::Parity(p) => {
            let Value::Int(i) = current.value else {
                return Err(EngineError::type_error("parity requires an int"));
            };
            Ok(match p {
                Parity::Even => i.rem_euclid(2) == 0,
                Parity::Odd => i.rem_euclid(2) != 0,
            })
        }

        Predicate::SizeRange { min, max } => {
            let n = require_size(ctx)?;
            Ok(n >= *min && n <= *max)
        }
        Predicate::SizeEquals { n } => Ok(require_size(ctx)? == *n),
        Predicate::NonEmpty => Ok(require_size(ctx)? > 0),

        Predicate::Sorted(order) => {
            let items = require_array(current)?;
            Ok(items.windows(2).all(|w| {
                let ord = w[0].partial_cmp_primitive(&w[1]).unwrap_or(Ordering::Equal);
                match order {
                    SortOrder::Asc => ord != Ordering::Greater,
                    SortOrder::Desc => ord != Ordering::Less,
                }
            }))
        }
        Predicate::UniqueElements => {
            let items = require_array(current)?;
            for i in 0..items.len() {
                for j in (i + 1)..items.len() {
                    if items[i].key_eq(&items[j]) {
                        return Ok(false);
                    }
                }
            }
            Ok(true)
        }
        Predicate::IsPermutationOf { original } => {
            let items = require_array(current)?;
            Ok(is_multiset_equal(&items, original))
        }

        Predicate::Not(inner) => Ok(!check(inner, ctx)?),
        Predicate::RangeSatisfies { from, to, inner } => {
            let items = require_array(current)?;
            if *to > items.len() || *from > *to {
                return Err(EngineError::container_error("range_satisfies: invalid index range"));
            }
            for elem in &items[*from..*to] {
                if !check_elementwise(inner, elem)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::AllElementsSatisfy { inner } => {
            let items = require_array(current)?;
            for elem in &items {
                if !check_elementwise(inner, elem)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }

        Predicate::Monotonic { direction, strict } => {
            let series: Vec<f64> = ctx.history.iter().filter_map(|s| s.numeric).collect();
            Ok(is_monotonic(&series, *direction, *strict))
        }
        Predicate::SizeMonotonic { direction, strict } => {
            let series: Vec<f64> = ctx
                .history
                .iter()
                .filter_map(|s| s.array_len.or(s.collection_size))
                .map(|n| n as f64)
                .collect();
            Ok(is_monotonic(&series, *direction, *strict))
        }

        Predicate::AllWeightsNonNegative => {
            let Value::Graph(g) = &current.value else {
                return Err(EngineError::type_error("all_weights_non_negative requires a graph"));
            };
            Ok(g.borrow().get_edges().iter().all(|e| e.weight >= 0.0))
        }
        Predicate::NoNegativeCycles => {
            let Value::Graph(g) = &current.value else {
                return Err(EngineError::type_error("no_negative_cycles requires a graph"));
            };
            crate::checks::no_negative_cycles(&g.borrow())
        }

        Predicate::DistanceToSelfZero => crate::checks::distance_to_self_zero(current),
        Predicate::TriangleInequality => crate::checks::triangle_inequality(current),

        Predicate::SubsetOf { other } => {
            let items = require_set(current)?;
            Ok(items.iter().all(|a| other.iter().any(|b| a.key_eq(b))))
        }
        Predicate::DisjointFrom { other } => {
            let items = require_set(current)?;
            Ok(items.iter().all(|a| !other.iter().any(|b| a.key_eq(b))))
        }
    }
}

/// `range_satisfies`/`all_elements_satisfy` evaluate the inner predicate on
/// each element's own singleton snapshot — temporal inner predicates don't
/// reduce inside a single element and are skipped (spec.md §4.6).
fn check_elementwise(inner: &Predicate, elem: &Binder) -> Result<bool, EngineError> {
    if matches!(inner, Predicate::Monotonic { .. } | Predicate::SizeMonotonic { .. }) {
        return Ok(true);
    }
    check(inner, &CheckContext::standalone(elem))
}

fn require_numeric(ctx: &CheckContext<'_>) -> Result<f64, EngineError> {
    ctx.scalar.numeric.ok_or_else(|| EngineError::type_error("predicate requires a numeric value"))
}

fn require_array(b: &Binder) -> Result<Vec<Binder>, EngineError> {
    match &b.value {
        Value::Array(a) => Ok(a.borrow().items.clone()),
        _ => Err(EngineError::type_error("predicate requires an array")),
    }
}

fn require_set(b: &Binder) -> Result<Vec<Binder>, EngineError> {
    match &b.value {
        Value::Set(s) => Ok(s.borrow().to_array()),
        _ => Err(EngineError::type_error("predicate requires a set")),
    }
}

fn require_size(ctx: &CheckContext<'_>) -> Result<usize, EngineError> {
    ctx.scalar
        .array_len
        .or(ctx.scalar.collection_size)
        .ok_or_else(|| EngineError::type_error("predicate requires a sized collection"))
}

fn is_multiset_equal(a: &[Binder], b: &[Binder]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    'outer: for x in a {
        for (i, y) in b.iter().enumerate() {
            if !used[i] && x.key_eq(y) {
                used[i] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

fn is_monotonic(series: &[f64], direction: Direction, strict: bool) -> bool {
    series.windows(2).all(|w| match (direction, strict) {
        (Direction::Increasing, true) => w[1] > w[0],
        (Direction::Increasing, false) => w[1] >= w[0],
        (Direction::Decreasing, true) => w[1] < w[0],
        (Direction::Decreasing, false) => w[1] <= w[0],
    })
}
