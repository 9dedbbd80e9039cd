//! Houdini-style invariant tracker / synthesizer (spec.md §4.6).
//!
//! Generalizes the teacher's "classify, then dispatch a fixed handler table"
//! shape (`exception_private.rs`) from "classify an error" to "generate a
//! pool of candidate refinements, then keep only the ones every recorded
//! snapshot agrees with". One `Tracker` is instantiated per loop.

use indexmap::IndexMap;

use crate::environment::{Environment, IGNORED};
use crate::predicate::{self, CheckContext, Direction, Parity, Predicate, ScalarSnapshot, SortOrder};
use crate::value::{Binder, Value};

/// One recorded point-in-time view of a single variable (spec.md §3).
#[derive(Clone)]
struct VariableSnapshot {
    binder: Binder,
    scalar: ScalarSnapshot,
}

/// Collects per-variable snapshots across a loop's iterations and, on exit,
/// synthesizes and attaches surviving refinements.
#[derive(Default)]
pub struct Tracker {
    histories: IndexMap<String, Vec<VariableSnapshot>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Category {
    Numeric,
    Array,
    Sized,
    Other,
}

impl Tracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Walks `env`'s flattened bindings, skipping `_` and function-typed
    /// values, and appends one snapshot per name (spec.md §4.6 "Recording").
    pub fn record(&mut self, env: &Environment) {
        for (name, binder) in env.get_all_bindings() {
            if name == IGNORED {
                continue;
            }
            if matches!(binder.value, Value::Function(_) | Value::Builtin(_)) {
                continue;
            }
            let scalar = predicate::scalar_view(&binder);
            self.histories.entry(name).or_default().push(VariableSnapshot { binder, scalar });
        }
    }

    /// Generates candidates per variable, filters by Houdini, and attaches
    /// survivors to each variable's refinements in `env`. Returns the number
    /// of variables that received at least one new refinement.
    pub fn synthesize_and_attach(&self, env: &Environment) -> usize {
        let mut refined_vars = 0;
        for (name, snaps) in &self.histories {
            if snaps.is_empty() {
                continue;
            }
            let candidates = generate_candidates(snaps);
            if candidates.is_empty() {
                continue;
            }
            let history: Vec<ScalarSnapshot> = snaps.iter().map(|s| s.scalar).collect();
            let mut survivors = Vec::new();
            for candidate in candidates {
                if holds_on_every_snapshot(&candidate, snaps, &history) {
                    survivors.push(candidate);
                }
            }
            if survivors.is_empty() {
                continue;
            }
            let attached = env
                .mutate(name, |b| {
                    for p in &survivors {
                        b.ty.add_refinement(p.clone());
                    }
                })
                .is_ok();
            if attached {
                refined_vars += 1;
            }
        }
        refined_vars
    }
}

fn holds_on_every_snapshot(candidate: &Predicate, snaps: &[VariableSnapshot], history: &[ScalarSnapshot]) -> bool {
    snaps.iter().enumerate().all(|(i, s)| {
        let ctx = CheckContext { binder: &s.binder, scalar: s.scalar, history: &history[..=i] };
        predicate::check(candidate, &ctx).unwrap_or(false)
    })
}

fn category(snaps: &[VariableSnapshot]) -> Category {
    let first = &snaps[0].scalar;
    if first.numeric.is_some() {
        Category::Numeric
    } else if first.array_len.is_some() {
        Category::Array
    } else if first.collection_size.is_some() {
        Category::Sized
    } else {
        Category::Other
    }
}

fn size_monotonic_variants() -> impl Iterator<Item = Predicate> {
    [Direction::Increasing, Direction::Decreasing].into_iter().flat_map(|direction| {
        [true, false].into_iter().map(move |strict| Predicate::SizeMonotonic { direction, strict })
    })
}

fn generate_candidates(snaps: &[VariableSnapshot]) -> Vec<Predicate> {
    match category(snaps) {
        Category::Numeric => generate_numeric_candidates(snaps),
        Category::Array => generate_array_candidates(snaps),
        Category::Sized => generate_sized_candidates(snaps, |s| s.scalar.collection_size),
        Category::Other => Vec::new(),
    }
}

fn generate_numeric_candidates(snaps: &[VariableSnapshot]) -> Vec<Predicate> {
    let nums: Vec<f64> = snaps.iter().filter_map(|s| s.scalar.numeric).collect();
    if nums.len() != snaps.len() {
        return Vec::new();
    }
    let min = nums.iter().copied().fold(f64::INFINITY, f64::min);
    let max = nums.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut candidates = vec![
        Predicate::IntRange { min: min as i64, max: max as i64 },
        Predicate::Positive { strict: true },
        Predicate::Positive { strict: false },
        Predicate::Negative { strict: true },
        Predicate::Negative { strict: false },
        Predicate::Parity(Parity::Even),
        Predicate::Parity(Parity::Odd),
    ];
    for divisor in [2, 3, 4, 5, 10] {
        candidates.push(Predicate::DivisibleBy { divisor });
    }
    if snaps.len() >= 2 {
        for direction in [Direction::Increasing, Direction::Decreasing] {
            for strict in [true, false] {
                candidates.push(Predicate::Monotonic { direction, strict });
            }
        }
    }
    candidates
}

fn generate_array_candidates(snaps: &[VariableSnapshot]) -> Vec<Predicate> {
    let mut candidates = generate_sized_candidates(snaps, |s| s.scalar.array_len);
    candidates.push(Predicate::Sorted(SortOrder::Asc));
    candidates.push(Predicate::Sorted(SortOrder::Desc));
    candidates.push(Predicate::UniqueElements);
    candidates
}

fn generate_sized_candidates(snaps: &[VariableSnapshot], size_of: impl Fn(&VariableSnapshot) -> Option<usize>) -> Vec<Predicate> {
    let sizes: Vec<usize> = snaps.iter().filter_map(size_of).collect();
    if sizes.len() != snaps.len() {
        return Vec::new();
    }
    let mut candidates = Vec::new();
    let (min, max) = (sizes.iter().copied().min().unwrap(), sizes.iter().copied().max().unwrap());
    if min == max {
        candidates.push(Predicate::SizeEquals { n: min });
    } else {
        candidates.push(Predicate::SizeRange { min, max });
    }
    candidates.push(Predicate::NonEmpty);
    if snaps.len() >= 2 {
        candidates.extend(size_monotonic_variants());
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::array::Array;
    use crate::environment::Environment;
    use crate::types::Type;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn array_binder(items: Vec<i64>) -> Binder {
        let arr = Array::from_vec(items.into_iter().map(Binder::int).collect());
        Binder::new(Value::Array(Rc::new(RefCell::new(arr))), Type::Array(Rc::new(Type::Int)))
    }

    #[test]
    fn frozen_constant_synthesizes_int_range_and_monotonic() {
        let env = Environment::new_global();
        env.define("k", Binder::int(42));
        env.define("i", Binder::int(0));

        let mut tracker = Tracker::new();
        tracker.record(&env);
        for step in 1..=5 {
            env.set("i", Binder::int(step)).unwrap();
            tracker.record(&env);
        }
        tracker.synthesize_and_attach(&env);

        let k = env.get("k").unwrap();
        assert!(k.ty.refinements.contains(&Predicate::IntRange { min: 42, max: 42 }));

        let i = env.get("i").unwrap();
        assert!(i.ty.refinements.contains(&Predicate::Monotonic { direction: Direction::Increasing, strict: true }));
    }

    #[test]
    fn insertion_sort_loop_synthesizes_sorted_on_final_aliased_array() {
        let env = Environment::new_global();
        let shared = array_binder(vec![5, 2, 4, 6, 1, 3]);
        env.define("arr", shared.clone());

        let mut tracker = Tracker::new();
        tracker.record(&env);
        // Mutate the same aliased array in place, as index-assignment would.
        if let Value::Array(a) = &shared.value {
            a.borrow_mut().items = vec![1, 2, 3, 4, 5, 6].into_iter().map(Binder::int).collect();
        }
        tracker.record(&env);
        tracker.synthesize_and_attach(&env);

        let arr = env.get("arr").unwrap();
        assert!(arr.ty.refinements.contains(&Predicate::Sorted(SortOrder::Asc)));
    }
}
