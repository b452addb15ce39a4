//! Ergonomic builders: `quicksum` and the coordinate-builder half of
//! `make_nd_variable` (the variable-creating half lives in
//! `algform-solver::Model` since it needs a live model to allocate
//! handles against).

use crate::expr::{ExprBuilder, VarIdx};
use crate::tupledict::{make_tupledict, Coord, TupleDict};
use crate::CoreResult;
use std::hash::Hash;

/// Folds any iterable of expression-like terms through an [`ExprBuilder`]
/// accumulator with `+=`.
pub fn quicksum<T: Into<ExprBuilder>>(terms: impl IntoIterator<Item = T>) -> ExprBuilder {
    let mut acc = ExprBuilder::new();
    for t in terms {
        acc = acc.checked_add(&t.into());
    }
    acc
}

/// `quicksum` with an explicit per-term mapping function, for terms that
/// are not themselves expression-like (e.g. raw indices into some other
/// collection).
pub fn quicksum_by<T, F: Fn(T) -> ExprBuilder>(
    terms: impl IntoIterator<Item = T>,
    f: F,
) -> ExprBuilder {
    let mut acc = ExprBuilder::new();
    for t in terms {
        acc = acc.checked_add(&f(t));
    }
    acc
}

/// Builds the coordinate grid and name map for an nd-indexed variable
/// family; `add_variable` is called once per coordinate tuple with its
/// generated name and must return the handle the caller's model assigned.
pub fn make_nd_variable<K, F>(
    coords: &[Vec<Coord<K>>],
    name: impl Fn(&[K]) -> String,
    mut add_variable: F,
) -> CoreResult<TupleDict<K, VarIdx>>
where
    K: Clone + Eq + Hash,
    F: FnMut(&str) -> VarIdx,
{
    make_tupledict(coords, |k| Some(add_variable(&name(k))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::VarIdx;

    #[test]
    fn quicksum_folds_variables_and_constants() {
        let x = VarIdx::new(0);
        let y = VarIdx::new(1);
        let sum = quicksum(vec![
            ExprBuilder::from(x),
            ExprBuilder::from(y),
            ExprBuilder::from(3.0),
        ]);
        assert_eq!(sum.eval(|_| 1.0), 1.0 + 1.0 + 3.0);
    }

    #[test]
    fn quicksum_by_maps_then_folds() {
        let sum = quicksum_by(0..4, |i: i32| ExprBuilder::from(i as f64));
        assert_eq!(sum.eval(|_| 0.0), 0.0 + 1.0 + 2.0 + 3.0);
    }

    #[test]
    fn make_nd_variable_names_follow_coordinates() {
        let coords = vec![
            vec![Coord::Scalar(0i64), Coord::Scalar(1)],
            vec![Coord::Scalar(0i64), Coord::Scalar(1)],
        ];
        let mut next = 0u32;
        let names = std::cell::RefCell::new(Vec::new());
        let td = make_nd_variable(
            &coords,
            |k| format!("x[{},{}]", k[0], k[1]),
            |name| {
                names.borrow_mut().push(name.to_string());
                let h = VarIdx::new(next);
                next += 1;
                h
            },
        )
        .unwrap();
        assert_eq!(td.len(), 4);
        assert!(names.borrow().contains(&"x[0,1]".to_string()));
    }
}
