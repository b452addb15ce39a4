//! Sparse tuple-keyed container with wildcard `select`, grounded directly
//! on the source language's `tupledict`/`make_tupledict` (see
//! `examples/original_source/.../tupledict.py`).

use crate::error::{CoreError, CoreResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

/// One position in a `select` pattern: either a concrete key atom or a
/// wildcard matching any value at that position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key<K> {
    Value(K),
    Wildcard,
}

/// One coordinate fed to [`make_tupledict`]: either a single key atom or a
/// tuple that gets flattened into the final key (mirrors the source's
/// `flatten_tuple`, e.g. `(1, (2, 3), (4, 5)) -> (1, 2, 3, 4, 5)`).
#[derive(Debug, Clone)]
pub enum Coord<K> {
    Scalar(K),
    Tuple(Vec<K>),
}

/// A mapping from tuple keys to values supporting a memoized wildcard
/// `select`.
#[derive(Debug, Clone)]
pub struct TupleDict<K, V> {
    map: HashMap<Vec<K>, V>,
    key_len: Option<usize>,
    select_cache: RefCell<HashMap<Vec<usize>, HashMap<Vec<K>, Vec<Vec<K>>>>>,
}

impl<K, V> Default for TupleDict<K, V> {
    fn default() -> Self {
        TupleDict {
            map: HashMap::new(),
            key_len: None,
            select_cache: RefCell::new(HashMap::new()),
        }
    }
}

impl<K, V> TupleDict<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Inserts `key -> value`, checking that every key in the dict has the
    /// same tuple arity.
    pub fn insert(&mut self, key: Vec<K>, value: V) -> CoreResult<()> {
        match self.key_len {
            None => self.key_len = Some(key.len()),
            Some(len) if len != key.len() => return Err(CoreError::InconsistentKeyLength),
            Some(_) => {}
        }
        self.map.insert(key, value);
        self.select_cache.borrow_mut().clear();
        Ok(())
    }

    pub fn remove(&mut self, key: &[K]) -> Option<V> {
        let removed = self.map.remove(key);
        if removed.is_some() {
            self.select_cache.borrow_mut().clear();
        }
        removed
    }

    pub fn get(&self, key: &[K]) -> Option<&V> {
        self.map.get(key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.map.values()
    }

    pub fn items(&self) -> impl Iterator<Item = (&Vec<K>, &V)> {
        self.map.iter()
    }

    /// Drops the memoized secondary index; call after bulk external
    /// mutation if you ever reach into `items_mut`-style access (not
    /// exposed here, kept for parity with the source's `clean()`).
    pub fn clean(&self) {
        self.select_cache.borrow_mut().clear();
    }

    pub fn map_values<W>(&self, mut f: impl FnMut(&V) -> W) -> TupleDict<K, W> {
        let mut out = TupleDict::new();
        out.key_len = self.key_len;
        for (k, v) in &self.map {
            out.map.insert(k.clone(), f(v));
        }
        out
    }

    /// Wildcard select: any omitted trailing position is implicitly a
    /// wildcard. Memoizes, per set of non-wildcard positions, a secondary
    /// index from the concrete sub-key to the matching full keys, so
    /// repeated selects over the same column pattern are O(1) per match
    /// after the first.
    pub fn select(&self, pattern: &[Key<K>]) -> CoreResult<Vec<(Vec<K>, &V)>> {
        let key_len = match self.key_len {
            Some(l) => l,
            None => return Ok(Vec::new()),
        };
        if pattern.len() > key_len {
            return Err(CoreError::TooManyKeys { arity: key_len });
        }

        let no_wildcard_indices: Vec<usize> = pattern
            .iter()
            .enumerate()
            .filter_map(|(i, k)| match k {
                Key::Value(_) => Some(i),
                Key::Wildcard => None,
            })
            .collect();

        if no_wildcard_indices.is_empty() {
            return Ok(self.map.iter().map(|(k, v)| (k.clone(), v)).collect());
        }

        let no_wildcard_keys: Vec<K> = no_wildcard_indices
            .iter()
            .map(|&i| match &pattern[i] {
                Key::Value(v) => v.clone(),
                Key::Wildcard => unreachable!(),
            })
            .collect();

        let mut cache = self.select_cache.borrow_mut();
        let indices_cache = cache
            .entry(no_wildcard_indices.clone())
            .or_insert_with(|| {
                let mut built: HashMap<Vec<K>, Vec<Vec<K>>> = HashMap::new();
                for k in self.map.keys() {
                    let sub: Vec<K> = no_wildcard_indices.iter().map(|&i| k[i].clone()).collect();
                    built.entry(sub).or_default().push(k.clone());
                }
                built
            });

        let matches = indices_cache
            .get(&no_wildcard_keys)
            .cloned()
            .unwrap_or_default();
        drop(cache);

        Ok(matches
            .into_iter()
            .filter_map(|k| self.map.get(&k).map(|v| (k.clone(), v)))
            .collect())
    }
}

fn cartesian_product<T: Clone>(pools: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut result: Vec<Vec<T>> = vec![Vec::new()];
    for pool in pools {
        let mut next = Vec::with_capacity(result.len() * pool.len().max(1));
        for prefix in &result {
            for item in pool {
                let mut combo = prefix.clone();
                combo.push(item.clone());
                next.push(combo);
            }
        }
        result = next;
    }
    result
}

/// Cartesian-product builder: takes the product of `coords`, flattens any
/// nested tuples, applies `rule`, and skips entries where `rule` returns
/// `None` (the null-sentinel skip rule).
pub fn make_tupledict<K, V>(
    coords: &[Vec<Coord<K>>],
    mut rule: impl FnMut(&[K]) -> Option<V>,
) -> CoreResult<TupleDict<K, V>>
where
    K: Clone + Eq + Hash,
{
    let mut td = TupleDict::new();
    for combo in cartesian_product(coords) {
        let mut flat = Vec::new();
        for c in combo {
            match c {
                Coord::Scalar(k) => flat.push(k),
                Coord::Tuple(ks) => flat.extend(ks),
            }
        }
        if let Some(value) = rule(&flat) {
            td.insert(flat, value)?;
        }
    }
    Ok(td)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn td_23() -> TupleDict<i64, f64> {
        let mut td = TupleDict::new();
        for i in 0..2 {
            for j in 0..3 {
                td.insert(vec![i, j], (i * 10 + j) as f64).unwrap();
            }
        }
        td
    }

    #[test]
    fn select_exact_match() {
        let td = td_23();
        let got = td
            .select(&[Key::Value(1), Key::Value(2)])
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(*got[0].1, 12.0);
    }

    #[test]
    fn select_wildcard_column() {
        let td = td_23();
        let mut got = td.select(&[Key::Value(0), Key::Wildcard]).unwrap();
        got.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].0, vec![0, 0]);
        assert_eq!(got[2].0, vec![0, 2]);
    }

    #[test]
    fn select_all_wildcard_returns_everything() {
        let td = td_23();
        let got = td.select(&[Key::Wildcard, Key::Wildcard]).unwrap();
        assert_eq!(got.len(), 6);
    }

    #[test]
    fn select_cache_is_reused_across_calls() {
        let td = td_23();
        let first = td.select(&[Key::Value(1), Key::Wildcard]).unwrap().len();
        // second call with the same column pattern hits the memoized index
        let second = td.select(&[Key::Value(1), Key::Wildcard]).unwrap().len();
        assert_eq!(first, second);
        assert_eq!(first, 3);
    }

    #[test]
    fn too_many_keys_is_an_error() {
        let td = td_23();
        let err = td
            .select(&[Key::Value(0), Key::Value(0), Key::Value(0)])
            .unwrap_err();
        assert!(matches!(err, CoreError::TooManyKeys { arity: 2 }));
    }

    #[test]
    fn inconsistent_key_length_is_an_error() {
        let mut td: TupleDict<i64, f64> = TupleDict::new();
        td.insert(vec![1, 2], 1.0).unwrap();
        let err = td.insert(vec![1], 2.0).unwrap_err();
        assert!(matches!(err, CoreError::InconsistentKeyLength));
    }

    #[test]
    fn make_tupledict_flattens_nested_tuples_and_skips_none() {
        let coords = vec![
            vec![Coord::Scalar(1i64), Coord::Scalar(2)],
            vec![Coord::Tuple(vec![10, 11]), Coord::Tuple(vec![20, 21])],
        ];
        let td = make_tupledict(&coords, |k| {
            if k[0] == 2 && k[1] == 20 {
                None
            } else {
                Some(k.iter().sum::<i64>())
            }
        })
        .unwrap();
        assert_eq!(td.len(), 3);
        assert_eq!(td.get(&[1, 10, 11]), Some(&22));
        assert_eq!(td.get(&[2, 20, 21]), None);
    }
}
