//! Affine and quadratic expression algebra over variable handles.
//!
//! Rust cannot overload `==`/`<=`/`>=` to return anything but `bool`
//! ([`std::cmp::PartialEq`]/[`PartialOrd`] are bound to it), so the
//! comparison sugar described for the source language is exposed here as
//! named methods (`eq_zero`, `leq`, `geq`) that build a [`ComparisonConstraint`]
//! instead.

use crate::error::{CoreError, CoreResult};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Opaque, stable handle to a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarIdx(pub u32);

impl VarIdx {
    pub fn new(raw: u32) -> Self {
        VarIdx(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Variable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Domain {
    Continuous,
    Integer,
    Binary,
    SemiContinuous,
}

/// Comparison sense for a [`ComparisonConstraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Eq,
    Leq,
    Geq,
}

/// A scalar affine function: `sum(coefficients[i] * variables[i]) + constant`.
///
/// Parallel `variables`/`coefficients` are in build order until
/// [`canonicalize`](Self::canonicalize) is called.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScalarAffineFunction {
    pub variables: Vec<VarIdx>,
    pub coefficients: Vec<f64>,
    pub constant: f64,
}

impl ScalarAffineFunction {
    pub fn constant(value: f64) -> Self {
        ScalarAffineFunction {
            variables: Vec::new(),
            coefficients: Vec::new(),
            constant: value,
        }
    }

    pub fn from_var(v: VarIdx) -> Self {
        ScalarAffineFunction {
            variables: vec![v],
            coefficients: vec![1.0],
            constant: 0.0,
        }
    }

    /// Degree of this term: 0 if no variables carry a nonzero coefficient
    /// after canonicalization, else 1. We report the syntactic degree (1
    /// whenever any variable is present) to match the algebra's degree law,
    /// canonicalize first if an exact semantic degree is required.
    pub fn degree(&self) -> u8 {
        if self.variables.is_empty() {
            0
        } else {
            1
        }
    }

    /// Sort by variable ascending, combine equal-variable coefficients,
    /// drop exact zeros. Deterministic.
    pub fn canonicalize(&mut self) {
        let mut merged: BTreeMap<VarIdx, f64> = BTreeMap::new();
        for (&v, &c) in self.variables.iter().zip(self.coefficients.iter()) {
            *merged.entry(v).or_insert(0.0) += c;
        }
        self.variables.clear();
        self.coefficients.clear();
        for (v, c) in merged {
            if c != 0.0 {
                self.variables.push(v);
                self.coefficients.push(c);
            }
        }
    }

    pub fn eval(&self, value_of: impl Fn(VarIdx) -> f64) -> f64 {
        self.variables
            .iter()
            .zip(self.coefficients.iter())
            .fold(self.constant, |acc, (&v, &c)| acc + c * value_of(v))
    }

    pub fn is_canonical(&self) -> bool {
        self.variables.windows(2).all(|w| w[0] < w[1])
    }

    pub fn negate(&mut self) {
        self.constant = -self.constant;
        for c in &mut self.coefficients {
            *c = -*c;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.constant *= factor;
        for c in &mut self.coefficients {
            *c *= factor;
        }
    }
}

/// A scalar quadratic function: the bilinear terms plus an affine part.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScalarQuadraticFunction {
    pub variable_1s: Vec<VarIdx>,
    pub variable_2s: Vec<VarIdx>,
    pub coefficients: Vec<f64>,
    pub affine_part: ScalarAffineFunction,
}

impl ScalarQuadraticFunction {
    pub fn degree(&self) -> u8 {
        if self.variable_1s.is_empty() {
            self.affine_part.degree()
        } else {
            2
        }
    }

    /// Canonicalize the affine part, swap each `(v1, v2)` pair so `v1 <=
    /// v2`, sort pairs lexicographically, combine duplicates, drop zeros.
    pub fn canonicalize(&mut self) {
        self.affine_part.canonicalize();

        let n = self.variable_1s.len();
        let mut pairs: Vec<(VarIdx, VarIdx, f64)> = Vec::with_capacity(n);
        for i in 0..n {
            let (mut a, mut b) = (self.variable_1s[i], self.variable_2s[i]);
            if a > b {
                std::mem::swap(&mut a, &mut b);
            }
            pairs.push((a, b, self.coefficients[i]));
        }
        pairs.sort_by(|x, y| match x.0.cmp(&y.0) {
            Ordering::Equal => x.1.cmp(&y.1),
            other => other,
        });

        let mut merged: Vec<(VarIdx, VarIdx, f64)> = Vec::with_capacity(pairs.len());
        for (a, b, c) in pairs {
            if let Some(last) = merged.last_mut() {
                if last.0 == a && last.1 == b {
                    last.2 += c;
                    continue;
                }
            }
            merged.push((a, b, c));
        }
        merged.retain(|&(_, _, c)| c != 0.0);

        self.variable_1s = merged.iter().map(|p| p.0).collect();
        self.variable_2s = merged.iter().map(|p| p.1).collect();
        self.coefficients = merged.iter().map(|p| p.2).collect();
    }

    pub fn eval(&self, value_of: impl Fn(VarIdx) -> f64) -> f64 {
        let quad: f64 = self
            .variable_1s
            .iter()
            .zip(self.variable_2s.iter())
            .zip(self.coefficients.iter())
            .map(|((&v1, &v2), &c)| c * value_of(v1) * value_of(v2))
            .sum();
        quad + self.affine_part.eval(value_of)
    }

    pub fn negate(&mut self) {
        self.affine_part.negate();
        for c in &mut self.coefficients {
            *c = -*c;
        }
    }
}

/// Mutable accumulator absorbing `+`, `-`, `*`, `/` against scalars and
/// lower/same-degree expressions, with a hard degree cap of 2.
#[derive(Debug, Clone, Default)]
pub struct ExprBuilder {
    pub constant: f64,
    linear: BTreeMap<VarIdx, f64>,
    quadratic: BTreeMap<(VarIdx, VarIdx), f64>,
}

impl ExprBuilder {
    pub fn new() -> Self {
        ExprBuilder::default()
    }

    pub fn degree(&self) -> u8 {
        if !self.quadratic.is_empty() {
            2
        } else if !self.linear.is_empty() {
            1
        } else {
            0
        }
    }

    pub fn add_constant(&mut self, c: f64) {
        self.constant += c;
    }

    pub fn add_linear_term(&mut self, coeff: f64, var: VarIdx) {
        *self.linear.entry(var).or_insert(0.0) += coeff;
    }

    /// Records an unordered quadratic term `coeff * v1 * v2`, normalizing
    /// the pair so `v1 <= v2` for storage.
    pub fn add_quadratic_term(&mut self, coeff: f64, mut v1: VarIdx, mut v2: VarIdx) {
        if v1 > v2 {
            std::mem::swap(&mut v1, &mut v2);
        }
        *self.quadratic.entry((v1, v2)).or_insert(0.0) += coeff;
    }

    pub fn negate(&mut self) {
        self.constant = -self.constant;
        for c in self.linear.values_mut() {
            *c = -*c;
        }
        for c in self.quadratic.values_mut() {
            *c = -*c;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.constant *= factor;
        for c in self.linear.values_mut() {
            *c *= factor;
        }
        for c in self.quadratic.values_mut() {
            *c *= factor;
        }
    }

    fn merge_linear_from(&mut self, other: &ExprBuilder) {
        self.constant += other.constant;
        for (&v, &c) in &other.linear {
            *self.linear.entry(v).or_insert(0.0) += c;
        }
        for (&(v1, v2), &c) in &other.quadratic {
            *self.quadratic.entry((v1, v2)).or_insert(0.0) += c;
        }
    }

    pub fn checked_add(&self, other: &ExprBuilder) -> ExprBuilder {
        let mut out = self.clone();
        out.merge_linear_from(other);
        out
    }

    pub fn checked_sub(&self, other: &ExprBuilder) -> ExprBuilder {
        let mut negated = other.clone();
        negated.negate();
        self.checked_add(&negated)
    }

    /// Multiplies two builders; errors with [`CoreError::DegreeExceeded`]
    /// if the resulting polynomial would exceed degree 2. Callers inside a
    /// graph-recording context catch this and escalate to `algform-graph`
    /// instead (see the crate-level design note).
    pub fn checked_mul(&self, other: &ExprBuilder) -> CoreResult<ExprBuilder> {
        let deg = self.degree() + other.degree();
        if deg > 2 {
            return Err(CoreError::DegreeExceeded { degree: deg });
        }
        let mut out = ExprBuilder::new();

        // constant * constant
        out.constant += self.constant * other.constant;
        // constant * linear/quadratic of other
        for (&v, &c) in &other.linear {
            out.add_linear_term(self.constant * c, v);
        }
        for (&(v1, v2), &c) in &other.quadratic {
            out.add_quadratic_term(self.constant * c, v1, v2);
        }
        // linear/quadratic of self * constant
        for (&v, &c) in &self.linear {
            out.add_linear_term(c * other.constant, v);
        }
        for (&(v1, v2), &c) in &self.quadratic {
            out.add_quadratic_term(c * other.constant, v1, v2);
        }
        // linear * linear -> quadratic
        for (&lv, &lc) in &self.linear {
            for (&rv, &rc) in &other.linear {
                out.add_quadratic_term(lc * rc, lv, rv);
            }
        }

        Ok(out)
    }

    pub fn checked_div(&self, divisor: f64) -> CoreResult<ExprBuilder> {
        if divisor == 0.0 {
            return Err(CoreError::NonLinearDivide);
        }
        let mut out = self.clone();
        out.scale(1.0 / divisor);
        Ok(out)
    }

    pub fn into_saf(self) -> CoreResult<ScalarAffineFunction> {
        if !self.quadratic.is_empty() {
            return Err(CoreError::DegreeExceeded { degree: 2 });
        }
        let mut saf = ScalarAffineFunction {
            variables: self.linear.keys().copied().collect(),
            coefficients: self.linear.values().copied().collect(),
            constant: self.constant,
        };
        saf.canonicalize();
        Ok(saf)
    }

    pub fn into_sqf(self) -> ScalarQuadraticFunction {
        let affine = ScalarAffineFunction {
            variables: self.linear.keys().copied().collect(),
            coefficients: self.linear.values().copied().collect(),
            constant: self.constant,
        };
        let mut sqf = ScalarQuadraticFunction {
            variable_1s: self.quadratic.keys().map(|p| p.0).collect(),
            variable_2s: self.quadratic.keys().map(|p| p.1).collect(),
            coefficients: self.quadratic.values().copied().collect(),
            affine_part: affine,
        };
        sqf.canonicalize();
        sqf
    }

    pub fn eval(&self, value_of: impl Fn(VarIdx) -> f64 + Copy) -> f64 {
        let lin: f64 = self.linear.iter().map(|(&v, &c)| c * value_of(v)).sum();
        let quad: f64 = self
            .quadratic
            .iter()
            .map(|(&(v1, v2), &c)| c * value_of(v1) * value_of(v2))
            .sum();
        self.constant + lin + quad
    }

    /// Builds a [`ComparisonConstraint`] for `self == rhs`, taking
    /// `lhs = self - rhs`.
    pub fn eq_constant(mut self, rhs: f64) -> ComparisonConstraint {
        self.constant -= rhs;
        ComparisonConstraint::new(Sense::Eq, self)
    }

    pub fn leq(mut self, rhs: f64) -> ComparisonConstraint {
        self.constant -= rhs;
        ComparisonConstraint::new(Sense::Leq, self)
    }

    pub fn geq(mut self, rhs: f64) -> ComparisonConstraint {
        self.constant -= rhs;
        ComparisonConstraint::new(Sense::Geq, self)
    }
}

impl From<f64> for ExprBuilder {
    fn from(value: f64) -> Self {
        let mut b = ExprBuilder::new();
        b.constant = value;
        b
    }
}

impl From<VarIdx> for ExprBuilder {
    fn from(v: VarIdx) -> Self {
        let mut b = ExprBuilder::new();
        b.add_linear_term(1.0, v);
        b
    }
}

impl From<ScalarAffineFunction> for ExprBuilder {
    fn from(saf: ScalarAffineFunction) -> Self {
        let mut b = ExprBuilder::new();
        b.constant = saf.constant;
        for (v, c) in saf.variables.into_iter().zip(saf.coefficients) {
            b.add_linear_term(c, v);
        }
        b
    }
}

impl From<ScalarQuadraticFunction> for ExprBuilder {
    fn from(sqf: ScalarQuadraticFunction) -> Self {
        let mut b: ExprBuilder = sqf.affine_part.into();
        for ((v1, v2), c) in sqf
            .variable_1s
            .into_iter()
            .zip(sqf.variable_2s)
            .zip(sqf.coefficients)
            .map(|((v1, v2), c)| ((v1, v2), c))
        {
            b.add_quadratic_term(c, v1, v2);
        }
        b
    }
}

macro_rules! impl_add_sub_via_builder {
    ($lhs:ty, $rhs:ty) => {
        impl Add<$rhs> for $lhs {
            type Output = ExprBuilder;
            fn add(self, rhs: $rhs) -> ExprBuilder {
                let lb: ExprBuilder = self.into();
                let rb: ExprBuilder = rhs.into();
                lb.checked_add(&rb)
            }
        }
        impl Sub<$rhs> for $lhs {
            type Output = ExprBuilder;
            fn sub(self, rhs: $rhs) -> ExprBuilder {
                let lb: ExprBuilder = self.into();
                let rb: ExprBuilder = rhs.into();
                lb.checked_sub(&rb)
            }
        }
        impl Mul<$rhs> for $lhs {
            type Output = CoreResult<ExprBuilder>;
            fn mul(self, rhs: $rhs) -> CoreResult<ExprBuilder> {
                let lb: ExprBuilder = self.into();
                let rb: ExprBuilder = rhs.into();
                lb.checked_mul(&rb)
            }
        }
    };
}

impl_add_sub_via_builder!(VarIdx, VarIdx);
impl_add_sub_via_builder!(VarIdx, ScalarAffineFunction);
impl_add_sub_via_builder!(ScalarAffineFunction, VarIdx);
impl_add_sub_via_builder!(ScalarAffineFunction, ScalarAffineFunction);
impl_add_sub_via_builder!(ScalarAffineFunction, ScalarQuadraticFunction);
impl_add_sub_via_builder!(ScalarQuadraticFunction, ScalarAffineFunction);
impl_add_sub_via_builder!(ScalarQuadraticFunction, ScalarQuadraticFunction);
impl_add_sub_via_builder!(ExprBuilder, ExprBuilder);
impl_add_sub_via_builder!(ExprBuilder, VarIdx);
impl_add_sub_via_builder!(VarIdx, ExprBuilder);
impl_add_sub_via_builder!(ExprBuilder, ScalarAffineFunction);
impl_add_sub_via_builder!(ScalarAffineFunction, ExprBuilder);

impl Neg for VarIdx {
    type Output = ExprBuilder;
    fn neg(self) -> ExprBuilder {
        let mut b: ExprBuilder = self.into();
        b.negate();
        b
    }
}

impl Neg for ExprBuilder {
    type Output = ExprBuilder;
    fn neg(mut self) -> ExprBuilder {
        self.negate();
        self
    }
}

impl Mul<f64> for VarIdx {
    type Output = ExprBuilder;
    fn mul(self, rhs: f64) -> ExprBuilder {
        let mut b = ExprBuilder::new();
        b.add_linear_term(rhs, self);
        b
    }
}

impl Mul<VarIdx> for f64 {
    type Output = ExprBuilder;
    fn mul(self, rhs: VarIdx) -> ExprBuilder {
        rhs * self
    }
}

impl Mul<f64> for ExprBuilder {
    type Output = ExprBuilder;
    fn mul(mut self, rhs: f64) -> ExprBuilder {
        self.scale(rhs);
        self
    }
}

impl Div<f64> for ExprBuilder {
    type Output = CoreResult<ExprBuilder>;
    fn div(self, rhs: f64) -> CoreResult<ExprBuilder> {
        self.checked_div(rhs)
    }
}

/// A `sense lhs rhs` comparison produced by the comparison helper methods;
/// consumed by `add_linear_constraint`/`add_quadratic_constraint`.
#[derive(Debug, Clone)]
pub struct ComparisonConstraint {
    pub sense: Sense,
    pub lhs: ExprBuilder,
    pub rhs: f64,
}

impl ComparisonConstraint {
    fn new(sense: Sense, lhs: ExprBuilder) -> Self {
        ComparisonConstraint {
            sense,
            lhs,
            rhs: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(id: u32) -> VarIdx {
        VarIdx::new(id)
    }

    #[test]
    fn saf_canonicalize_sorts_and_merges() {
        let mut saf = ScalarAffineFunction {
            variables: vec![v(2), v(1), v(1)],
            coefficients: vec![3.0, 1.0, 2.0],
            constant: 5.0,
        };
        saf.canonicalize();
        assert_eq!(saf.variables, vec![v(1), v(2)]);
        assert_eq!(saf.coefficients, vec![3.0, 3.0]);
        assert!(saf.is_canonical());
    }

    #[test]
    fn saf_canonicalize_drops_zero_coefficients() {
        let mut saf = ScalarAffineFunction {
            variables: vec![v(1), v(1)],
            coefficients: vec![2.0, -2.0],
            constant: 0.0,
        };
        saf.canonicalize();
        assert!(saf.variables.is_empty());
        assert!(saf.coefficients.is_empty());
    }

    #[test]
    fn sqf_canonicalize_orders_pairs() {
        let mut sqf = ScalarQuadraticFunction {
            variable_1s: vec![v(2), v(1)],
            variable_2s: vec![v(1), v(2)],
            coefficients: vec![1.0, 4.0],
            affine_part: ScalarAffineFunction::default(),
        };
        sqf.canonicalize();
        assert_eq!(sqf.variable_1s, vec![v(1)]);
        assert_eq!(sqf.variable_2s, vec![v(2)]);
        assert_eq!(sqf.coefficients, vec![5.0]);
    }

    #[test]
    fn degree_law_add_is_max() {
        let x = v(1);
        let y = v(2);
        let linear = x + y;
        assert_eq!(linear.degree(), 1);

        let quad = (x * y).unwrap();
        assert_eq!(quad.degree(), 2);

        let sum = quad.checked_add(&linear);
        assert_eq!(sum.degree(), 2);
    }

    #[test]
    fn degree_law_mul_is_sum_and_errors_past_two() {
        let x = v(1);
        let y = v(2);
        let z = v(3);
        let xy = (x * y).unwrap();
        let xyz: ExprBuilder = xy.into();
        let z_builder: ExprBuilder = z.into();
        let err = xyz.checked_mul(&z_builder).unwrap_err();
        assert!(matches!(err, CoreError::DegreeExceeded { degree: 3 }));
    }

    #[test]
    fn round_trip_saf_matches_builder_eval() {
        let x = v(1);
        let y = v(2);
        let b = (x * 2.0) + (y * 3.0) + ExprBuilder::from(1.0);
        let value_of = |var: VarIdx| if var == x { 4.0 } else { 7.0 };
        let direct = b.clone().eval(value_of);
        let saf = b.into_saf().unwrap();
        let via_saf = saf.eval(value_of);
        assert!((direct - via_saf).abs() < 1e-12);
    }

    #[test]
    fn comparison_moves_rhs_into_lhs() {
        let x = v(1);
        let cc = ExprBuilder::from(x).leq(10.0);
        assert_eq!(cc.rhs, 0.0);
        assert_eq!(cc.lhs.constant, -10.0);
        assert!(matches!(cc.sense, Sense::Leq));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let b = ExprBuilder::from(v(1));
        assert!(matches!(b / 0.0, Err(CoreError::NonLinearDivide)));
    }
}
