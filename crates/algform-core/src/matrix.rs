//! Bulk constraint construction from dense and sparse matrix rows,
//! grounded on `examples/original_source/.../matrix.py`
//! (`iterate_sparse_matrix_rows`, `add_matrix_constraints`).

use crate::error::CoreResult;
use crate::expr::{ComparisonConstraint, ExprBuilder, Sense, VarIdx};
use sprs::CsMat;

/// Right-hand side for a batch of matrix constraints: either one scalar
/// broadcast to every row, or one value per row.
#[derive(Debug, Clone)]
pub enum Rhs {
    Scalar(f64),
    PerRow(Vec<f64>),
}

impl Rhs {
    fn at(&self, row: usize) -> f64 {
        match self {
            Rhs::Scalar(v) => *v,
            Rhs::PerRow(v) => v[row],
        }
    }
}

fn comparison_for(sense: Sense, builder: ExprBuilder, rhs: f64) -> ComparisonConstraint {
    match sense {
        Sense::Eq => builder.eq_constant(rhs),
        Sense::Leq => builder.leq(rhs),
        Sense::Geq => builder.geq(rhs),
    }
}

/// Builds one [`ComparisonConstraint`] per row of a dense matrix
/// `A x <sense> b`, where `vars[j]` is the variable bound to column `j`.
pub fn from_dense_rows(
    rows: &[Vec<f64>],
    vars: &[VarIdx],
    sense: Sense,
    rhs: &Rhs,
) -> Vec<ComparisonConstraint> {
    rows.iter()
        .enumerate()
        .map(|(r, row)| {
            let mut b = ExprBuilder::new();
            for (j, &coeff) in row.iter().enumerate() {
                if coeff != 0.0 {
                    b.add_linear_term(coeff, vars[j]);
                }
            }
            comparison_for(sense, b, rhs.at(r))
        })
        .collect()
}

/// Builds one [`ComparisonConstraint`] per row of a sparse (CSR) matrix
/// `A x <sense> b`.
pub fn from_sparse_rows(
    a: &CsMat<f64>,
    vars: &[VarIdx],
    sense: Sense,
    rhs: &Rhs,
) -> CoreResult<Vec<ComparisonConstraint>> {
    let mut out = Vec::with_capacity(a.rows());
    for (row_idx, row_vec) in a.outer_iterator().enumerate() {
        let mut b = ExprBuilder::new();
        for (col, &coeff) in row_vec.iter() {
            if coeff != 0.0 {
                b.add_linear_term(coeff, vars[col]);
            }
        }
        out.push(comparison_for(sense, b, rhs.at(row_idx)));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::VarIdx;
    use sprs::TriMat;

    fn vars(n: usize) -> Vec<VarIdx> {
        (0..n as u32).map(VarIdx::new).collect()
    }

    #[test]
    fn dense_rows_build_expected_constraints() {
        let rows = vec![vec![1.0, 2.0], vec![0.0, 3.0]];
        let cs = from_dense_rows(&rows, &vars(2), Sense::Leq, &Rhs::Scalar(5.0));
        assert_eq!(cs.len(), 2);
        assert_eq!(cs[0].lhs.eval(|v| if v == vars(2)[0] { 1.0 } else { 1.0 }), 1.0 * 1.0 + 2.0 * 1.0 - 5.0);
        assert_eq!(cs[1].lhs.eval(|_| 1.0), 3.0 - 5.0);
    }

    #[test]
    fn sparse_rows_build_expected_constraints() {
        let mut tri = TriMat::new((2, 3));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(0, 2, 4.0);
        tri.add_triplet(1, 1, 2.0);
        let a: CsMat<f64> = tri.to_csr();
        let rhs = Rhs::PerRow(vec![1.0, 2.0]);
        let cs = from_sparse_rows(&a, &vars(3), Sense::Eq, &rhs).unwrap();
        assert_eq!(cs.len(), 2);
        assert_eq!(cs[0].lhs.eval(|_| 1.0), 1.0 + 4.0 - 1.0);
        assert_eq!(cs[1].lhs.eval(|_| 1.0), 2.0 - 2.0);
    }
}
