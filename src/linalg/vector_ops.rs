use faer::{Col, ColRef, unzip, zip};

use crate::{E, EPS, I};

pub(crate) fn dot<'a>(x1: ColRef<'a, E>, x2: ColRef<'a, E>) -> E {
    let mut out = 0.;

    zip!(x1, x2).for_each(|unzip!(x1, x2)| out += *x1 * *x2);

    out
}

pub(crate) fn norm2<'a>(x: ColRef<'a, E>) -> E {
    let mut out = 0.;

    zip!(x).for_each(|unzip!(x)| out += *x * *x);

    out.sqrt()
}

/// Cosine of the angle between two vectors; 0 when either vector is
/// (numerically) zero.
pub(crate) fn cosine<'a>(x1: ColRef<'a, E>, x2: ColRef<'a, E>) -> E {
    let n1 = norm2(x1);
    let n2 = norm2(x2);

    if n1 <= EPS || n2 <= EPS {
        return 0.;
    }

    dot(x1, x2) / (n1 * n2)
}

/// Dot product of a sorted sparse vector `(vars, vals)` with a dense vector.
pub(crate) fn sparse_dot<'a>(vars: &[I], vals: &[E], x: ColRef<'a, E>) -> E {
    let mut out = 0.;

    for (&j, &v) in vars.iter().zip(vals.iter()) {
        out += v * x[j];
    }

    out
}

/// Scatters a sorted sparse vector into a dense column of length `n`.
pub(crate) fn sparse_to_dense(vars: &[I], vals: &[E], n: I) -> Col<E> {
    let mut out = Col::<E>::zeros(n);

    for (&j, &v) in vars.iter().zip(vals.iter()) {
        out[j] = v;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot() {
        let x1_data = [1.0, 2.0, 3.0];
        let x2_data = [4.0, 5.0, 6.0];
        let x1 = Col::from_fn(x1_data.len(), |i| x1_data[i]);
        let x2 = Col::from_fn(x2_data.len(), |i| x2_data[i]);
        assert_eq!(dot(x1.as_ref(), x2.as_ref()), 32.0);
    }

    #[test]
    fn test_norm2() {
        let x_data = [3.0, 4.0];
        let x = Col::from_fn(x_data.len(), |i| x_data[i]);
        assert!((norm2(x.as_ref()) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_parallel_and_orthogonal() {
        let a = Col::from_fn(2, |i| [1.0, 0.0][i]);
        let b = Col::from_fn(2, |i| [2.0, 0.0][i]);
        let c = Col::from_fn(2, |i| [0.0, 1.0][i]);
        assert!((cosine(a.as_ref(), b.as_ref()) - 1.0).abs() < 1e-12);
        assert!(cosine(a.as_ref(), c.as_ref()).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let a = Col::from_fn(2, |i| [1.0, 0.0][i]);
        let z = Col::<E>::zeros(2);
        assert_eq!(cosine(a.as_ref(), z.as_ref()), 0.0);
    }

    #[test]
    fn test_sparse_dot() {
        let x = Col::from_fn(4, |i| [1.0, 2.0, 3.0, 4.0][i]);
        let vars = [1, 3];
        let vals = [10.0, -1.0];
        assert_eq!(sparse_dot(&vars, &vals, x.as_ref()), 16.0);
    }

    #[test]
    fn test_sparse_to_dense() {
        let vars = [0, 2];
        let vals = [1.5, -2.5];
        let dense = sparse_to_dense(&vars, &vals, 4);
        assert_eq!(dense[0], 1.5);
        assert_eq!(dense[1], 0.0);
        assert_eq!(dense[2], -2.5);
        assert_eq!(dense[3], 0.0);
    }
}
