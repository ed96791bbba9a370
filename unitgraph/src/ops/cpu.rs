use crate::error::{Error, Result};
use crate::tensor::Scalar;

fn check_len(context: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(Error::values(context, expected, got));
    }
    Ok(())
}

/// `out[m×n] = a[m×k] · b[k×n]`
pub fn matmul<T: Scalar>(a: &[T], b: &[T], out: &mut [T], m: usize, k: usize, n: usize) -> Result<()> {
    check_len("matmul lhs", m * k, a.len())?;
    check_len("matmul rhs", k * n, b.len())?;
    check_len("matmul out", m * n, out.len())?;
    for i in 0..m {
        for j in 0..n {
            let mut acc = T::zero();
            for p in 0..k {
                acc += a[i * k + p] * b[p * n + j];
            }
            out[i * n + j] = acc;
        }
    }
    Ok(())
}

/// `out[k×n] = aᵀ · b` for `a[m×k]`, `b[m×n]`.
pub fn matmul_at_b<T: Scalar>(a: &[T], b: &[T], out: &mut [T], m: usize, k: usize, n: usize) -> Result<()> {
    check_len("matmul_at_b lhs", m * k, a.len())?;
    check_len("matmul_at_b rhs", m * n, b.len())?;
    check_len("matmul_at_b out", k * n, out.len())?;
    for p in 0..k {
        for j in 0..n {
            let mut acc = T::zero();
            for i in 0..m {
                acc += a[i * k + p] * b[i * n + j];
            }
            out[p * n + j] = acc;
        }
    }
    Ok(())
}

/// `out[m×k] = a · bᵀ` for `a[m×n]`, `b[k×n]`.
pub fn matmul_a_bt<T: Scalar>(a: &[T], b: &[T], out: &mut [T], m: usize, n: usize, k: usize) -> Result<()> {
    check_len("matmul_a_bt lhs", m * n, a.len())?;
    check_len("matmul_a_bt rhs", k * n, b.len())?;
    check_len("matmul_a_bt out", m * k, out.len())?;
    for i in 0..m {
        for p in 0..k {
            let mut acc = T::zero();
            for j in 0..n {
                acc += a[i * n + j] * b[p * n + j];
            }
            out[i * k + p] = acc;
        }
    }
    Ok(())
}

/// Column-wise sum of an `m×n` matrix into `out[n]`, accumulating.
pub fn sum_rows<T: Scalar>(a: &[T], out: &mut [T], m: usize, n: usize) -> Result<()> {
    check_len("sum_rows in", m * n, a.len())?;
    check_len("sum_rows out", n, out.len())?;
    for i in 0..m {
        for j in 0..n {
            out[j] += a[i * n + j];
        }
    }
    Ok(())
}

pub fn add_assign<T: Scalar>(out: &mut [T], b: &[T]) -> Result<()> {
    check_len("add", out.len(), b.len())?;
    out.iter_mut().zip(b).for_each(|(x, y)| *x += *y);
    Ok(())
}

pub fn scale<T: Scalar>(out: &mut [T], factor: T) {
    out.iter_mut().for_each(|x| *x = *x * factor);
}

pub fn unary<T: Scalar, F: Fn(T) -> T>(src: &[T], dst: &mut [T], f: F) -> Result<()> {
    check_len("unary", src.len(), dst.len())?;
    dst.iter_mut().zip(src).for_each(|(d, s)| *d = f(*s));
    Ok(())
}

pub fn zip_map<T: Scalar, F: Fn(T, T) -> T>(a: &[T], b: &[T], dst: &mut [T], f: F) -> Result<()> {
    check_len("zip lhs", dst.len(), a.len())?;
    check_len("zip rhs", dst.len(), b.len())?;
    for ((d, x), y) in dst.iter_mut().zip(a).zip(b) {
        *d = f(*x, *y);
    }
    Ok(())
}
