//! Small dense linear-algebra helpers shared by the solver, the optimizer and
//! the simulators. Matrices are row-major `Vec<Vec<f64>>`; problem sizes are
//! a handful of assets so nothing here tries to be clever about cache use.

/// Dot product.
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Matrix-vector multiplication.
pub(crate) fn mat_vec_multiply(mat: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    mat.iter().map(|row| dot(row, v)).collect()
}

/// Quadratic form v' * M * v.
pub(crate) fn quadratic_form(mat: &[Vec<f64>], v: &[f64]) -> f64 {
    dot(v, &mat_vec_multiply(mat, v))
}

/// Euclidean norm.
pub(crate) fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

pub(crate) fn identity(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| {
            let mut row = vec![0.0; n];
            row[i] = 1.0;
            row
        })
        .collect()
}

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when a pivot falls below `1e-14` relative to the largest
/// entry of `A`, i.e. the system is singular to working precision.
#[allow(clippy::needless_range_loop)]
pub(crate) fn solve_linear_system(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = a.len();
    if n == 0 {
        return Some(Vec::new());
    }
    if b.len() != n || a.iter().any(|row| row.len() != n) {
        return None;
    }

    let scale = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let threshold = 1e-14 * scale;

    let mut aug: Vec<Vec<f64>> = a
        .iter()
        .zip(b.iter())
        .map(|(row, rhs)| {
            let mut r = row.clone();
            r.push(*rhs);
            r
        })
        .collect();

    for col in 0..n {
        // Partial pivoting
        let mut max_row = col;
        let mut max_val = aug[col][col].abs();
        for row in (col + 1)..n {
            let val = aug[row][col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < threshold {
            return None;
        }

        if max_row != col {
            aug.swap(col, max_row);
        }

        let pivot_row = aug[col].clone();
        for row in (col + 1)..n {
            let factor = aug[row][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for (cell, &pv) in aug[row].iter_mut().zip(pivot_row.iter()).skip(col) {
                *cell -= factor * pv;
            }
        }
    }

    // Back substitution
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum -= aug[i][j] * x[j];
        }
        x[i] = sum / aug[i][i];
    }

    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

/// Lower-triangular Cholesky factor `L` with `L L' = A`.
///
/// Tiny negative pivots (down to `-1e-12` times the diagonal scale) are
/// treated as zero so that positive-semidefinite covariance estimates with a
/// rank deficiency still factor. Returns `None` for anything less definite.
#[cfg_attr(not(feature = "monte_carlo"), allow(dead_code))]
#[allow(clippy::needless_range_loop)]
pub(crate) fn cholesky(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let diag_scale = (0..n).fold(0.0_f64, |acc, i| acc.max(a[i][i].abs()));
    let tolerance = 1e-12 * diag_scale.max(1e-300);
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum < -tolerance {
                    return None;
                }
                l[i][j] = sum.max(0.0).sqrt();
            } else if l[j][j] > 0.0 {
                l[i][j] = sum / l[j][j];
            } else if sum.abs() > tolerance {
                return None;
            }
        }
    }

    Some(l)
}
