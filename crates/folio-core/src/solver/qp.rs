//! Dual active-set solver for the strictly convex quadratic subproblem
//!
//! ```text
//!   minimize    ½ x'Hx + g'x
//!   subject to  n_i'x  = b_i   (equality rows)
//!               n_i'x >= b_i   (inequality rows)
//! ```
//!
//! Follows Goldfarb & Idnani (1983): start from the unconstrained minimizer
//! and repeatedly add the most violated constraint, taking primal/dual steps
//! that keep every active multiplier dual feasible. The projection operators
//! are obtained from the KKT system of the current active set instead of
//! updated QR factors; sizes are small enough that a fresh dense solve per
//! step is cheaper than the bookkeeping.

use crate::linalg::{dot, norm, solve_linear_system};

/// A single linear constraint row of the subproblem.
#[derive(Debug, Clone)]
pub(crate) struct LinearConstraint {
    pub normal: Vec<f64>,
    pub rhs: f64,
    pub equality: bool,
}

impl LinearConstraint {
    pub fn equality(normal: Vec<f64>, rhs: f64) -> Self {
        Self {
            normal,
            rhs,
            equality: true,
        }
    }

    pub fn at_least(normal: Vec<f64>, rhs: f64) -> Self {
        Self {
            normal,
            rhs,
            equality: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QpError {
    /// No point satisfies all constraint rows.
    Infeasible,
    /// H (or a KKT system built from it) is singular to working precision.
    Singular,
    /// The active-set iteration did not settle.
    IterationLimit,
}

#[derive(Debug, Clone)]
pub(crate) struct QpSolution {
    pub x: Vec<f64>,
    /// One multiplier per constraint row, zero for inactive rows. Sign
    /// convention: H x + g = Σ multiplier_i · n_i.
    pub multipliers: Vec<f64>,
}

const FEASIBILITY_TOL: f64 = 1e-12;
const DEPENDENCE_TOL: f64 = 1e-14;

struct ActiveSet {
    /// Index into the constraint list.
    index: Vec<usize>,
    /// Signed normal actually used (equalities may be flipped).
    normal: Vec<Vec<f64>>,
    sign: Vec<f64>,
    equality: Vec<bool>,
    multiplier: Vec<f64>,
}

impl ActiveSet {
    fn new() -> Self {
        Self {
            index: Vec::new(),
            normal: Vec::new(),
            sign: Vec::new(),
            equality: Vec::new(),
            multiplier: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn contains(&self, p: usize) -> bool {
        self.index.contains(&p)
    }

    fn push(&mut self, p: usize, normal: Vec<f64>, sign: f64, equality: bool, multiplier: f64) {
        self.index.push(p);
        self.normal.push(normal);
        self.sign.push(sign);
        self.equality.push(equality);
        self.multiplier.push(multiplier);
    }

    fn remove(&mut self, k: usize) {
        self.index.remove(k);
        self.normal.remove(k);
        self.sign.remove(k);
        self.equality.remove(k);
        self.multiplier.remove(k);
    }
}

/// Solve the subproblem. `h` must be symmetric positive definite.
pub(crate) fn solve_qp(
    h: &[Vec<f64>],
    g: &[f64],
    constraints: &[LinearConstraint],
) -> Result<QpSolution, QpError> {
    let n = g.len();
    let neg_g: Vec<f64> = g.iter().map(|v| -v).collect();
    let mut x = solve_linear_system(h, &neg_g).ok_or(QpError::Singular)?;
    let mut active = ActiveSet::new();

    let max_steps = 10 * (n + constraints.len()) + 50;
    let mut steps = 0usize;

    // Equalities first; they never leave the active set.
    for (p, con) in constraints.iter().enumerate() {
        if con.equality {
            add_constraint(h, &mut x, &mut active, p, con, &mut steps, max_steps)?;
        }
    }

    loop {
        let mut worst: Option<(usize, f64)> = None;
        for (p, con) in constraints.iter().enumerate() {
            if con.equality || active.contains(p) {
                continue;
            }
            let slack = dot(&con.normal, &x) - con.rhs;
            let tol = FEASIBILITY_TOL * (1.0 + con.rhs.abs());
            if slack < -tol && worst.map_or(true, |(_, s)| slack < s) {
                worst = Some((p, slack));
            }
        }

        let Some((p, _)) = worst else {
            break;
        };
        add_constraint(h, &mut x, &mut active, p, &constraints[p], &mut steps, max_steps)?;
    }

    let mut multipliers = vec![0.0; constraints.len()];
    for k in 0..active.len() {
        multipliers[active.index[k]] = active.sign[k] * active.multiplier[k];
    }

    Ok(QpSolution { x, multipliers })
}

/// Make constraint `p` active, dropping inequality rows whose multipliers
/// would otherwise turn negative.
fn add_constraint(
    h: &[Vec<f64>],
    x: &mut [f64],
    active: &mut ActiveSet,
    p: usize,
    con: &LinearConstraint,
    steps: &mut usize,
    max_steps: usize,
) -> Result<(), QpError> {
    let mut sign = 1.0;
    if con.equality && dot(&con.normal, x) - con.rhs > 0.0 {
        sign = -1.0;
    }
    let normal: Vec<f64> = con.normal.iter().map(|v| sign * v).collect();
    let rhs = sign * con.rhs;
    let mut u_new = 0.0;

    loop {
        *steps += 1;
        if *steps > max_steps {
            return Err(QpError::IterationLimit);
        }

        let slack = dot(&normal, x) - rhs;
        let (z, r) = step_direction(h, &active.normal, &normal)?;

        // Partial step: largest dual step keeping active inequality
        // multipliers non-negative.
        let mut t1 = f64::INFINITY;
        let mut drop_at: Option<usize> = None;
        for k in 0..active.len() {
            if active.equality[k] || r[k] <= DEPENDENCE_TOL {
                continue;
            }
            let ratio = active.multiplier[k] / r[k];
            if ratio < t1 {
                t1 = ratio;
                drop_at = Some(k);
            }
        }

        // Full step: primal step that satisfies constraint p.
        let zn = dot(&z, &normal);
        let dependent = norm(&z) <= DEPENDENCE_TOL * (1.0 + norm(&normal)) || zn <= 0.0;
        let t2 = if dependent { f64::INFINITY } else { -slack / zn };

        if dependent && drop_at.is_none() {
            // Linearly dependent on the active rows with nothing to drop:
            // either redundant (already satisfied) or contradictory.
            let tol = FEASIBILITY_TOL * (1.0 + rhs.abs());
            if slack.abs() <= tol || (!con.equality && slack >= 0.0) {
                return Ok(());
            }
            return Err(QpError::Infeasible);
        }

        let t = t1.min(t2.max(0.0));
        if !t.is_finite() {
            return Err(QpError::Infeasible);
        }

        if !dependent {
            for (xi, zi) in x.iter_mut().zip(z.iter()) {
                *xi += t * zi;
            }
        }
        for k in 0..active.len() {
            active.multiplier[k] -= t * r[k];
        }
        u_new += t;

        if !dependent && t2.max(0.0) <= t1 {
            active.push(p, normal, sign, con.equality, u_new);
            return Ok(());
        }

        if let Some(k) = drop_at {
            active.remove(k);
        }
    }
}

/// Primal direction `z = H⁺ n` and dual direction `r = N* n` for the active
/// set with (signed) normals `active`, from the KKT system
/// `[H N; N' 0] [z; r] = [n; 0]`.
fn step_direction(
    h: &[Vec<f64>],
    active: &[Vec<f64>],
    normal: &[f64],
) -> Result<(Vec<f64>, Vec<f64>), QpError> {
    let n = normal.len();
    let m = active.len();
    let size = n + m;

    let mut kkt = vec![vec![0.0; size]; size];
    for i in 0..n {
        kkt[i][..n].copy_from_slice(&h[i]);
    }
    for (k, row) in active.iter().enumerate() {
        for i in 0..n {
            kkt[i][n + k] = row[i];
            kkt[n + k][i] = row[i];
        }
    }

    let mut rhs = vec![0.0; size];
    rhs[..n].copy_from_slice(normal);

    let sol = solve_linear_system(&kkt, &rhs).ok_or(QpError::Singular)?;
    let z = sol[..n].to_vec();
    let r = sol[n..].to_vec();
    Ok((z, r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::identity;

    fn assert_close(got: &[f64], expected: &[f64], tol: f64) {
        assert_eq!(got.len(), expected.len());
        for (g, e) in got.iter().zip(expected.iter()) {
            assert!((g - e).abs() <= tol, "got={got:?} expected={expected:?}");
        }
    }

    #[test]
    fn test_unconstrained_minimizer() {
        let h = vec![vec![2.0, 0.0], vec![0.0, 4.0]];
        let sol = solve_qp(&h, &[-2.0, -4.0], &[]).unwrap();
        assert_close(&sol.x, &[1.0, 1.0], 1e-12);
    }

    #[test]
    fn test_equality_projection() {
        // min ½|x|² - x0  s.t. x0 + x1 = 1  ->  x = (1, 0)
        let sol = solve_qp(
            &identity(2),
            &[-1.0, 0.0],
            &[LinearConstraint::equality(vec![1.0, 1.0], 1.0)],
        )
        .unwrap();
        assert_close(&sol.x, &[1.0, 0.0], 1e-12);
        // H x + g = λ n  ->  (0, 0) = λ (1, 1)
        assert!(sol.multipliers[0].abs() < 1e-12);
    }

    #[test]
    fn test_active_bound_has_positive_multiplier() {
        // min ½|x|² - 2 x0 - x1  s.t. x0 + x1 = 1, x0 <= 0.6
        let cons = vec![
            LinearConstraint::equality(vec![1.0, 1.0], 1.0),
            LinearConstraint::at_least(vec![-1.0, 0.0], -0.6),
        ];
        let sol = solve_qp(&identity(2), &[-2.0, -1.0], &cons).unwrap();
        assert_close(&sol.x, &[0.6, 0.4], 1e-12);
        assert!(sol.multipliers[1] > 0.0);
    }

    #[test]
    fn test_inactive_bounds_are_ignored() {
        let cons = vec![
            LinearConstraint::equality(vec![1.0, 1.0, 1.0], 1.0),
            LinearConstraint::at_least(vec![1.0, 0.0, 0.0], 0.0),
            LinearConstraint::at_least(vec![0.0, 1.0, 0.0], 0.0),
            LinearConstraint::at_least(vec![0.0, 0.0, 1.0], 0.0),
        ];
        let sol = solve_qp(&identity(3), &[0.0, 0.0, 0.0], &cons).unwrap();
        assert_close(&sol.x, &[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0], 1e-12);
        assert!(sol.multipliers[1..].iter().all(|m| *m == 0.0));
    }

    #[test]
    fn test_two_bounds_active_at_origin() {
        let cons = vec![
            LinearConstraint::at_least(vec![1.0, 0.0], 0.0),
            LinearConstraint::at_least(vec![0.0, 1.0], 0.0),
            LinearConstraint::at_least(vec![1.0, 1.0], -5.0),
        ];
        let sol = solve_qp(&identity(2), &[1.0, 1.0], &cons).unwrap();
        assert_close(&sol.x, &[0.0, 0.0], 1e-12);
        assert_close(&sol.multipliers, &[1.0, 1.0, 0.0], 1e-12);
    }

    #[test]
    fn test_drops_constraint_that_becomes_inactive() {
        // The first row added is the most violated one at (-2, 0), but the
        // optimum only needs x0 >= 0.5; the first row must be released.
        let cons = vec![
            LinearConstraint::at_least(vec![2.0, 2.0], 0.8),
            LinearConstraint::at_least(vec![1.0, 0.0], 0.5),
        ];
        let sol = solve_qp(&identity(2), &[2.0, 0.0], &cons).unwrap();
        assert_close(&sol.x, &[0.5, 0.0], 1e-12);
        assert_close(&sol.multipliers, &[0.0, 2.5], 1e-12);
    }

    #[test]
    fn test_infeasible_box() {
        let cons = vec![
            LinearConstraint::equality(vec![1.0, 1.0], 1.0),
            LinearConstraint::at_least(vec![-1.0, 0.0], -0.3),
            LinearConstraint::at_least(vec![0.0, -1.0], -0.3),
        ];
        let err = solve_qp(&identity(2), &[0.0, 0.0], &cons).unwrap_err();
        assert_eq!(err, QpError::Infeasible);
    }
}
