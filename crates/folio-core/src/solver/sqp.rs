use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::qp::{solve_qp, LinearConstraint, QpError, QpSolution};
use super::{
    violation_of, ConstrainedMinimizer, ExitStatus, Problem, SolverOptions, SolverResult,
};
use crate::linalg::{dot, identity, mat_vec_multiply, norm};

/// Maximum number of merit-function trials per line search. After the last
/// trial the (short) step is taken regardless and the convergence test
/// decides what happens next.
const MAX_LINE_SEARCH: u32 = 10;

/// Sufficient-decrease fraction of the predicted merit change.
const ARMIJO: f64 = 0.1;

/// Sequential quadratic programming minimizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sqp {
    pub options: SolverOptions,
}

impl Sqp {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }
}

impl ConstrainedMinimizer for Sqp {
    fn minimize(&self, problem: &Problem<'_>, x0: &[f64]) -> SolverResult {
        Search::new(problem, self.options, x0.len()).run(x0)
    }
}

struct Search<'p, 'a> {
    problem: &'p Problem<'a>,
    options: SolverOptions,
    lower: Vec<f64>,
    upper: Vec<f64>,
    evaluations: u32,
}

impl<'p, 'a> Search<'p, 'a> {
    fn new(problem: &'p Problem<'a>, options: SolverOptions, n: usize) -> Self {
        let (lower, upper) = match problem.bounds() {
            Some(bounds) => bounds.iter().copied().unzip(),
            None => (vec![f64::NEG_INFINITY; n], vec![f64::INFINITY; n]),
        };
        Self {
            problem,
            options,
            lower,
            upper,
            evaluations: 0,
        }
    }

    fn run(mut self, x0: &[f64]) -> SolverResult {
        let n = x0.len();
        if self.lower.len() != n {
            return SolverResult::finish(
                x0.to_vec(),
                f64::NAN,
                ExitStatus::DimensionMismatch,
                0,
                0,
            );
        }

        let tol = self.options.tolerance;
        let m = self.problem.constraints().len();

        let mut x = x0.to_vec();
        self.clip(&mut x);
        let mut f = self.evaluate(&x);
        if !f.is_finite() {
            return self.finish(x, f, ExitStatus::NonFiniteObjective, 0);
        }
        let mut c = self.constraint_values(&x);
        let mut g = self.gradient(&x, f);
        if g.iter().any(|v| !v.is_finite()) {
            return self.finish(x, f, ExitStatus::NonFiniteObjective, 0);
        }
        let mut a = self.jacobian(&x, &c);
        let mut hessian = identity(n);
        let mut rho = vec![0.0; m];

        for iteration in 1..=self.options.max_iterations {
            let rows = self.subproblem_rows(&x, &c, &a);
            let QpSolution { x: d, multipliers } = match solve_qp(&hessian, &g, &rows) {
                Ok(sol) => sol,
                Err(QpError::Infeasible) => {
                    return self.finish(x, f, ExitStatus::IncompatibleConstraints, iteration);
                }
                Err(_) => {
                    // Restart the quasi-Newton model once before giving up.
                    debug!(iteration, "resetting Hessian approximation");
                    hessian = identity(n);
                    match solve_qp(&hessian, &g, &rows) {
                        Ok(sol) => sol,
                        Err(QpError::Infeasible) => {
                            return self.finish(
                                x,
                                f,
                                ExitStatus::IncompatibleConstraints,
                                iteration,
                            );
                        }
                        Err(_) => {
                            return self.finish(x, f, ExitStatus::SingularSubproblem, iteration);
                        }
                    }
                }
            };
            let lambda = &multipliers[..m];

            let violation = self.total_violation(&c);
            let kkt_gap = dot(&g, &d).abs()
                + lambda
                    .iter()
                    .zip(c.iter())
                    .map(|(l, v)| l.abs() * v.abs())
                    .sum::<f64>();
            trace!(iteration, f, violation, kkt_gap, step = norm(&d), "sqp iterate");
            if kkt_gap < tol && violation < tol {
                return self.finish(x, f, ExitStatus::Converged, iteration);
            }

            for (r, l) in rho.iter_mut().zip(lambda.iter()) {
                *r = l.abs().max(0.5 * (*r + l.abs()));
            }
            let merit0 = f + self.penalty(&rho, &c);
            let derivative = dot(&g, &d) - self.penalty(&rho, &c);
            if derivative >= 0.0 {
                return self.finish(x, f, ExitStatus::LineSearchFailure, iteration);
            }

            let mut alpha = 1.0;
            let mut line = 0;
            let (x_new, f_new, c_new) = loop {
                line += 1;
                let mut trial: Vec<f64> = x.iter().zip(d.iter()).map(|(xi, di)| xi + alpha * di).collect();
                self.clip(&mut trial);
                let f_trial = self.evaluate(&trial);
                let c_trial = self.constraint_values(&trial);
                let merit = if f_trial.is_finite() {
                    f_trial + self.penalty(&rho, &c_trial)
                } else {
                    f64::INFINITY
                };

                let actual = merit - merit0;
                let predicted = alpha * derivative;
                if actual <= ARMIJO * predicted || line >= MAX_LINE_SEARCH {
                    break (trial, f_trial, c_trial);
                }

                let factor = if actual.is_finite() {
                    predicted / (2.0 * (predicted - actual))
                } else {
                    0.1
                };
                alpha *= factor.clamp(0.1, 0.5);
            };
            trace!(iteration, alpha, line, "line search finished");

            if !f_new.is_finite() {
                return self.finish(x, f, ExitStatus::NonFiniteObjective, iteration);
            }

            let s: Vec<f64> = x_new.iter().zip(x.iter()).map(|(a, b)| a - b).collect();
            if ((f_new - f).abs() < tol || norm(&s) < tol) && self.total_violation(&c_new) < tol {
                return self.finish(x_new, f_new, ExitStatus::Converged, iteration);
            }

            let g_new = self.gradient(&x_new, f_new);
            if g_new.iter().any(|v| !v.is_finite()) {
                return self.finish(x_new, f_new, ExitStatus::NonFiniteObjective, iteration);
            }
            let a_new = self.jacobian(&x_new, &c_new);

            let y: Vec<f64> = lagrangian_gradient(&g_new, &a_new, lambda)
                .iter()
                .zip(lagrangian_gradient(&g, &a, lambda).iter())
                .map(|(a, b)| a - b)
                .collect();
            bfgs_update(&mut hessian, &s, &y);

            x = x_new;
            f = f_new;
            c = c_new;
            g = g_new;
            a = a_new;
        }

        let iterations = self.options.max_iterations;
        self.finish(x, f, ExitStatus::IterationLimit, iterations)
    }

    fn finish(&self, x: Vec<f64>, f: f64, status: ExitStatus, iterations: u32) -> SolverResult {
        debug!(
            ?status,
            iterations,
            evaluations = self.evaluations,
            objective = f,
            "sqp finished"
        );
        SolverResult::finish(x, f, status, iterations, self.evaluations)
    }

    fn evaluate(&mut self, x: &[f64]) -> f64 {
        self.evaluations += 1;
        self.problem.objective(x)
    }

    fn clip(&self, x: &mut [f64]) {
        for ((xi, lo), hi) in x.iter_mut().zip(self.lower.iter()).zip(self.upper.iter()) {
            *xi = xi.max(*lo).min(*hi);
        }
    }

    /// Forward differences, stepping backwards at an upper bound so the
    /// shifted point stays inside the box.
    fn gradient(&mut self, x: &[f64], f: f64) -> Vec<f64> {
        let h = self.options.gradient_step;
        let mut shifted = x.to_vec();
        let mut grad = Vec::with_capacity(x.len());
        for i in 0..x.len() {
            let original = shifted[i];
            let step = if original + h > self.upper[i] { -h } else { h };
            shifted[i] = original + step;
            let fi = self.evaluate(&shifted);
            shifted[i] = original;
            grad.push((fi - f) / step);
        }
        grad
    }

    fn constraint_values(&self, x: &[f64]) -> Vec<f64> {
        self.problem.constraints().iter().map(|con| con.value(x)).collect()
    }

    fn jacobian(&self, x: &[f64], values: &[f64]) -> Vec<Vec<f64>> {
        let h = self.options.gradient_step;
        self.problem
            .constraints()
            .iter()
            .zip(values.iter())
            .map(|(con, v)| con.gradient(x, *v, h))
            .collect()
    }

    fn total_violation(&self, values: &[f64]) -> f64 {
        self.problem
            .constraints()
            .iter()
            .zip(values.iter())
            .map(|(con, v)| violation_of(con.kind, *v))
            .sum()
    }

    fn penalty(&self, rho: &[f64], values: &[f64]) -> f64 {
        self.problem
            .constraints()
            .iter()
            .zip(values.iter())
            .zip(rho.iter())
            .map(|((con, v), r)| r * violation_of(con.kind, *v))
            .sum()
    }

    /// Linearized constraints plus the box, expressed in the step `d`.
    /// General constraints come first so multiplier indices line up.
    fn subproblem_rows(&self, x: &[f64], c: &[f64], a: &[Vec<f64>]) -> Vec<LinearConstraint> {
        let n = x.len();
        let mut rows = Vec::with_capacity(c.len() + 2 * n);

        for ((con, value), grad) in self.problem.constraints().iter().zip(c.iter()).zip(a.iter()) {
            rows.push(match con.kind {
                super::ConstraintKind::Equality => LinearConstraint::equality(grad.clone(), -value),
                super::ConstraintKind::Inequality => LinearConstraint::at_least(grad.clone(), -value),
            });
        }

        for i in 0..n {
            if self.lower[i].is_finite() {
                let mut e = vec![0.0; n];
                e[i] = 1.0;
                rows.push(LinearConstraint::at_least(e, self.lower[i] - x[i]));
            }
            if self.upper[i].is_finite() {
                let mut e = vec![0.0; n];
                e[i] = -1.0;
                rows.push(LinearConstraint::at_least(e, x[i] - self.upper[i]));
            }
        }

        rows
    }
}

/// ∇f − Σ λⱼ ∇cⱼ
fn lagrangian_gradient(g: &[f64], jacobian: &[Vec<f64>], lambda: &[f64]) -> Vec<f64> {
    let mut out = g.to_vec();
    for (row, l) in jacobian.iter().zip(lambda.iter()) {
        for (o, r) in out.iter_mut().zip(row.iter()) {
            *o -= l * r;
        }
    }
    out
}

/// Powell-damped BFGS update; keeps `b` positive definite.
fn bfgs_update(b: &mut [Vec<f64>], s: &[f64], y: &[f64]) {
    let bs = mat_vec_multiply(b, s);
    let sbs = dot(s, &bs);
    if !(sbs > 1e-16) {
        return;
    }

    let sy = dot(s, y);
    let theta = if sy >= 0.2 * sbs {
        1.0
    } else {
        0.8 * sbs / (sbs - sy)
    };
    let r: Vec<f64> = y
        .iter()
        .zip(bs.iter())
        .map(|(yi, bsi)| theta * yi + (1.0 - theta) * bsi)
        .collect();
    let sr = dot(s, &r);
    if !(sr > 1e-16) || r.iter().any(|v| !v.is_finite()) {
        return;
    }

    for i in 0..b.len() {
        for j in 0..b.len() {
            b[i][j] += r[i] * r[j] / sr - bs[i] * bs[j] / sbs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Constraint;

    fn solver() -> Sqp {
        Sqp::default()
    }

    #[test]
    fn test_textbook_inequality_problem() {
        // minimize (x0 - 1)² + (x1 - 2.5)² over three half-planes and x >= 0
        let problem = Problem::new(|x: &[f64]| (x[0] - 1.0).powi(2) + (x[1] - 2.5).powi(2))
            .with_bounds(vec![(0.0, f64::INFINITY), (0.0, f64::INFINITY)])
            .with_constraint(Constraint::inequality(|x: &[f64]| x[0] - 2.0 * x[1] + 2.0))
            .with_constraint(Constraint::inequality(|x: &[f64]| -x[0] - 2.0 * x[1] + 6.0))
            .with_constraint(Constraint::inequality(|x: &[f64]| -x[0] + 2.0 * x[1] + 2.0));

        let result = solver().minimize(&problem, &[2.0, 0.0]);
        assert!(result.success, "{}", result.message);
        assert_eq!(result.status, ExitStatus::Converged);
        assert!((result.x[0] - 1.4).abs() < 1e-4, "x={:?}", result.x);
        assert!((result.x[1] - 1.7).abs() < 1e-4, "x={:?}", result.x);
        assert!(result.iterations > 0);
        assert!(result.function_evaluations > result.iterations);
    }

    #[test]
    fn test_equality_constrained_from_infeasible_start() {
        let problem = Problem::new(|x: &[f64]| x[0] * x[0] + x[1] * x[1])
            .with_constraint(
                Constraint::equality(|x: &[f64]| x[0] + x[1] - 1.0).with_jacobian(|x| vec![1.0; x.len()]),
            );

        let result = solver().minimize(&problem, &[0.0, 0.0]);
        assert!(result.success, "{}", result.message);
        assert!((result.x[0] - 0.5).abs() < 1e-5);
        assert!((result.x[1] - 0.5).abs() < 1e-5);
        assert!((result.fun - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_bound_is_respected() {
        let problem = Problem::new(|x: &[f64]| (x[0] - 3.0).powi(2)).with_bounds(vec![(0.0, 2.0)]);
        let result = solver().minimize(&problem, &[0.5]);
        assert!(result.success, "{}", result.message);
        assert!((result.x[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_starting_point_is_clipped_into_bounds() {
        let problem = Problem::new(|x: &[f64]| x[0] * x[0]).with_bounds(vec![(1.0, 4.0)]);
        let result = solver().minimize(&problem, &[10.0]);
        assert!(result.success, "{}", result.message);
        assert!((result.x[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_incompatible_constraints_reported() {
        let problem = Problem::new(|x: &[f64]| x[0] * x[0] + x[1] * x[1])
            .with_bounds(vec![(0.0, 0.3), (0.0, 0.3)])
            .with_constraint(Constraint::equality(|x: &[f64]| x[0] + x[1] - 1.0));

        let result = solver().minimize(&problem, &[0.2, 0.2]);
        assert!(!result.success);
        assert_eq!(result.status, ExitStatus::IncompatibleConstraints);
        assert_eq!(result.message, "Inequality constraints incompatible");
    }

    #[test]
    fn test_non_finite_objective_reported() {
        let problem = Problem::new(|_: &[f64]| f64::NAN);
        let result = solver().minimize(&problem, &[1.0]);
        assert!(!result.success);
        assert_eq!(result.status, ExitStatus::NonFiniteObjective);
        assert_eq!(result.function_evaluations, 1);
    }

    #[test]
    fn test_iteration_limit_reported() {
        let rosenbrock = |x: &[f64]| 100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2);
        let problem = Problem::new(rosenbrock);
        let options = SolverOptions {
            max_iterations: 2,
            ..SolverOptions::default()
        };
        let result = Sqp::new(options).minimize(&problem, &[-1.2, 1.0]);
        assert!(!result.success);
        assert_eq!(result.status, ExitStatus::IterationLimit);
        assert_eq!(result.iterations, 2);
    }

    #[test]
    fn test_bound_dimension_mismatch() {
        let problem = Problem::new(|x: &[f64]| x[0]).with_bounds(vec![(0.0, 1.0)]);
        let result = solver().minimize(&problem, &[0.5, 0.5]);
        assert_eq!(result.status, ExitStatus::DimensionMismatch);
    }

    #[test]
    fn test_bfgs_update_keeps_secant_condition() {
        let mut b = identity(2);
        let s = [0.5, 0.25];
        let y = [1.0, 0.5];
        bfgs_update(&mut b, &s, &y);
        let bs = mat_vec_multiply(&b, &s);
        assert!((bs[0] - y[0]).abs() < 1e-12);
        assert!((bs[1] - y[1]).abs() < 1e-12);
    }
}
