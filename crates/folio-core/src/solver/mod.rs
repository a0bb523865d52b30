//! General-purpose constrained nonlinear minimization.
//!
//! [`Sqp`] is a sequential quadratic programming method in the SLSQP family
//! (Kraft, 1988): forward-difference gradients, a damped BFGS approximation
//! of the Lagrangian Hessian, an active-set quadratic subproblem and an L1
//! merit line search. It handles box bounds plus equality (`c(x) = 0`) and
//! inequality (`c(x) >= 0`) constraints.
//!
//! Callers depend on the [`ConstrainedMinimizer`] trait so the portfolio
//! driver can be exercised against other implementations.

mod qp;
mod sqp;

use serde::{Deserialize, Serialize};

pub use sqp::Sqp;

/// Objective or constraint function over the decision vector.
pub type ScalarFn<'a> = Box<dyn Fn(&[f64]) -> f64 + 'a>;

/// Analytic gradient of a constraint function.
pub type GradientFn<'a> = Box<dyn Fn(&[f64]) -> Vec<f64> + 'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// `c(x) = 0`
    Equality,
    /// `c(x) >= 0`
    Inequality,
}

pub struct Constraint<'a> {
    pub kind: ConstraintKind,
    fun: ScalarFn<'a>,
    jac: Option<GradientFn<'a>>,
}

impl<'a> Constraint<'a> {
    pub fn equality(fun: impl Fn(&[f64]) -> f64 + 'a) -> Self {
        Self {
            kind: ConstraintKind::Equality,
            fun: Box::new(fun),
            jac: None,
        }
    }

    pub fn inequality(fun: impl Fn(&[f64]) -> f64 + 'a) -> Self {
        Self {
            kind: ConstraintKind::Inequality,
            fun: Box::new(fun),
            jac: None,
        }
    }

    /// Supply the exact gradient instead of finite differences.
    pub fn with_jacobian(mut self, jac: impl Fn(&[f64]) -> Vec<f64> + 'a) -> Self {
        self.jac = Some(Box::new(jac));
        self
    }

    pub fn value(&self, x: &[f64]) -> f64 {
        (self.fun)(x)
    }

    /// Violation measure used by the merit function and convergence tests.
    pub fn violation(&self, x: &[f64]) -> f64 {
        violation_of(self.kind, self.value(x))
    }

    fn gradient(&self, x: &[f64], value: f64, step: f64) -> Vec<f64> {
        if let Some(jac) = &self.jac {
            return jac(x);
        }
        let mut shifted = x.to_vec();
        (0..x.len())
            .map(|i| {
                let original = shifted[i];
                shifted[i] = original + step;
                let d = ((self.fun)(&shifted) - value) / step;
                shifted[i] = original;
                d
            })
            .collect()
    }
}

pub(crate) fn violation_of(kind: ConstraintKind, value: f64) -> f64 {
    match kind {
        ConstraintKind::Equality => value.abs(),
        ConstraintKind::Inequality => (-value).max(0.0),
    }
}

/// A minimization problem: objective, optional box bounds, constraints.
pub struct Problem<'a> {
    objective: ScalarFn<'a>,
    bounds: Option<Vec<(f64, f64)>>,
    constraints: Vec<Constraint<'a>>,
}

impl<'a> Problem<'a> {
    pub fn new(objective: impl Fn(&[f64]) -> f64 + 'a) -> Self {
        Self {
            objective: Box::new(objective),
            bounds: None,
            constraints: Vec::new(),
        }
    }

    /// Per-variable `(lower, upper)` bounds; infinite values are allowed.
    pub fn with_bounds(mut self, bounds: Vec<(f64, f64)>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint<'a>) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn objective(&self, x: &[f64]) -> f64 {
        (self.objective)(x)
    }

    pub fn bounds(&self) -> Option<&[(f64, f64)]> {
        self.bounds.as_deref()
    }

    pub fn constraints(&self) -> &[Constraint<'a>] {
        &self.constraints
    }
}

/// Tuning knobs shared by every iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Major iteration cap.
    pub max_iterations: u32,
    /// Accuracy for the objective change, step length and constraint
    /// violation convergence tests.
    pub tolerance: f64,
    /// Absolute forward-difference step.
    pub gradient_step: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-6,
            gradient_step: 1.490_116_119_384_765_6e-8,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Converged,
    IterationLimit,
    IncompatibleConstraints,
    SingularSubproblem,
    LineSearchFailure,
    NonFiniteObjective,
    DimensionMismatch,
}

impl ExitStatus {
    pub fn is_success(self) -> bool {
        matches!(self, ExitStatus::Converged)
    }

    pub fn message(self) -> &'static str {
        match self {
            ExitStatus::Converged => "Optimization terminated successfully",
            ExitStatus::IterationLimit => "Iteration limit reached",
            ExitStatus::IncompatibleConstraints => "Inequality constraints incompatible",
            ExitStatus::SingularSubproblem => "Singular matrix in quadratic subproblem",
            ExitStatus::LineSearchFailure => "Positive directional derivative for linesearch",
            ExitStatus::NonFiniteObjective => "Objective function returned a non-finite value",
            ExitStatus::DimensionMismatch => "Bounds do not match the dimension of the starting point",
        }
    }
}

/// Outcome of one solver run. Always carries the last iterate, even on
/// failure; interpreting a failed run is the caller's decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverResult {
    pub x: Vec<f64>,
    pub fun: f64,
    pub success: bool,
    pub status: ExitStatus,
    pub message: String,
    pub iterations: u32,
    pub function_evaluations: u32,
}

impl SolverResult {
    pub(crate) fn finish(
        x: Vec<f64>,
        fun: f64,
        status: ExitStatus,
        iterations: u32,
        function_evaluations: u32,
    ) -> Self {
        Self {
            x,
            fun,
            success: status.is_success(),
            status,
            message: status.message().to_string(),
            iterations,
            function_evaluations,
        }
    }
}

/// A constrained nonlinear minimizer.
pub trait ConstrainedMinimizer {
    fn minimize(&self, problem: &Problem<'_>, x0: &[f64]) -> SolverResult;
}
