//! Reduction of an nth-order equation to a first-order system, numerical
//! integration of that system and sampling of closed-form solutions.

use serde::Serialize;
use tracing::{debug, warn};

use crate::algebra::linear::split_linear;
use crate::algebra::numeric::{evaluate, to_f64, Scope};
use crate::algebra::simplify::simplify;
use crate::algebra::AlgebraError;
use crate::integrator::{
  integrate_partially, IntegrationError, IntegratorOptions,
};
use crate::ode::{requires_positive_domain, InitialCondition, Ode};
use crate::syntax::Expr;
use crate::SolveError;

/// `z_1 = y, ..., z_n = y^(n-1)` with `z_k' = z_(k+1)` and
/// `z_n' = highest(x, z_1, ..., z_n)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstOrderSystem {
  highest: Expr,
  order: usize,
  independent: String,
  dependent: String,
}

impl FirstOrderSystem {
  /// Number of state components.
  pub fn order(&self) -> usize {
    self.order
  }

  /// `y^(n)` as a function of `x` and the lower derivatives.
  pub fn highest(&self) -> &Expr {
    &self.highest
  }

  /// The system function. Evaluation problems give NaN components, which
  /// the integrator rejects.
  pub fn derivatives(&self, x: f64, state: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(self.order);
    out.extend_from_slice(&state[1.min(state.len())..]);
    let scope =
      Scope::at(&self.independent, x).with_state(&self.dependent, state);
    out.push(evaluate(&self.highest, &scope).unwrap_or(f64::NAN));
    out
  }

  pub fn requires_positive_domain(&self) -> bool {
    requires_positive_domain(&self.highest, &self.independent)
  }
}

/// Solves the equation for its highest derivative.
///
/// Fails with `AlgebraFailure` when `y^(n)` cannot be isolated or when the
/// equation has free parameters that cannot be evaluated.
pub fn to_first_order_system(
  ode: &Ode,
  order: usize,
) -> Result<FirstOrderSystem, SolveError> {
  if order != ode.order() || order == 0 {
    return Err(SolveError::InternalConsistencyFailure(format!(
      "first-order system of size {} requested for an equation of order {}",
      order,
      ode.order()
    )));
  }
  let top = Expr::derivative(ode.dependent(), order);
  let isolate_error = |reason: String| {
    SolveError::AlgebraFailure(format!("cannot isolate {}: {}", top, reason))
  };
  let (coefficients, rest) = split_linear(ode.expression(), &[top.clone()])
    .map_err(|err| isolate_error(err.to_string()))?;
  let coefficient = &coefficients[0];
  if coefficient.is_zero() {
    return Err(isolate_error("zero coefficient".to_string()));
  }
  let highest = simplify(&Expr::neg(Expr::div(rest, coefficient.clone())));

  let parameters: Vec<String> = highest
    .free_symbols()
    .into_iter()
    .filter(|s| s != ode.independent())
    .collect();
  if !parameters.is_empty() {
    return Err(SolveError::AlgebraFailure(format!(
      "free parameters {} cannot be integrated numerically",
      parameters.join(", ")
    )));
  }
  debug!(%top, %highest, "isolated highest derivative");
  Ok(FirstOrderSystem {
    highest,
    order,
    independent: ode.independent().to_string(),
    dependent: ode.dependent().to_string(),
  })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Domain {
  pub start: f64,
  pub end: f64,
}

impl Domain {
  pub fn new(start: f64, end: f64) -> Self {
    Domain { start, end }
  }

  /// `samples` evenly spaced points including both ends.
  pub fn linspace(&self, samples: usize) -> Vec<f64> {
    match samples {
      0 => Vec::new(),
      1 => vec![self.start],
      n => {
        let step = (self.end - self.start) / (n - 1) as f64;
        (0..n)
          .map(|i| match i {
            i if i == n - 1 => self.end,
            i => self.start + step * i as f64,
          })
          .collect()
      }
    }
  }

  pub fn contains(&self, x: f64) -> bool {
    self.start <= x && x <= self.end
  }

  fn bounds(&self) -> (f64, f64) {
    (self.start, self.end)
  }
}

/// Sampled `(x, y)` pairs. Points with non-finite values are dropped and
/// counted in `masked`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampledTrajectory {
  pub domain: Domain,
  pub points: Vec<(f64, f64)>,
  pub masked: usize,
}

impl SampledTrajectory {
  fn from_values(domain: Domain, xs: &[f64], ys: &[f64]) -> Self {
    let mut points = Vec::with_capacity(xs.len());
    let mut masked = 0;
    for (&x, &y) in xs.iter().zip(ys) {
      if y.is_finite() {
        points.push((x, y));
      } else {
        masked += 1;
      }
    }
    SampledTrajectory {
      domain,
      points,
      masked,
    }
  }
}

/// Integrates `system` over `domain` from the initial point, in both
/// directions, and samples `y` at `samples` points.
///
/// A singularity stops the integration in that direction and the samples
/// beyond it are masked. Initial conditions must share one point. Without
/// conditions the system starts at 0 (or at the start of a domain that
/// excludes 0) with `y = 1` and all derivatives 0.
pub fn integrate_system(
  system: &FirstOrderSystem,
  conditions: &[InitialCondition],
  domain: Domain,
  samples: usize,
  options: &IntegratorOptions,
) -> Result<SampledTrajectory, SolveError> {
  let failure = |reason: String| SolveError::IntegrationFailure {
    domain: domain.bounds(),
    reason,
  };

  let mut state = vec![0.0; system.order()];
  state[0] = 1.0;
  let mut x0 = if domain.contains(0.0) { 0.0 } else { domain.start };
  if let Some(first) = conditions.first() {
    x0 = to_f64(&first.point).filter(|p| p.is_finite()).ok_or_else(|| {
      failure(format!("initial point {} is not numeric", first.point))
    })?;
  }
  for condition in conditions {
    if to_f64(&condition.point) != Some(x0) {
      return Err(failure(
        "initial conditions must all be given at one point".to_string(),
      ));
    }
    if condition.order >= system.order() {
      return Err(failure(format!(
        "condition on derivative {} for an equation of order {}",
        condition.order,
        system.order()
      )));
    }
    state[condition.order] = to_f64(&condition.value)
      .filter(|v| v.is_finite())
      .ok_or_else(|| {
        failure(format!("initial value {} is not numeric", condition.value))
      })?;
  }

  let xs = domain.linspace(samples);
  let backward: Vec<f64> =
    xs.iter().rev().copied().filter(|&x| x < x0).collect();
  let forward: Vec<f64> = xs.iter().copied().filter(|&x| x >= x0).collect();
  let f = |x: f64, z: &[f64]| system.derivatives(x, z);

  let before = integrate_partially(f, x0, &state, &backward, options);
  let after = integrate_partially(f, x0, &state, &forward, options);
  let mut stopped = None;
  for error in [before.stopped, after.stopped].into_iter().flatten() {
    match error {
      IntegrationError::StepSizeTooSmall { .. }
      | IntegrationError::MaxStepsExceeded { .. } => {
        warn!(%error, "integration stopped early, remaining points masked");
        if stopped.is_none() {
          stopped = Some(error);
        }
      }
      fatal => return Err(failure(fatal.to_string())),
    }
  }

  // unreached points are NaN and get masked
  let mut values = vec![f64::NAN; backward.len() - before.states.len()];
  values.extend(before.states.iter().rev().map(|z| z[0]));
  values.extend(after.states.iter().map(|z| z[0]));
  values.resize(xs.len(), f64::NAN);

  let trajectory = SampledTrajectory::from_values(domain, &xs, &values);
  if trajectory.points.is_empty() {
    let reason = stopped.map_or_else(
      || "no finite sample".to_string(),
      |error| error.to_string(),
    );
    return Err(failure(reason));
  }
  debug!(
    points = trajectory.points.len(),
    masked = trajectory.masked,
    x0,
    "integrated"
  );
  Ok(trajectory)
}

/// Evaluates a closed-form `expr` at `samples` points of `domain`.
pub fn sample_expression(
  expr: &Expr,
  independent: &str,
  domain: Domain,
  samples: usize,
) -> Result<SampledTrajectory, AlgebraError> {
  let xs = domain.linspace(samples);
  let values = xs
    .iter()
    .map(|&x| evaluate(expr, &Scope::at(independent, x)))
    .collect::<Result<Vec<f64>, _>>()?;
  Ok(SampledTrajectory::from_values(domain, &xs, &values))
}
