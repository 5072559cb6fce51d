//! The ordered method chain: structural method for the classified kind,
//! then the generic analytical solver, then numerical integration.
//!
//! Every method runs on the blocking pool under a wall-clock timeout. A
//! timed-out or failed analytical method hands over to the next one; an
//! internal consistency failure ends the chain.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::algebra::dsolve::dsolve;
use crate::algebra::linear::coefficient_of;
use crate::algebra::particular::{
  euler_cauchy_particular, undetermined_coefficients, variation_of_parameters,
};
use crate::algebra::AlgebraError;
use crate::algebra::simplify::simplify;
use crate::integrator::IntegratorOptions;
use crate::ode::auxiliary::{
  build_auxiliary, indeterminate, CharacteristicPolynomial,
};
use crate::ode::classify::{classify, Classification, OdeKind};
use crate::ode::euler_cauchy::characteristic_polynomial;
use crate::ode::general_solution::{
  construct, fit_constants, ArgumentKind, GeneralSolution,
};
use crate::ode::numerical::{
  integrate_system, sample_expression, to_first_order_system, Domain,
  SampledTrajectory,
};
use crate::ode::roots::{classify_polynomial_roots, RootClassification};
use crate::ode::{
  check_conditions, requires_positive_domain, InitialCondition, Ode,
};
use crate::syntax::{expr_to_latex, Expr};
use crate::SolveError;

#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
  pub analytical_timeout: Duration,
  pub numerical_timeout: Duration,
  /// Points in a sampled trajectory
  pub samples: usize,
  pub default_domain: Domain,
  /// Used when the solution involves `ln x` or fractional powers of `x`
  pub positive_domain: Domain,
  pub integrator: IntegratorOptions,
}

impl Default for SolverConfig {
  fn default() -> Self {
    SolverConfig {
      analytical_timeout: Duration::from_secs(10),
      numerical_timeout: Duration::from_secs(10),
      samples: 500,
      default_domain: Domain::new(-10.0, 10.0),
      positive_domain: Domain::new(0.1, 10.0),
      integrator: IntegratorOptions::default(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
  AnalyticalHigh,
  Numerical,
  Failed,
}

impl fmt::Display for Confidence {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      Confidence::AnalyticalHigh => "analytical (high)",
      Confidence::Numerical => "numerical",
      Confidence::Failed => "failed",
    };
    write!(f, "{}", text)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
  ConstantCoefficient,
  EulerCauchy,
  GenericAnalytical,
  Numerical,
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      Method::ConstantCoefficient => "constant coefficient",
      Method::EulerCauchy => "Euler-Cauchy",
      Method::GenericAnalytical => "generic analytical",
      Method::Numerical => "numerical",
    };
    write!(f, "{}", text)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodAttempt {
  pub method: Method,
  pub succeeded: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
}

/// Why no solution was produced. `method` is the last method tried, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveFailure {
  pub method: Option<Method>,
  pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Solution {
  /// `y = expression`. `samples` holds the solution evaluated over the
  /// plotting domain, with free constants set to `C1 = 1`, others 0.
  Analytical {
    expression: Expr,
    samples: Option<SampledTrajectory>,
  },
  Numerical { trajectory: SampledTrajectory },
}

impl Solution {
  pub fn expression(&self) -> Option<&Expr> {
    match self {
      Solution::Analytical { expression, .. } => Some(expression),
      Solution::Numerical { .. } => None,
    }
  }
}

/// Everything the solver learned about one equation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveReport {
  pub equation: Expr,
  pub independent: String,
  pub dependent: String,
  pub classification: Classification,
  pub characteristic: Option<CharacteristicPolynomial>,
  pub roots: Option<RootClassification>,
  pub general: Option<GeneralSolution>,
  pub solution: Option<Solution>,
  pub confidence: Confidence,
  pub method: Option<Method>,
  pub attempts: Vec<MethodAttempt>,
  pub failure: Option<SolveFailure>,
}

impl SolveReport {
  fn new(ode: &Ode, classification: Classification) -> Self {
    SolveReport {
      equation: ode.expression().clone(),
      independent: ode.independent().to_string(),
      dependent: ode.dependent().to_string(),
      classification,
      characteristic: None,
      roots: None,
      general: None,
      solution: None,
      confidence: Confidence::Failed,
      method: None,
      attempts: Vec::new(),
      failure: None,
    }
  }

  pub fn expression(&self) -> Option<&Expr> {
    self.solution.as_ref().and_then(Solution::expression)
  }

  /// `y = ...`, a description of the trajectory, or the failure reason.
  pub fn solution_text(&self) -> String {
    match (&self.solution, &self.failure) {
      (Some(Solution::Analytical { expression, .. }), _) => {
        format!("{} = {}", self.dependent, expression)
      }
      (Some(Solution::Numerical { trajectory }), _) => format!(
        "numerical solution on [{}, {}] ({} points)",
        trajectory.domain.start,
        trajectory.domain.end,
        trajectory.points.len()
      ),
      (None, Some(failure)) => match failure.method {
        Some(method) => format!("no solution ({}): {}", method, failure.reason),
        None => format!("no solution: {}", failure.reason),
      },
      (None, None) => "no solution".to_string(),
    }
  }

  pub fn to_latex(&self) -> String {
    match self.expression() {
      Some(expression) => {
        format!("{} = {}", self.dependent, expr_to_latex(expression))
      }
      None => format!("\\text{{{}}}", self.solution_text()),
    }
  }

  fn record(&mut self, method: Method, result: Result<(), &SolveError>) {
    self.attempts.push(MethodAttempt {
      method,
      succeeded: result.is_ok(),
      reason: result.err().map(|e| e.to_string()),
    });
  }

  fn fail(mut self, method: Option<Method>, error: &dyn fmt::Display) -> Self {
    warn!(?method, %error, "no solution");
    self.confidence = Confidence::Failed;
    self.failure = Some(SolveFailure {
      method,
      reason: error.to_string(),
    });
    self
  }
}

impl fmt::Display for SolveReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "equation: {} = 0", self.equation)?;
    writeln!(f, "classification: {}", self.classification)?;
    if let Some(characteristic) = &self.characteristic {
      writeln!(f, "characteristic polynomial: {}", characteristic)?;
    }
    if let Some(roots) = &self.roots {
      let listed: Vec<String> =
        roots.roots.iter().map(|r| r.to_string()).collect();
      writeln!(f, "roots: {}", listed.join("; "))?;
    }
    if let Some(method) = self.method {
      writeln!(f, "method: {}", method)?;
    }
    writeln!(f, "solution: {}", self.solution_text())?;
    write!(f, "confidence: {}", self.confidence)
  }
}

/// What a structural method established, kept even if a later step fails.
#[derive(Debug, Default)]
struct Findings {
  characteristic: Option<CharacteristicPolynomial>,
  roots: Option<RootClassification>,
  general: Option<GeneralSolution>,
}

#[derive(Debug, Clone, Default)]
pub struct Solver {
  config: SolverConfig,
}

impl Solver {
  pub fn new(config: SolverConfig) -> Self {
    Solver { config }
  }

  pub fn config(&self) -> &SolverConfig {
    &self.config
  }

  /// Solves `ode`, fitting `conditions` when given. Never fails: problems
  /// end up in the report's `failure`.
  pub async fn solve(
    &self,
    ode: Ode,
    conditions: Vec<InitialCondition>,
  ) -> SolveReport {
    let classification = classify(&ode);
    let mut report = SolveReport::new(&ode, classification.clone());
    if let Err(error) = check_conditions(&ode, &conditions) {
      return report.fail(None, &error);
    }

    match structural_method(&classification) {
      Ok(method) => {
        let task_ode = ode.clone();
        let task_conditions = conditions.clone();
        let kind = classification.kind.clone();
        let deadline = Deadline::after(method, self.config.analytical_timeout);
        let outcome = run_blocking(
          self.config.analytical_timeout,
          deadline.error(),
          move || {
            let mut findings = Findings::default();
            let result = structural(
              &task_ode,
              &kind,
              &task_conditions,
              deadline,
              &mut findings,
            );
            (findings, result)
          },
        )
        .await;
        let result = match outcome {
          Ok((findings, result)) => {
            report.characteristic = findings.characteristic;
            report.roots = findings.roots;
            report.general = findings.general;
            result
          }
          Err(error) => Err(error),
        };
        match result {
          Ok(expression) => {
            report.record(method, Ok(()));
            return self.analytical(report, method, expression, &ode);
          }
          Err(error) => {
            report.record(method, Err(&error));
            if let SolveError::InternalConsistencyFailure(_) = error {
              return report.fail(Some(method), &error);
            }
            warn!(%method, %error, "falling back to generic solver");
          }
        }
      }
      Err(reason) => debug!(%reason, "no structural method"),
    }

    let method = Method::GenericAnalytical;
    let task_ode = ode.clone();
    let task_conditions = conditions.clone();
    let deadline = Deadline::after(method, self.config.analytical_timeout);
    let result = run_blocking(
      self.config.analytical_timeout,
      deadline.error(),
      move || generic(&task_ode, &task_conditions, deadline),
    )
    .await
    .and_then(|result| result);
    match result {
      Ok(expression) => {
        report.record(method, Ok(()));
        return self.analytical(report, method, expression, &ode);
      }
      Err(error) => {
        report.record(method, Err(&error));
        if let SolveError::InternalConsistencyFailure(_) = error {
          return report.fail(Some(method), &error);
        }
        warn!(%error, "falling back to numerical integration");
      }
    }

    let method = Method::Numerical;
    let result = self.numerical(&ode, &conditions, &classification).await;
    match result {
      Ok(trajectory) => {
        report.record(method, Ok(()));
        info!(points = trajectory.points.len(), "solved numerically");
        report.method = Some(method);
        report.confidence = Confidence::Numerical;
        report.solution = Some(Solution::Numerical { trajectory });
        report
      }
      Err(error) => {
        report.record(method, Err(&error));
        report.fail(Some(method), &error)
      }
    }
  }

  /// Runs [`Solver::solve`] on a fresh current-thread runtime. Must not be
  /// called from inside an async context. Returns when the report is ready;
  /// timed-out tasks are left to finish on their own.
  pub fn solve_blocking(
    &self,
    ode: Ode,
    conditions: Vec<InitialCondition>,
  ) -> SolveReport {
    let runtime = tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build();
    match runtime {
      Ok(runtime) => {
        let report = runtime.block_on(self.solve(ode, conditions));
        runtime.shutdown_background();
        report
      }
      Err(error) => {
        let classification = classify(&ode);
        SolveReport::new(&ode, classification).fail(
          None,
          &SolveError::InternalConsistencyFailure(format!(
            "cannot start runtime: {}",
            error
          )),
        )
      }
    }
  }

  fn analytical(
    &self,
    mut report: SolveReport,
    method: Method,
    expression: Expr,
    ode: &Ode,
  ) -> SolveReport {
    info!(%method, solution = %expression, "solved analytically");
    let positive = requires_positive_domain(&expression, ode.independent())
      || matches!(report.classification.kind, OdeKind::EulerCauchy { .. });
    let domain = if positive {
      self.config.positive_domain
    } else {
      self.config.default_domain
    };
    let samples = sample_expression(
      &plotting_instance(&expression),
      ode.independent(),
      domain,
      self.config.samples,
    )
    .map_err(|error| debug!(%error, "solution not sampled"))
    .ok();
    report.method = Some(method);
    report.confidence = Confidence::AnalyticalHigh;
    report.solution = Some(Solution::Analytical {
      expression,
      samples,
    });
    report
  }

  async fn numerical(
    &self,
    ode: &Ode,
    conditions: &[InitialCondition],
    classification: &Classification,
  ) -> Result<SampledTrajectory, SolveError> {
    let system = to_first_order_system(ode, ode.order())?;
    let positive = system.requires_positive_domain()
      || requires_positive_domain(ode.expression(), ode.independent())
      || matches!(classification.kind, OdeKind::EulerCauchy { .. });
    let domain = if positive {
      self.config.positive_domain
    } else {
      self.config.default_domain
    };
    let conditions = conditions.to_vec();
    let samples = self.config.samples;
    let options = IntegratorOptions {
      deadline: Instant::now().checked_add(self.config.numerical_timeout),
      ..self.config.integrator
    };
    let timeout = SolveError::IntegrationFailure {
      domain: (domain.start, domain.end),
      reason: format!("timed out after {:?}", self.config.numerical_timeout),
    };
    run_blocking(self.config.numerical_timeout, timeout, move || {
      integrate_system(&system, &conditions, domain, samples, &options)
    })
    .await
    .and_then(|result| result)
  }
}

/// The structural method for `classification`, if it has one.
fn structural_method(
  classification: &Classification,
) -> Result<Method, SolveError> {
  match classification.kind {
    OdeKind::ConstantCoefficient { .. } => Ok(Method::ConstantCoefficient),
    OdeKind::EulerCauchy { .. } => Ok(Method::EulerCauchy),
    OdeKind::VariableCoefficient | OdeKind::Nonlinear { .. } => {
      Err(SolveError::ClassificationIndeterminate(classification.to_string()))
    }
  }
}

/// Wall-clock limit of an analytical method. The blocking task checks it
/// between stages so that it stops soon after the caller gave up on it.
#[derive(Debug, Clone, Copy)]
struct Deadline {
  at: Option<Instant>,
  method: Method,
  timeout: Duration,
}

impl Deadline {
  fn after(method: Method, timeout: Duration) -> Self {
    Deadline {
      at: Instant::now().checked_add(timeout),
      method,
      timeout,
    }
  }

  fn error(&self) -> SolveError {
    SolveError::AlgebraFailure(format!(
      "{} method timed out after {:?}",
      self.method, self.timeout
    ))
  }

  fn check(&self) -> Result<(), SolveError> {
    if self.at.is_some_and(|at| Instant::now() >= at) {
      Err(self.error())
    } else {
      Ok(())
    }
  }
}

/// Runs `task` on the blocking pool. A panic in the task is a defect.
async fn run_blocking<T, F>(
  timeout: Duration,
  on_timeout: SolveError,
  task: F,
) -> Result<T, SolveError>
where
  F: FnOnce() -> T + Send + 'static,
  T: Send + 'static,
{
  match tokio::time::timeout(timeout, tokio::task::spawn_blocking(task)).await
  {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(join)) => Err(SolveError::InternalConsistencyFailure(format!(
      "solver task failed: {}",
      join
    ))),
    Err(_) => {
      warn!(?timeout, "method timed out");
      Err(on_timeout)
    }
  }
}

/// Auxiliary or Euler–Cauchy path: characteristic polynomial, roots,
/// general solution, particular solution, initial conditions.
fn structural(
  ode: &Ode,
  kind: &OdeKind,
  conditions: &[InitialCondition],
  deadline: Deadline,
  findings: &mut Findings,
) -> Result<Expr, SolveError> {
  let x = ode.independent();
  let (characteristic, argument) = match kind {
    OdeKind::ConstantCoefficient { .. } => {
      (build_auxiliary(ode, ode.order())?, ArgumentKind::Linear)
    }
    OdeKind::EulerCauchy { coefficients } => (
      characteristic_polynomial(coefficients, &indeterminate(ode))?,
      ArgumentKind::Log,
    ),
    other => {
      return Err(SolveError::InternalConsistencyFailure(format!(
        "no structural method for {:?}",
        other
      )));
    }
  };
  if characteristic.degree() != ode.order() {
    return Err(SolveError::InternalConsistencyFailure(format!(
      "characteristic polynomial {} has degree {} for order {}",
      characteristic,
      characteristic.degree(),
      ode.order()
    )));
  }
  debug!(%characteristic, "characteristic polynomial");
  findings.characteristic = Some(characteristic.clone());

  deadline.check()?;
  let roots = classify_polynomial_roots(&characteristic)?;
  findings.roots = Some(roots.clone());

  deadline.check()?;
  let mut general = construct(&roots, argument, x);
  if !ode.is_homogeneous() {
    let all_roots = roots.expanded();
    let particular = match argument {
      ArgumentKind::Linear => undetermined_coefficients(
        characteristic.coefficients(),
        &all_roots,
        ode.forcing(),
        x,
      ),
      ArgumentKind::Log => euler_cauchy_particular(
        characteristic.coefficients(),
        &all_roots,
        ode.forcing(),
        x,
      ),
    };
    let particular = match particular {
      Err(AlgebraError::Unsupported(reason)) => {
        debug!(%reason, "trying variation of parameters");
        deadline.check()?;
        let top = Expr::derivative(ode.dependent(), ode.order());
        let leading = coefficient_of(ode.homogeneous(), &top);
        variation_of_parameters(&general.basis(), &leading, ode.forcing(), x)?
      }
      other => other?,
    };
    debug!(%particular, "particular solution");
    general = general.with_particular(particular);
  }
  findings.general = Some(general.clone());

  deadline.check()?;
  fit_constants(&general.to_expr(), &general.constants, conditions, x)
}

/// First-order closed forms with one constant `C1`.
fn generic(
  ode: &Ode,
  conditions: &[InitialCondition],
  deadline: Deadline,
) -> Result<Expr, SolveError> {
  let expression =
    dsolve(ode.expression(), ode.independent(), ode.dependent())?;
  deadline.check()?;
  fit_constants(
    &expression,
    &["C1".to_string()],
    conditions,
    ode.independent(),
  )
}

/// `C1 = 1` and every other `C<n>` = 0.
fn plotting_instance(expression: &Expr) -> Expr {
  let mut instance = expression.clone();
  for name in expression.free_symbols() {
    let is_constant = name.strip_prefix('C').map_or(false, |n| {
      !n.is_empty() && n.chars().all(|c| c.is_ascii_digit())
    });
    if is_constant {
      let value = if name == "C1" { Expr::one() } else { Expr::zero() };
      instance = instance.substitute_variable(&name, &value);
    }
  }
  simplify(&instance)
}
