//! Assembly of closed-form general solutions from classified roots, and
//! fitting of their constants to initial conditions.

use serde::Serialize;
use tracing::debug;

use crate::algebra::calculus::nth_derivative;
use crate::algebra::linear::{
  is_zero_expr, solve_for, solve_linear_system, split_linear, terms,
};
use crate::algebra::numeric::{evaluate, to_f64, Scope};
use crate::algebra::simplify::{simplify, simplify_times};
use crate::algebra::AlgebraError;
use crate::ode::roots::{ClassifiedRoot, RootClassification};
use crate::ode::{InitialCondition, Ode};
use crate::syntax::Expr;
use crate::SolveError;

/// What the characteristic roots are exponents of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgumentKind {
  /// `e^(r x)`, constant coefficients
  Linear,
  /// `x^r = e^(r ln x)`, Euler–Cauchy
  Log,
}

/// The part of a general solution contributed by one classified root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolutionTerm {
  pub expr: Expr,
  pub root: ClassifiedRoot,
  pub constants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralSolution {
  pub terms: Vec<SolutionTerm>,
  pub particular: Option<Expr>,
  /// `C1, C2, ...` in the order they were assigned
  pub constants: Vec<String>,
}

impl GeneralSolution {
  pub fn with_particular(mut self, particular: Expr) -> Self {
    self.particular = if particular.is_zero() {
      None
    } else {
      Some(particular)
    };
    self
  }

  /// One homogeneous solution per constant, with that constant set to 1 and
  /// the others to 0.
  pub fn basis(&self) -> Vec<Expr> {
    let homogeneous = GeneralSolution {
      particular: None,
      ..self.clone()
    }
    .to_expr();
    self
      .constants
      .iter()
      .map(|chosen| {
        let mut instance = homogeneous.clone();
        for name in &self.constants {
          let value = if name == chosen {
            Expr::one()
          } else {
            Expr::zero()
          };
          instance = instance.substitute_variable(name, &value);
        }
        simplify(&instance)
      })
      .collect()
  }

  /// Homogeneous terms in constant order, then the particular solution. The
  /// sum is not re-sorted.
  pub fn to_expr(&self) -> Expr {
    let mut parts = Vec::new();
    for term in &self.terms {
      match &term.expr {
        Expr::Plus(inner) => parts.extend(inner.iter().cloned()),
        other => parts.push(other.clone()),
      }
    }
    if let Some(particular) = &self.particular {
      parts.extend(terms(particular));
    }
    match parts.len() {
      0 => Expr::zero(),
      1 => parts.remove(0),
      _ => Expr::Plus(parts),
    }
  }
}

/// Builds the homogeneous general solution. Constants are numbered in the
/// order of `roots`, and within a root by ascending power of the prefactor;
/// for complex pairs the cosine branch comes first.
pub fn construct(
  roots: &RootClassification,
  kind: ArgumentKind,
  independent: &str,
) -> GeneralSolution {
  let x = Expr::symbol(independent);
  let argument = match kind {
    ArgumentKind::Linear => x.clone(),
    ArgumentKind::Log => Expr::call("Log", x.clone()),
  };
  let carrier = |rate: &Expr| match kind {
    ArgumentKind::Linear => {
      simplify(&Expr::exp(Expr::Times(vec![rate.clone(), x.clone()])))
    }
    ArgumentKind::Log => simplify(&Expr::pow(x.clone(), rate.clone())),
  };

  let mut next = 1;
  let mut fresh = |count: usize| -> Vec<String> {
    let names = (next..next + count).map(|i| format!("C{}", i)).collect();
    next += count;
    names
  };

  let mut terms = Vec::with_capacity(roots.roots.len());
  let mut constants = Vec::new();
  for root in &roots.roots {
    let (expr, names) = match root {
      ClassifiedRoot::RealDistinct { value }
      | ClassifiedRoot::RealRepeated { value, .. } => {
        let names = fresh(root.multiplicity());
        let prefactor = prefactor(&names, &argument);
        (simplify_times(vec![prefactor, carrier(value)]), names)
      }
      ClassifiedRoot::ComplexConjugate {
        re,
        im,
        multiplicity,
      } => {
        let names = fresh(2 * multiplicity);
        let angle = simplify(&Expr::Times(vec![im.clone(), argument.clone()]));
        let (cos_names, sin_names) = names.split_at(*multiplicity);
        let oscillation = Expr::Plus(vec![
          simplify_times(vec![
            prefactor(cos_names, &argument),
            Expr::call("Cos", angle.clone()),
          ]),
          simplify_times(vec![
            prefactor(sin_names, &argument),
            Expr::call("Sin", angle),
          ]),
        ]);
        let amplitude = carrier(re);
        let expr = if amplitude.is_one() {
          oscillation
        } else {
          simplify_times(vec![amplitude, oscillation])
        };
        (expr, names)
      }
    };
    constants.extend(names.iter().cloned());
    terms.push(SolutionTerm {
      expr,
      root: root.clone(),
      constants: names,
    });
  }

  GeneralSolution {
    terms,
    particular: None,
    constants,
  }
}

/// `C_1 + C_2 arg + ... + C_m arg^(m-1)`, left in ascending order.
fn prefactor(names: &[String], argument: &Expr) -> Expr {
  let mut parts: Vec<Expr> = names
    .iter()
    .enumerate()
    .map(|(j, name)| {
      let constant = Expr::symbol(name);
      match j {
        0 => constant,
        _ => simplify(&Expr::Times(vec![
          constant,
          Expr::pow(argument.clone(), Expr::int(j as i64)),
        ])),
      }
    })
    .collect();
  match parts.len() {
    1 => parts.remove(0),
    _ => Expr::Plus(parts),
  }
}

pub fn fit_initial_conditions(
  solution: &GeneralSolution,
  conditions: &[InitialCondition],
  independent: &str,
) -> Result<Expr, SolveError> {
  fit_constants(
    &solution.to_expr(),
    &solution.constants,
    conditions,
    independent,
  )
}

/// Determines constants of `expr` from `conditions`.
///
/// Each condition gives one equation, linear in the constants for the
/// structural paths. With fewer conditions than constants the first subset
/// of constants that the conditions determine is solved for and the rest
/// stay free. A single constant that enters nonlinearly is isolated with
/// [`solve_for`].
pub fn fit_constants(
  expr: &Expr,
  constants: &[String],
  conditions: &[InitialCondition],
  independent: &str,
) -> Result<Expr, SolveError> {
  if conditions.is_empty() {
    return Ok(expr.clone());
  }
  if conditions.len() > constants.len() {
    return Err(SolveError::AlgebraFailure(format!(
      "{} conditions for {} constants",
      conditions.len(),
      constants.len()
    )));
  }

  let mut equations = Vec::with_capacity(conditions.len());
  for condition in conditions {
    let derivative = nth_derivative(expr, independent, condition.order)?;
    let at =
      simplify(&derivative.substitute_variable(independent, &condition.point));
    if is_undefined(&at) {
      return Err(undefined_at(condition));
    }
    equations.push((at, condition));
  }

  let targets: Vec<Expr> = constants.iter().map(|c| Expr::symbol(c)).collect();
  let mut matrix = Vec::with_capacity(equations.len());
  let mut rhs = Vec::with_capacity(equations.len());
  for (at, condition) in &equations {
    let residual = Expr::sub(at.clone(), condition.value.clone());
    match split_linear(&residual, &targets) {
      Ok((row, remainder)) => {
        if row.iter().chain([&remainder]).any(is_undefined) {
          return Err(undefined_at(condition));
        }
        matrix.push(row);
        rhs.push(simplify(&Expr::neg(remainder)));
      }
      Err(AlgebraError::Nonlinear(_)) if constants.len() == 1 => {
        let value = solve_for(at, &condition.value, &constants[0])?;
        debug!(constant = %constants[0], %value, "fitted nonlinear constant");
        return Ok(simplify(&expr.substitute_variable(&constants[0], &value)));
      }
      Err(err) => return Err(err.into()),
    }
  }

  let (chosen, values) = solve_subset(&matrix, &rhs, &targets)?;
  let mut fitted = expr.clone();
  for (index, value) in chosen.into_iter().zip(values) {
    fitted = fitted.substitute_variable(&constants[index], &value);
  }
  Ok(simplify(&fitted))
}

fn is_undefined(expr: &Expr) -> bool {
  expr.free_symbols().is_empty()
    && to_f64(expr).map_or(false, |v| !v.is_finite())
}

fn undefined_at(condition: &InitialCondition) -> SolveError {
  SolveError::AlgebraFailure(format!(
    "general solution is not defined at {}",
    condition.point
  ))
}

/// Solves for the first subset of unknowns, in lexicographic order, that
/// makes the square system regular. Columns left out move to the right-hand
/// side.
fn solve_subset(
  matrix: &[Vec<Expr>],
  rhs: &[Expr],
  targets: &[Expr],
) -> Result<(Vec<usize>, Vec<Expr>), SolveError> {
  let size = matrix.len();
  let mut last_error = None;
  for subset in combinations(targets.len(), size) {
    let square: Vec<Vec<Expr>> = matrix
      .iter()
      .map(|row| subset.iter().map(|&j| row[j].clone()).collect())
      .collect();
    let moved: Vec<Expr> = matrix
      .iter()
      .zip(rhs)
      .map(|(row, b)| {
        let mut parts = vec![b.clone()];
        for (j, target) in targets.iter().enumerate() {
          if !subset.contains(&j) {
            parts.push(Expr::neg(Expr::Times(vec![
              row[j].clone(),
              target.clone(),
            ])));
          }
        }
        simplify(&Expr::Plus(parts))
      })
      .collect();
    match solve_linear_system(square, moved) {
      Ok(values) => return Ok((subset, values)),
      Err(err) => last_error = Some(err),
    }
  }
  Err(
    last_error
      .unwrap_or_else(|| {
        AlgebraError::Singular("no constants to fit".to_string())
      })
      .into(),
  )
}

/// All `k`-element index subsets of `0..n` in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
  fn extend(
    start: usize,
    n: usize,
    k: usize,
    current: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
  ) {
    if current.len() == k {
      out.push(current.clone());
      return;
    }
    for i in start..n {
      current.push(i);
      extend(i + 1, n, k, current, out);
      current.pop();
    }
  }
  let mut out = Vec::new();
  extend(0, n, k, &mut Vec::with_capacity(k), &mut out);
  out
}

/// How a solution was confirmed by substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verification {
  /// The residual simplified to zero.
  Symbolic,
  /// The residual did not cancel but vanished at every sample point.
  Sampled,
  Failed,
}

/// Substitutes `solution` into `ode` and checks that the residual vanishes.
///
/// The residual is first tested symbolically. If it does not cancel, it is
/// evaluated at a few points with the constants set to fixed values.
pub fn check_solution(
  ode: &Ode,
  solution: &Expr,
) -> Result<Verification, AlgebraError> {
  let x = ode.independent();
  let mut derivatives = Vec::with_capacity(ode.order() + 1);
  for k in 0..=ode.order() {
    derivatives.push(nth_derivative(solution, x, k)?);
  }
  let residual = ode.expression().map_derivatives(ode.dependent(), &|k| {
    derivatives
      .get(k)
      .cloned()
      .unwrap_or_else(|| Expr::derivative(ode.dependent(), k))
  });
  if is_zero_expr(&residual) {
    return Ok(Verification::Symbolic);
  }

  let mut closed = residual;
  for (i, name) in closed.free_symbols().into_iter().enumerate() {
    if name != x {
      let value = Expr::rational(3 + i as i64, 7);
      closed = closed.substitute_variable(&name, &value);
    }
  }
  for point in [0.7, 1.3, 2.1] {
    let value = evaluate(&closed, &Scope::at(x, point))?;
    if !value.is_finite() || value.abs() > 1e-8 {
      return Ok(Verification::Failed);
    }
  }
  debug!(%solution, "residual only vanishes numerically");
  Ok(Verification::Sampled)
}

/// True unless [`check_solution`] fails.
pub fn verify(ode: &Ode, solution: &Expr) -> Result<bool, AlgebraError> {
  Ok(check_solution(ode, solution)? != Verification::Failed)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn distinct_real_roots() {
    let roots = RootClassification {
      roots: vec![
        ClassifiedRoot::RealDistinct { value: Expr::one() },
        ClassifiedRoot::RealDistinct {
          value: Expr::int(2),
        },
      ],
    };
    let solution = construct(&roots, ArgumentKind::Linear, "x");
    assert_eq!(solution.to_expr().to_string(), "C1*exp(x) + C2*exp(2*x)");
    assert_eq!(solution.constants, vec!["C1", "C2"]);
  }

  #[test]
  fn repeated_root_gets_polynomial_prefactor() {
    let roots = RootClassification {
      roots: vec![ClassifiedRoot::RealRepeated {
        value: Expr::int(-1),
        multiplicity: 2,
      }],
    };
    let solution = construct(&roots, ArgumentKind::Linear, "x");
    assert_eq!(solution.to_expr().to_string(), "(C1 + C2*x)*exp(-x)");
  }

  #[test]
  fn combinations_are_lexicographic() {
    assert_eq!(
      combinations(3, 2),
      vec![vec![0, 1], vec![0, 2], vec![1, 2]]
    );
  }

  #[test]
  fn fits_two_conditions() {
    let roots = RootClassification {
      roots: vec![
        ClassifiedRoot::RealDistinct { value: Expr::one() },
        ClassifiedRoot::RealDistinct {
          value: Expr::int(2),
        },
      ],
    };
    let solution = construct(&roots, ArgumentKind::Linear, "x");
    let conditions = [
      InitialCondition {
        order: 0,
        point: Expr::zero(),
        value: Expr::zero(),
      },
      InitialCondition {
        order: 1,
        point: Expr::zero(),
        value: Expr::one(),
      },
    ];
    let fitted = fit_initial_conditions(&solution, &conditions, "x").unwrap();
    assert!(fitted.free_symbols().iter().all(|s| s == "x"));
    // y = exp(2x) - exp(x)
    let at_one = evaluate(&fitted, &Scope::at("x", 1.0)).unwrap();
    let expected = (2.0f64).exp() - (1.0f64).exp();
    assert!((at_one - expected).abs() < 1e-12);
  }

  #[test]
  fn basis_sets_one_constant_at_a_time() {
    let roots = RootClassification {
      roots: vec![ClassifiedRoot::RealRepeated {
        value: Expr::one(),
        multiplicity: 2,
      }],
    };
    let basis = construct(&roots, ArgumentKind::Linear, "x").basis();
    let printed: Vec<String> = basis.iter().map(|b| b.to_string()).collect();
    assert_eq!(printed, vec!["exp(x)", "x*exp(x)"]);
  }

  #[test]
  fn reports_how_a_solution_was_checked() {
    let x = Expr::symbol("x");
    // y' - y = 0
    let growth = Ode::new(
      &Expr::sub(Expr::derivative("y", 1), Expr::derivative("y", 0)),
      "x",
      "y",
    )
    .unwrap();
    let exact = Expr::Times(vec![Expr::symbol("C1"), Expr::exp(x.clone())]);
    assert_eq!(check_solution(&growth, &exact), Ok(Verification::Symbolic));
    assert_eq!(check_solution(&growth, &x), Ok(Verification::Failed));

    // y' = sin(2x) by y = sin(x)^2 needs the double-angle identity
    let double_angle = Ode::new(
      &Expr::sub(
        Expr::derivative("y", 1),
        Expr::call("Sin", Expr::Times(vec![Expr::int(2), x.clone()])),
      ),
      "x",
      "y",
    )
    .unwrap();
    let squared = Expr::pow(Expr::call("Sin", x), Expr::int(2));
    assert_eq!(
      check_solution(&double_angle, &squared),
      Ok(Verification::Sampled)
    );
  }
}
