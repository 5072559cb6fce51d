//! Classification of ordinary differential equations and construction of
//! their closed-form solutions.
//!
//! Everything here consumes an [`Ode`]: an equation normalized to
//! `expression = 0` and split into the part that involves the dependent
//! function and the forcing term.

pub mod auxiliary;
pub mod classify;
pub mod euler_cauchy;
pub mod general_solution;
pub mod numerical;
pub mod roots;

use serde::Serialize;

use crate::algebra::linear::terms;
use crate::algebra::simplify::{expand, negate, simplify, simplify_plus};
use crate::syntax::{Constant, Expr};
use crate::OdeError;

/// An equation `expression(x, y, y', ..., y^(n)) = 0`.
///
/// The expression is split as `homogeneous - forcing`, where every term of
/// `homogeneous` involves the dependent function and `forcing` is a
/// function of the independent variable alone. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Ode {
  expression: Expr,
  independent: String,
  dependent: String,
  order: usize,
  homogeneous: Expr,
  forcing: Expr,
}

impl Ode {
  /// Normalizes `expression = 0`. Fails when the expression contains no
  /// derivative of `dependent`.
  pub fn new(
    expression: &Expr,
    independent: &str,
    dependent: &str,
  ) -> Result<Ode, OdeError> {
    let expanded = expand(expression);
    if expanded.divides_by_zero() {
      return Err(OdeError::InvalidEquation(format!(
        "division by zero in {}",
        expanded
      )));
    }
    let order = match expanded.max_derivative_order(dependent) {
      Some(order) if order > 0 => order,
      _ => {
        return Err(OdeError::InvalidEquation(format!(
          "no derivative of {} in {}",
          dependent, expanded
        )));
      }
    };
    if expanded.mentions(dependent) {
      return Err(OdeError::InvalidEquation(format!(
        "{} is used both as a function and as a symbol",
        dependent
      )));
    }

    let (involving, free): (Vec<Expr>, Vec<Expr>) = terms(&expanded)
      .into_iter()
      .partition(|t| t.contains_function(dependent));
    Ok(Ode {
      expression: simplify(expression),
      independent: independent.to_string(),
      dependent: dependent.to_string(),
      order,
      homogeneous: simplify_plus(involving),
      forcing: negate(simplify_plus(free)),
    })
  }

  pub fn expression(&self) -> &Expr {
    &self.expression
  }

  pub fn independent(&self) -> &str {
    &self.independent
  }

  pub fn dependent(&self) -> &str {
    &self.dependent
  }

  /// Highest derivative with a non-zero coefficient.
  pub fn order(&self) -> usize {
    self.order
  }

  pub fn homogeneous(&self) -> &Expr {
    &self.homogeneous
  }

  /// Right-hand side `g(x)` of `homogeneous = g(x)`.
  pub fn forcing(&self) -> &Expr {
    &self.forcing
  }

  pub fn is_homogeneous(&self) -> bool {
    self.forcing.is_zero()
  }
}

/// `y^(order)(point) = value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialCondition {
  pub order: usize,
  pub point: Expr,
  pub value: Expr,
}

/// Conditions must name distinct derivative orders below the order of the
/// equation.
pub fn check_conditions(
  ode: &Ode,
  conditions: &[InitialCondition],
) -> Result<(), OdeError> {
  let mut seen = vec![false; ode.order()];
  for condition in conditions {
    let name = Expr::derivative(ode.dependent(), condition.order);
    match seen.get_mut(condition.order) {
      None => {
        return Err(OdeError::InvalidInitialCondition(format!(
          "{} is not below the order {} of the equation",
          name,
          ode.order()
        )));
      }
      Some(true) => {
        return Err(OdeError::InvalidInitialCondition(format!(
          "{} is given more than once",
          name
        )));
      }
      Some(slot) => *slot = true,
    }
    if condition.value.mentions(ode.independent()) {
      return Err(OdeError::InvalidInitialCondition(format!(
        "value {} depends on {}",
        condition.value,
        ode.independent()
      )));
    }
  }
  Ok(())
}

/// True if `expr` is only real for `var > 0`: it takes a logarithm or a
/// fractional power of something involving `var`. Integer powers, negative
/// ones included, are real on both sides of their poles.
pub fn requires_positive_domain(expr: &Expr, var: &str) -> bool {
  expr.any(&|e| match e {
    Expr::FunctionCall { name, args } if name == "Log" => {
      args.iter().any(|a| a.mentions(var))
    }
    Expr::Power(base, exp) => {
      **base != Expr::Constant(Constant::E)
        && base.mentions(var)
        && exp.as_integer().is_none()
    }
    _ => false,
  })
}
