//! Order, linearity and coefficient-type classification.

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::algebra::dsolve::{explicit_first_order, separate, state_powers};
use crate::algebra::linear::split_linear;
use crate::ode::euler_cauchy;
use crate::ode::Ode;
use crate::syntax::Expr;

/// The solver handles each variant with its own method.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OdeKind {
  /// Linear with constant coefficients `a_k` of `y^(k)`, lowest order
  /// first.
  ConstantCoefficient { coefficients: Vec<Expr> },
  /// Linear with coefficients `a_k x^k`; holds the `a_k`.
  EulerCauchy { coefficients: Vec<Expr> },
  VariableCoefficient,
  Nonlinear { form: NonlinearKind },
}

/// Informational pattern name for nonlinear equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NonlinearKind {
  Separable,
  Bernoulli,
  Riccati,
  Autonomous,
  Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoefficientKind {
  Constant,
  EulerCauchy,
  VariableOther,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
  pub order: usize,
  pub kind: OdeKind,
}

impl Classification {
  pub fn is_linear(&self) -> bool {
    !matches!(self.kind, OdeKind::Nonlinear { .. })
  }

  /// Nonlinear equations report `VariableOther`.
  pub fn coefficient_kind(&self) -> CoefficientKind {
    match self.kind {
      OdeKind::ConstantCoefficient { .. } => CoefficientKind::Constant,
      OdeKind::EulerCauchy { .. } => CoefficientKind::EulerCauchy,
      _ => CoefficientKind::VariableOther,
    }
  }

  pub fn nonlinear_kind(&self) -> Option<NonlinearKind> {
    match self.kind {
      OdeKind::Nonlinear { form } => Some(form),
      _ => None,
    }
  }
}

impl fmt::Display for Classification {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "order {}, ", self.order)?;
    match &self.kind {
      OdeKind::ConstantCoefficient { .. } => {
        write!(f, "linear, constant coefficients")
      }
      OdeKind::EulerCauchy { .. } => write!(f, "linear, Euler-Cauchy"),
      OdeKind::VariableCoefficient => write!(f, "linear, variable coefficients"),
      OdeKind::Nonlinear { form } => write!(f, "nonlinear ({:?})", form),
    }
  }
}

impl Serialize for Classification {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("Classification", 4)?;
    state.serialize_field("order", &self.order)?;
    state.serialize_field("is_linear", &self.is_linear())?;
    state.serialize_field("coefficient_kind", &self.coefficient_kind())?;
    state.serialize_field("kind", &self.kind)?;
    state.end()
  }
}

/// Never fails: structure that matches no linear pattern is reported as
/// `VariableCoefficient` or as a nonlinear form.
pub fn classify(ode: &Ode) -> Classification {
  let order = ode.order();
  let kind = match linear_coefficients(ode) {
    Some(coefficients) => linear_kind(ode, coefficients),
    None => OdeKind::Nonlinear {
      form: nonlinear_kind(ode),
    },
  };
  let classification = Classification { order, kind };
  debug!(equation = %ode.expression(), %classification, "classified");
  classification
}

/// Coefficients of `y, y', ..., y^(n)` if the equation is linear in all of
/// them.
fn linear_coefficients(ode: &Ode) -> Option<Vec<Expr>> {
  let targets: Vec<Expr> = (0..=ode.order())
    .map(|k| Expr::derivative(ode.dependent(), k))
    .collect();
  let (coefficients, remainder) =
    split_linear(ode.homogeneous(), &targets).ok()?;
  if !remainder.is_zero() {
    return None;
  }
  Some(coefficients)
}

fn linear_kind(ode: &Ode, coefficients: Vec<Expr>) -> OdeKind {
  let x = ode.independent();
  if coefficients.iter().all(|c| !c.mentions(x)) {
    return OdeKind::ConstantCoefficient { coefficients };
  }
  match euler_cauchy::detect(ode.homogeneous(), ode.order(), x, ode.dependent())
  {
    Ok(euler_cauchy::EulerCauchyDetection {
      is_euler_cauchy: true,
      coefficients: Some(coefficients),
    }) => OdeKind::EulerCauchy { coefficients },
    _ => OdeKind::VariableCoefficient,
  }
}

fn nonlinear_kind(ode: &Ode) -> NonlinearKind {
  let x = ode.independent();
  if ode.order() > 1 {
    return if ode.expression().mentions(x) {
      NonlinearKind::Other
    } else {
      NonlinearKind::Autonomous
    };
  }
  let Ok(rhs) = explicit_first_order(ode.expression(), ode.dependent()) else {
    return NonlinearKind::Other;
  };
  if separate(&rhs, x).is_some() {
    return NonlinearKind::Separable;
  }
  if let Some(powers) = state_powers(&rhs) {
    let exponents: Vec<&Expr> = powers.iter().map(|(k, _)| k).collect();
    let others: Vec<&&Expr> = exponents.iter().filter(|k| !k.is_one()).collect();
    if others.len() == 1 && !others[0].is_zero() {
      return NonlinearKind::Bernoulli;
    }
    let riccati = exponents
      .iter()
      .all(|k| k.is_zero() || k.is_one() || **k == Expr::int(2));
    if riccati && exponents.contains(&&Expr::int(2)) {
      return NonlinearKind::Riccati;
    }
  }
  if !rhs.mentions(x) {
    return NonlinearKind::Autonomous;
  }
  NonlinearKind::Other
}
