//! Characteristic polynomials and the auxiliary equation of constant
//! coefficient equations.

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::algebra::linear::polynomial_coefficients;
use crate::algebra::polynomial::{polynomial_roots, AlgebraicRoot};
use crate::algebra::AlgebraError;
use crate::ode::Ode;
use crate::syntax::{expr_to_latex, Expr};
use crate::SolveError;

/// Which substitution produced a characteristic polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolynomialKind {
  /// `y^(k)` → `r^k`
  Auxiliary,
  /// `x^k y^(k)` → `r(r-1)...(r-k+1)`
  EulerCauchy,
}

/// Polynomial in an indeterminate distinct from the independent variable.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacteristicPolynomial {
  variable: String,
  /// lowest degree first, no trailing zeros
  coefficients: Vec<Expr>,
  kind: PolynomialKind,
}

impl CharacteristicPolynomial {
  pub fn new(
    variable: &str,
    coefficients: Vec<Expr>,
    kind: PolynomialKind,
  ) -> Self {
    CharacteristicPolynomial {
      variable: variable.to_string(),
      coefficients,
      kind,
    }
  }

  pub fn variable(&self) -> &str {
    &self.variable
  }

  pub fn coefficients(&self) -> &[Expr] {
    &self.coefficients
  }

  pub fn kind(&self) -> PolynomialKind {
    self.kind
  }

  pub fn degree(&self) -> usize {
    self.coefficients.len().saturating_sub(1)
  }

  pub fn roots(&self) -> Result<Vec<AlgebraicRoot>, AlgebraError> {
    polynomial_roots(&self.coefficients)
  }

  /// Highest power first. The sum is left unsimplified so that this order
  /// is kept when printed.
  pub fn to_expr(&self) -> Expr {
    let r = Expr::symbol(&self.variable);
    let mut terms = Vec::new();
    for (k, c) in self.coefficients.iter().enumerate().rev() {
      if c.is_zero() {
        continue;
      }
      let power = match k {
        0 => {
          terms.push(c.clone());
          continue;
        }
        1 => r.clone(),
        _ => Expr::pow(r.clone(), Expr::int(k as i64)),
      };
      terms.push(if c.is_one() {
        power
      } else if *c == Expr::int(-1) {
        Expr::neg(power)
      } else {
        Expr::Times(vec![c.clone(), power])
      });
    }
    match terms.len() {
      0 => Expr::zero(),
      1 => terms.remove(0),
      _ => Expr::Plus(terms),
    }
  }

  pub fn to_latex(&self) -> String {
    expr_to_latex(&self.to_expr())
  }
}

impl fmt::Display for CharacteristicPolynomial {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_expr())
  }
}

impl Serialize for CharacteristicPolynomial {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("CharacteristicPolynomial", 4)?;
    state.serialize_field("kind", &self.kind)?;
    state.serialize_field("variable", &self.variable)?;
    state.serialize_field("polynomial", &self.to_string())?;
    state.serialize_field("coefficients", &self.coefficients)?;
    state.end()
  }
}

/// Name for the indeterminate that does not clash with the equation.
pub fn indeterminate(ode: &Ode) -> String {
  ["r", "s", "m", "lambda"]
    .iter()
    .find(|name| {
      !ode.expression().mentions(name)
        && ode.independent() != **name
        && ode.dependent() != **name
    })
    .map_or_else(|| "__r".to_string(), |name| name.to_string())
}

/// Substitutes `y^(k)` → `r^k` in the homogeneous part of a constant
/// coefficient equation.
///
/// Calling this on an equation whose coefficients depend on the independent
/// variable is a defect of the caller and reported as
/// `InternalConsistencyFailure`.
pub fn build_auxiliary(
  ode: &Ode,
  order: usize,
) -> Result<CharacteristicPolynomial, SolveError> {
  let variable = indeterminate(ode);
  let r = Expr::symbol(&variable);
  let substituted = ode.homogeneous().map_derivatives(ode.dependent(), &|k| {
    Expr::pow(r.clone(), Expr::int(k as i64))
  });
  if substituted.mentions(ode.independent()) {
    return Err(SolveError::InternalConsistencyFailure(format!(
      "auxiliary equation requested for non-constant coefficients in {}",
      ode.homogeneous()
    )));
  }
  let coefficients = polynomial_coefficients(&substituted, &variable)?;
  if coefficients.len() != order + 1 {
    return Err(SolveError::InternalConsistencyFailure(format!(
      "auxiliary polynomial has degree {} for an equation of order {}",
      coefficients.len().saturating_sub(1),
      order
    )));
  }
  Ok(CharacteristicPolynomial::new(
    &variable,
    coefficients,
    PolynomialKind::Auxiliary,
  ))
}
