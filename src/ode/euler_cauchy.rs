//! Detection of equidimensional (Euler–Cauchy) equations
//! `sum_k a_k x^k y^(k) = 0` and their falling-factorial characteristic
//! polynomial.

use serde::Serialize;

use crate::algebra::linear::{
  coefficient_of, is_zero_expr, polynomial_coefficients,
};
use crate::algebra::simplify::{expand, simplify};
use crate::ode::auxiliary::{CharacteristicPolynomial, PolynomialKind};
use crate::syntax::Expr;
use crate::SolveError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EulerCauchyDetection {
  pub is_euler_cauchy: bool,
  /// `a_0, ..., a_n` on success
  pub coefficients: Option<Vec<Expr>>,
}

impl EulerCauchyDetection {
  fn rejected() -> Self {
    EulerCauchyDetection {
      is_euler_cauchy: false,
      coefficients: None,
    }
  }
}

/// Checks that the coefficient of every `y^(k)` in `homogeneous` is a
/// constant times `x^k`.
pub fn detect(
  homogeneous: &Expr,
  order: usize,
  independent: &str,
  dependent: &str,
) -> Result<EulerCauchyDetection, SolveError> {
  if order == 0 {
    return Err(SolveError::InternalConsistencyFailure(
      "Euler-Cauchy detection on an equation of order 0".to_string(),
    ));
  }
  let placeholders: Vec<Expr> = (0..=order)
    .map(|k| Expr::symbol(&format!("__d{}", k)))
    .collect();
  let replaced = homogeneous.map_derivatives(dependent, &|k| {
    placeholders
      .get(k)
      .cloned()
      .unwrap_or_else(|| Expr::derivative(dependent, k))
  });
  let expanded = expand(&replaced);
  let x = Expr::symbol(independent);

  let mut coefficients = Vec::with_capacity(order + 1);
  let mut rebuilt = Vec::with_capacity(order + 1);
  for (k, placeholder) in placeholders.iter().enumerate() {
    let coefficient = coefficient_of(&expanded, placeholder);
    let power = Expr::pow(x.clone(), Expr::int(k as i64));
    let quotient = expand(&Expr::div(coefficient, power.clone()));
    if quotient.mentions(independent)
      || placeholders.iter().any(|p| quotient.contains(p))
    {
      return Ok(EulerCauchyDetection::rejected());
    }
    rebuilt.push(Expr::Times(vec![
      quotient.clone(),
      power,
      placeholder.clone(),
    ]));
    coefficients.push(quotient);
  }

  // Anything not captured above (products of derivatives, stray terms)
  let leftover = Expr::sub(expanded, Expr::Plus(rebuilt));
  if !is_zero_expr(&leftover) || coefficients[order].is_zero() {
    return Ok(EulerCauchyDetection::rejected());
  }
  Ok(EulerCauchyDetection {
    is_euler_cauchy: true,
    coefficients: Some(coefficients),
  })
}

/// `sum_k a_k r(r-1)...(r-k+1)` for the detected `a_k`.
pub fn characteristic_polynomial(
  coefficients: &[Expr],
  variable: &str,
) -> Result<CharacteristicPolynomial, SolveError> {
  let r = Expr::symbol(variable);
  let terms: Vec<Expr> = coefficients
    .iter()
    .enumerate()
    .map(|(k, a)| {
      let mut product = vec![a.clone()];
      product.extend(
        (0..k).map(|j| Expr::Plus(vec![r.clone(), Expr::int(-(j as i64))])),
      );
      Expr::Times(product)
    })
    .collect();
  let polynomial =
    polynomial_coefficients(&expand(&Expr::Plus(terms)), variable)?;
  let order = coefficients.len().saturating_sub(1);
  if polynomial.len() != order + 1 {
    return Err(SolveError::InternalConsistencyFailure(format!(
      "Euler-Cauchy polynomial has degree {} for an equation of order {}",
      polynomial.len().saturating_sub(1),
      order
    )));
  }
  Ok(CharacteristicPolynomial::new(
    variable,
    polynomial.iter().map(simplify).collect(),
    PolynomialKind::EulerCauchy,
  ))
}
