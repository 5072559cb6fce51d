//! Particular solutions by undetermined coefficients, with variation of
//! parameters for other forcing terms.
//!
//! Undetermined coefficients needs the forcing term to be a sum of products
//! `x^n e^(a x) cos(b x)` or `x^n e^(a x) sin(b x)`. Terms sharing `(a, b)`
//! form one family; its trial function is raised by `x^s`, where `s` is the
//! multiplicity of `a + b i` as a characteristic root.

use crate::algebra::calculus::{integrate, linear_coefficient, nth_derivative};
use crate::algebra::linear::{
  factors, polynomial_coefficients, solve_linear_system, split_linear, terms,
};
use crate::algebra::polynomial::AlgebraicRoot;
use crate::algebra::simplify::{expand, negate, simplify};
use crate::algebra::AlgebraError;
use crate::syntax::{Constant, Expr};

/// Variable standing for `ln x` in the Euler–Cauchy substitution.
const LOG_VARIABLE: &str = "__t";

#[derive(Debug, Clone)]
struct Family {
  rate: Expr,
  frequency: Expr,
  degree: usize,
}

/// Particular solution of `sum_k coefficients[k] * y^(k) = forcing` for
/// constant `coefficients` whose characteristic roots are `roots`.
pub fn undetermined_coefficients(
  coefficients: &[Expr],
  roots: &[AlgebraicRoot],
  forcing: &Expr,
  var: &str,
) -> Result<Expr, AlgebraError> {
  let forcing = expand(&exponential_form(forcing));
  if forcing.is_zero() {
    return Ok(Expr::zero());
  }

  let mut families: Vec<Family> = Vec::new();
  for term in terms(&forcing) {
    let family = classify_term(&term, var)?;
    match families
      .iter_mut()
      .find(|f| f.rate == family.rate && f.frequency == family.frequency)
    {
      Some(existing) => existing.degree = existing.degree.max(family.degree),
      None => families.push(family),
    }
  }

  let x = Expr::symbol(var);
  let mut unknowns = Vec::new();
  let mut trial = Vec::new();
  for family in &families {
    let s = resonance(roots, &family.rate, &family.frequency);
    let exponential =
      Expr::exp(Expr::Times(vec![family.rate.clone(), x.clone()]));
    let waves = if family.frequency.is_zero() {
      vec![Expr::one()]
    } else {
      let angle = Expr::Times(vec![family.frequency.clone(), x.clone()]);
      vec![Expr::call("Cos", angle.clone()), Expr::call("Sin", angle)]
    };
    for j in 0..=family.degree {
      let power = Expr::pow(x.clone(), Expr::int((j + s) as i64));
      for wave in &waves {
        let unknown = Expr::symbol(&format!("__u{}", unknowns.len()));
        trial.push(Expr::Times(vec![
          unknown.clone(),
          power.clone(),
          exponential.clone(),
          wave.clone(),
        ]));
        unknowns.push(unknown);
      }
    }
  }
  let trial = simplify(&Expr::Plus(trial));

  let mut applied = Vec::with_capacity(coefficients.len() + 1);
  for (k, c) in coefficients.iter().enumerate() {
    if c.is_zero() {
      continue;
    }
    applied.push(Expr::Times(vec![c.clone(), nth_derivative(&trial, var, k)?]));
  }
  applied.push(negate(forcing));
  let residual = expand(&Expr::Plus(applied));

  let values = match_coefficients(&residual, &unknowns, var)?;
  let mut solution = trial;
  for (unknown, value) in unknowns.iter().zip(values) {
    if let Expr::Identifier(name) = unknown {
      solution = solution.substitute_variable(name, &value);
    }
  }
  Ok(simplify(&solution))
}

/// Particular solution of `sum_k a_k x^k y^(k) = forcing`, where
/// `characteristic` holds the coefficients of the falling-factorial
/// polynomial. Solved in `t = ln x`, where the equation has constant
/// coefficients.
pub fn euler_cauchy_particular(
  characteristic: &[Expr],
  roots: &[AlgebraicRoot],
  forcing: &Expr,
  var: &str,
) -> Result<Expr, AlgebraError> {
  let t = Expr::symbol(LOG_VARIABLE);
  let forcing_t = simplify(&forcing.substitute_variable(var, &Expr::exp(t)));
  let particular =
    undetermined_coefficients(characteristic, roots, &forcing_t, LOG_VARIABLE)?;
  let log_x = Expr::call("Log", Expr::symbol(var));
  Ok(simplify(&particular.substitute_variable(LOG_VARIABLE, &log_x)))
}

/// Particular solution `sum_k u_k y_k` of a linear equation whose
/// homogeneous solutions are `basis` and whose highest derivative has the
/// coefficient `leading`. The `u_k'` solve `W u' = (0, ..., 0, g)` with `W`
/// the Wronskian matrix and `g = forcing / leading`.
pub fn variation_of_parameters(
  basis: &[Expr],
  leading: &Expr,
  forcing: &Expr,
  var: &str,
) -> Result<Expr, AlgebraError> {
  let n = basis.len();
  if n == 0 {
    return Err(AlgebraError::Unsupported(
      "variation of parameters without homogeneous solutions".to_string(),
    ));
  }
  let mut wronskian = Vec::with_capacity(n);
  for k in 0..n {
    let row = basis
      .iter()
      .map(|y| nth_derivative(y, var, k))
      .collect::<Result<Vec<Expr>, _>>()?;
    wronskian.push(row);
  }
  let mut rhs = vec![Expr::zero(); n];
  rhs[n - 1] = simplify(&Expr::div(forcing.clone(), leading.clone()));

  let rates = solve_linear_system(wronskian, rhs)?;
  let mut parts = Vec::with_capacity(n);
  for (rate, y) in rates.iter().zip(basis) {
    let u = integrate(rate, var)
      .ok_or_else(|| AlgebraError::NoIntegral(rate.to_string()))?;
    parts.push(Expr::Times(vec![u, y.clone()]));
  }
  Ok(simplify(&Expr::Plus(parts)))
}

/// Rewrites hyperbolic functions as exponentials.
fn exponential_form(expr: &Expr) -> Expr {
  expr.map(&|e| match e {
    Expr::FunctionCall { name, args } if args.len() == 1 => {
      let u = args[0].clone();
      let sign = match name.as_str() {
        "Sinh" => -1,
        "Cosh" => 1,
        _ => return None,
      };
      Some(Expr::Times(vec![
        Expr::rational(1, 2),
        Expr::Plus(vec![
          Expr::exp(u.clone()),
          Expr::Times(vec![Expr::int(sign), Expr::exp(Expr::neg(u))]),
        ]),
      ]))
    }
    _ => None,
  })
}

fn classify_term(term: &Expr, var: &str) -> Result<Family, AlgebraError> {
  let unsupported =
    || AlgebraError::Unsupported(format!("forcing term {}", term));
  let mut family = Family {
    rate: Expr::zero(),
    frequency: Expr::zero(),
    degree: 0,
  };
  let mut has_wave = false;
  for factor in factors(term) {
    if !factor.mentions(var) {
      continue;
    }
    match &factor {
      Expr::Identifier(_) => family.degree += 1,
      Expr::Power(base, exp) if **base == Expr::symbol(var) => {
        let n = exp.as_integer().filter(|n| *n > 0).ok_or_else(unsupported)?;
        family.degree += n as usize;
      }
      Expr::Power(base, exp) if **base == Expr::Constant(Constant::E) => {
        let rate = linear_coefficient(exp, var).ok_or_else(unsupported)?;
        family.rate = simplify(&Expr::Plus(vec![family.rate, rate]));
      }
      Expr::FunctionCall { name, args }
        if (name == "Sin" || name == "Cos") && args.len() == 1 && !has_wave =>
      {
        let coefficients =
          polynomial_coefficients(&args[0], var).map_err(|_| unsupported())?;
        if coefficients.len() != 2 || !coefficients[0].is_zero() {
          return Err(unsupported());
        }
        family.frequency = coefficients[1].clone();
        has_wave = true;
      }
      _ => return Err(unsupported()),
    }
  }
  Ok(family)
}

/// Multiplicity of `rate + frequency*i` among `roots`.
fn resonance(roots: &[AlgebraicRoot], rate: &Expr, frequency: &Expr) -> usize {
  roots
    .iter()
    .filter(|root| simplify(&root.re) == *rate)
    .filter(|root| {
      if frequency.is_zero() {
        root.is_real()
      } else {
        simplify(&root.im) == *frequency
      }
    })
    .count()
}

/// Splits each term into its `var`-free coefficient and the basis function
/// it multiplies.
fn basis_split(term: &Expr, var: &str) -> (Expr, Expr) {
  let mut coefficient = Vec::new();
  let mut basis = Vec::new();
  for factor in factors(term) {
    if !factor.mentions(var) {
      coefficient.push(factor);
      continue;
    }
    match &factor {
      Expr::Power(base, exp) if **base == Expr::Constant(Constant::E) => {
        let (varying, constant): (Vec<Expr>, Vec<Expr>) =
          terms(exp).into_iter().partition(|t| t.mentions(var));
        if !constant.is_empty() {
          coefficient.push(Expr::exp(Expr::Plus(constant)));
        }
        basis.push(Expr::exp(Expr::Plus(varying)));
      }
      _ => basis.push(factor.clone()),
    }
  }
  (
    simplify(&Expr::Times(coefficient)),
    simplify(&Expr::Times(basis)),
  )
}

/// Solves `residual = 0` identically in `var` for the unknowns.
fn match_coefficients(
  residual: &Expr,
  unknowns: &[Expr],
  var: &str,
) -> Result<Vec<Expr>, AlgebraError> {
  let (coefficients, remainder) = split_linear(residual, unknowns)?;
  let mut keys: Vec<Expr> = Vec::new();
  let mut rows: Vec<Vec<Vec<Expr>>> = Vec::new();
  let mut rhs: Vec<Vec<Expr>> = Vec::new();

  let mut row_for = |basis: Expr| -> usize {
    match keys.iter().position(|k| *k == basis) {
      Some(i) => i,
      None => {
        keys.push(basis);
        rows.push(vec![Vec::new(); unknowns.len()]);
        rhs.push(Vec::new());
        keys.len() - 1
      }
    }
  };

  let mut entries = Vec::new();
  for (i, c) in coefficients.iter().enumerate() {
    for term in terms(&expand(c)) {
      let (coefficient, basis) = basis_split(&term, var);
      entries.push((row_for(basis), Some(i), coefficient));
    }
  }
  for term in terms(&remainder) {
    let (coefficient, basis) = basis_split(&term, var);
    entries.push((row_for(basis), None, negate(coefficient)));
  }
  for (row, column, value) in entries {
    match column {
      Some(i) => rows[row][i].push(value),
      None => rhs[row].push(value),
    }
  }

  let matrix = rows
    .into_iter()
    .map(|row| {
      row
        .into_iter()
        .map(|parts| simplify(&Expr::Plus(parts)))
        .collect()
    })
    .collect();
  let rhs = rhs
    .into_iter()
    .map(|parts| simplify(&Expr::Plus(parts)))
    .collect();
  solve_linear_system(matrix, rhs)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::algebra::numeric::{evaluate, Scope};
  use crate::syntax::expr_to_string;

  fn x() -> Expr {
    Expr::symbol("x")
  }

  #[test]
  fn polynomial_forcing() {
    // y'' + y = x^2 → x^2 - 2
    let coefficients = vec![Expr::one(), Expr::zero(), Expr::one()];
    let roots = vec![
      AlgebraicRoot::complex(Expr::zero(), Expr::one()),
      AlgebraicRoot::complex(Expr::zero(), Expr::int(-1)),
    ];
    let forcing = Expr::pow(x(), Expr::int(2));
    let yp =
      undetermined_coefficients(&coefficients, &roots, &forcing, "x").unwrap();
    assert_eq!(expr_to_string(&yp), "-2 + x^2");
  }

  #[test]
  fn resonant_exponential() {
    // y' - y = e^x → x e^x
    let coefficients = vec![Expr::int(-1), Expr::one()];
    let roots = vec![AlgebraicRoot::real(Expr::one())];
    let yp =
      undetermined_coefficients(&coefficients, &roots, &Expr::exp(x()), "x")
        .unwrap();
    assert_eq!(expr_to_string(&yp), "x*exp(x)");
  }

  #[test]
  fn trigonometric_forcing() {
    // y'' + 4y = cos(x) → cos(x)/3
    let coefficients = vec![Expr::int(4), Expr::zero(), Expr::one()];
    let roots = vec![
      AlgebraicRoot::complex(Expr::zero(), Expr::int(2)),
      AlgebraicRoot::complex(Expr::zero(), Expr::int(-2)),
    ];
    let forcing = Expr::call("Cos", x());
    let yp =
      undetermined_coefficients(&coefficients, &roots, &forcing, "x").unwrap();
    assert_eq!(expr_to_string(&yp), "cos(x)/3");
  }

  #[test]
  fn euler_cauchy_power_forcing() {
    // x^2 y'' + x y' - y = x^2, characteristic r^2 - 1
    let characteristic = vec![Expr::int(-1), Expr::zero(), Expr::one()];
    let roots = vec![
      AlgebraicRoot::real(Expr::int(-1)),
      AlgebraicRoot::real(Expr::one()),
    ];
    let forcing = Expr::pow(x(), Expr::int(2));
    let yp =
      euler_cauchy_particular(&characteristic, &roots, &forcing, "x").unwrap();
    assert_eq!(expr_to_string(&yp), "x^2/3");
  }

  #[test]
  fn rejects_unsupported_forcing() {
    let coefficients = vec![Expr::zero(), Expr::one()];
    let forcing = Expr::call("Tan", x());
    let result = undetermined_coefficients(&coefficients, &[], &forcing, "x");
    assert!(result.is_err());
  }

  #[test]
  fn variation_of_parameters_with_reciprocal_forcing() {
    // y'' - 2y' + y = e^x/x
    let basis = vec![Expr::exp(x()), Expr::Times(vec![x(), Expr::exp(x())])];
    let forcing = Expr::div(Expr::exp(x()), x());
    let yp =
      variation_of_parameters(&basis, &Expr::one(), &forcing, "x").unwrap();
    let has_log =
      |e: &Expr| matches!(e, Expr::FunctionCall { name, .. } if name == "Log");
    assert!(yp.any(&has_log));

    let residual = Expr::Plus(vec![
      nth_derivative(&yp, "x", 2).unwrap(),
      Expr::Times(vec![Expr::int(-2), nth_derivative(&yp, "x", 1).unwrap()]),
      yp,
      negate(forcing),
    ]);
    let value = evaluate(&residual, &Scope::at("x", 1.5)).unwrap();
    assert!(value.abs() < 1e-9, "residual {}", value);
  }

  #[test]
  fn variation_of_parameters_needs_integrals() {
    // y'' + y = tan(x)
    let basis = vec![Expr::call("Cos", x()), Expr::call("Sin", x())];
    let forcing = Expr::call("Tan", x());
    assert!(
      variation_of_parameters(&basis, &Expr::one(), &forcing, "x").is_err()
    );
  }
}
