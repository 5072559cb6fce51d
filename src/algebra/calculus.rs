//! Symbolic differentiation and integration.
//!
//! Derivative nodes of the dependent function are differentiated by raising
//! their order, so `differentiate(y', x)` is `y''`.

use crate::algebra::linear::polynomial_coefficients;
use crate::algebra::simplify::{expand, simplify};
use crate::algebra::AlgebraError;
use crate::syntax::{Constant, Expr};

/// d/d`var` of `expr`, simplified.
pub fn differentiate(expr: &Expr, var: &str) -> Result<Expr, AlgebraError> {
  Ok(simplify(&derivative_of(expr, var)?))
}

pub fn nth_derivative(
  expr: &Expr,
  var: &str,
  n: usize,
) -> Result<Expr, AlgebraError> {
  let mut result = simplify(expr);
  for _ in 0..n {
    result = differentiate(&result, var)?;
  }
  Ok(result)
}

fn derivative_of(expr: &Expr, var: &str) -> Result<Expr, AlgebraError> {
  if !expr.depends_on(var) {
    return Ok(Expr::zero());
  }
  match expr {
    Expr::Identifier(_) => Ok(Expr::one()),
    Expr::Derivative { function, order } => {
      Ok(Expr::derivative(function, order + 1))
    }
    Expr::Plus(terms) => Ok(Expr::Plus(
      terms
        .iter()
        .map(|t| derivative_of(t, var))
        .collect::<Result<_, _>>()?,
    )),
    Expr::Times(factors) => {
      // Product rule: one term per varying factor
      let mut terms = Vec::new();
      for (i, factor) in factors.iter().enumerate() {
        if !factor.depends_on(var) {
          continue;
        }
        let mut product = factors.clone();
        product[i] = derivative_of(factor, var)?;
        terms.push(Expr::Times(product));
      }
      Ok(Expr::Plus(terms))
    }
    Expr::Power(base, exp) => {
      if !exp.depends_on(var) {
        // d/dx[b^n] = n * b^(n-1) * b'
        Ok(Expr::Times(vec![
          (**exp).clone(),
          Expr::pow(
            (**base).clone(),
            Expr::Plus(vec![(**exp).clone(), Expr::int(-1)]),
          ),
          derivative_of(base, var)?,
        ]))
      } else if **base == Expr::Constant(Constant::E) {
        Ok(Expr::Times(vec![expr.clone(), derivative_of(exp, var)?]))
      } else {
        // d/dx[b^e] = b^e * (e' * log(b) + e * b' / b)
        Ok(Expr::Times(vec![
          expr.clone(),
          Expr::Plus(vec![
            Expr::Times(vec![
              derivative_of(exp, var)?,
              Expr::call("Log", (**base).clone()),
            ]),
            Expr::Times(vec![
              (**exp).clone(),
              derivative_of(base, var)?,
              Expr::pow((**base).clone(), Expr::int(-1)),
            ]),
          ]),
        ]))
      }
    }
    Expr::FunctionCall { name, args } if args.len() == 1 => {
      let u = &args[0];
      let outer = match name.as_str() {
        "Sin" => Expr::call("Cos", u.clone()),
        "Cos" => Expr::neg(Expr::call("Sin", u.clone())),
        "Tan" => Expr::pow(Expr::call("Cos", u.clone()), Expr::int(-2)),
        "Sinh" => Expr::call("Cosh", u.clone()),
        "Cosh" => Expr::call("Sinh", u.clone()),
        "Tanh" => Expr::pow(Expr::call("Cosh", u.clone()), Expr::int(-2)),
        "ArcTan" => Expr::pow(
          Expr::Plus(vec![Expr::one(), Expr::pow(u.clone(), Expr::int(2))]),
          Expr::int(-1),
        ),
        "Log" => Expr::pow(u.clone(), Expr::int(-1)),
        "Abs" => {
          Expr::Times(vec![u.clone(), Expr::pow(expr.clone(), Expr::int(-1))])
        }
        other => {
          return Err(AlgebraError::Unsupported(format!(
            "derivative of {}",
            other
          )));
        }
      };
      Ok(Expr::Times(vec![outer, derivative_of(u, var)?]))
    }
    other => Err(AlgebraError::Unsupported(format!("derivative of {}", other))),
  }
}

// ─── Integration ───────────────────────────────────────────────────────

/// Antiderivative with respect to `var`, without a constant of integration.
/// Returns `None` when no rule applies.
pub fn integrate(expr: &Expr, var: &str) -> Option<Expr> {
  antiderivative(&expand(expr), var).map(|r| simplify(&r))
}

fn antiderivative(expr: &Expr, var: &str) -> Option<Expr> {
  let x = Expr::symbol(var);
  if !expr.depends_on(var) {
    return Some(Expr::Times(vec![expr.clone(), x]));
  }
  match expr {
    Expr::Identifier(_) => Some(Expr::Times(vec![
      Expr::rational(1, 2),
      Expr::pow(x, Expr::int(2)),
    ])),
    Expr::Plus(terms) => terms
      .iter()
      .map(|t| antiderivative(t, var))
      .collect::<Option<Vec<_>>>()
      .map(Expr::Plus),
    Expr::Times(factors) => {
      let (mut constant, varying): (Vec<Expr>, Vec<Expr>) =
        factors.iter().cloned().partition(|f| !f.depends_on(var));
      if varying.len() != 1 {
        return None;
      }
      constant.push(antiderivative(&varying[0], var)?);
      Some(Expr::Times(constant))
    }
    Expr::Power(base, exp) => {
      if **base == Expr::Constant(Constant::E) {
        let a = linear_coefficient(exp, var)?;
        return Some(Expr::div(expr.clone(), a));
      }
      if exp.depends_on(var) {
        return None;
      }
      let a = linear_coefficient(base, var)?;
      if **exp == Expr::int(-1) {
        return Some(Expr::div(Expr::call("Log", (**base).clone()), a));
      }
      let raised = Expr::Plus(vec![(**exp).clone(), Expr::one()]);
      Some(Expr::div(
        Expr::pow((**base).clone(), raised.clone()),
        Expr::Times(vec![raised, a]),
      ))
    }
    Expr::FunctionCall { name, args } if args.len() == 1 => {
      let u = &args[0];
      let a = linear_coefficient(u, var)?;
      let result = match name.as_str() {
        "Sin" => Expr::neg(Expr::call("Cos", u.clone())),
        "Cos" => Expr::call("Sin", u.clone()),
        "Sinh" => Expr::call("Cosh", u.clone()),
        "Cosh" => Expr::call("Sinh", u.clone()),
        "Log" => Expr::sub(
          Expr::Times(vec![u.clone(), Expr::call("Log", u.clone())]),
          u.clone(),
        ),
        _ => return None,
      };
      Some(Expr::div(result, a))
    }
    _ => None,
  }
}

/// `a` when `expr` is `a*var + b` with `a` and `b` free of `var`.
pub(crate) fn linear_coefficient(expr: &Expr, var: &str) -> Option<Expr> {
  let coefficients = polynomial_coefficients(expr, var).ok()?;
  if coefficients.len() != 2 {
    return None;
  }
  Some(coefficients[1].clone())
}
