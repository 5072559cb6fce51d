//! Generic analytical solver for first-order equations.
//!
//! The equation is brought into the explicit form `y' = F(x, y)` and then
//! tried as a linear equation (integrating factor), a separable equation
//! and a Bernoulli equation, in that order. The answer is explicit in `y`
//! with one constant `C1`.

use crate::algebra::calculus::integrate;
use crate::algebra::linear::{factors, solve_for, split_linear, terms};
use crate::algebra::simplify::{expand, simplify, simplify_times};
use crate::algebra::AlgebraError;
use crate::syntax::Expr;

/// Stands for the dependent function inside `F(x, y)`.
pub const STATE_SYMBOL: &str = "__y";

fn state() -> Expr {
  Expr::symbol(STATE_SYMBOL)
}

pub fn dsolve(
  expression: &Expr,
  independent: &str,
  dependent: &str,
) -> Result<Expr, AlgebraError> {
  let rhs = explicit_first_order(expression, dependent)?;
  let constant = Expr::symbol("C1");

  if let Ok((coefficients, forcing)) = split_linear(&rhs, &[state()]) {
    if let Some(solution) =
      linear_solution(&coefficients[0], &forcing, independent, &constant)
    {
      return Ok(solution);
    }
  }
  if let Some((f, g)) = separate(&rhs, independent) {
    if let Some(solution) = separable_solution(&f, &g, independent, &constant)
    {
      return Ok(solution);
    }
  }
  if let Some(solution) = bernoulli_solution(&rhs, independent, &constant) {
    return Ok(solution);
  }

  let shown = rhs.substitute_variable(STATE_SYMBOL, &Expr::symbol(dependent));
  Err(AlgebraError::Unsupported(format!(
    "no closed form for {}' = {}",
    dependent, shown
  )))
}

/// `F` in `y' = F(x, y)`, with `y` replaced by [`STATE_SYMBOL`].
pub fn explicit_first_order(
  expression: &Expr,
  dependent: &str,
) -> Result<Expr, AlgebraError> {
  let order = expression.max_derivative_order(dependent);
  if order != Some(1) {
    return Err(AlgebraError::Unsupported(format!(
      "generic solving of order {}",
      order.unwrap_or(0)
    )));
  }
  let replaced = expression.map_derivatives(dependent, &|k| {
    if k == 0 {
      state()
    } else {
      Expr::derivative(dependent, k)
    }
  });
  let (coefficients, remainder) =
    split_linear(&replaced, &[Expr::derivative(dependent, 1)])?;
  let slope = &coefficients[0];
  if slope.is_zero() || slope.mentions(STATE_SYMBOL) {
    return Err(AlgebraError::Nonlinear(format!("{}'", dependent)));
  }
  Ok(simplify(&Expr::neg(Expr::div(remainder, slope.clone()))))
}

/// `(f, g)` with `rhs = f(x) * g(y)`, if such a split exists.
pub fn separate(rhs: &Expr, independent: &str) -> Option<(Expr, Expr)> {
  if !rhs.mentions(independent) {
    return Some((Expr::one(), rhs.clone()));
  }
  if !rhs.mentions(STATE_SYMBOL) {
    return Some((rhs.clone(), Expr::one()));
  }
  if let Some(split) = split_factors(rhs, independent) {
    return Some(split);
  }
  // x + x*y = x * (1 + y): divide by the x-part of the first term
  let first = terms(rhs).into_iter().next()?;
  let x_part = split_factors(&first, independent)?.0;
  let rest = expand(&Expr::div(rhs.clone(), x_part.clone()));
  if rest.mentions(independent) {
    return None;
  }
  Some((x_part, rest))
}

fn split_factors(expr: &Expr, independent: &str) -> Option<(Expr, Expr)> {
  let mut f = Vec::new();
  let mut g = Vec::new();
  for factor in factors(expr) {
    match (factor.mentions(independent), factor.mentions(STATE_SYMBOL)) {
      (true, true) => return None,
      (false, true) => g.push(factor),
      _ => f.push(factor),
    }
  }
  Some((simplify_times(f), simplify_times(g)))
}

/// `rhs` written as `sum_k c_k(x) y^k`, as `(k, c_k)` pairs with numeric
/// `k`. `None` if `y` occurs other than through such powers.
pub fn state_powers(rhs: &Expr) -> Option<Vec<(Expr, Expr)>> {
  let mut groups: Vec<(Expr, Vec<Expr>)> = Vec::new();
  for term in terms(&expand(rhs)) {
    let mut exponent = Vec::new();
    let mut rest = Vec::new();
    for factor in factors(&term) {
      match &factor {
        Expr::Identifier(name) if name == STATE_SYMBOL => {
          exponent.push(Expr::one())
        }
        Expr::Power(base, e) if **base == state() && e.is_numeric() => {
          exponent.push((**e).clone())
        }
        f if f.mentions(STATE_SYMBOL) => return None,
        _ => rest.push(factor.clone()),
      }
    }
    let exponent = simplify(&Expr::Plus(exponent));
    let coefficient = simplify_times(rest);
    match groups.iter_mut().find(|(k, _)| *k == exponent) {
      Some(group) => group.1.push(coefficient),
      None => groups.push((exponent, vec![coefficient])),
    }
  }
  Some(
    groups
      .into_iter()
      .map(|(k, parts)| (k, simplify(&Expr::Plus(parts))))
      .collect(),
  )
}

/// `y' = p(x) y + q(x)` through the integrating factor `exp(-∫p)`.
fn linear_solution(
  p: &Expr,
  q: &Expr,
  independent: &str,
  constant: &Expr,
) -> Option<Expr> {
  let big_p = integrate(p, independent)?;
  let factor = simplify(&Expr::exp(Expr::neg(big_p.clone())));
  let integral =
    integrate(&simplify(&Expr::Times(vec![q.clone(), factor])), independent)?;
  Some(simplify(&Expr::Times(vec![
    Expr::exp(big_p),
    Expr::Plus(vec![integral, constant.clone()]),
  ])))
}

/// Solves `∫ dy/g(y) = ∫ f(x) dx + C1` for `y`.
fn separable_solution(
  f: &Expr,
  g: &Expr,
  independent: &str,
  constant: &Expr,
) -> Option<Expr> {
  let left = integrate(&Expr::pow(g.clone(), Expr::int(-1)), STATE_SYMBOL)?;
  let right = integrate(f, independent)?;
  let solved = solve_for(
    &left,
    &Expr::Plus(vec![right, constant.clone()]),
    STATE_SYMBOL,
  )
  .ok()?;
  if solved.mentions(STATE_SYMBOL) {
    return None;
  }
  Some(solved)
}

/// `y' = p(x) y + q(x) y^n` through `v = y^(1-n)`, which satisfies the
/// linear equation `v' = (1-n) p v + (1-n) q`.
fn bernoulli_solution(
  rhs: &Expr,
  independent: &str,
  constant: &Expr,
) -> Option<Expr> {
  let powers = state_powers(rhs)?;
  let (n, q) = powers.iter().find(|(k, _)| !k.is_one())?.clone();
  if n.is_zero() || powers.iter().any(|(k, _)| !k.is_one() && *k != n) {
    return None;
  }
  let p = powers
    .iter()
    .find(|(k, _)| k.is_one())
    .map_or_else(Expr::zero, |(_, c)| c.clone());
  let lowered = simplify(&Expr::Plus(vec![Expr::one(), Expr::neg(n)]));
  let v = linear_solution(
    &simplify(&Expr::Times(vec![lowered.clone(), p])),
    &simplify(&Expr::Times(vec![lowered.clone(), q])),
    independent,
    constant,
  )?;
  Some(simplify(&Expr::pow(v, Expr::pow(lowered, Expr::int(-1)))))
}
