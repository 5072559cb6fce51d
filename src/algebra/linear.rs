//! Coefficient extraction and equation solving over expressions.

use crate::algebra::numeric::to_f64;
use crate::algebra::simplify::{expand, simplify, simplify_plus, simplify_times};
use crate::algebra::AlgebraError;
use crate::syntax::{Constant, Expr};

/// Additive terms of an expression.
pub fn terms(expr: &Expr) -> Vec<Expr> {
  match expr {
    Expr::Plus(terms) => terms.clone(),
    e if e.is_zero() => Vec::new(),
    e => vec![e.clone()],
  }
}

/// Multiplicative factors of a term.
pub fn factors(expr: &Expr) -> Vec<Expr> {
  match expr {
    Expr::Times(factors) => factors.clone(),
    e => vec![e.clone()],
  }
}

/// Coefficient multiplying `target` in the expanded form of `expr`. Terms
/// where `target` occurs other than as a plain factor are ignored.
pub fn coefficient_of(expr: &Expr, target: &Expr) -> Expr {
  let parts = terms(&expand(expr))
    .iter()
    .filter_map(|term| linear_factor(term, target))
    .collect();
  simplify_plus(parts)
}

/// `c` when `term` is `c * target` with `c` free of `target`.
fn linear_factor(term: &Expr, target: &Expr) -> Option<Expr> {
  if term == target {
    return Some(Expr::one());
  }
  let Expr::Times(fs) = term else {
    return None;
  };
  let position = fs.iter().position(|f| f == target)?;
  let rest: Vec<Expr> = fs
    .iter()
    .enumerate()
    .filter(|(i, _)| *i != position)
    .map(|(_, f)| f.clone())
    .collect();
  if rest.iter().any(|f| f.contains(target)) {
    return None;
  }
  Some(simplify_times(rest))
}

/// Splits `expr` as `sum_i c_i * targets[i] + remainder`, failing when a
/// target occurs in any other way.
pub fn split_linear(
  expr: &Expr,
  targets: &[Expr],
) -> Result<(Vec<Expr>, Expr), AlgebraError> {
  let mut coefficients: Vec<Vec<Expr>> = vec![Vec::new(); targets.len()];
  let mut remainder = Vec::new();
  for term in terms(&expand(expr)) {
    let present: Vec<usize> = (0..targets.len())
      .filter(|&i| term.contains(&targets[i]))
      .collect();
    match present.as_slice() {
      [] => remainder.push(term),
      [i] => match linear_factor(&term, &targets[*i]) {
        Some(c) => coefficients[*i].push(c),
        None => return Err(AlgebraError::Nonlinear(targets[*i].to_string())),
      },
      many => {
        let names: Vec<String> =
          many.iter().map(|&i| targets[i].to_string()).collect();
        return Err(AlgebraError::Nonlinear(names.join(", ")));
      }
    }
  }
  Ok((
    coefficients.into_iter().map(simplify_plus).collect(),
    simplify_plus(remainder),
  ))
}

/// Coefficients of `expr` as a polynomial in `var`, lowest degree first,
/// with trailing zeros removed.
pub fn polynomial_coefficients(
  expr: &Expr,
  var: &str,
) -> Result<Vec<Expr>, AlgebraError> {
  let mut by_degree: Vec<Vec<Expr>> = Vec::new();
  for term in terms(&expand(expr)) {
    let (degree, coefficient) = monomial(&term, var).ok_or_else(|| {
      AlgebraError::Unsupported(format!(
        "{} is not polynomial in {}",
        term, var
      ))
    })?;
    if by_degree.len() <= degree {
      by_degree.resize(degree + 1, Vec::new());
    }
    by_degree[degree].push(coefficient);
  }
  let mut coefficients: Vec<Expr> =
    by_degree.into_iter().map(simplify_plus).collect();
  while coefficients.last().is_some_and(|c| c.is_zero()) {
    coefficients.pop();
  }
  Ok(coefficients)
}

fn monomial(term: &Expr, var: &str) -> Option<(usize, Expr)> {
  let mut degree = 0;
  let mut rest = Vec::new();
  for factor in factors(term) {
    match &factor {
      Expr::Identifier(name) if name == var => degree += 1,
      Expr::Power(base, exp) if **base == Expr::symbol(var) => {
        let n = exp.as_integer().filter(|n| *n >= 0)?;
        degree += n as usize;
      }
      f if f.mentions(var) => return None,
      _ => rest.push(factor.clone()),
    }
  }
  Some((degree, simplify_times(rest)))
}

/// Exact zero test with a numeric fallback for closed expressions that
/// simplification cannot cancel.
pub fn is_zero_expr(expr: &Expr) -> bool {
  let expanded = expand(expr);
  if expanded.is_zero() {
    return true;
  }
  // Exact rationals are already decided by `is_zero`
  if expanded.as_rational().is_some() {
    return false;
  }
  if expanded.free_symbols().is_empty() {
    if let Some(v) = to_f64(&expanded) {
      return v.abs() < 1e-12;
    }
  }
  false
}

fn reduce(expr: &Expr) -> Expr {
  let expanded = expand(expr);
  if is_zero_expr(&expanded) {
    Expr::zero()
  } else {
    expanded
  }
}

/// Solves `matrix * u = rhs` by Gauss–Jordan elimination. Overdetermined
/// systems are accepted when consistent; free unknowns are an error.
pub fn solve_linear_system(
  mut matrix: Vec<Vec<Expr>>,
  mut rhs: Vec<Expr>,
) -> Result<Vec<Expr>, AlgebraError> {
  let rows = matrix.len();
  let cols = matrix.first().map_or(0, |r| r.len());
  let mut pivot_of = vec![None; cols];
  let mut row = 0;

  for col in 0..cols {
    if row == rows {
      break;
    }
    // Prefer numeric pivots
    let pivot = (row..rows)
      .filter(|&r| !is_zero_expr(&matrix[r][col]))
      .min_by_key(|&r| usize::from(!matrix[r][col].is_numeric()));
    let Some(pivot) = pivot else {
      continue;
    };
    matrix.swap(row, pivot);
    rhs.swap(row, pivot);

    let inverse = simplify(&Expr::pow(matrix[row][col].clone(), Expr::int(-1)));
    for c in col..cols {
      matrix[row][c] =
        reduce(&Expr::Times(vec![matrix[row][c].clone(), inverse.clone()]));
    }
    rhs[row] = reduce(&Expr::Times(vec![rhs[row].clone(), inverse]));

    for r in 0..rows {
      if r == row || is_zero_expr(&matrix[r][col]) {
        continue;
      }
      let factor = matrix[r][col].clone();
      for c in col..cols {
        matrix[r][c] = reduce(&Expr::sub(
          matrix[r][c].clone(),
          Expr::Times(vec![factor.clone(), matrix[row][c].clone()]),
        ));
      }
      rhs[r] = reduce(&Expr::sub(
        rhs[r].clone(),
        Expr::Times(vec![factor, rhs[row].clone()]),
      ));
    }
    pivot_of[col] = Some(row);
    row += 1;
  }

  if let Some(r) = (row..rows).find(|&r| !is_zero_expr(&rhs[r])) {
    return Err(AlgebraError::Inconsistent(format!("0 = {}", rhs[r])));
  }
  pivot_of
    .iter()
    .enumerate()
    .map(|(col, pivot)| {
      pivot.map(|r| rhs[r].clone()).ok_or_else(|| {
        AlgebraError::Singular(format!("unknown {} is undetermined", col + 1))
      })
    })
    .collect()
}

/// Solves `lhs = rhs` for `symbol` by peeling operations off `lhs`.
pub fn solve_for(
  lhs: &Expr,
  rhs: &Expr,
  symbol: &str,
) -> Result<Expr, AlgebraError> {
  let unsupported = |e: &Expr| {
    AlgebraError::Unsupported(format!("cannot isolate {} in {}", symbol, e))
  };
  let mut lhs = simplify(lhs);
  let mut rhs = simplify(rhs);
  loop {
    if !lhs.mentions(symbol) {
      return Err(unsupported(&lhs));
    }
    lhs = match lhs {
      Expr::Identifier(name) if name == symbol => return Ok(rhs),
      Expr::Plus(terms) => {
        let (mut with, without): (Vec<Expr>, Vec<Expr>) =
          terms.into_iter().partition(|t| t.mentions(symbol));
        let rest = Expr::sub(rhs, Expr::Plus(without));
        if with.len() != 1 {
          // a*s + b with several terms in s
          let (coefficients, remainder) =
            split_linear(&Expr::Plus(with), &[Expr::symbol(symbol)])?;
          if remainder.mentions(symbol) {
            return Err(unsupported(&remainder));
          }
          return Ok(simplify(&Expr::div(
            Expr::sub(rest, remainder),
            coefficients[0].clone(),
          )));
        }
        rhs = simplify(&rest);
        with.remove(0)
      }
      Expr::Times(factors) => {
        let (mut with, without): (Vec<Expr>, Vec<Expr>) =
          factors.into_iter().partition(|f| f.mentions(symbol));
        if with.len() != 1 {
          return Err(unsupported(&Expr::Times(with)));
        }
        rhs = simplify(&Expr::div(rhs, Expr::Times(without)));
        with.remove(0)
      }
      Expr::Power(base, exp) => {
        if !exp.mentions(symbol) {
          rhs = simplify(&Expr::pow(rhs, Expr::pow(*exp, Expr::int(-1))));
          *base
        } else if *base == Expr::Constant(Constant::E) {
          rhs = simplify(&Expr::call("Log", rhs));
          *exp
        } else {
          return Err(unsupported(&Expr::Power(base, exp)));
        }
      }
      Expr::FunctionCall { name, mut args } if args.len() == 1 => {
        let inverse = match name.as_str() {
          "Log" => Expr::exp(rhs),
          "Tan" => Expr::call("ArcTan", rhs),
          "ArcTan" => Expr::call("Tan", rhs),
          _ => {
            return Err(unsupported(&Expr::FunctionCall { name, args }));
          }
        };
        rhs = simplify(&inverse);
        args.remove(0)
      }
      other => return Err(unsupported(&other)),
    };
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::syntax::expr_to_string;
  use num_bigint::BigInt;
  use num_rational::BigRational;

  fn x() -> Expr {
    Expr::symbol("x")
  }

  #[test]
  fn extracts_coefficients() {
    // (x + 1) * y'' + 3*y'' → (4 + x) y''
    let ypp = Expr::derivative("y", 2);
    let expr = Expr::Plus(vec![
      Expr::Times(vec![Expr::Plus(vec![x(), Expr::one()]), ypp.clone()]),
      Expr::Times(vec![Expr::int(3), ypp.clone()]),
    ]);
    assert_eq!(expr_to_string(&coefficient_of(&expr, &ypp)), "4 + x");
  }

  #[test]
  fn split_rejects_nonlinear_occurrences() {
    let y = Expr::derivative("y", 0);
    let expr = Expr::pow(y.clone(), Expr::int(2));
    assert!(split_linear(&expr, &[y]).is_err());
  }

  #[test]
  fn polynomial_coefficients_in_order() {
    let r = Expr::symbol("r");
    let expr = Expr::Plus(vec![
      Expr::pow(r.clone(), Expr::int(2)),
      Expr::Times(vec![Expr::int(-3), r]),
      Expr::int(2),
    ]);
    let coefficients = polynomial_coefficients(&expr, "r").unwrap();
    assert_eq!(coefficients, vec![Expr::int(2), Expr::int(-3), Expr::int(1)]);
  }

  #[test]
  fn solves_small_systems() {
    // a + b = 3, a - b = 1
    let matrix = vec![
      vec![Expr::int(1), Expr::int(1)],
      vec![Expr::int(1), Expr::int(-1)],
    ];
    let solution =
      solve_linear_system(matrix, vec![Expr::int(3), Expr::int(1)]).unwrap();
    assert_eq!(solution, vec![Expr::int(2), Expr::int(1)]);
  }

  #[test]
  fn tiny_exact_rationals_are_not_zero() {
    let tiny =
      Expr::Number(BigRational::new(BigInt::from(1), BigInt::from(10).pow(30)));
    assert!(!is_zero_expr(&tiny));
    assert!(is_zero_expr(&Expr::Real(1e-14)));

    // pivots of 1e-30 are kept
    let matrix = vec![vec![tiny.clone()]];
    let solution = solve_linear_system(matrix, vec![tiny]).unwrap();
    assert_eq!(solution, vec![Expr::int(1)]);
  }

  #[test]
  fn detects_singular_systems() {
    let matrix = vec![vec![Expr::int(1), Expr::int(1)]];
    assert!(matches!(
      solve_linear_system(matrix, vec![Expr::int(1)]),
      Err(AlgebraError::Singular(_))
    ));
  }

  #[test]
  fn inverts_reciprocals() {
    // -1/s = x + C1
    let s = Expr::symbol("s");
    let lhs = Expr::neg(Expr::pow(s, Expr::int(-1)));
    let rhs = Expr::Plus(vec![x(), Expr::symbol("C1")]);
    let solved = solve_for(&lhs, &rhs, "s").unwrap();
    assert_eq!(expr_to_string(&solved), "-1/(C1 + x)");
  }
}
