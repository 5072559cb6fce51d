//! Canonical simplification and expansion.
//!
//! `simplify` brings an expression into canonical form: sums and products
//! are flattened, numbers folded, like terms and like bases collected and
//! operands sorted. Two expressions that are equal after `simplify` are
//! treated as symbolically equal everywhere in the crate.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::syntax::{display_negation, expr_to_string, Constant, Expr};

/// Largest integer power of a sum that `expand` multiplies out.
const MAX_EXPANDED_POWER: i64 = 12;

/// Re-simplification passes allowed when folding powers in a product.
const MAX_TIMES_PASSES: usize = 4;

// ─── Coefficients ──────────────────────────────────────────────────────

/// Coefficient: either exact rational or approximate real
#[derive(Clone, Debug)]
pub(crate) enum Coeff {
  Exact(BigRational),
  Real(f64),
}

impl Coeff {
  pub(crate) fn one() -> Coeff {
    Coeff::Exact(BigRational::one())
  }

  pub(crate) fn zero() -> Coeff {
    Coeff::Exact(BigRational::zero())
  }

  pub(crate) fn from_expr(e: &Expr) -> Option<Coeff> {
    match e {
      Expr::Number(r) => Some(Coeff::Exact(r.clone())),
      Expr::Real(f) => Some(Coeff::Real(*f)),
      _ => None,
    }
  }

  pub(crate) fn is_zero(&self) -> bool {
    match self {
      Coeff::Exact(r) => r.is_zero(),
      Coeff::Real(f) => *f == 0.0,
    }
  }

  fn is_one(&self) -> bool {
    match self {
      Coeff::Exact(r) => r.is_one(),
      Coeff::Real(f) => *f == 1.0,
    }
  }

  fn to_f64(&self) -> f64 {
    match self {
      Coeff::Exact(r) => r.to_f64().unwrap_or(f64::NAN),
      Coeff::Real(f) => *f,
    }
  }

  fn add(&self, other: &Coeff) -> Coeff {
    match (self, other) {
      (Coeff::Exact(a), Coeff::Exact(b)) => Coeff::Exact(a + b),
      _ => Coeff::Real(self.to_f64() + other.to_f64()),
    }
  }

  fn mul(&self, other: &Coeff) -> Coeff {
    match (self, other) {
      (Coeff::Exact(a), Coeff::Exact(b)) => Coeff::Exact(a * b),
      _ => Coeff::Real(self.to_f64() * other.to_f64()),
    }
  }

  pub(crate) fn to_expr(&self) -> Expr {
    match self {
      Coeff::Exact(r) => Expr::Number(r.clone()),
      Coeff::Real(f) => Expr::Real(*f),
    }
  }
}

/// Decompose a term into (coefficient, rest).
/// `3*x` → (3, x), `x` → (1, x), `-x*y` → (-1, x*y).
pub(crate) fn decompose_term(term: &Expr) -> (Coeff, Expr) {
  if let Expr::Times(factors) = term {
    if let Some(c) = factors.first().and_then(Coeff::from_expr) {
      let rest = match &factors[1..] {
        [] => Expr::one(),
        [single] => single.clone(),
        many => Expr::Times(many.to_vec()),
      };
      return (c, rest);
    }
  }
  (Coeff::one(), term.clone())
}

fn with_coefficient(c: Coeff, rest: Expr) -> Expr {
  if c.is_one() {
    return rest;
  }
  match rest {
    Expr::Times(mut factors) => {
      factors.insert(0, c.to_expr());
      Expr::Times(factors)
    }
    other => Expr::Times(vec![c.to_expr(), other]),
  }
}

// ─── Simplify ──────────────────────────────────────────────────────────

pub fn simplify(expr: &Expr) -> Expr {
  match expr {
    Expr::Plus(args) => simplify_plus(args.iter().map(simplify).collect()),
    Expr::Times(args) => simplify_times(args.iter().map(simplify).collect()),
    Expr::Power(base, exp) => simplify_power(simplify(base), simplify(exp)),
    Expr::FunctionCall { name, args } => {
      simplify_function(name, args.iter().map(simplify).collect())
    }
    other => other.clone(),
  }
}

/// `-expr` in canonical form.
pub fn negate(expr: Expr) -> Expr {
  simplify_times(vec![Expr::int(-1), expr])
}

/// Sum of already-canonical terms.
pub(crate) fn simplify_plus(args: Vec<Expr>) -> Expr {
  let mut flat = Vec::with_capacity(args.len());
  for arg in args {
    match arg {
      Expr::Plus(inner) => flat.extend(inner),
      other => flat.push(other),
    }
  }

  let mut constant = Coeff::zero();
  let mut groups: Vec<(String, Expr, Coeff)> = Vec::new();
  let mut index: BTreeMap<String, usize> = BTreeMap::new();
  for term in flat {
    if let Some(c) = Coeff::from_expr(&term) {
      constant = constant.add(&c);
      continue;
    }
    let (c, rest) = decompose_term(&term);
    let key = expr_to_string(&rest);
    if let Some(&idx) = index.get(&key) {
      groups[idx].2 = groups[idx].2.add(&c);
    } else {
      index.insert(key.clone(), groups.len());
      groups.push((key, rest, c));
    }
  }
  groups.sort_by(|a, b| a.0.cmp(&b.0));

  let mut terms = Vec::new();
  if !constant.is_zero() {
    terms.push(constant.to_expr());
  }
  for (_, rest, c) in groups {
    if c.is_zero() {
      continue; // terms cancelled
    }
    terms.push(with_coefficient(c, rest));
  }
  match terms.len() {
    0 => constant.to_expr(),
    1 => terms.remove(0),
    _ => Expr::Plus(terms),
  }
}

/// Product of already-canonical factors.
pub(crate) fn simplify_times(args: Vec<Expr>) -> Expr {
  simplify_times_pass(args, 0)
}

fn simplify_times_pass(args: Vec<Expr>, pass: usize) -> Expr {
  let mut flat = Vec::with_capacity(args.len());
  for arg in args {
    match arg {
      Expr::Times(inner) => flat.extend(inner),
      other => flat.push(other),
    }
  }

  let mut coefficient = Coeff::one();
  let mut factors = Vec::new();
  for factor in flat {
    match Coeff::from_expr(&factor) {
      Some(c) => coefficient = coefficient.mul(&c),
      None => factors.push(factor),
    }
  }
  if let Coeff::Exact(r) = &coefficient {
    if r.is_zero() {
      return Expr::zero();
    }
  }

  // x^a * x^b → x^(a+b)
  let mut groups: Vec<(String, Expr, Vec<Expr>)> = Vec::new();
  for factor in factors {
    let (base, exp) = base_exponent(factor);
    let key = expr_to_string(&base);
    match groups.iter_mut().find(|(k, _, _)| *k == key) {
      Some(group) => group.2.push(exp),
      None => groups.push((key, base, vec![exp])),
    }
  }

  let mut combined = Vec::new();
  let mut unfolded = false;
  for (_, base, mut exponents) in groups {
    let exp = if exponents.len() == 1 {
      exponents.remove(0)
    } else {
      simplify_plus(exponents)
    };
    match simplify_power(base, exp) {
      Expr::Times(inner) => {
        unfolded = true;
        for factor in inner {
          match Coeff::from_expr(&factor) {
            Some(c) => coefficient = coefficient.mul(&c),
            None => combined.push(factor),
          }
        }
      }
      power => match Coeff::from_expr(&power) {
        Some(c) => coefficient = coefficient.mul(&c),
        None => combined.push(power),
      },
    }
  }

  if unfolded && pass < MAX_TIMES_PASSES {
    combined.push(coefficient.to_expr());
    return simplify_times_pass(combined, pass + 1);
  }

  if coefficient.is_zero() {
    return coefficient.to_expr();
  }
  combined.sort_by(compare_factors);
  if !coefficient.is_one() {
    combined.insert(0, coefficient.to_expr());
  }
  match combined.len() {
    0 => Expr::one(),
    1 => combined.remove(0),
    _ => Expr::Times(combined),
  }
}

fn base_exponent(factor: Expr) -> (Expr, Expr) {
  match factor {
    Expr::Power(base, exp) => (*base, *exp),
    other => (other, Expr::one()),
  }
}

/// Numeric radicals first, then symbols, the dependent function, sums,
/// function calls and exponentials.
fn factor_rank(e: &Expr) -> u8 {
  let base = match e {
    Expr::Power(base, _) => base.as_ref(),
    other => other,
  };
  match base {
    Expr::Number(_) | Expr::Real(_) | Expr::Constant(Constant::Pi) => 0,
    Expr::Identifier(_) => 1,
    Expr::Derivative { .. } => 2,
    Expr::Plus(_) => 3,
    Expr::FunctionCall { .. } => 4,
    Expr::Constant(Constant::E) => 5,
    _ => 6,
  }
}

fn compare_factors(a: &Expr, b: &Expr) -> Ordering {
  let base_key = |e: &Expr| match e {
    Expr::Power(base, _) => expr_to_string(base),
    other => expr_to_string(other),
  };
  factor_rank(a)
    .cmp(&factor_rank(b))
    .then_with(|| base_key(a).cmp(&base_key(b)))
    .then_with(|| expr_to_string(a).cmp(&expr_to_string(b)))
}

/// `base^exp` for already-canonical operands.
pub(crate) fn simplify_power(base: Expr, exp: Expr) -> Expr {
  if exp.is_zero() {
    return Expr::one();
  }
  if exp.is_one() || base.is_one() {
    return base;
  }

  if let (Expr::Number(b), Expr::Number(e)) = (&base, &exp) {
    if let Some(result) = exact_power(b, e) {
      return result;
    }
    return Expr::pow(base.clone(), exp.clone());
  }
  if base.is_numeric() && exp.is_numeric() {
    let value = numeric_value(&base).powf(numeric_value(&exp));
    if value.is_nan() {
      return Expr::pow(base, exp);
    }
    return Expr::Real(value);
  }

  match base {
    Expr::Power(inner_base, inner_exp) => {
      let positive_base = match inner_base.as_ref() {
        Expr::Constant(Constant::E) => true,
        Expr::Number(r) => r.is_positive(),
        _ => false,
      };
      if exp.as_integer().is_some() || positive_base {
        simplify_power(*inner_base, simplify_times(vec![*inner_exp, exp]))
      } else {
        Expr::pow(Expr::Power(inner_base, inner_exp), exp)
      }
    }
    Expr::Times(factors) if exp.as_integer().is_some() => simplify_times(
      factors
        .into_iter()
        .map(|f| simplify_power(f, exp.clone()))
        .collect(),
    ),
    Expr::Constant(Constant::E) => exp_of(exp),
    other => Expr::pow(other, exp),
  }
}

fn numeric_value(e: &Expr) -> f64 {
  match e {
    Expr::Number(r) => r.to_f64().unwrap_or(f64::NAN),
    Expr::Real(f) => *f,
    _ => f64::NAN,
  }
}

fn rational_pow(base: &BigRational, k: i32) -> Option<BigRational> {
  if base.is_zero() && k < 0 {
    return None;
  }
  let n = k.unsigned_abs() as usize;
  let numer = num_traits::pow(base.numer().clone(), n);
  let denom = num_traits::pow(base.denom().clone(), n);
  Some(if k >= 0 {
    BigRational::new(numer, denom)
  } else {
    BigRational::new(denom, numer)
  })
}

fn exact_power(base: &BigRational, exp: &BigRational) -> Option<Expr> {
  if base.is_zero() {
    return if exp.is_positive() {
      Some(Expr::zero())
    } else {
      None
    };
  }
  if exp.is_integer() {
    let k = exp.to_integer().to_i32()?;
    if k.abs() > 4096 {
      return None;
    }
    return rational_pow(base, k).map(Expr::Number);
  }
  rational_root(base, exp.numer(), exp.denom())
}

/// `base^(p/q)` with perfect powers pulled out of the radical and the
/// denominator rationalized: `8^(1/2)` → `2*sqrt(2)`, `(1/2)^(1/2)` →
/// `sqrt(2)/2`.
fn rational_root(base: &BigRational, p: &BigInt, q: &BigInt) -> Option<Expr> {
  let q = q.to_u32()?;
  if q > 64 {
    return None;
  }
  let (whole, r) = p.div_mod_floor(&BigInt::from(q));
  let whole = whole.to_i32()?;
  let r = r.to_u32()?;

  let mut coefficient = rational_pow(base, whole)?;
  if base.is_negative() {
    if q % 2 == 0 {
      return None;
    }
    if r % 2 == 1 {
      coefficient = -coefficient;
    }
  }
  let magnitude = base.abs();
  let (numer_out, numer_in) = extract_power(magnitude.numer(), q);
  let (denom_out, denom_in) = extract_power(magnitude.denom(), q);
  coefficient *= BigRational::new(
    num_traits::pow(numer_out, r as usize),
    num_traits::pow(denom_out, r as usize),
  );

  let mut factors = Vec::new();
  if !numer_in.is_one() {
    factors.push(Expr::pow(
      Expr::Number(BigRational::from_integer(numer_in)),
      Expr::Number(BigRational::new(BigInt::from(r), BigInt::from(q))),
    ));
  }
  if !denom_in.is_one() {
    coefficient /= BigRational::from_integer(denom_in.clone());
    factors.push(Expr::pow(
      Expr::Number(BigRational::from_integer(denom_in)),
      Expr::Number(BigRational::new(BigInt::from(q - r), BigInt::from(q))),
    ));
  }

  if factors.is_empty() {
    return Some(Expr::Number(coefficient));
  }
  if !coefficient.is_one() {
    factors.insert(0, Expr::Number(coefficient));
  }
  Some(if factors.len() == 1 {
    factors.remove(0)
  } else {
    Expr::Times(factors)
  })
}

/// Splits `n = outside^q * inside` by trial division.
fn extract_power(n: &BigInt, q: u32) -> (BigInt, BigInt) {
  let mut outside = BigInt::one();
  let mut inside = BigInt::one();
  let mut rest = n.clone();
  let mut d = BigInt::from(2u32);
  let limit = BigInt::from(100_000u32);
  while &d * &d <= rest && d <= limit {
    let mut count = 0u32;
    while (&rest % &d).is_zero() {
      rest /= &d;
      count += 1;
    }
    outside *= num_traits::pow(d.clone(), (count / q) as usize);
    inside *= num_traits::pow(d.clone(), (count % q) as usize);
    d += 1u32;
  }
  inside *= rest;
  (outside, inside)
}

fn is_log(e: &Expr) -> bool {
  matches!(e, Expr::FunctionCall { name, args } if name == "Log" && args.len() == 1)
}

fn has_log_factor(term: &Expr) -> bool {
  match term {
    Expr::Times(factors) => factors.iter().filter(|f| is_log(f)).count() == 1,
    other => is_log(other),
  }
}

/// `E^exp`, folding logarithms: `E^(c*Log(z))` → `z^c`.
fn exp_of(exp: Expr) -> Expr {
  match exp {
    Expr::Real(v) => Expr::Real(v.exp()),
    Expr::FunctionCall { name, mut args } if name == "Log" && args.len() == 1 => {
      args.remove(0)
    }
    Expr::Times(factors) if has_log_factor(&Expr::Times(factors.clone())) => {
      let mut argument = Expr::one();
      let mut rest = Vec::new();
      for factor in factors {
        match factor {
          Expr::FunctionCall { name, mut args }
            if name == "Log" && args.len() == 1 =>
          {
            argument = args.remove(0);
          }
          other => rest.push(other),
        }
      }
      simplify_power(argument, simplify_times(rest))
    }
    Expr::Plus(terms) if terms.iter().any(has_log_factor) => {
      let (logs, others): (Vec<Expr>, Vec<Expr>) =
        terms.into_iter().partition(has_log_factor);
      let mut factors: Vec<Expr> = logs.into_iter().map(exp_of).collect();
      factors.push(exp_of(simplify_plus(others)));
      simplify_times(factors)
    }
    other => Expr::exp(other),
  }
}

pub(crate) fn simplify_function(name: &str, args: Vec<Expr>) -> Expr {
  if args.len() == 1 {
    let arg = &args[0];
    if let Expr::Real(v) = arg {
      if let Some(value) = eval_function(name, *v) {
        return Expr::Real(value);
      }
    }
    if let Some(value) = quarter_turn_value(name, arg) {
      return value;
    }
    match name {
      "Sin" | "Tan" | "Sinh" | "Tanh" | "ArcTan" => {
        if arg.is_zero() {
          return Expr::zero();
        }
        if let Some(positive) = display_negation(arg) {
          return negate(simplify_function(name, vec![positive]));
        }
      }
      "Cos" | "Cosh" => {
        if arg.is_zero() {
          return Expr::one();
        }
        if let Some(positive) = display_negation(arg) {
          return simplify_function(name, vec![positive]);
        }
      }
      "Log" => {
        if arg.is_one() {
          return Expr::zero();
        }
        if *arg == Expr::Constant(Constant::E) {
          return Expr::one();
        }
        if let Expr::Power(base, exp) = arg {
          if **base == Expr::Constant(Constant::E) {
            return (**exp).clone();
          }
        }
      }
      "Abs" => {
        if let Expr::Number(r) = arg {
          return Expr::Number(r.abs());
        }
        if let Some(positive) = display_negation(arg) {
          return simplify_function(name, vec![positive]);
        }
      }
      _ => {}
    }
  }
  Expr::FunctionCall {
    name: name.to_string(),
    args,
  }
}

/// Exact `sin`, `cos` and `tan` at integer multiples of `pi/2`.
fn quarter_turn_value(name: &str, arg: &Expr) -> Option<Expr> {
  if !matches!(name, "Sin" | "Cos" | "Tan") {
    return None;
  }
  let halves = pi_multiple(arg)? * BigInt::from(2);
  if !halves.is_integer() {
    return None;
  }
  let quarter = halves.to_integer().mod_floor(&BigInt::from(4)).to_i64()?;
  let value = match (name, quarter) {
    ("Sin", 1) | ("Cos", 0) => 1,
    ("Sin", 3) | ("Cos", 2) => -1,
    ("Sin" | "Cos", _) => 0,
    ("Tan", 0 | 2) => 0,
    // poles of tan
    _ => return None,
  };
  Some(Expr::int(value))
}

/// `r` for `r*pi` with rational `r`.
fn pi_multiple(arg: &Expr) -> Option<BigRational> {
  match arg {
    Expr::Constant(Constant::Pi) => Some(BigRational::one()),
    Expr::Times(factors) if factors.len() == 2 => {
      match (&factors[0], &factors[1]) {
        (Expr::Number(r), Expr::Constant(Constant::Pi))
        | (Expr::Constant(Constant::Pi), Expr::Number(r)) => Some(r.clone()),
        _ => None,
      }
    }
    _ => None,
  }
}

pub(crate) fn eval_function(name: &str, v: f64) -> Option<f64> {
  let value = match name {
    "Sin" => v.sin(),
    "Cos" => v.cos(),
    "Tan" => v.tan(),
    "Sinh" => v.sinh(),
    "Cosh" => v.cosh(),
    "Tanh" => v.tanh(),
    "ArcTan" => v.atan(),
    "Log" => v.ln(),
    "Abs" => v.abs(),
    _ => return None,
  };
  if value.is_nan() {
    None
  } else {
    Some(value)
  }
}

// ─── Expand ────────────────────────────────────────────────────────────

/// Distributes products over sums and multiplies out small positive integer
/// powers of sums.
pub fn expand(expr: &Expr) -> Expr {
  expand_canonical(&simplify(expr))
}

fn expand_canonical(expr: &Expr) -> Expr {
  match expr {
    Expr::Plus(terms) => {
      simplify_plus(terms.iter().map(expand_canonical).collect())
    }
    Expr::Times(factors) => {
      distribute(factors.iter().map(expand_canonical).collect())
    }
    Expr::Power(base, exp) => {
      let base = expand_canonical(base);
      let exp = expand_canonical(exp);
      if let (Expr::Plus(_), Some(n)) = (&base, exp.as_integer()) {
        if (2..=MAX_EXPANDED_POWER).contains(&n) {
          return distribute(vec![base; n as usize]);
        }
      }
      simplify_power(base, exp)
    }
    Expr::FunctionCall { name, args } => {
      simplify_function(name, args.iter().map(expand_canonical).collect())
    }
    other => other.clone(),
  }
}

fn distribute(factors: Vec<Expr>) -> Expr {
  let mut products: Vec<Vec<Expr>> = vec![Vec::new()];
  for factor in factors {
    match factor {
      Expr::Plus(terms) => {
        products = products
          .iter()
          .flat_map(|p| {
            terms.iter().map(move |t| {
              let mut next = p.clone();
              next.push(t.clone());
              next
            })
          })
          .collect();
      }
      other => {
        for p in &mut products {
          p.push(other.clone());
        }
      }
    }
  }
  simplify_plus(products.into_iter().map(simplify_times).collect())
}
