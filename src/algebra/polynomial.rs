//! Univariate polynomials over the rationals and their roots.
//!
//! Roots are found exactly whenever possible: the polynomial is split into
//! square-free factors, rational roots are divided out, and what is left of
//! degree two is solved with surds. Only irreducible factors of degree
//! three or more fall back to a numeric search.

use std::collections::BTreeSet;
use std::fmt;

use num_bigint::BigInt;
use num_complex::Complex64;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::algebra::simplify::{negate, simplify};
use crate::algebra::AlgebraError;
use crate::syntax::{display_negation, Expr};

/// Largest constant or leading coefficient whose divisors are enumerated
/// during the rational-root search.
const MAX_DIVISOR_SEARCH: u64 = 1_000_000_000_000;

const DURAND_KERNER_ITERATIONS: usize = 1000;

/// Imaginary parts below this (relative to the root's magnitude) are zero.
const IMAGINARY_TOLERANCE: f64 = 1e-9;

/// Dense polynomial, lowest degree first, without trailing zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
  coefficients: Vec<BigRational>,
}

impl Polynomial {
  pub fn new(mut coefficients: Vec<BigRational>) -> Self {
    while coefficients.last().is_some_and(|c| c.is_zero()) {
      coefficients.pop();
    }
    Polynomial { coefficients }
  }

  /// Converts numeric coefficient expressions. Symbolic coefficients are
  /// rejected.
  pub fn from_exprs(coefficients: &[Expr]) -> Result<Self, AlgebraError> {
    let exact = coefficients
      .iter()
      .map(|c| match simplify(c) {
        Expr::Number(r) => Ok(r),
        Expr::Real(f) => BigRational::from_float(f).ok_or_else(|| {
          AlgebraError::Unsupported(format!("coefficient {}", f))
        }),
        other => Err(AlgebraError::Unsupported(format!(
          "symbolic coefficient {}",
          other
        ))),
      })
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Polynomial::new(exact))
  }

  pub fn coefficients(&self) -> &[BigRational] {
    &self.coefficients
  }

  /// `None` for the zero polynomial.
  pub fn degree(&self) -> Option<usize> {
    self.coefficients.len().checked_sub(1)
  }

  pub fn is_zero(&self) -> bool {
    self.coefficients.is_empty()
  }

  fn is_constant(&self) -> bool {
    self.coefficients.len() <= 1
  }

  fn leading(&self) -> BigRational {
    self
      .coefficients
      .last()
      .cloned()
      .unwrap_or_else(BigRational::zero)
  }

  pub fn eval(&self, x: &BigRational) -> BigRational {
    self
      .coefficients
      .iter()
      .rev()
      .fold(BigRational::zero(), |acc, c| acc * x + c)
  }

  pub fn derivative(&self) -> Polynomial {
    Polynomial::new(
      self
        .coefficients
        .iter()
        .enumerate()
        .skip(1)
        .map(|(k, c)| c * BigRational::from_integer(BigInt::from(k)))
        .collect(),
    )
  }

  pub fn monic(&self) -> Polynomial {
    let leading = self.leading();
    if leading.is_zero() {
      return self.clone();
    }
    Polynomial::new(self.coefficients.iter().map(|c| c / &leading).collect())
  }

  fn sub(&self, other: &Polynomial) -> Polynomial {
    let n = self.coefficients.len().max(other.coefficients.len());
    let zero = BigRational::zero();
    Polynomial::new(
      (0..n)
        .map(|k| {
          self.coefficients.get(k).unwrap_or(&zero)
            - other.coefficients.get(k).unwrap_or(&zero)
        })
        .collect(),
    )
  }

  /// Quotient and remainder. Division by zero yields `(0, self)`.
  pub fn div_rem(&self, divisor: &Polynomial) -> (Polynomial, Polynomial) {
    let Some(d) = divisor.degree() else {
      return (Polynomial::new(Vec::new()), self.clone());
    };
    let lead = divisor.leading();
    let mut remainder = self.coefficients.clone();
    let mut quotient = vec![BigRational::zero(); remainder.len().saturating_sub(d)];
    while remainder.len() > d {
      let k = remainder.len() - 1 - d;
      let factor = remainder[remainder.len() - 1].clone() / &lead;
      for (i, c) in divisor.coefficients.iter().enumerate() {
        remainder[k + i] -= &factor * c;
      }
      quotient[k] = factor;
      remainder.pop();
    }
    (Polynomial::new(quotient), Polynomial::new(remainder))
  }

  /// Monic greatest common divisor.
  pub fn gcd(&self, other: &Polynomial) -> Polynomial {
    let mut a = self.clone();
    let mut b = other.clone();
    while !b.is_zero() {
      let (_, r) = a.div_rem(&b);
      a = b;
      b = r;
    }
    a.monic()
  }

  /// Yun's algorithm: pairs `(factor, multiplicity)` of monic square-free
  /// factors whose product is the monic form of `self`.
  pub fn square_free_decomposition(&self) -> Vec<(Polynomial, usize)> {
    let mut factors = Vec::new();
    if self.is_constant() {
      return factors;
    }
    let f = self.monic();
    let df = f.derivative();
    let a0 = f.gcd(&df);
    let mut b = f.div_rem(&a0).0;
    let c = df.div_rem(&a0).0;
    let mut d = c.sub(&b.derivative());
    let mut multiplicity = 1;
    while !b.is_constant() {
      let a = b.gcd(&d);
      let next_b = b.div_rem(&a).0;
      let next_c = d.div_rem(&a).0;
      d = next_c.sub(&next_b.derivative());
      b = next_b;
      if !a.is_constant() {
        factors.push((a, multiplicity));
      }
      multiplicity += 1;
    }
    factors
  }

  /// Expression in `var`, highest power first, left unsimplified so the
  /// display order survives.
  pub fn to_expr(&self, var: &str) -> Expr {
    let x = Expr::symbol(var);
    let mut terms = Vec::new();
    for (k, c) in self.coefficients.iter().enumerate().rev() {
      if c.is_zero() {
        continue;
      }
      let power = match k {
        0 => None,
        1 => Some(x.clone()),
        _ => Some(Expr::pow(x.clone(), Expr::int(k as i64))),
      };
      terms.push(match power {
        None => Expr::Number(c.clone()),
        Some(p) if c.is_one() => p,
        Some(p) => Expr::Times(vec![Expr::Number(c.clone()), p]),
      });
    }
    match terms.len() {
      0 => Expr::zero(),
      1 => terms.remove(0),
      _ => Expr::Plus(terms),
    }
  }
}

// ─── Roots ─────────────────────────────────────────────────────────────

/// Root `re + im*i`; real roots have `im = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgebraicRoot {
  pub re: Expr,
  pub im: Expr,
}

impl AlgebraicRoot {
  pub fn real(re: Expr) -> Self {
    AlgebraicRoot {
      re,
      im: Expr::zero(),
    }
  }

  pub fn complex(re: Expr, im: Expr) -> Self {
    AlgebraicRoot { re, im }
  }

  pub fn is_real(&self) -> bool {
    self.im.is_zero()
  }

  pub fn conjugate(&self) -> Self {
    AlgebraicRoot {
      re: self.re.clone(),
      im: negate(self.im.clone()),
    }
  }
}

impl fmt::Display for AlgebraicRoot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_real() {
      return write!(f, "{}", self.re);
    }
    let (sign, magnitude) = match display_negation(&self.im) {
      Some(positive) => ("-", positive),
      None => ("+", self.im.clone()),
    };
    let imaginary = if magnitude.is_one() {
      "i".to_string()
    } else {
      format!("{}*i", magnitude)
    };
    if self.re.is_zero() {
      let sign = if sign == "-" { "-" } else { "" };
      write!(f, "{}{}", sign, imaginary)
    } else {
      write!(f, "{} {} {}", self.re, sign, imaginary)
    }
  }
}

/// All roots of the polynomial with ascending coefficients `coefficients`,
/// each repeated according to its multiplicity.
pub fn polynomial_roots(
  coefficients: &[Expr],
) -> Result<Vec<AlgebraicRoot>, AlgebraError> {
  let poly = Polynomial::from_exprs(coefficients)?;
  let mut roots = Vec::new();
  for (factor, multiplicity) in poly.square_free_decomposition() {
    for root in square_free_roots(factor)? {
      roots.extend(std::iter::repeat(root).take(multiplicity));
    }
  }
  Ok(roots)
}

fn square_free_roots(
  mut poly: Polynomial,
) -> Result<Vec<AlgebraicRoot>, AlgebraError> {
  let mut roots = Vec::new();
  for r in rational_roots(&poly) {
    roots.push(AlgebraicRoot::real(Expr::Number(r.clone())));
    let linear = Polynomial::new(vec![-r, BigRational::one()]);
    poly = poly.div_rem(&linear).0;
  }
  match poly.degree() {
    None | Some(0) => {}
    Some(1) => {
      let c = poly.coefficients();
      roots.push(AlgebraicRoot::real(Expr::Number(-&c[0] / &c[1])));
    }
    Some(2) => roots.extend(quadratic_roots(&poly)),
    Some(_) => roots.extend(numeric_roots(&poly)?),
  }
  Ok(roots)
}

/// Rational roots by the rational-root theorem. Empty if the coefficients
/// are too large to enumerate divisors.
fn rational_roots(poly: &Polynomial) -> Vec<BigRational> {
  let Some(integers) = integer_coefficients(poly) else {
    return Vec::new();
  };
  let mut found = Vec::new();
  let leading_zeros = integers.iter().take_while(|c| c.is_zero()).count();
  if leading_zeros > 0 {
    found.push(BigRational::zero());
  }
  let integers = &integers[leading_zeros..];
  let (Some(constant), Some(leading)) = (integers.first(), integers.last())
  else {
    return found;
  };
  if integers.len() < 2 {
    return found;
  }
  let (Some(ps), Some(qs)) = (divisors(constant), divisors(leading)) else {
    return found;
  };
  let mut candidates = BTreeSet::new();
  for p in &ps {
    for q in &qs {
      let r = BigRational::new(p.clone(), q.clone());
      candidates.insert(-r.clone());
      candidates.insert(r);
    }
  }
  found.extend(candidates.into_iter().filter(|r| poly.eval(r).is_zero()));
  found
}

fn integer_coefficients(poly: &Polynomial) -> Option<Vec<BigInt>> {
  if poly.is_zero() {
    return None;
  }
  let lcm = poly
    .coefficients()
    .iter()
    .fold(BigInt::one(), |acc, c| acc.lcm(c.denom()));
  Some(
    poly
      .coefficients()
      .iter()
      .map(|c| (c * BigRational::from_integer(lcm.clone())).to_integer())
      .collect(),
  )
}

fn divisors(n: &BigInt) -> Option<Vec<BigInt>> {
  let n = n.abs().to_u64().filter(|v| *v <= MAX_DIVISOR_SEARCH)?;
  let mut out = Vec::new();
  let mut d: u64 = 1;
  while d * d <= n {
    if n % d == 0 {
      out.push(BigInt::from(d));
      if d != n / d {
        out.push(BigInt::from(n / d));
      }
    }
    d += 1;
  }
  Some(out)
}

/// Exact roots of `a x^2 + b x + c` with irrational or complex roots.
fn quadratic_roots(poly: &Polynomial) -> Vec<AlgebraicRoot> {
  let c = &poly.coefficients()[0];
  let b = &poly.coefficients()[1];
  let a = &poly.coefficients()[2];
  let two_a = a * BigRational::from_integer(BigInt::from(2));
  let four = BigRational::from_integer(BigInt::from(4));
  let discriminant = b * b - four * a * c;
  let re = Expr::Number(-b / &two_a);
  let radical = |d: BigRational| {
    simplify(&Expr::Times(vec![
      Expr::Number(BigRational::one() / two_a.abs()),
      Expr::sqrt(Expr::Number(d)),
    ]))
  };
  if discriminant.is_negative() {
    let im = radical(-discriminant);
    vec![
      AlgebraicRoot::complex(re.clone(), im.clone()),
      AlgebraicRoot::complex(re, negate(im)),
    ]
  } else {
    let offset = radical(discriminant);
    vec![
      AlgebraicRoot::real(simplify(&Expr::Plus(vec![
        re.clone(),
        negate(offset.clone()),
      ]))),
      AlgebraicRoot::real(simplify(&Expr::Plus(vec![re, offset]))),
    ]
  }
}

/// Durand–Kerner iteration. Near-real roots are snapped to the real axis
/// and complex roots are returned as conjugate pairs.
fn numeric_roots(poly: &Polynomial) -> Result<Vec<AlgebraicRoot>, AlgebraError> {
  let coefficients: Vec<f64> = poly
    .monic()
    .coefficients()
    .iter()
    .map(|c| c.to_f64().unwrap_or(f64::NAN))
    .collect();
  let n = coefficients.len() - 1;
  let eval = |z: Complex64| {
    coefficients
      .iter()
      .rev()
      .fold(Complex64::new(0.0, 0.0), |acc, c| acc * z + *c)
  };

  let seed = Complex64::new(0.4, 0.9);
  let mut estimates: Vec<Complex64> = (0..n).map(|k| seed.powu(k as u32)).collect();
  let mut converged = false;
  for _ in 0..DURAND_KERNER_ITERATIONS {
    let mut change: f64 = 0.0;
    let mut scale: f64 = 1.0;
    for i in 0..n {
      let mut denominator = Complex64::new(1.0, 0.0);
      for j in 0..n {
        if i != j {
          denominator *= estimates[i] - estimates[j];
        }
      }
      let step = eval(estimates[i]) / denominator;
      estimates[i] -= step;
      change = change.max(step.norm());
      scale = scale.max(estimates[i].norm());
    }
    if !change.is_finite() {
      break;
    }
    if change <= 1e-14 * scale {
      converged = true;
      break;
    }
  }
  if !converged {
    return Err(AlgebraError::RootSearch(format!(
      "no convergence for degree {} factor",
      n
    )));
  }

  let mut real = Vec::new();
  let mut upper = Vec::new();
  let mut lower = 0;
  for z in estimates {
    if z.im.abs() <= IMAGINARY_TOLERANCE * (1.0 + z.norm()) {
      real.push(z.re + 0.0);
    } else if z.im > 0.0 {
      upper.push(z);
    } else {
      lower += 1;
    }
  }
  if upper.len() != lower {
    return Err(AlgebraError::RootSearch(
      "complex roots without conjugates".to_string(),
    ));
  }
  let mut roots: Vec<AlgebraicRoot> = real
    .into_iter()
    .map(|re| AlgebraicRoot::real(Expr::Real(re)))
    .collect();
  for z in upper {
    roots.push(AlgebraicRoot::complex(Expr::Real(z.re + 0.0), Expr::Real(z.im)));
    roots.push(AlgebraicRoot::complex(Expr::Real(z.re + 0.0), Expr::Real(-z.im)));
  }
  Ok(roots)
}
