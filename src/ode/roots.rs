//! Grouping of characteristic roots into the families that determine the
//! shape of the general solution.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::algebra::numeric::to_f64;
use crate::algebra::polynomial::AlgebraicRoot;
use crate::algebra::simplify::{negate, simplify};
use crate::ode::auxiliary::CharacteristicPolynomial;
use crate::syntax::Expr;
use crate::SolveError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassifiedRoot {
  RealDistinct { value: Expr },
  RealRepeated { value: Expr, multiplicity: usize },
  /// The pair `re ± im*i`, with `im > 0`.
  ComplexConjugate {
    re: Expr,
    im: Expr,
    multiplicity: usize,
  },
}

impl ClassifiedRoot {
  pub fn multiplicity(&self) -> usize {
    match self {
      ClassifiedRoot::RealDistinct { .. } => 1,
      ClassifiedRoot::RealRepeated { multiplicity, .. }
      | ClassifiedRoot::ComplexConjugate { multiplicity, .. } => *multiplicity,
    }
  }

  /// Number of roots of the polynomial this entry accounts for.
  pub fn degree(&self) -> usize {
    match self {
      ClassifiedRoot::ComplexConjugate { multiplicity, .. } => 2 * multiplicity,
      other => other.multiplicity(),
    }
  }
}

impl fmt::Display for ClassifiedRoot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ClassifiedRoot::RealDistinct { value } => write!(f, "{}", value),
      ClassifiedRoot::RealRepeated {
        value,
        multiplicity,
      } => write!(f, "{} (multiplicity {})", value, multiplicity),
      ClassifiedRoot::ComplexConjugate {
        re,
        im,
        multiplicity,
      } => {
        let pair = AlgebraicRoot::complex(re.clone(), im.clone());
        write!(f, "{}, {}", pair, pair.conjugate())?;
        if *multiplicity > 1 {
          write!(f, " (multiplicity {})", multiplicity)?;
        }
        Ok(())
      }
    }
  }
}

/// Real roots in ascending order, then complex pairs by real part and then
/// imaginary part. This order fixes the numbering of the constants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootClassification {
  pub roots: Vec<ClassifiedRoot>,
}

impl RootClassification {
  pub fn degree(&self) -> usize {
    self.roots.iter().map(ClassifiedRoot::degree).sum()
  }

  /// The full root multiset again, conjugates included.
  pub fn expanded(&self) -> Vec<AlgebraicRoot> {
    let mut all = Vec::with_capacity(self.degree());
    for root in &self.roots {
      match root {
        ClassifiedRoot::RealDistinct { value }
        | ClassifiedRoot::RealRepeated { value, .. } => {
          let real = AlgebraicRoot::real(value.clone());
          all.extend(std::iter::repeat(real).take(root.multiplicity()));
        }
        ClassifiedRoot::ComplexConjugate {
          re,
          im,
          multiplicity,
        } => {
          let pair = AlgebraicRoot::complex(re.clone(), im.clone());
          for _ in 0..*multiplicity {
            all.push(pair.clone());
            all.push(pair.conjugate());
          }
        }
      }
    }
    all
  }
}

struct Group {
  re: Expr,
  im: Expr,
  count: usize,
}

/// Groups a root multiset by exact equality. The input order is irrelevant.
pub fn classify_roots(
  roots: &[AlgebraicRoot],
) -> Result<RootClassification, SolveError> {
  let mut groups: Vec<Group> = Vec::new();
  for root in roots {
    let re = simplify(&root.re);
    let im = simplify(&root.im);
    match groups.iter_mut().find(|g| g.re == re && g.im == im) {
      Some(group) => group.count += 1,
      None => groups.push(Group { re, im, count: 1 }),
    }
  }

  let mut real = Vec::new();
  let mut complex = Vec::new();
  for group in &groups {
    if group.im.is_zero() {
      real.push(group);
      continue;
    }
    let conjugate = negate(group.im.clone());
    let partner = groups
      .iter()
      .find(|g| g.re == group.re && g.im == conjugate)
      .ok_or_else(|| {
        SolveError::InternalConsistencyFailure(format!(
          "complex root {} has no conjugate",
          AlgebraicRoot::complex(group.re.clone(), group.im.clone())
        ))
      })?;
    if partner.count != group.count {
      return Err(SolveError::InternalConsistencyFailure(format!(
        "conjugate roots {} have multiplicities {} and {}",
        AlgebraicRoot::complex(group.re.clone(), group.im.clone()),
        group.count,
        partner.count
      )));
    }
    if is_positive(&group.im) {
      complex.push(group);
    }
  }

  real.sort_by(|a, b| compare(&a.re, &b.re));
  complex.sort_by(|a, b| compare(&a.re, &b.re).then(compare(&a.im, &b.im)));

  let mut classified = Vec::with_capacity(real.len() + complex.len());
  for group in real {
    classified.push(match group.count {
      1 => ClassifiedRoot::RealDistinct {
        value: group.re.clone(),
      },
      m => ClassifiedRoot::RealRepeated {
        value: group.re.clone(),
        multiplicity: m,
      },
    });
  }
  for group in complex {
    classified.push(ClassifiedRoot::ComplexConjugate {
      re: group.re.clone(),
      im: group.im.clone(),
      multiplicity: group.count,
    });
  }
  Ok(RootClassification { roots: classified })
}

/// Roots of `polynomial`, classified. The total multiplicity must equal the
/// degree.
pub fn classify_polynomial_roots(
  polynomial: &CharacteristicPolynomial,
) -> Result<RootClassification, SolveError> {
  let roots = polynomial.roots()?;
  let classification = classify_roots(&roots)?;
  if classification.degree() != polynomial.degree() {
    return Err(SolveError::InternalConsistencyFailure(format!(
      "{} roots found for {} of degree {}",
      classification.degree(),
      polynomial,
      polynomial.degree()
    )));
  }
  Ok(classification)
}

fn is_positive(expr: &Expr) -> bool {
  to_f64(expr).map_or(false, |v| v > 0.0)
}

fn compare(a: &Expr, b: &Expr) -> Ordering {
  match (to_f64(a), to_f64(b)) {
    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    _ => a.to_string().cmp(&b.to_string()),
  }
}
