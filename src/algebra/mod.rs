//! Symbolic-algebra primitives used by the ODE core: canonical
//! simplification, calculus, polynomial roots, linear solving, particular
//! solutions and a generic first-order solver.

pub mod calculus;
pub mod dsolve;
pub mod linear;
pub mod numeric;
pub mod particular;
pub mod polynomial;
pub mod simplify;

use thiserror::Error;

pub use calculus::{differentiate, integrate, nth_derivative};
pub use linear::{
  coefficient_of, polynomial_coefficients, solve_for, solve_linear_system,
  split_linear,
};
pub use polynomial::{polynomial_roots, AlgebraicRoot, Polynomial};
pub use simplify::{expand, simplify};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlgebraError {
  #[error("unsupported: {0}")]
  Unsupported(String),
  #[error("expression is not linear in {0}")]
  Nonlinear(String),
  #[error("singular system: {0}")]
  Singular(String),
  #[error("inconsistent system: {0}")]
  Inconsistent(String),
  #[error("no integral found for {0}")]
  NoIntegral(String),
  #[error("numeric root search failed: {0}")]
  RootSearch(String),
  #[error("unbound symbol {0}")]
  Unbound(String),
}
