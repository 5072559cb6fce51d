//! Floating-point evaluation of expressions.
//!
//! Domain problems such as `log(-1)` or `1/0` produce non-finite values
//! rather than errors; only unbound symbols and unknown functions fail.

use num_traits::ToPrimitive;

use crate::algebra::AlgebraError;
use crate::syntax::{Constant, Expr};

/// Bindings used during evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
  /// Independent variable name and value
  pub variable: Option<(&'a str, f64)>,
  /// Dependent function name and the values of its derivatives, indexed by
  /// order
  pub function: Option<(&'a str, &'a [f64])>,
}

impl<'a> Scope<'a> {
  pub fn at(variable: &'a str, value: f64) -> Self {
    Scope {
      variable: Some((variable, value)),
      function: None,
    }
  }

  pub fn with_state(mut self, function: &'a str, state: &'a [f64]) -> Self {
    self.function = Some((function, state));
    self
  }
}

pub fn evaluate(expr: &Expr, scope: &Scope) -> Result<f64, AlgebraError> {
  match expr {
    Expr::Number(r) => Ok(r.to_f64().unwrap_or(f64::NAN)),
    Expr::Real(f) => Ok(*f),
    Expr::Constant(c) => Ok(c.value()),
    Expr::Identifier(name) => match scope.variable {
      Some((var, value)) if var == name => Ok(value),
      _ => Err(AlgebraError::Unbound(name.clone())),
    },
    Expr::Derivative { function, order } => {
      match scope.function {
        Some((f, state)) if f == function => state
          .get(*order)
          .copied()
          .ok_or_else(|| AlgebraError::Unbound(expr.to_string())),
        _ => Err(AlgebraError::Unbound(expr.to_string())),
      }
    }
    Expr::Plus(terms) => terms.iter().map(|t| evaluate(t, scope)).sum(),
    Expr::Times(factors) => {
      factors.iter().map(|f| evaluate(f, scope)).product()
    }
    Expr::Power(base, exp) => {
      let e = evaluate(exp, scope)?;
      if **base == Expr::Constant(Constant::E) {
        return Ok(e.exp());
      }
      Ok(evaluate(base, scope)?.powf(e))
    }
    Expr::FunctionCall { name, args } if args.len() == 1 => {
      let v = evaluate(&args[0], scope)?;
      Ok(match name.as_str() {
        "Sin" => v.sin(),
        "Cos" => v.cos(),
        "Tan" => v.tan(),
        "Sinh" => v.sinh(),
        "Cosh" => v.cosh(),
        "Tanh" => v.tanh(),
        "ArcTan" => v.atan(),
        "Log" => v.ln(),
        "Abs" => v.abs(),
        other => {
          return Err(AlgebraError::Unsupported(format!(
            "numeric value of {}",
            other
          )));
        }
      })
    }
    other => Err(AlgebraError::Unsupported(format!(
      "numeric value of {}",
      other
    ))),
  }
}

/// Value of a closed expression, or `None` if it still has free symbols.
pub fn to_f64(expr: &Expr) -> Option<f64> {
  evaluate(expr, &Scope::default()).ok()
}
