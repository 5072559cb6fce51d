use num_bigint::BigInt;
use num_rational::BigRational;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

pub mod algebra;
pub mod integrator;
pub mod ode;
pub mod solver;
pub mod syntax;

use algebra::simplify::simplify;
use algebra::AlgebraError;
use ode::{InitialCondition, Ode};
use solver::{SolveReport, Solver};
use syntax::{Constant, Expr};

#[derive(Parser)]
#[grammar = "ode.pest"]
pub struct OdeParser;

/// Problems with the input, reported before any solving starts.
#[derive(Error, Debug)]
pub enum OdeError {
  #[error("Parse error: {0}")]
  ParseError(#[from] Box<pest::error::Error<Rule>>),
  #[error("Empty input")]
  EmptyInput,
  #[error("Invalid equation: {0}")]
  InvalidEquation(String),
  #[error("Invalid initial condition: {0}")]
  InvalidInitialCondition(String),
}

/// Failures of the solving chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
  /// Not an error in itself: the equation matches no structural pattern and
  /// goes to the generic and numerical methods.
  #[error("no structural pattern matches: {0}")]
  ClassificationIndeterminate(String),
  #[error("algebra failure: {0}")]
  AlgebraFailure(String),
  #[error("integration failed on [{}, {}]: {reason}", .domain.0, .domain.1)]
  IntegrationFailure { domain: (f64, f64), reason: String },
  /// A broken invariant of the solver itself.
  #[error("internal consistency failure: {0}")]
  InternalConsistencyFailure(String),
}

impl From<AlgebraError> for SolveError {
  fn from(error: AlgebraError) -> Self {
    SolveError::AlgebraFailure(error.to_string())
  }
}

impl OdeParser {
  pub fn parse_program(
    input: &str,
  ) -> Result<pest::iterators::Pairs<'_, Rule>, Box<pest::error::Error<Rule>>>
  {
    Self::parse(Rule::Program, input).map_err(Box::new)
  }
}

pub fn parse(
  input: &str,
) -> Result<pest::iterators::Pairs<'_, Rule>, Box<pest::error::Error<Rule>>> {
  OdeParser::parse_program(input)
}

/// Names of the independent variable and the dependent function.
#[derive(Debug, Clone, Copy)]
struct Names<'a> {
  independent: &'a str,
  dependent: &'a str,
}

/// Parses `lhs = rhs` (or a bare `lhs`) into the simplified `lhs - rhs`.
pub fn parse_expression(
  input: &str,
  independent: &str,
  dependent: &str,
) -> Result<Expr, OdeError> {
  if input.trim().is_empty() {
    return Err(OdeError::EmptyInput);
  }
  let names = Names {
    independent,
    dependent,
  };
  let program = parse(input)?.next().ok_or(OdeError::EmptyInput)?;
  let mut sides = Vec::with_capacity(2);
  for node in program.into_inner() {
    if node.as_rule() == Rule::Expression {
      sides.push(pair_to_expr(node, names)?);
    }
  }
  let mut sides = sides.into_iter();
  let lhs = sides.next().ok_or(OdeError::EmptyInput)?;
  Ok(match sides.next() {
    Some(rhs) => simplify(&Expr::sub(lhs, rhs)),
    None => simplify(&lhs),
  })
}

/// Parses an equation in `y` and `x`.
pub fn parse_ode(input: &str) -> Result<Ode, OdeError> {
  parse_ode_with(input, "x", "y")
}

pub fn parse_ode_with(
  input: &str,
  independent: &str,
  dependent: &str,
) -> Result<Ode, OdeError> {
  let expression = parse_expression(input, independent, dependent)?;
  Ode::new(&expression, independent, dependent)
}

/// Parses `y(x0) = v`, `y'(x0) = v`, ...
pub fn parse_initial_condition(
  input: &str,
  independent: &str,
  dependent: &str,
) -> Result<InitialCondition, OdeError> {
  if input.trim().is_empty() {
    return Err(OdeError::EmptyInput);
  }
  let names = Names {
    independent,
    dependent,
  };
  let invalid = |message: String| OdeError::InvalidInitialCondition(message);
  let condition = OdeParser::parse(Rule::InitialCondition, input)
    .map_err(Box::new)?
    .next()
    .ok_or(OdeError::EmptyInput)?;

  let mut order = 0;
  let mut point = None;
  let mut value = None;
  for node in condition.into_inner() {
    match node.as_rule() {
      Rule::ConditionTarget => {
        for part in node.into_inner() {
          match part.as_rule() {
            Rule::Identifier if part.as_str() != dependent => {
              return Err(invalid(format!(
                "{} is not the function {}",
                part.as_str(),
                dependent
              )));
            }
            Rule::Primes => order = part.as_str().len(),
            Rule::Expression => point = Some(pair_to_expr(part, names)?),
            _ => {}
          }
        }
      }
      Rule::Expression => value = Some(pair_to_expr(node, names)?),
      _ => {}
    }
  }
  let (Some(point), Some(value)) = (point, value) else {
    return Err(invalid(input.to_string()));
  };
  for (what, expr) in [("point", &point), ("value", &value)] {
    if expr.contains_function(dependent) || expr.mentions(independent) {
      return Err(invalid(format!(
        "{} {} must be a constant expression",
        what, expr
      )));
    }
  }
  let (point, value) = (simplify(&point), simplify(&value));
  if point.divides_by_zero() || value.divides_by_zero() {
    return Err(invalid(format!("division by zero in {}", input.trim())));
  }
  Ok(InitialCondition {
    order,
    point,
    value,
  })
}

/// Parses and solves an equation in `y` and `x` with the default
/// configuration.
pub fn dsolve(equation: &str) -> Result<SolveReport, OdeError> {
  dsolve_with(equation, &[])
}

/// Like [`dsolve`], with initial conditions such as `"y(0) = 1"`.
pub fn dsolve_with(
  equation: &str,
  conditions: &[&str],
) -> Result<SolveReport, OdeError> {
  let ode = parse_ode(equation)?;
  let conditions = conditions
    .iter()
    .map(|c| parse_initial_condition(c, "x", "y"))
    .collect::<Result<Vec<_>, _>>()?;
  Ok(Solver::default().solve_blocking(ode, conditions))
}

// ─── Pair → Expr ───────────────────────────────────────────────────────

fn pair_to_expr(pair: Pair<Rule>, names: Names) -> Result<Expr, OdeError> {
  match pair.as_rule() {
    Rule::Expression => {
      let mut terms = Vec::new();
      let mut negative = false;
      for item in pair.into_inner() {
        match item.as_rule() {
          Rule::AddOperator => negative = item.as_str() == "-",
          _ => {
            let term = pair_to_expr(item, names)?;
            terms.push(if negative { Expr::neg(term) } else { term });
          }
        }
      }
      Ok(single_or(terms, Expr::Plus))
    }
    Rule::Term => {
      let mut factors = Vec::new();
      let mut divide = false;
      for item in pair.into_inner() {
        match item.as_rule() {
          Rule::MulOperator => divide = item.as_str() == "/",
          _ => {
            let factor = pair_to_expr(item, names)?;
            factors.push(if divide {
              Expr::pow(factor, Expr::int(-1))
            } else {
              factor
            });
            divide = false;
          }
        }
      }
      Ok(single_or(factors, Expr::Times))
    }
    Rule::Signed => {
      let mut negations = 0;
      let mut operand = None;
      for item in pair.into_inner() {
        match item.as_rule() {
          Rule::Negation => negations += 1,
          _ => operand = Some(pair_to_expr(item, names)?),
        }
      }
      let operand = operand.ok_or_else(|| missing("operand"))?;
      Ok(if negations % 2 == 1 {
        Expr::neg(operand)
      } else {
        operand
      })
    }
    Rule::Power => {
      let mut inner = pair.into_inner();
      let base = inner.next().ok_or_else(|| missing("base"))?;
      let base = pair_to_expr(base, names)?;
      match inner.next() {
        Some(exponent) => Ok(Expr::pow(base, pair_to_expr(exponent, names)?)),
        None => Ok(base),
      }
    }
    Rule::Number => parse_number(pair.as_str()),
    Rule::Identifier => Ok(identifier(pair.as_str(), names)),
    Rule::Derivative => {
      let mut function = "";
      let mut order = 0;
      let mut argument = None;
      for item in pair.into_inner() {
        match item.as_rule() {
          Rule::Primes => order = item.as_str().len(),
          Rule::Identifier if order == 0 => function = item.as_str(),
          Rule::Identifier => argument = Some(item.as_str()),
          _ => {}
        }
      }
      derivative(function, order, argument, names)
    }
    Rule::Diff => {
      let mut identifiers = Vec::with_capacity(3);
      let mut order = 1;
      for item in pair.into_inner() {
        match item.as_rule() {
          Rule::Identifier => identifiers.push(item.as_str()),
          Rule::Integer => {
            order = item.as_str().parse::<usize>().map_err(|_| {
              OdeError::InvalidEquation(format!(
                "derivative order {} is too large",
                item.as_str()
              ))
            })?;
          }
          _ => {}
        }
      }
      let (function, argument, variable) = match identifiers.as_slice() {
        [f, v] => (*f, None, *v),
        [f, a, v] => (*f, Some(*a), *v),
        _ => return Err(missing("diff arguments")),
      };
      if variable != names.independent {
        return Err(OdeError::InvalidEquation(format!(
          "differentiation with respect to {} instead of {}",
          variable, names.independent
        )));
      }
      derivative(function, order, argument, names)
    }
    Rule::Call => {
      let mut inner = pair.into_inner();
      let name = inner.next().ok_or_else(|| missing("function name"))?;
      let argument = inner.next().ok_or_else(|| missing("argument"))?;
      call(name.as_str(), pair_to_expr(argument, names)?, names)
    }
    other => Err(OdeError::InvalidEquation(format!(
      "unexpected {:?}",
      other
    ))),
  }
}

fn single_or(mut items: Vec<Expr>, wrap: fn(Vec<Expr>) -> Expr) -> Expr {
  if items.len() == 1 {
    items.remove(0)
  } else {
    wrap(items)
  }
}

fn missing(what: &str) -> OdeError {
  OdeError::InvalidEquation(format!("missing {}", what))
}

fn identifier(name: &str, names: Names) -> Expr {
  if name == names.dependent {
    return Expr::derivative(name, 0);
  }
  if name == names.independent {
    return Expr::symbol(name);
  }
  match name {
    "e" | "E" => Expr::Constant(Constant::E),
    "pi" | "Pi" => Expr::Constant(Constant::Pi),
    _ => Expr::symbol(name),
  }
}

fn derivative(
  function: &str,
  order: usize,
  argument: Option<&str>,
  names: Names,
) -> Result<Expr, OdeError> {
  if function != names.dependent {
    return Err(OdeError::InvalidEquation(format!(
      "derivative of {}, expected {}",
      function, names.dependent
    )));
  }
  if let Some(argument) = argument {
    if argument != names.independent {
      return Err(OdeError::InvalidEquation(format!(
        "{}({}) inside an equation in {}",
        function, argument, names.independent
      )));
    }
  }
  Ok(Expr::derivative(function, order))
}

/// Known functions by lower-case name. Any other `name(arg)` is the product
/// `name * arg`, and `y(x)` is `y`.
fn call(name: &str, argument: Expr, names: Names) -> Result<Expr, OdeError> {
  if name == names.dependent {
    return match &argument {
      Expr::Identifier(a) if a == names.independent => {
        Ok(Expr::derivative(name, 0))
      }
      _ => Err(OdeError::InvalidEquation(format!(
        "{}({}) inside an equation in {}",
        name, argument, names.independent
      ))),
    };
  }
  let mut chars = name.chars();
  let lowered: String = match chars.next() {
    Some(first) => first.to_lowercase().chain(chars).collect(),
    None => String::new(),
  };
  Ok(match lowered.as_str() {
    "sin" => Expr::call("Sin", argument),
    "cos" => Expr::call("Cos", argument),
    "tan" => Expr::call("Tan", argument),
    "sinh" => Expr::call("Sinh", argument),
    "cosh" => Expr::call("Cosh", argument),
    "tanh" => Expr::call("Tanh", argument),
    "atan" | "arctan" => Expr::call("ArcTan", argument),
    "log" | "ln" => Expr::call("Log", argument),
    "abs" => Expr::call("Abs", argument),
    "exp" => Expr::exp(argument),
    "sqrt" => Expr::sqrt(argument),
    _ => Expr::Times(vec![identifier(name, names), argument]),
  })
}

const MAX_DECIMAL_EXPONENT: i64 = 4096;

/// Decimal literals become exact rationals: `0.25 -> 1/4`.
fn parse_number(text: &str) -> Result<Expr, OdeError> {
  let invalid =
    || OdeError::InvalidEquation(format!("invalid number {}", text));
  let lower = text.to_ascii_lowercase();
  let (mantissa, exponent) = match lower.split_once('e') {
    Some((m, e)) => (m, e.parse::<i64>().map_err(|_| invalid())?),
    None => (lower.as_str(), 0),
  };
  let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
  let digits = format!("{}{}", whole, fraction);
  let numer: BigInt = if digits.is_empty() {
    BigInt::from(0)
  } else {
    digits.parse().map_err(|_| invalid())?
  };
  let scale = exponent - fraction.len() as i64;
  if scale.abs() > MAX_DECIMAL_EXPONENT {
    return Err(invalid());
  }
  let power = num_traits::pow(BigInt::from(10), scale.unsigned_abs() as usize);
  Ok(Expr::Number(if scale >= 0 {
    BigRational::from_integer(numer * power)
  } else {
    BigRational::new(numer, power)
  }))
}
