//! Expression tree shared by the parser, the algebra layer and the ODE core.
//!
//! Sums and products are n-ary. Division is `a * b^-1` and subtraction is
//! `a + (-1)*b`, so the algebra layer only reasons about three compound
//! shapes: `Plus`, `Times` and `Power`.

use std::collections::BTreeSet;
use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  /// Exact rational number; integers have denominator 1
  Number(BigRational),
  Real(f64),
  Identifier(String),
  Constant(Constant),
  /// `function^(order)` of the independent variable. Order 0 is the
  /// dependent function itself.
  Derivative {
    function: String,
    order: usize,
  },
  Plus(Vec<Expr>),
  Times(Vec<Expr>),
  Power(Box<Expr>, Box<Expr>),
  FunctionCall {
    name: String,
    args: Vec<Expr>,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
  E,
  Pi,
}

impl Constant {
  pub fn value(self) -> f64 {
    match self {
      Constant::E => std::f64::consts::E,
      Constant::Pi => std::f64::consts::PI,
    }
  }
}

/// Functions the algebra layer knows how to simplify, differentiate and
/// evaluate.
pub const KNOWN_FUNCTIONS: &[&str] = &[
  "Sin", "Cos", "Tan", "Sinh", "Cosh", "Tanh", "ArcTan", "Log", "Abs",
];

// ─── Construction ──────────────────────────────────────────────────────

impl Expr {
  pub fn int(n: i64) -> Expr {
    Expr::Number(BigRational::from_integer(BigInt::from(n)))
  }

  pub fn rational(numer: i64, denom: i64) -> Expr {
    Expr::Number(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
  }

  pub fn zero() -> Expr {
    Expr::int(0)
  }

  pub fn one() -> Expr {
    Expr::int(1)
  }

  pub fn symbol(name: &str) -> Expr {
    Expr::Identifier(name.to_string())
  }

  pub fn derivative(function: &str, order: usize) -> Expr {
    Expr::Derivative {
      function: function.to_string(),
      order,
    }
  }

  pub fn pow(base: Expr, exponent: Expr) -> Expr {
    Expr::Power(Box::new(base), Box::new(exponent))
  }

  pub fn exp(arg: Expr) -> Expr {
    Expr::pow(Expr::Constant(Constant::E), arg)
  }

  pub fn sqrt(arg: Expr) -> Expr {
    Expr::pow(arg, Expr::rational(1, 2))
  }

  pub fn call(name: &str, arg: Expr) -> Expr {
    Expr::FunctionCall {
      name: name.to_string(),
      args: vec![arg],
    }
  }

  pub fn neg(expr: Expr) -> Expr {
    Expr::Times(vec![Expr::int(-1), expr])
  }

  pub fn sub(a: Expr, b: Expr) -> Expr {
    Expr::Plus(vec![a, Expr::neg(b)])
  }

  pub fn div(a: Expr, b: Expr) -> Expr {
    Expr::Times(vec![a, Expr::pow(b, Expr::int(-1))])
  }
}

// ─── Structural queries ────────────────────────────────────────────────

impl Expr {
  pub fn as_rational(&self) -> Option<&BigRational> {
    match self {
      Expr::Number(r) => Some(r),
      _ => None,
    }
  }

  pub fn as_integer(&self) -> Option<i64> {
    match self {
      Expr::Number(r) if r.is_integer() => r.to_integer().to_i64(),
      _ => None,
    }
  }

  pub fn is_zero(&self) -> bool {
    match self {
      Expr::Number(r) => r.is_zero(),
      Expr::Real(f) => *f == 0.0,
      _ => false,
    }
  }

  pub fn is_one(&self) -> bool {
    match self {
      Expr::Number(r) => r.is_one(),
      Expr::Real(f) => *f == 1.0,
      _ => false,
    }
  }

  pub fn is_numeric(&self) -> bool {
    matches!(self, Expr::Number(_) | Expr::Real(_))
  }

  /// True if any node satisfies `pred`.
  pub fn any(&self, pred: &dyn Fn(&Expr) -> bool) -> bool {
    if pred(self) {
      return true;
    }
    match self {
      Expr::Plus(args)
      | Expr::Times(args)
      | Expr::FunctionCall { args, .. } => args.iter().any(|a| a.any(pred)),
      Expr::Power(base, exp) => base.any(pred) || exp.any(pred),
      _ => false,
    }
  }

  /// Rebuilds the tree top-down. Where `f` returns a replacement the
  /// subtree is replaced and not visited further.
  pub fn map(&self, f: &dyn Fn(&Expr) -> Option<Expr>) -> Expr {
    if let Some(replacement) = f(self) {
      return replacement;
    }
    match self {
      Expr::Plus(args) => Expr::Plus(args.iter().map(|a| a.map(f)).collect()),
      Expr::Times(args) => {
        Expr::Times(args.iter().map(|a| a.map(f)).collect())
      }
      Expr::Power(base, exp) => Expr::pow(base.map(f), exp.map(f)),
      Expr::FunctionCall { name, args } => Expr::FunctionCall {
        name: name.clone(),
        args: args.iter().map(|a| a.map(f)).collect(),
      },
      other => other.clone(),
    }
  }

  /// True if the expression varies with `var`. Derivative nodes always do,
  /// since the dependent function is a function of the independent
  /// variable.
  pub fn depends_on(&self, var: &str) -> bool {
    self.any(&|e| match e {
      Expr::Identifier(name) => name == var,
      Expr::Derivative { .. } => true,
      _ => false,
    })
  }

  /// True if the identifier `name` occurs anywhere.
  pub fn mentions(&self, name: &str) -> bool {
    self.any(&|e| matches!(e, Expr::Identifier(n) if n == name))
  }

  /// True if some power raises an exact zero to a negative exponent,
  /// as `1/0` simplifies to `0^-1`.
  pub fn divides_by_zero(&self) -> bool {
    self.any(&|e| match e {
      Expr::Power(base, exp) => {
        base.is_zero()
          && match exp.as_ref() {
            Expr::Number(r) => r.is_negative(),
            Expr::Real(f) => *f < 0.0,
            _ => false,
          }
      }
      _ => false,
    })
  }

  pub fn contains(&self, target: &Expr) -> bool {
    self.any(&|e| e == target)
  }

  pub fn contains_function(&self, function: &str) -> bool {
    self.any(
      &|e| matches!(e, Expr::Derivative { function: f, .. } if f == function),
    )
  }

  pub fn max_derivative_order(&self, function: &str) -> Option<usize> {
    let mut max = None;
    collect_orders(self, function, &mut max);
    max
  }

  pub fn free_symbols(&self) -> BTreeSet<String> {
    let mut symbols = BTreeSet::new();
    collect_symbols(self, &mut symbols);
    symbols
  }

  pub fn substitute(&self, target: &Expr, replacement: &Expr) -> Expr {
    self.map(&|e| {
      if e == target {
        Some(replacement.clone())
      } else {
        None
      }
    })
  }

  pub fn substitute_variable(&self, name: &str, replacement: &Expr) -> Expr {
    self.map(&|e| match e {
      Expr::Identifier(n) if n == name => Some(replacement.clone()),
      _ => None,
    })
  }

  /// Replaces every derivative of `function` by `f(order)`.
  pub fn map_derivatives(
    &self,
    function: &str,
    f: &dyn Fn(usize) -> Expr,
  ) -> Expr {
    self.map(&|e| match e {
      Expr::Derivative { function: name, order } if name == function => {
        Some(f(*order))
      }
      _ => None,
    })
  }
}

fn collect_orders(expr: &Expr, function: &str, max: &mut Option<usize>) {
  match expr {
    Expr::Derivative { function: name, order } if name == function => {
      *max = Some(max.map_or(*order, |m: usize| m.max(*order)));
    }
    Expr::Plus(args) | Expr::Times(args) | Expr::FunctionCall { args, .. } => {
      for arg in args {
        collect_orders(arg, function, max);
      }
    }
    Expr::Power(base, exp) => {
      collect_orders(base, function, max);
      collect_orders(exp, function, max);
    }
    _ => {}
  }
}

fn collect_symbols(expr: &Expr, symbols: &mut BTreeSet<String>) {
  match expr {
    Expr::Identifier(name) => {
      symbols.insert(name.clone());
    }
    Expr::Plus(args) | Expr::Times(args) | Expr::FunctionCall { args, .. } => {
      for arg in args {
        collect_symbols(arg, symbols);
      }
    }
    Expr::Power(base, exp) => {
      collect_symbols(base, symbols);
      collect_symbols(exp, symbols);
    }
    _ => {}
  }
}

// ─── Plain-text output ─────────────────────────────────────────────────

const PREC_SUM: u8 = 1;
const PREC_PRODUCT: u8 = 2;
const PREC_POWER: u8 = 3;
const PREC_ATOM: u8 = 4;

/// Renders an expression in the input syntax accepted by the parser.
pub fn expr_to_string(expr: &Expr) -> String {
  match expr {
    Expr::Number(r) => format_rational(r),
    Expr::Real(f) => format_real(*f),
    Expr::Identifier(name) => name.clone(),
    Expr::Constant(Constant::E) => "E".to_string(),
    Expr::Constant(Constant::Pi) => "pi".to_string(),
    Expr::Derivative { function, order } => {
      format!("{}{}", function, "'".repeat(*order))
    }
    Expr::Plus(terms) => format_sum(terms, PlainStyle),
    Expr::Times(factors) => format_product(factors, PlainStyle),
    Expr::Power(base, exp) => format_power(base, exp),
    Expr::FunctionCall { name, args } => {
      let args: Vec<String> = args.iter().map(expr_to_string).collect();
      format!("{}({})", plain_function_name(name), args.join(", "))
    }
  }
}

pub fn plain_function_name(name: &str) -> String {
  match name {
    "ArcTan" => "atan".to_string(),
    other => other.to_lowercase(),
  }
}

fn format_rational(r: &BigRational) -> String {
  if r.is_integer() {
    r.numer().to_string()
  } else {
    format!("{}/{}", r.numer(), r.denom())
  }
}

pub fn format_real(f: f64) -> String {
  if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
    format!("{:.1}", f)
  } else {
    format!("{}", f)
  }
}

fn precedence(expr: &Expr) -> u8 {
  match expr {
    Expr::Plus(_) => PREC_SUM,
    Expr::Times(_) => PREC_PRODUCT,
    Expr::Number(r) if !r.is_integer() || r.is_negative() => PREC_PRODUCT,
    Expr::Real(f) if *f < 0.0 => PREC_PRODUCT,
    Expr::Power(base, exp) => {
      if is_negative_exponent(exp) {
        PREC_PRODUCT
      } else if **base == Expr::Constant(Constant::E)
        || **exp == Expr::rational(1, 2)
      {
        PREC_ATOM
      } else {
        PREC_POWER
      }
    }
    _ => PREC_ATOM,
  }
}

fn wrap(expr: &Expr, min_prec: u8) -> String {
  let s = expr_to_string(expr);
  if precedence(expr) < min_prec {
    format!("({})", s)
  } else {
    s
  }
}

fn is_negative_exponent(exp: &Expr) -> bool {
  match exp {
    Expr::Number(r) => r.is_negative(),
    Expr::Real(f) => *f < 0.0,
    _ => false,
  }
}

/// If `term` carries a negative numeric coefficient, returns the term with
/// that sign removed.
pub(crate) fn display_negation(term: &Expr) -> Option<Expr> {
  match term {
    Expr::Number(r) if r.is_negative() => Some(Expr::Number(-r)),
    Expr::Real(f) if *f < 0.0 => Some(Expr::Real(-f)),
    Expr::Times(factors) => {
      let (coefficient, rest) = factors.split_first()?;
      let positive = match coefficient {
        Expr::Number(r) if r.is_negative() => Expr::Number(-r),
        Expr::Real(f) if *f < 0.0 => Expr::Real(-f),
        _ => return None,
      };
      let mut kept = Vec::with_capacity(factors.len());
      if !positive.is_one() {
        kept.push(positive);
      }
      kept.extend(rest.iter().cloned());
      Some(match kept.len() {
        0 => Expr::one(),
        1 => kept.remove(0),
        _ => Expr::Times(kept),
      })
    }
    _ => None,
  }
}

/// Shared between the plain and LaTeX printers.
trait Style: Copy {
  fn render(self, expr: &Expr) -> String;
  fn parens(self, s: &str) -> String;
  fn join_product(self, parts: &[String]) -> String;
  fn fraction(self, numer: &str, denom: &[String]) -> String;

  fn wrap(self, expr: &Expr, min_prec: u8) -> String {
    let s = self.render(expr);
    if precedence(expr) < min_prec {
      self.parens(&s)
    } else {
      s
    }
  }
}

#[derive(Clone, Copy)]
struct PlainStyle;

impl Style for PlainStyle {
  fn render(self, expr: &Expr) -> String {
    expr_to_string(expr)
  }

  fn parens(self, s: &str) -> String {
    format!("({})", s)
  }

  fn join_product(self, parts: &[String]) -> String {
    parts.join("*")
  }

  fn fraction(self, numer: &str, denom: &[String]) -> String {
    if denom.len() == 1 {
      format!("{}/{}", numer, denom[0])
    } else {
      format!("{}/({})", numer, denom.join("*"))
    }
  }
}

#[derive(Clone, Copy)]
struct LatexStyle;

impl Style for LatexStyle {
  fn render(self, expr: &Expr) -> String {
    expr_to_latex(expr)
  }

  fn parens(self, s: &str) -> String {
    format!("\\left({}\\right)", s)
  }

  fn join_product(self, parts: &[String]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
      if i > 0 {
        let digit_follows = part.starts_with(|c: char| c.is_ascii_digit());
        out.push_str(if digit_follows { " \\cdot " } else { " " });
      }
      out.push_str(part);
    }
    out
  }

  fn fraction(self, numer: &str, denom: &[String]) -> String {
    format!("\\frac{{{}}}{{{}}}", numer, self.join_product(denom))
  }
}

fn format_sum<S: Style>(terms: &[Expr], style: S) -> String {
  let mut out = String::new();
  for (i, term) in terms.iter().enumerate() {
    match display_negation(term) {
      Some(positive) => {
        out.push_str(if i == 0 { "-" } else { " - " });
        out.push_str(&style.wrap(&positive, PREC_PRODUCT));
      }
      None => {
        if i > 0 {
          out.push_str(" + ");
        }
        out.push_str(&style.wrap(term, PREC_SUM));
      }
    }
  }
  out
}

fn format_product<S: Style>(factors: &[Expr], style: S) -> String {
  let mut negative = false;
  let mut numer = Vec::new();
  let mut denom = Vec::new();
  for factor in factors {
    match factor {
      Expr::Number(r) => {
        if r.is_negative() {
          negative = !negative;
        }
        let magnitude = r.abs();
        if !magnitude.numer().is_one() {
          numer.push(magnitude.numer().to_string());
        }
        if !magnitude.denom().is_one() {
          denom.push(magnitude.denom().to_string());
        }
      }
      Expr::Real(f) => {
        if *f < 0.0 {
          negative = !negative;
        }
        numer.push(format_real(f.abs()));
      }
      Expr::Power(base, exp) if is_negative_exponent(exp) => {
        let flipped = match &**exp {
          Expr::Number(r) if (-r).is_one() => (**base).clone(),
          Expr::Number(r) => Expr::pow((**base).clone(), Expr::Number(-r)),
          Expr::Real(f) => Expr::pow((**base).clone(), Expr::Real(-f)),
          _ => factor.clone(),
        };
        denom.push(style.wrap(&flipped, PREC_POWER));
      }
      other => numer.push(style.wrap(other, PREC_POWER)),
    }
  }
  let numer = if numer.is_empty() {
    "1".to_string()
  } else {
    style.join_product(&numer)
  };
  let body = if denom.is_empty() {
    numer
  } else {
    style.fraction(&numer, &denom)
  };
  if negative {
    format!("-{}", body)
  } else {
    body
  }
}

fn format_power(base: &Expr, exp: &Expr) -> String {
  if is_negative_exponent(exp) {
    return format_product(
      &[Expr::pow(base.clone(), exp.clone())],
      PlainStyle,
    );
  }
  if *base == Expr::Constant(Constant::E) {
    return format!("exp({})", expr_to_string(exp));
  }
  if *exp == Expr::rational(1, 2) {
    return format!("sqrt({})", expr_to_string(base));
  }
  let exponent = match exp {
    Expr::Number(r) if r.is_integer() && !r.is_negative() => r.to_string(),
    Expr::Identifier(_) | Expr::Constant(_) => expr_to_string(exp),
    _ => format!("({})", expr_to_string(exp)),
  };
  format!("{}^{}", wrap(base, PREC_ATOM), exponent)
}

impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", expr_to_string(self))
  }
}

impl Serialize for Expr {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

// ─── LaTeX output ──────────────────────────────────────────────────────

pub fn expr_to_latex(expr: &Expr) -> String {
  match expr {
    Expr::Number(r) if r.is_integer() => r.numer().to_string(),
    Expr::Number(r) => {
      let sign = if r.is_negative() { "-" } else { "" };
      format!("{}\\frac{{{}}}{{{}}}", sign, r.numer().abs(), r.denom())
    }
    Expr::Real(f) => format_real(*f),
    Expr::Identifier(name) => latex_identifier(name),
    Expr::Constant(Constant::E) => "e".to_string(),
    Expr::Constant(Constant::Pi) => "\\pi".to_string(),
    Expr::Derivative { function, order } => {
      format!("{}{}", function, "'".repeat(*order))
    }
    Expr::Plus(terms) => format_sum(terms, LatexStyle),
    Expr::Times(factors) => format_product(factors, LatexStyle),
    Expr::Power(base, exp) => {
      if is_negative_exponent(exp) {
        return format_product(
          &[Expr::pow((**base).clone(), (**exp).clone())],
          LatexStyle,
        );
      }
      if **base == Expr::Constant(Constant::E) {
        return format!("e^{{{}}}", expr_to_latex(exp));
      }
      if **exp == Expr::rational(1, 2) {
        return format!("\\sqrt{{{}}}", expr_to_latex(base));
      }
      format!(
        "{}^{{{}}}",
        LatexStyle.wrap(base, PREC_ATOM),
        expr_to_latex(exp)
      )
    }
    Expr::FunctionCall { name, args } => {
      let args: Vec<String> = args.iter().map(expr_to_latex).collect();
      let args = args.join(", ");
      match name.as_str() {
        "Abs" => format!("\\left|{}\\right|", args),
        "Log" => format!("\\ln\\left({}\\right)", args),
        "ArcTan" => format!("\\arctan\\left({}\\right)", args),
        other => {
          format!("\\{}\\left({}\\right)", other.to_lowercase(), args)
        }
      }
    }
  }
}

/// `C12` becomes `C_{12}`.
fn latex_identifier(name: &str) -> String {
  let split = name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
  if split == 0 || split == name.len() {
    name.to_string()
  } else {
    format!("{}_{{{}}}", &name[..split], &name[split..])
  }
}
