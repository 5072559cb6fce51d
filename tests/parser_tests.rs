use odesolver::{
  parse, parse_expression, parse_initial_condition, parse_ode, OdeError,
};

#[cfg(test)]
mod tests {
  use odesolver::Rule;

  use super::*;

  #[test]
  fn test_parse_equation() {
    let pair = parse("y'' - 3*y' + 2*y = 0").unwrap().next().unwrap();
    assert_eq!(pair.as_rule(), Rule::Program);
  }

  #[test]
  fn test_parse_double_equals() {
    let pair = parse("y' == x*y").unwrap().next().unwrap();
    assert_eq!(pair.as_rule(), Rule::Program);
  }

  #[test]
  fn test_parse_without_right_side() {
    let pair = parse("y'' + y").unwrap().next().unwrap();
    assert_eq!(pair.as_rule(), Rule::Program);
  }

  #[test]
  fn test_parse_diff_notation() {
    let pair = parse("diff(y(x), x, 2) + y = 0").unwrap().next().unwrap();
    assert_eq!(pair.as_rule(), Rule::Program);
  }

  #[test]
  fn test_parse_function_argument() {
    let pair = parse("y''(x) + y(x) = sin(x)").unwrap().next().unwrap();
    assert_eq!(pair.as_rule(), Rule::Program);
  }

  #[test]
  fn test_parse_invalid_input() {
    assert!(parse("y'' + = 0").is_err());
    assert!(parse("y' = = 0").is_err());
    assert!(parse("(y' + 1").is_err());
  }

  fn expr(input: &str) -> String {
    parse_expression(input, "x", "y").unwrap().to_string()
  }

  #[test]
  fn test_juxtaposition_is_multiplication() {
    assert_eq!(expr("2x"), expr("2*x"));
    assert_eq!(expr("2(x + 1)"), expr("2*(x + 1)"));
  }

  #[test]
  fn test_power_operators() {
    assert_eq!(expr("x**3"), expr("x^3"));
    assert_eq!(expr("x^3"), "x^3");
  }

  #[test]
  fn test_unary_minus_binds_below_power() {
    assert_eq!(expr("-x^2"), "-x^2");
  }

  #[test]
  fn test_sides_are_subtracted() {
    assert_eq!(expr("x = 1"), expr("x - 1"));
  }

  #[test]
  fn test_exp_and_sqrt() {
    assert_eq!(expr("exp(x)"), "exp(x)");
    assert_eq!(expr("sqrt(4)"), "2");
    assert_eq!(expr("e^x"), "exp(x)");
  }

  #[test]
  fn test_function_aliases() {
    assert_eq!(expr("ln(x)"), "log(x)");
    assert_eq!(expr("arctan(x)"), "atan(x)");
    assert_eq!(expr("Sin(x)"), "sin(x)");
  }

  #[test]
  fn test_initial_condition() {
    let condition = parse_initial_condition("y'(0) = -2", "x", "y").unwrap();
    assert_eq!(condition.order, 1);
    assert_eq!(condition.point.to_string(), "0");
    assert_eq!(condition.value.to_string(), "-2");
  }

  #[test]
  fn test_initial_condition_exact_values() {
    let condition =
      parse_initial_condition("y''(1/2) = 0.25", "x", "y").unwrap();
    assert_eq!(condition.order, 2);
    assert_eq!(condition.point.to_string(), "1/2");
    assert_eq!(condition.value.to_string(), "1/4");
  }

  #[test]
  fn test_initial_condition_rejects_variable_value() {
    assert!(parse_initial_condition("y(0) = x", "x", "y").is_err());
    assert!(parse_initial_condition("y(0)", "x", "y").is_err());
  }

  #[test]
  fn test_division_by_zero_is_rejected() {
    for equation in ["y' + y = 1/0", "y'' + y/(2 - 2) = x"] {
      assert!(
        matches!(parse_ode(equation), Err(OdeError::InvalidEquation(_))),
        "{} was accepted",
        equation
      );
    }
    assert!(matches!(
      parse_initial_condition("y(0) = 1/0", "x", "y"),
      Err(OdeError::InvalidInitialCondition(_))
    ));
  }
}
