use super::*;

mod linear {
  use super::*;

  #[test]
  fn constant_coefficients() {
    let classification = classify(&parse_ode("y'' - 3*y' + 2*y = 0").unwrap());
    assert_eq!(
      classification.to_string(),
      "order 2, linear, constant coefficients"
    );
    assert!(classification.is_linear());
    assert_eq!(classification.coefficient_kind(), CoefficientKind::Constant);
  }

  #[test]
  fn constant_coefficients_with_forcing() {
    let classification = classify(&parse_ode("y'' + y = sin(x)").unwrap());
    assert!(matches!(
      classification.kind,
      OdeKind::ConstantCoefficient { .. }
    ));
  }

  #[test]
  fn euler_cauchy() {
    let classification =
      classify(&parse_ode("x^2*y'' + x*y' + y = 0").unwrap());
    assert_eq!(classification.order, 2);
    assert_eq!(
      classification.kind,
      OdeKind::EulerCauchy {
        coefficients: vec![Expr::int(1), Expr::int(1), Expr::int(1)]
      }
    );
    assert_eq!(classification.to_string(), "order 2, linear, Euler-Cauchy");
  }

  #[test]
  fn variable_coefficients() {
    let classification =
      classify(&parse_ode("(x + 1)*y'' + y = 0").unwrap());
    assert_eq!(classification.kind, OdeKind::VariableCoefficient);
    assert_eq!(
      classification.coefficient_kind(),
      CoefficientKind::VariableOther
    );
  }

  #[test]
  fn first_order_with_variable_coefficient() {
    let classification = classify(&parse_ode("y' = x*y").unwrap());
    assert_eq!(classification.order, 1);
    assert!(classification.is_linear());
    assert_eq!(classification.kind, OdeKind::VariableCoefficient);
  }
}

mod nonlinear {
  use super::*;

  #[test]
  fn separable() {
    let classification = classify(&parse_ode("y' - y^2 = 0").unwrap());
    assert_eq!(classification.to_string(), "order 1, nonlinear (Separable)");
    assert!(!classification.is_linear());
    assert_eq!(
      classification.nonlinear_kind(),
      Some(NonlinearKind::Separable)
    );
  }

  #[test]
  fn riccati() {
    let classification = classify(&parse_ode("y' = y^2 + x").unwrap());
    assert_eq!(
      classification.nonlinear_kind(),
      Some(NonlinearKind::Riccati)
    );
  }

  #[test]
  fn bernoulli() {
    let classification = classify(&parse_ode("y' + y = x*y^3").unwrap());
    assert_eq!(
      classification.nonlinear_kind(),
      Some(NonlinearKind::Bernoulli)
    );
  }

  #[test]
  fn autonomous_second_order() {
    let classification = classify(&parse_ode("y'' + sin(y) = 0").unwrap());
    assert_eq!(classification.order, 2);
    assert_eq!(
      classification.nonlinear_kind(),
      Some(NonlinearKind::Autonomous)
    );
    assert_eq!(
      classification.coefficient_kind(),
      CoefficientKind::VariableOther
    );
  }
}

mod input {
  use super::*;

  #[test]
  fn equation_without_derivative() {
    assert!(matches!(
      parse_ode("y = x"),
      Err(OdeError::InvalidEquation(_))
    ));
  }

  #[test]
  fn empty_equation() {
    assert!(matches!(parse_ode("   "), Err(OdeError::EmptyInput)));
  }

  #[test]
  fn malformed_equation() {
    assert!(matches!(
      parse_ode("y'' + * y = 0"),
      Err(OdeError::ParseError(_))
    ));
  }

  #[test]
  fn order_ignores_cancelled_terms() {
    let ode = parse_ode("y'' + y' = y'' + y").unwrap();
    assert_eq!(ode.order(), 1);
  }

  #[test]
  fn alternative_notations_agree() {
    let primes = parse_ode("y''(x) + 4*y(x) == 0").unwrap();
    let diff = parse_ode("diff(y(x), x, 2) + 4*y = 0").unwrap();
    assert_eq!(primes.expression(), diff.expression());
  }

  #[test]
  fn custom_names() {
    let ode = odesolver::parse_ode_with("u'' + u = 0", "t", "u").unwrap();
    assert_eq!(ode.order(), 2);
    assert_eq!(ode.dependent(), "u");
    assert_eq!(ode.independent(), "t");
  }
}
