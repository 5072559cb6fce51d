use super::*;

mod homogeneous {
  use super::*;

  #[test]
  fn distinct_real_roots() {
    assert_eq!(
      solution("y'' - 3*y' + 2*y = 0"),
      "C1*exp(x) + C2*exp(2*x)"
    );
  }

  #[test]
  fn repeated_root() {
    assert_eq!(solution("y'' + 2*y' + y = 0"), "(C1 + C2*x)*exp(-x)");
  }

  #[test]
  fn complex_roots() {
    let (_, report) = solves_exactly("y'' + 4*y = 0");
    let general = report.general.unwrap();
    assert_eq!(general.constants, vec!["C1", "C2"]);
    assert_eq!(general.particular, None);
  }

  #[test]
  fn damped_oscillation() {
    solves("y'' + 2*y' + 5*y = 0");
  }

  #[test]
  fn third_order_constants_are_numbered_in_root_order() {
    let (_, report) = solves("y''' - y' = 0");
    let general = report.general.unwrap();
    assert_eq!(general.constants, vec!["C1", "C2", "C3"]);
    assert_eq!(general.terms.len(), 3);
  }

  #[test]
  fn repeated_complex_pair() {
    let (_, report) = solves("y'''' + 2*y'' + y = 0");
    assert_eq!(report.general.unwrap().constants.len(), 4);
  }

  #[test]
  fn first_order() {
    let (_, report) = solves_exactly("y' + 3*y = 0");
    assert_eq!(report.method, Some(Method::ConstantCoefficient));
  }

  #[test]
  fn report_display() {
    let report = report("y'' - 3*y' + 2*y = 0");
    let text = report.to_string();
    assert!(text.contains("classification: order 2, linear, constant"));
    assert!(text.contains("characteristic polynomial: r^2 - 3*r + 2"));
    assert!(text.contains("solution: y = C1*exp(x) + C2*exp(2*x)"));
    assert!(text.ends_with("confidence: analytical (high)"));
  }

  #[test]
  fn serialized_report() {
    let report = report("y'' - 3*y' + 2*y = 0");
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["confidence"], "ANALYTICAL_HIGH");
    assert_eq!(json["method"], "constant_coefficient");
    assert_eq!(json["classification"]["coefficient_kind"], "CONSTANT");
    assert_eq!(json["characteristic"]["polynomial"], "r^2 - 3*r + 2");
    assert_eq!(json["solution"]["type"], "analytical");
  }
}

mod initial_conditions {
  use super::*;

  #[test]
  fn two_conditions_at_zero() {
    let report =
      dsolve_with("y'' - 3*y' + 2*y = 0", &["y(0) = 0", "y'(0) = 1"]).unwrap();
    let y = report.expression().unwrap();
    assert!(!y.to_string().contains('C'));
    // y = exp(2x) - exp(x)
    let expected = 1f64.exp().powi(2) - 1f64.exp();
    assert!((value_at(y, 1.0) - expected).abs() < 1e-9);
  }

  #[test]
  fn oscillator() {
    let conditions = ["y(0) = 1", "y'(0) = 0"];
    let report = dsolve_with("y'' + y = 0", &conditions).unwrap();
    let y = report.expression().unwrap();
    assert!((value_at(y, 0.4) - 0.4f64.cos()).abs() < 1e-9);
  }

  #[test]
  fn partial_conditions_leave_constants() {
    let report = dsolve_with("y'' + 2*y' + y = 0", &["y(0) = 3"]).unwrap();
    let y = report.expression().unwrap();
    let text = y.to_string();
    assert!(text.contains("C2"));
    assert!(!text.contains("C1"));
    assert_eq!(report.confidence, Confidence::AnalyticalHigh);
  }

  #[test]
  fn condition_above_order_is_rejected() {
    let report = dsolve_with("y' + y = 0", &["y'(0) = 1"]).unwrap();
    assert_eq!(report.confidence, Confidence::Failed);
    assert_eq!(report.solution, None);
    let failure = report.failure.unwrap();
    assert_eq!(failure.method, None);
    assert!(failure.reason.starts_with("Invalid initial condition"));
  }

  #[test]
  fn duplicate_condition_is_rejected() {
    let report =
      dsolve_with("y'' + y = 0", &["y(0) = 1", "y(0) = 2"]).unwrap();
    assert_eq!(report.confidence, Confidence::Failed);
    assert!(report.attempts.is_empty());
  }

  #[test]
  fn condition_on_another_function() {
    assert!(matches!(
      dsolve_with("y' + y = 0", &["z(0) = 1"]),
      Err(OdeError::InvalidInitialCondition(_))
    ));
  }

  #[test]
  fn conditions_at_pi() {
    let conditions = ["y(pi) = 1", "y'(pi) = 0"];
    let report = dsolve_with("y'' + y = 0", &conditions).unwrap();
    assert_eq!(report.expression().unwrap().to_string(), "-cos(x)");
  }

  #[test]
  fn tiny_exact_coefficients() {
    let conditions = ["y(0) = 1", "y'(0) = 1"];
    let report = dsolve_with("y'' + 1e-30*y = 0", &conditions).unwrap();
    assert_eq!(report.method, Some(Method::ConstantCoefficient));
    assert!(report.attempts[0].succeeded);
  }

  #[test]
  fn euler_cauchy_at_one() {
    let report =
      dsolve_with("x^2*y'' + x*y' - y = 0", &["y(1) = 2", "y'(1) = 0"])
        .unwrap();
    let y = report.expression().unwrap();
    // y = 1/x + x
    assert!((value_at(y, 2.0) - 2.5).abs() < 1e-9);
  }

  #[test]
  fn euler_cauchy_at_zero_is_undefined() {
    let report =
      dsolve_with("x^2*y'' + x*y' - y = 0", &["y(0) = 1", "y'(0) = 0"])
        .unwrap();
    assert_ne!(report.method, Some(Method::EulerCauchy));
    assert!(!report.attempts[0].succeeded);
    assert!(report.attempts[0]
      .reason
      .as_deref()
      .unwrap()
      .contains("not defined at"));
  }
}
