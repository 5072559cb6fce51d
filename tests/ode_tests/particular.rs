use super::*;

mod undetermined_coefficients {
  use super::*;

  #[test]
  fn polynomial_forcing() {
    let (_, report) = solves("y'' + y = x");
    let general = report.general.unwrap();
    assert_eq!(general.particular.unwrap().to_string(), "x");
  }

  #[test]
  fn quadratic_forcing() {
    solves("y'' - y' - 2*y = 4*x^2");
  }

  #[test]
  fn exponential_forcing() {
    let (_, report) = solves("y' - y = exp(2*x)");
    assert_eq!(report.method, Some(Method::ConstantCoefficient));
  }

  #[test]
  fn resonant_exponential() {
    let (_, report) = solves("y'' - y = exp(x)");
    let particular = report.general.unwrap().particular.unwrap();
    assert!(particular.to_string().contains('x'));
  }

  #[test]
  fn resonant_oscillation() {
    solves("y'' + y = sin(x)");
  }

  #[test]
  fn double_resonance() {
    solves("y'' - 2*y' + y = exp(x)");
  }

  #[test]
  fn mixed_families() {
    solves("y'' + 3*y' + 2*y = x + cos(2*x)");
  }

  #[test]
  fn damped_forcing() {
    solves("y'' + y = exp(-x)*sin(x)");
  }

  #[test]
  fn constants_stay_free() {
    let text = solution("y'' + y = 1");
    assert!(text.contains("C1"));
    assert!(text.contains("C2"));
  }

  #[test]
  fn with_initial_conditions() {
    // y = 1 - cos(x)
    let conditions = ["y(0) = 0", "y'(0) = 0"];
    let report = dsolve_with("y'' + y = 1", &conditions).unwrap();
    let y = report.expression().unwrap();
    assert!((value_at(y, 1.2) - (1.0 - 1.2f64.cos())).abs() < 1e-9);
  }
}

mod euler_cauchy_forcing {
  use super::*;

  #[test]
  fn power_forcing() {
    let (_, report) = solves("x^2*y'' - 2*y = x");
    assert_eq!(report.method, Some(Method::EulerCauchy));
  }

  #[test]
  fn logarithmic_forcing() {
    solves("x^2*y'' + x*y' - y = log(x)");
  }
}

mod variation_of_parameters {
  use super::*;

  #[test]
  fn reciprocal_forcing() {
    let (_, report) = solves("y'' - 2*y' + y = exp(x)/x");
    assert_eq!(report.method, Some(Method::ConstantCoefficient));
    let general = report.general.unwrap();
    assert!(general.particular.unwrap().to_string().contains("log(x)"));
  }

  #[test]
  fn with_initial_conditions() {
    let conditions = ["y(1) = 0", "y'(1) = 0"];
    let report =
      dsolve_with("y'' - 2*y' + y = exp(x)/x", &conditions).unwrap();
    let y = report.expression().unwrap();
    assert!(value_at(y, 1.0).abs() < 1e-9);
    assert!(!y.to_string().contains('C'));
  }
}

mod unsupported_forcing {
  use super::*;

  #[test]
  fn falls_back_to_numerical() {
    let report = report("y'' + y = 1/(1 + x^2)");
    assert_eq!(report.method, Some(Method::Numerical));
    assert_eq!(report.confidence, Confidence::Numerical);
    let methods: Vec<Method> =
      report.attempts.iter().map(|a| a.method).collect();
    assert_eq!(
      methods,
      vec![
        Method::ConstantCoefficient,
        Method::GenericAnalytical,
        Method::Numerical
      ]
    );
    assert!(!report.attempts[0].succeeded);
    assert!(report.attempts[2].succeeded);

    // reciprocals are real on both sides of zero
    let Some(Solution::Numerical { trajectory }) = &report.solution else {
      panic!("expected a numerical solution");
    };
    assert_eq!(trajectory.domain.start, -10.0);
  }
}
