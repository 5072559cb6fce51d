use super::*;

mod first_order {
  use super::*;

  #[test]
  fn separable() {
    let report = report("y' - y^2 = 0");
    assert_eq!(report.method, Some(Method::GenericAnalytical));
    assert_eq!(report.expression().unwrap().to_string(), "-1/(C1 + x)");
    assert_eq!(report.characteristic, None);
    // reciprocals are real on both sides of their pole
    let Some(Solution::Analytical {
      samples: Some(samples),
      ..
    }) = &report.solution
    else {
      panic!("expected a sampled analytical solution");
    };
    assert_eq!(samples.domain.start, -10.0);
  }

  #[test]
  fn separable_with_condition() {
    let report = dsolve_with("y' - y^2 = 0", &["y(0) = 1"]).unwrap();
    let y = report.expression().unwrap();
    assert!((value_at(y, 0.5) - 2.0).abs() < 1e-12);
  }

  #[test]
  fn linear_variable_coefficient() {
    let (_, report) = solves("y' = x*y");
    assert_eq!(report.method, Some(Method::GenericAnalytical));
    assert_eq!(report.confidence, Confidence::AnalyticalHigh);
  }

  #[test]
  fn integrating_factor() {
    solves("y' + y/x = 1");
  }

  #[test]
  fn bernoulli() {
    let (_, report) = solves("y' + y = y^3");
    assert_eq!(report.method, Some(Method::GenericAnalytical));
  }

  #[test]
  fn attempts_skip_structural_methods() {
    let report = report("y' = x*y");
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(report.attempts[0].method, Method::GenericAnalytical);
    assert!(report.attempts[0].succeeded);
    assert_eq!(report.attempts[0].reason, None);
  }
}

mod fallback {
  use super::*;

  #[test]
  fn second_order_variable_coefficient_is_integrated() {
    let report = report("(x + 1)*y'' + y = 0");
    assert_eq!(report.attempts[0].method, Method::GenericAnalytical);
    assert!(!report.attempts[0].succeeded);
    assert_eq!(report.attempts[1].method, Method::Numerical);
  }

  #[test]
  fn riccati_pole_masks_the_rest() {
    // y(0) = 1 reaches a pole before x = 1
    let report = report("y' = y^2 + x");
    assert_eq!(report.method, Some(Method::Numerical));
    let Some(Solution::Numerical { trajectory }) = &report.solution else {
      panic!("expected a numerical solution");
    };
    assert!(trajectory.masked > 0);
    assert!(!trajectory.points.is_empty());
    assert!(trajectory.points.iter().all(|(x, _)| *x < 1.0));
    assert_eq!(trajectory.points[0].0, -10.0);
  }
}
