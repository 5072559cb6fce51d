use super::*;

use odesolver::ode::auxiliary::PolynomialKind;
use odesolver::ode::euler_cauchy::{characteristic_polynomial, detect};

mod detection {
  use super::*;

  #[test]
  fn accepts_equidimensional_equation() {
    let ode = parse_ode("2*x^2*y'' + 3*x*y' - y = 0").unwrap();
    let detection = detect(ode.homogeneous(), 2, "x", "y").unwrap();
    assert!(detection.is_euler_cauchy);
    assert_eq!(
      detection.coefficients,
      Some(vec![Expr::int(-1), Expr::int(3), Expr::int(2)])
    );
  }

  #[test]
  fn rejects_wrong_power_of_x() {
    let ode = parse_ode("x*y'' + y = 0").unwrap();
    let detection = detect(ode.homogeneous(), 2, "x", "y").unwrap();
    assert!(!detection.is_euler_cauchy);
    assert_eq!(detection.coefficients, None);
  }

  #[test]
  fn rejects_shifted_coefficient() {
    let ode = parse_ode("(x + 1)*y'' + x*y' + y = 0").unwrap();
    let detection = detect(ode.homogeneous(), 2, "x", "y").unwrap();
    assert!(!detection.is_euler_cauchy);
  }

  #[test]
  fn rejects_products_of_derivatives() {
    let ode = parse_ode("x^2*y''*y + x*y' = 0").unwrap();
    let detection = detect(ode.homogeneous(), 2, "x", "y").unwrap();
    assert!(!detection.is_euler_cauchy);
  }

  #[test]
  fn order_zero_is_a_defect() {
    let ode = parse_ode("x*y' + y = 0").unwrap();
    assert!(matches!(
      detect(ode.homogeneous(), 0, "x", "y"),
      Err(SolveError::InternalConsistencyFailure(_))
    ));
  }
}

mod characteristic {
  use super::*;

  #[test]
  fn falling_factorial_polynomial() {
    // r(r - 1) + r + 1
    let coefficients = [Expr::int(1), Expr::int(1), Expr::int(1)];
    let polynomial = characteristic_polynomial(&coefficients, "r").unwrap();
    assert_eq!(polynomial.to_string(), "r^2 + 1");
    assert_eq!(polynomial.kind(), PolynomialKind::EulerCauchy);
    assert_eq!(polynomial.degree(), 2);
  }

  #[test]
  fn reported_with_the_solution() {
    let report = report("x^2*y'' + x*y' - y = 0");
    let characteristic = report.characteristic.unwrap();
    assert_eq!(characteristic.to_string(), "r^2 - 1");
    assert_eq!(characteristic.kind(), PolynomialKind::EulerCauchy);
  }
}

mod solutions {
  use super::*;

  #[test]
  fn distinct_real_roots() {
    assert_eq!(solution("x**2*y'' + x*y' - y = 0"), "C1/x + C2*x");
  }

  #[test]
  fn complex_roots() {
    assert_eq!(
      solution("x^2*y'' + x*y' + y = 0"),
      "C1*cos(log(x)) + C2*sin(log(x))"
    );
  }

  #[test]
  fn repeated_root() {
    let (_, report) = solves("x^2*y'' - x*y' + y = 0");
    assert_eq!(report.method, Some(Method::EulerCauchy));
  }

  #[test]
  fn third_order() {
    let (_, report) = solves("x^3*y''' - 6*x*y' + 12*y = 0");
    assert_eq!(report.general.unwrap().constants.len(), 3);
  }

  #[test]
  fn repeated_complex_pair() {
    // characteristic (r^2 + 1)^2
    let (_, report) =
      solves("x^4*y'''' + 6*x^3*y''' + 9*x^2*y'' + 3*x*y' + y = 0");
    assert_eq!(report.method, Some(Method::EulerCauchy));
    assert_eq!(report.characteristic.unwrap().to_string(), "r^4 + 2*r^2 + 1");
    let general = report.general.unwrap();
    assert_eq!(general.constants, vec!["C1", "C2", "C3", "C4"]);
    let text = general.to_expr().to_string();
    assert!(text.contains("cos(log(x))"));
    assert!(text.contains("sin(log(x))"));
    assert!(text.contains("C2*log(x)"));
  }

  #[test]
  fn sampled_on_positive_domain() {
    let report = report("x^2*y'' + x*y' - y = 0");
    let Some(Solution::Analytical {
      samples: Some(samples),
      ..
    }) = report.solution
    else {
      panic!("expected a sampled analytical solution");
    };
    assert_eq!(samples.domain.start, 0.1);
    assert_eq!(samples.points.len(), 500);
  }
}
