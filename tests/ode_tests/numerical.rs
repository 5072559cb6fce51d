use super::*;

use std::time::{Duration, Instant};

use odesolver::ode::numerical::{
  integrate_system, to_first_order_system, Domain,
};
use odesolver::integrator::IntegratorOptions;
use odesolver::parse_initial_condition;
use odesolver::solver::{Solver, SolverConfig};

fn trajectory(report: &SolveReport) -> Vec<(f64, f64)> {
  match &report.solution {
    Some(Solution::Numerical { trajectory }) => trajectory.points.clone(),
    other => panic!("expected a numerical solution, got {:?}", other),
  }
}

mod first_order_system {
  use super::*;

  #[test]
  fn state_shifts_down() {
    let ode = parse_ode("y''' + y*y' = 0").unwrap();
    let system = to_first_order_system(&ode, 3).unwrap();
    assert_eq!(system.order(), 3);
    let rates = system.derivatives(0.0, &[1.0, 2.0, 3.0]);
    assert_eq!(rates, vec![2.0, 3.0, -2.0]);
  }

  #[test]
  fn highest_derivative_is_isolated() {
    let ode = parse_ode("2*y'' + sin(y) = x").unwrap();
    let system = to_first_order_system(&ode, 2).unwrap();
    let rates = system.derivatives(1.0, &[0.0, 5.0]);
    assert_eq!(rates[0], 5.0);
    assert!((rates[1] - 0.5).abs() < 1e-15);
  }

  #[test]
  fn free_parameters_cannot_be_integrated() {
    let ode = parse_ode("y'' + a*sin(y) = 0").unwrap();
    assert!(matches!(
      to_first_order_system(&ode, 2),
      Err(SolveError::AlgebraFailure(_))
    ));
  }

  #[test]
  fn size_must_match_order() {
    let ode = parse_ode("y'' + sin(y) = 0").unwrap();
    assert!(matches!(
      to_first_order_system(&ode, 1),
      Err(SolveError::InternalConsistencyFailure(_))
    ));
  }

  #[test]
  fn logarithms_need_positive_domain() {
    let ode = parse_ode("y'' + log(x)*sin(y) = 0").unwrap();
    assert!(to_first_order_system(&ode, 2)
      .unwrap()
      .requires_positive_domain());
  }
}

mod integration {
  use super::*;

  #[test]
  fn exponential_growth() {
    let ode = parse_ode("y' = y").unwrap();
    let system = to_first_order_system(&ode, 1).unwrap();
    let condition = parse_initial_condition("y(0) = 1", "x", "y").unwrap();
    let trajectory = integrate_system(
      &system,
      &[condition],
      Domain::new(-1.0, 1.0),
      5,
      &IntegratorOptions::default(),
    )
    .unwrap();
    assert_eq!(trajectory.points.len(), 5);
    for (x, y) in trajectory.points {
      assert!((y - x.exp()).abs() < 1e-7, "y({}) = {}", x, y);
    }
  }

  #[test]
  fn oscillator_against_cosine() {
    let ode = parse_ode("y'' + y = 0").unwrap();
    let system = to_first_order_system(&ode, 2).unwrap();
    let conditions = [
      parse_initial_condition("y(0) = 1", "x", "y").unwrap(),
      parse_initial_condition("y'(0) = 0", "x", "y").unwrap(),
    ];
    let trajectory = integrate_system(
      &system,
      &conditions,
      Domain::new(-3.0, 3.0),
      13,
      &IntegratorOptions::default(),
    )
    .unwrap();
    assert_eq!(trajectory.masked, 0);
    for (x, y) in trajectory.points {
      assert!((y - x.cos()).abs() < 1e-6, "y({}) = {}", x, y);
    }
  }

  #[test]
  fn conditions_at_different_points() {
    let ode = parse_ode("y'' + sin(y) = 0").unwrap();
    let system = to_first_order_system(&ode, 2).unwrap();
    let conditions = [
      parse_initial_condition("y(0) = 1", "x", "y").unwrap(),
      parse_initial_condition("y'(1) = 0", "x", "y").unwrap(),
    ];
    let result = integrate_system(
      &system,
      &conditions,
      Domain::new(-1.0, 1.0),
      5,
      &IntegratorOptions::default(),
    );
    assert!(matches!(
      result,
      Err(SolveError::IntegrationFailure { domain, .. })
        if domain == (-1.0, 1.0)
    ));
  }
}

mod solver {
  use super::*;

  #[test]
  fn pendulum() {
    let report = report("y'' + sin(y) = 0");
    assert_eq!(report.method, Some(Method::Numerical));
    assert_eq!(report.confidence, Confidence::Numerical);
    assert_eq!(trajectory(&report).len(), 500);
    assert_eq!(
      report.solution_text(),
      "numerical solution on [-10, 10] (500 points)"
    );
  }

  #[test]
  fn pendulum_at_rest() {
    let report =
      dsolve_with("y'' + sin(y) = 0", &["y(0) = 0", "y'(0) = 0"]).unwrap();
    assert!(trajectory(&report).iter().all(|(_, y)| y.abs() < 1e-12));
  }

  #[test]
  fn free_parameter_fails() {
    let report = report("y'' + a*sin(y) = 0");
    assert_eq!(report.confidence, Confidence::Failed);
    assert_eq!(report.failure.unwrap().method, Some(Method::Numerical));
  }

  #[test]
  fn sample_count_is_configurable() {
    let config = SolverConfig {
      samples: 11,
      ..SolverConfig::default()
    };
    let ode = parse_ode("y'' + sin(y) = 0").unwrap();
    let report = Solver::new(config).solve_blocking(ode, Vec::new());
    assert_eq!(trajectory(&report).len(), 11);
  }

  #[test]
  fn analytical_solutions_are_sampled() {
    let config = SolverConfig {
      samples: 21,
      ..SolverConfig::default()
    };
    let ode = parse_ode("y'' - 3*y' + 2*y = 0").unwrap();
    let report = Solver::new(config).solve_blocking(ode, Vec::new());
    let Some(Solution::Analytical {
      samples: Some(samples),
      ..
    }) = &report.solution
    else {
      panic!("expected a sampled analytical solution");
    };
    // C1 = 1, C2 = 0
    assert_eq!(samples.points.len(), 21);
    assert_eq!(samples.points[10], (0.0, 1.0));
  }

  #[test]
  fn pole_in_the_forcing_masks_the_far_side() {
    let report = report("y'' + sin(y) = 1/(x - 5)");
    assert_eq!(report.method, Some(Method::Numerical));
    let Some(Solution::Numerical { trajectory }) = &report.solution else {
      panic!("expected a numerical solution");
    };
    assert!(trajectory.masked > 0);
    assert_eq!(trajectory.points.len() + trajectory.masked, 500);
    assert!(trajectory.points.iter().all(|(x, _)| *x < 5.0));
  }

  #[test]
  fn numerical_timeout_bounds_the_call() {
    let config = SolverConfig {
      numerical_timeout: Duration::from_millis(50),
      samples: 400_000,
      integrator: IntegratorOptions {
        rtol: 1e-13,
        atol: 1e-13,
        max_steps: usize::MAX,
        ..IntegratorOptions::default()
      },
      ..SolverConfig::default()
    };
    let ode = parse_ode("y'' + sin(y) = 0").unwrap();
    let started = Instant::now();
    let report = Solver::new(config).solve_blocking(ode, Vec::new());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.confidence, Confidence::Failed);
    let failure = report.failure.unwrap();
    assert_eq!(failure.method, Some(Method::Numerical));
    assert!(failure.reason.contains("timed out"), "{}", failure.reason);
  }

  #[test]
  fn analytical_timeout_hands_over_to_integration() {
    let config = SolverConfig {
      analytical_timeout: Duration::ZERO,
      samples: 11,
      ..SolverConfig::default()
    };
    let ode = parse_ode("y'' + y = 0").unwrap();
    let report = Solver::new(config).solve_blocking(ode, Vec::new());
    let first = &report.attempts[0];
    assert_eq!(first.method, Method::ConstantCoefficient);
    assert!(!first.succeeded);
    assert!(first.reason.as_deref().unwrap().contains("timed out"));
    assert_eq!(report.method, Some(Method::Numerical));
    assert_eq!(trajectory(&report).len(), 11);
  }

  #[tokio::test]
  async fn solves_inside_a_runtime() {
    let ode = parse_ode("y' + y = 0").unwrap();
    let report = Solver::default().solve(ode, Vec::new()).await;
    assert_eq!(report.method, Some(Method::ConstantCoefficient));
    assert_eq!(report.expression().unwrap().to_string(), "C1*exp(-x)");
  }
}
