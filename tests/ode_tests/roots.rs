use super::*;

use odesolver::algebra::numeric::to_f64;
use odesolver::ode::auxiliary::{build_auxiliary, PolynomialKind};
use odesolver::algebra::polynomial::AlgebraicRoot;
use odesolver::ode::roots::{
  classify_polynomial_roots, classify_roots, ClassifiedRoot,
};

mod auxiliary_polynomial {
  use super::*;

  #[test]
  fn descending_powers() {
    let ode = parse_ode("y'' - 3*y' + 2*y = 0").unwrap();
    let polynomial = build_auxiliary(&ode, 2).unwrap();
    assert_eq!(polynomial.to_string(), "r^2 - 3*r + 2");
    assert_eq!(polynomial.kind(), PolynomialKind::Auxiliary);
    assert_eq!(polynomial.variable(), "r");
  }

  #[test]
  fn missing_middle_term() {
    let ode = parse_ode("y'' + y = 0").unwrap();
    assert_eq!(build_auxiliary(&ode, 2).unwrap().to_string(), "r^2 + 1");
  }

  #[test]
  fn indeterminate_avoids_names_in_the_equation() {
    let ode = parse_ode("y'' + r*y = 0").unwrap();
    assert_eq!(build_auxiliary(&ode, 2).unwrap().variable(), "s");
  }

  #[test]
  fn degree_mismatch_is_a_defect() {
    let ode = parse_ode("y'' + y = 0").unwrap();
    assert!(matches!(
      build_auxiliary(&ode, 3),
      Err(SolveError::InternalConsistencyFailure(_))
    ));
  }
}

mod classified {
  use super::*;

  #[test]
  fn from_root_lists() {
    let real = |n| AlgebraicRoot::real(Expr::int(n));
    let distinct = classify_roots(&[real(2), real(1)]).unwrap();
    assert_eq!(
      distinct.roots,
      vec![
        ClassifiedRoot::RealDistinct {
          value: Expr::int(1)
        },
        ClassifiedRoot::RealDistinct {
          value: Expr::int(2)
        },
      ]
    );
    let repeated = classify_roots(&[real(2), real(2)]).unwrap();
    assert_eq!(
      repeated.roots,
      vec![ClassifiedRoot::RealRepeated {
        value: Expr::int(2),
        multiplicity: 2
      }]
    );
    let pair = AlgebraicRoot::complex(Expr::int(1), Expr::int(-2));
    let complex = classify_roots(&[pair.clone(), pair.conjugate()]).unwrap();
    assert_eq!(
      complex.roots,
      vec![ClassifiedRoot::ComplexConjugate {
        re: Expr::int(1),
        im: Expr::int(2),
        multiplicity: 1
      }]
    );
  }

  #[test]
  fn distinct_real_roots_ascending() {
    let ode = parse_ode("y'' - 3*y' + 2*y = 0").unwrap();
    let roots =
      classify_polynomial_roots(&build_auxiliary(&ode, 2).unwrap()).unwrap();
    assert_eq!(
      roots.roots,
      vec![
        ClassifiedRoot::RealDistinct {
          value: Expr::int(1)
        },
        ClassifiedRoot::RealDistinct {
          value: Expr::int(2)
        },
      ]
    );
  }

  #[test]
  fn repeated_root() {
    let roots = report("y'' + 2*y' + y = 0").roots.unwrap();
    assert_eq!(
      roots.roots,
      vec![ClassifiedRoot::RealRepeated {
        value: Expr::int(-1),
        multiplicity: 2
      }]
    );
    assert_eq!(roots.degree(), 2);
  }

  #[test]
  fn complex_pair_keeps_positive_imaginary_part() {
    let roots = report("y'' + 4*y = 0").roots.unwrap();
    assert_eq!(roots.roots.len(), 1);
    let ClassifiedRoot::ComplexConjugate {
      re,
      im,
      multiplicity,
    } = &roots.roots[0]
    else {
      panic!("expected a complex pair, got {:?}", roots.roots);
    };
    assert_eq!(to_f64(re), Some(0.0));
    assert_eq!(to_f64(im), Some(2.0));
    assert_eq!(*multiplicity, 1);
    assert_eq!(roots.degree(), 2);
  }

  #[test]
  fn complex_pair_display() {
    let roots = report("y'' + 2*y' + 5*y = 0").roots.unwrap();
    assert_eq!(roots.roots[0].to_string(), "-1 + 2*i, -1 - 2*i");
  }

  #[test]
  fn repeated_complex_pair() {
    let roots = report("y'''' + 2*y'' + y = 0").roots.unwrap();
    assert_eq!(roots.roots.len(), 1);
    assert_eq!(roots.roots[0].multiplicity(), 2);
    assert_eq!(roots.degree(), 4);
    assert_eq!(roots.expanded().len(), 4);
  }

  #[test]
  fn reals_before_complex() {
    let roots = report("y''' - y = 0").roots.unwrap();
    assert_eq!(
      roots.roots[0],
      ClassifiedRoot::RealDistinct {
        value: Expr::int(1)
      }
    );
    assert!(matches!(
      roots.roots[1],
      ClassifiedRoot::ComplexConjugate { multiplicity: 1, .. }
    ));
  }
}
