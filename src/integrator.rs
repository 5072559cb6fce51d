//! Adaptive Dormand–Prince 5(4) integration of first-order systems.
//!
//! The integrator steps from `x0` towards a list of output points in one
//! direction, landing exactly on each of them, and reports the state there.

use std::time::Instant;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrationError {
  #[error("step size {step:e} too small at x = {t}")]
  StepSizeTooSmall { step: f64, t: f64 },
  #[error("maximum number of steps ({steps}) exceeded at x = {t}")]
  MaxStepsExceeded { steps: usize, t: f64 },
  #[error("timed out at x = {t}")]
  DeadlineExceeded { t: f64 },
  #[error("invalid input: {0}")]
  InvalidInput(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegratorOptions {
  pub rtol: f64,
  pub atol: f64,
  pub max_steps: usize,
  pub min_step: f64,
  /// Checked before every step.
  pub deadline: Option<Instant>,
}

impl Default for IntegratorOptions {
  fn default() -> Self {
    IntegratorOptions {
      rtol: 1e-8,
      atol: 1e-10,
      max_steps: 100_000,
      min_step: 1e-12,
      deadline: None,
    }
  }
}

// ─── Dormand–Prince tableau ────────────────────────────────────────────

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th order weights
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Error weights (5th - 4th order)
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

/// Order of the embedded error estimate.
const ERROR_ORDER: usize = 4;

struct StepSizeController {
  safety: f64,
  min_factor: f64,
  max_factor: f64,
}

impl Default for StepSizeController {
  fn default() -> Self {
    StepSizeController {
      safety: 0.9,
      min_factor: 0.2,
      max_factor: 10.0,
    }
  }
}

impl StepSizeController {
  /// New step magnitude and whether the step is accepted. `err` is the
  /// normalized error, at most 1 for an acceptable step.
  fn compute_step(&self, h: f64, err: f64, order: usize) -> (f64, bool) {
    let accept = err <= 1.0;
    let exponent = 1.0 / (order as f64 + 1.0);
    let factor = if err == 0.0 {
      self.max_factor
    } else {
      self.safety * (1.0 / err).powf(exponent)
    };
    let factor = factor.clamp(self.min_factor, self.max_factor);
    // never grow after a rejection
    let factor = if accept { factor } else { factor.min(1.0) };
    (h * factor, accept)
  }
}

/// States at the targets that were reached, and the error that stopped
/// the integration before the remaining ones.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialIntegration {
  pub states: Vec<Vec<f64>>,
  pub stopped: Option<IntegrationError>,
}

/// Integrates `y' = f(x, y)` from `(x0, y0)` and returns the state at each
/// of `targets`. Targets must move monotonically away from `x0`.
pub fn integrate_to_points<F>(
  f: F,
  x0: f64,
  y0: &[f64],
  targets: &[f64],
  options: &IntegratorOptions,
) -> Result<Vec<Vec<f64>>, IntegrationError>
where
  F: Fn(f64, &[f64]) -> Vec<f64>,
{
  let run = integrate_partially(f, x0, y0, targets, options);
  match run.stopped {
    Some(error) => Err(error),
    None => Ok(run.states),
  }
}

/// Like [`integrate_to_points`], but keeps the states reached before a
/// failure.
pub fn integrate_partially<F>(
  f: F,
  x0: f64,
  y0: &[f64],
  targets: &[f64],
  options: &IntegratorOptions,
) -> PartialIntegration
where
  F: Fn(f64, &[f64]) -> Vec<f64>,
{
  let mut out = Vec::with_capacity(targets.len());
  let stopped = step_through(&f, x0, y0, targets, options, &mut out).err();
  PartialIntegration {
    states: out,
    stopped,
  }
}

fn step_through<F>(
  f: &F,
  x0: f64,
  y0: &[f64],
  targets: &[f64],
  options: &IntegratorOptions,
  out: &mut Vec<Vec<f64>>,
) -> Result<(), IntegrationError>
where
  F: Fn(f64, &[f64]) -> Vec<f64>,
{
  if y0.is_empty() {
    return Err(IntegrationError::InvalidInput(
      "initial state cannot be empty".to_string(),
    ));
  }
  if !x0.is_finite() || y0.iter().any(|v| !v.is_finite()) {
    return Err(IntegrationError::InvalidInput(
      "initial point is not finite".to_string(),
    ));
  }
  let Some(&last) = targets.last() else {
    return Ok(());
  };
  let direction = if last < x0 { -1.0 } else { 1.0 };
  let mut previous = x0;
  for &t in targets {
    if !t.is_finite() || (t - previous) * direction < 0.0 {
      return Err(IntegrationError::InvalidInput(
        "output points must move monotonically away from x0".to_string(),
      ));
    }
    previous = t;
  }

  let controller = StepSizeController::default();
  let mut x = x0;
  let mut y = y0.to_vec();
  let mut k1 = f(x, &y);
  if k1.iter().any(|v| !v.is_finite()) {
    return Err(IntegrationError::InvalidInput(format!(
      "right-hand side is not finite at x = {}",
      x0
    )));
  }
  let span = (last - x0).abs();
  let mut h = initial_step(f, x, &y, &k1, direction, options)
    .min(span.max(options.min_step));
  let mut steps = 0;

  for &target in targets {
    while (target - x) * direction > 0.0 {
      if steps >= options.max_steps {
        return Err(IntegrationError::MaxStepsExceeded { steps, t: x });
      }
      if options.deadline.is_some_and(|d| Instant::now() >= d) {
        return Err(IntegrationError::DeadlineExceeded { t: x });
      }
      steps += 1;

      let remaining = (target - x).abs();
      let step = h.min(remaining);
      let (y5, k7, err) =
        dormand_prince_step(f, x, &y, &k1, step * direction, options);
      // a NaN error estimate counts as a rejection
      let err = if err.is_nan() { f64::INFINITY } else { err };
      let (h_new, accept) = controller.compute_step(step, err, ERROR_ORDER);
      if accept {
        x = if step == remaining {
          target
        } else {
          x + step * direction
        };
        y = y5;
        k1 = k7;
      }
      h = h_new;
      if h < options.min_step {
        return Err(IntegrationError::StepSizeTooSmall { step: h, t: x });
      }
    }
    out.push(y.clone());
  }
  Ok(())
}

/// One Dormand–Prince step of signed size `h`. Returns the 5th order
/// solution, the derivative there (first stage of the next step) and the
/// normalized error.
fn dormand_prince_step<F>(
  f: &F,
  x: f64,
  y: &[f64],
  k1: &[f64],
  h: f64,
  options: &IntegratorOptions,
) -> (Vec<f64>, Vec<f64>, f64)
where
  F: Fn(f64, &[f64]) -> Vec<f64>,
{
  let stage = |weights: &[(f64, &[f64])]| -> Vec<f64> {
    (0..y.len())
      .map(|i| y[i] + h * weights.iter().map(|(a, k)| a * k[i]).sum::<f64>())
      .collect()
  };

  let k2 = f(x + C2 * h, &stage(&[(A21, k1)]));
  let k3 = f(x + C3 * h, &stage(&[(A31, k1), (A32, &k2[..])]));
  let k4 = f(
    x + C4 * h,
    &stage(&[(A41, k1), (A42, &k2[..]), (A43, &k3[..])]),
  );
  let k5 = f(
    x + C5 * h,
    &stage(&[(A51, k1), (A52, &k2[..]), (A53, &k3[..]), (A54, &k4[..])]),
  );
  let k6 = f(
    x + h,
    &stage(&[
      (A61, k1),
      (A62, &k2[..]),
      (A63, &k3[..]),
      (A64, &k4[..]),
      (A65, &k5[..]),
    ]),
  );
  let y5 = stage(&[
    (B1, k1),
    (B3, &k3[..]),
    (B4, &k4[..]),
    (B5, &k5[..]),
    (B6, &k6[..]),
  ]);
  let k7 = f(x + h, &y5);

  let y_err: Vec<f64> = (0..y.len())
    .map(|i| {
      h * (E1 * k1[i]
        + E3 * k3[i]
        + E4 * k4[i]
        + E5 * k5[i]
        + E6 * k6[i]
        + E7 * k7[i])
    })
    .collect();
  let err = error_norm(&y5, &y_err, y, options.rtol, options.atol);
  (y5, k7, err)
}

fn error_norm(
  y_new: &[f64],
  y_err: &[f64],
  y_old: &[f64],
  rtol: f64,
  atol: f64,
) -> f64 {
  let n = y_new.len();
  let sum: f64 = (0..n)
    .map(|i| {
      let sc = atol + rtol * y_old[i].abs().max(y_new[i].abs());
      (y_err[i] / sc).powi(2)
    })
    .sum();
  (sum / n as f64).sqrt()
}

/// Initial step magnitude following Hairer, Nørsett & Wanner.
fn initial_step<F>(
  f: &F,
  x0: f64,
  y0: &[f64],
  f0: &[f64],
  direction: f64,
  options: &IntegratorOptions,
) -> f64
where
  F: Fn(f64, &[f64]) -> Vec<f64>,
{
  let n = y0.len() as f64;
  let scale: Vec<f64> =
    y0.iter().map(|y| options.atol + options.rtol * y.abs()).collect();
  let norm = |values: &[f64]| {
    values
      .iter()
      .zip(&scale)
      .map(|(v, s)| (v / s).powi(2))
      .sum::<f64>()
      .sqrt()
      / n.sqrt()
  };

  let d0 = norm(y0);
  let d1 = norm(f0);
  let h0 = if d0 < 1e-5 || d1 < 1e-5 {
    1e-6
  } else {
    0.01 * d0 / d1
  };

  // explicit Euler step to estimate the second derivative
  let y1: Vec<f64> = y0
    .iter()
    .zip(f0)
    .map(|(y, f)| y + direction * h0 * f)
    .collect();
  let f1 = f(x0 + direction * h0, &y1);
  let difference: Vec<f64> = f1.iter().zip(f0).map(|(a, b)| a - b).collect();
  let d2 = norm(&difference) / h0;

  let h1 = if !d2.is_finite() {
    h0 * 1e-3
  } else if d1.max(d2) <= 1e-15 {
    (h0 * 1e-3).max(1e-6)
  } else {
    (0.01 / d1.max(d2)).powf(1.0 / (ERROR_ORDER as f64 + 1.0))
  };
  (100.0 * h0).min(h1).max(options.min_step)
}
