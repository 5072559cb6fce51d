use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use odesolver::ode::classify::classify;
use odesolver::solver::{SolveReport, Solver, SolverConfig};
use odesolver::{parse_initial_condition, parse_ode_with};
use tracing::Level;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,

  /// Maximum level of log messages written to stderr
  #[arg(long, global = true, default_value = "warn")]
  log_level: Level,
}

#[derive(Subcommand)]
enum Commands {
  /// Print order, linearity and coefficient type of an equation
  Classify {
    /// The equation, e.g. "y'' - 3*y' + 2*y = 0"
    equation: String,
    #[command(flatten)]
    names: Names,
  },
  /// Solve an equation in closed form or numerically
  Solve {
    /// The equation, e.g. "x^2*y'' + x*y' + y = 0"
    equation: String,
    #[command(flatten)]
    names: Names,
    /// Initial condition such as "y(0) = 1" (repeatable)
    #[arg(long = "ic")]
    conditions: Vec<String>,
    #[arg(long, value_enum, default_value_t = Format::Plain)]
    format: Format,
    /// Timeout per method in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Number of points in sampled trajectories
    #[arg(long)]
    samples: Option<usize>,
  },
}

#[derive(clap::Args)]
struct Names {
  /// Independent variable
  #[arg(long, default_value = "x")]
  independent: String,
  /// Dependent function
  #[arg(long, default_value = "y")]
  dependent: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
  Plain,
  Latex,
  Json,
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  tracing_subscriber::fmt()
    .with_max_level(cli.log_level)
    .with_writer(std::io::stderr)
    .init();

  match cli.command {
    Commands::Classify { equation, names } => {
      let ode =
        parse_ode_with(&equation, &names.independent, &names.dependent)?;
      println!("{}", classify(&ode));
    }
    Commands::Solve {
      equation,
      names,
      conditions,
      format,
      timeout_ms,
      samples,
    } => {
      let ode =
        parse_ode_with(&equation, &names.independent, &names.dependent)?;
      let conditions = conditions
        .iter()
        .map(|c| {
          parse_initial_condition(c, &names.independent, &names.dependent)
            .with_context(|| format!("in initial condition {:?}", c))
        })
        .collect::<Result<Vec<_>>>()?;

      let mut config = SolverConfig::default();
      if let Some(ms) = timeout_ms {
        config.analytical_timeout = Duration::from_millis(ms);
        config.numerical_timeout = Duration::from_millis(ms);
      }
      if let Some(samples) = samples {
        config.samples = samples;
      }
      let report = Solver::new(config).solve_blocking(ode, conditions);
      print_report(&report, format)?;
    }
  }
  Ok(())
}

fn print_report(report: &SolveReport, format: Format) -> Result<()> {
  match format {
    Format::Plain => println!("{}", report),
    Format::Latex => println!("{}", report.to_latex()),
    Format::Json => println!("{}", serde_json::to_string_pretty(report)?),
  }
  Ok(())
}
