//! Time-stepping configuration.

use std::collections::BTreeMap;
use std::fmt;

use rb_core::{RbError, RbResult, Real};
use rb_solver::NewtonConfig;
use serde::{Deserialize, Serialize};

/// Derivative rule used by `TimeStepping`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorType {
    /// Backward Euler (default).
    #[default]
    ImplicitEuler,
    /// Second-order backward differentiation.
    Bdf2,
}

impl IntegratorType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "implicit_euler" | "beuler" => Some(Self::ImplicitEuler),
            "bdf2" => Some(Self::Bdf2),
            _ => None,
        }
    }
}

/// A single value of a flat options map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Real(Real),
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{v}"),
            OptionValue::Integer(v) => write!(f, "{v}"),
            OptionValue::Real(v) => write!(f, "{v}"),
            OptionValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<Real> for OptionValue {
    fn from(v: Real) -> Self {
        OptionValue::Real(v)
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Integer(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

/// Horizon, step size and nonlinear solver settings for a transient solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSteppingParameters {
    pub initial_time: Real,
    pub final_time: Real,
    pub time_step_size: Real,
    pub integrator: IntegratorType,
    /// Safety limit on the number of steps
    pub max_steps: usize,
    pub max_nonlinear_iterations: usize,
    /// Absolute residual tolerance of the per-step Newton solve
    pub nonlinear_tolerance: Real,
}

impl Default for TimeSteppingParameters {
    fn default() -> Self {
        Self {
            initial_time: 0.0,
            final_time: 1.0,
            time_step_size: 0.1,
            integrator: IntegratorType::default(),
            max_steps: 100_000,
            max_nonlinear_iterations: 20,
            nonlinear_tolerance: 1e-10,
        }
    }
}

impl TimeSteppingParameters {
    /// Overlay a flat options map on the defaults. Unknown keys and
    /// ill-typed values are configuration errors.
    pub fn from_options(options: &BTreeMap<String, OptionValue>) -> RbResult<Self> {
        let mut params = Self::default();
        params.apply_options(options)?;
        Ok(params)
    }

    pub fn apply_options(&mut self, options: &BTreeMap<String, OptionValue>) -> RbResult<()> {
        for (key, value) in options {
            match key.as_str() {
                "initial_time" => self.initial_time = real_option(key, value)?,
                "final_time" => self.final_time = real_option(key, value)?,
                "time_step_size" => self.time_step_size = real_option(key, value)?,
                "max_steps" => self.max_steps = count_option(key, value)?,
                "max_nonlinear_iterations" => {
                    self.max_nonlinear_iterations = count_option(key, value)?
                }
                "nonlinear_tolerance" => self.nonlinear_tolerance = real_option(key, value)?,
                "integrator" => {
                    self.integrator = match value {
                        OptionValue::Text(name) => IntegratorType::parse(name),
                        _ => None,
                    }
                    .ok_or_else(|| config_error(key, value))?
                }
                _ => {
                    return Err(RbError::Config {
                        message: format!("unknown time-stepping option '{key}'"),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> RbResult<()> {
        if !(self.time_step_size > 0.0) || !self.time_step_size.is_finite() {
            return Err(RbError::invalid_arg("time_step_size must be positive"));
        }
        if !self.initial_time.is_finite() || !self.final_time.is_finite() {
            return Err(RbError::invalid_arg("time horizon must be finite"));
        }
        if self.final_time < self.initial_time {
            return Err(RbError::invalid_arg(
                "final_time must not precede initial_time",
            ));
        }
        if self.max_steps == 0 {
            return Err(RbError::invalid_arg("max_steps must be positive"));
        }
        Ok(())
    }

    /// Number of uniform steps covering the horizon; the step is shrunk so
    /// the last one lands on `final_time`.
    pub fn step_count(&self) -> usize {
        let span = self.final_time - self.initial_time;
        if span <= 0.0 {
            return 0;
        }
        let ratio = span / self.time_step_size;
        let rounded = ratio.round();
        let steps = if (ratio - rounded).abs() < 1e-9 * ratio.max(1.0) {
            rounded
        } else {
            ratio.ceil()
        };
        steps as usize
    }

    pub fn newton_config(&self) -> NewtonConfig {
        NewtonConfig {
            max_iterations: self.max_nonlinear_iterations,
            abs_tol: self.nonlinear_tolerance,
            ..NewtonConfig::default()
        }
    }
}

fn config_error(key: &str, value: &OptionValue) -> RbError {
    RbError::Config {
        message: format!("invalid value '{value}' for time-stepping option '{key}'"),
    }
}

fn real_option(key: &str, value: &OptionValue) -> RbResult<Real> {
    match value {
        OptionValue::Real(v) => Ok(*v),
        OptionValue::Integer(v) => Ok(*v as Real),
        OptionValue::Text(s) => s.parse().map_err(|_| config_error(key, value)),
        OptionValue::Bool(_) => Err(config_error(key, value)),
    }
}

fn count_option(key: &str, value: &OptionValue) -> RbResult<usize> {
    match value {
        OptionValue::Integer(v) if *v >= 0 => Ok(*v as usize),
        OptionValue::Text(s) => s.parse().map_err(|_| config_error(key, value)),
        _ => Err(config_error(key, value)),
    }
}
