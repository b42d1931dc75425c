//! Engine configuration, loadable from YAML.

use std::path::{Path, PathBuf};

use rb_core::{RbError, RbResult};
use rb_solver::NewtonConfig;
use rb_timestep::TimeSteppingParameters;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nonlinear stationary solves
    pub newton: NewtonConfig,
    /// Defaults for every time-stepped solve
    pub time_stepping: TimeSteppingParameters,
    /// Where offline data is stored, if anywhere
    pub storage_dir: Option<PathBuf>,
}

impl EngineConfig {
    pub fn from_yaml_str(content: &str) -> RbResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(content).map_err(|e| RbError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_yaml(path: &Path) -> RbResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RbError::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_string(&self) -> RbResult<String> {
        serde_yaml::to_string(self).map_err(|e| RbError::Config {
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> RbResult<()> {
        if self.newton.max_iterations == 0 {
            return Err(RbError::Config {
                message: "newton.max_iterations must be positive".to_string(),
            });
        }
        self.time_stepping.validate().map_err(|e| RbError::Config {
            message: format!("time_stepping: {e}"),
        })
    }
}
