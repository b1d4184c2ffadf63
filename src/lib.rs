//! Waypoint: dynamic routing and execution for agent workflows.
//!
//! The scout picks what runs next, the path executor runs a committed
//! path, and the fork/join coordinator tracks concurrent branches. This
//! crate ties them to one [`AppConfig`].

use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

pub use waypoint_core::{config, control_flow, error, traits, types};
pub use waypoint_executor as executor;
pub use waypoint_forkjoin as forkjoin;
pub use waypoint_scout as scout;

pub use waypoint_core::config::{AppConfig, LogConfig};
pub use waypoint_core::{ExecutionContext, Result, WaypointError};
pub use waypoint_executor::PathExecutor;
pub use waypoint_forkjoin::ForkGroupManager;
pub use waypoint_scout::{Scout, ScoutResult, ScoutStatus};

/// Install a fmt subscriber filtered by `RUST_LOG`, else by `config.filter`.
pub fn init_tracing(config: &LogConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter)),
        )
        .with_target(false)
        .try_init()
        .map_err(|e| WaypointError::Unexpected(format!("tracing already initialised: {}", e)))
}

/// Configured entry point: builds scouts and executors and owns the
/// fork/join coordinator.
#[derive(Clone)]
pub struct Waypoint {
    config: AppConfig,
    forks: ForkGroupManager,
}

impl Waypoint {
    pub fn new(config: AppConfig) -> Result<Self> {
        let forks = ForkGroupManager::from_config(&config.fork_join)?;
        info!(fork_join = ?config.fork_join, executor = config.executor.is_some(), "Waypoint initialised");
        Ok(Self { config, forks })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::new(AppConfig::load(path)?)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn scout(&self, id: impl Into<String>) -> Scout {
        Scout::new(id, self.config.scout.clone())
    }

    /// An executor for the `[executor]` section.
    pub fn path_executor(&self, id: impl Into<String>) -> Result<PathExecutor> {
        let config = self.config.executor.as_ref().ok_or_else(|| {
            WaypointError::Config("no [executor] section configured".to_string())
        })?;
        Ok(PathExecutor::from_config(id, config))
    }

    pub fn forks(&self) -> &ForkGroupManager {
        &self.forks
    }
}
