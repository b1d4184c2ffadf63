pub mod config;
pub mod context;
pub mod control_flow;
pub mod error;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use context::ExecutionContext;
pub use error::{Result, WaypointError};
pub use traits::{Agent, AgentRunner, CandidateJudge, Orchestrator};
pub use types::*;
