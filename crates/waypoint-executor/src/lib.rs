pub mod executor;
pub mod extract;

pub use executor::{PathExecutor, EXECUTOR_AGENT_TYPE};
pub use extract::{decode_path, extract_agent_path, navigate, PathShape};
