use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use waypoint_core::config::PathExecutorConfig;
use waypoint_core::control_flow::is_control_flow_in;
use waypoint_core::error::{panic_message, Result, WaypointError};
use waypoint_core::traits::{Agent, Orchestrator};
use waypoint_core::types::{error_marker, AgentHandle, OnAgentFailure, Outputs, PathExecutionResult, PathStatus};
use waypoint_core::ExecutionContext;

use crate::extract::extract_agent_path;

/// Agent type reported by the executor; classified as control flow.
pub const EXECUTOR_AGENT_TYPE: &str = "path-executor";

/// Runs a committed path, one agent at a time.
///
/// The path is read from the previous outputs at `path_source`, stripped
/// of this node and of control-flow nodes, then executed in order. Each
/// agent sees the original input plus everything produced before it.
#[derive(Debug, Clone)]
pub struct PathExecutor {
    node_id: String,
    path_source: String,
    on_agent_failure: OnAgentFailure,
}

impl PathExecutor {
    pub fn new(node_id: impl Into<String>, path_source: impl Into<String>, on_agent_failure: OnAgentFailure) -> Self {
        Self {
            node_id: node_id.into(),
            path_source: path_source.into(),
            on_agent_failure,
        }
    }

    /// Construct from a textual failure policy; an unknown policy is a
    /// configuration error.
    pub fn parse(node_id: impl Into<String>, path_source: impl Into<String>, on_agent_failure: &str) -> Result<Self> {
        Ok(Self::new(node_id, path_source, on_agent_failure.parse()?))
    }

    pub fn from_config(node_id: impl Into<String>, config: &PathExecutorConfig) -> Self {
        Self::new(node_id, config.path_source.clone(), config.on_agent_failure)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn path_source(&self) -> &str {
        &self.path_source
    }

    pub fn on_agent_failure(&self) -> OnAgentFailure {
        self.on_agent_failure
    }

    /// Execute the committed path. Never fails: every error and panic is
    /// reported through the returned result.
    pub async fn execute(&self, ctx: &ExecutionContext) -> PathExecutionResult {
        match AssertUnwindSafe(self.run(ctx)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(executor = %self.node_id, run_id = %ctx.run_id, error = %e, "Path execution failed");
                PathExecutionResult::failed(e.to_string())
            }
            Err(panic) => {
                let message = format!("unexpected panic: {}", panic_message(panic.as_ref()));
                error!(executor = %self.node_id, run_id = %ctx.run_id, error = %message, "Path execution panicked");
                PathExecutionResult::failed(message)
            }
        }
    }

    /// Drop this node and every control-flow node from `path`.
    pub fn filter_path(&self, path: Vec<String>, orchestrator: Option<&dyn Orchestrator>) -> Vec<String> {
        path.into_iter()
            .filter(|id| {
                let keep = *id != self.node_id && !is_control_flow_in(id, orchestrator);
                if !keep {
                    debug!(executor = %self.node_id, agent_id = %id, "Skipping control-flow node");
                }
                keep
            })
            .collect()
    }

    async fn run(&self, ctx: &ExecutionContext) -> Result<PathExecutionResult> {
        let path = extract_agent_path(&ctx.previous_outputs, &self.path_source)?;
        let orchestrator = ctx.orchestrator().cloned();

        let path = self.filter_path(path, orchestrator.as_deref());
        if path.is_empty() {
            return Err(WaypointError::Extraction(format!(
                "path at '{}' has no executable agents after filtering",
                self.path_source
            )));
        }

        let orchestrator = orchestrator
            .ok_or_else(|| WaypointError::Context("no orchestrator in execution context".into()))?;
        let runner = orchestrator
            .runner()
            .ok_or_else(|| WaypointError::Context("orchestrator cannot run agents".into()))?;
        let registry = orchestrator.agents();

        info!(
            executor = %self.node_id,
            run_id = %ctx.run_id,
            path = ?path,
            policy = %self.on_agent_failure,
            "Executing committed path"
        );

        let mut results = Outputs::new();
        let mut executed_path = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut aborted = false;

        for (step_index, agent_id) in path.iter().enumerate() {
            if registry.is_some_and(|r| !r.contains(agent_id)) {
                let message = WaypointError::AgentNotFound(agent_id.clone()).to_string();
                warn!(executor = %self.node_id, agent_id = %agent_id, "Agent not registered");
                errors.push(message.clone());
                if self.on_agent_failure == OnAgentFailure::Abort {
                    aborted = true;
                    break;
                }
                results.insert(agent_id.clone(), error_marker(&message));
                executed_path.push(agent_id.clone());
                continue;
            }

            let payload = ExecutionContext {
                input: ctx.input.clone(),
                previous_outputs: results.clone(),
                orchestrator: Some(orchestrator.clone()),
                run_id: ctx.run_id.clone(),
                step_index,
                current_agent_id: Some(agent_id.clone()),
            };
            let call = runner.run_agent(agent_id.clone(), ctx.input.clone(), results.clone(), payload);
            let outcome = match AssertUnwindSafe(call).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(e.to_string()),
                Err(panic) => Err(format!("{} panicked: {}", agent_id, panic_message(panic.as_ref()))),
            };

            executed_path.push(agent_id.clone());
            match outcome {
                Ok(value) => {
                    debug!(executor = %self.node_id, agent_id = %agent_id, step_index, "Agent completed");
                    results.insert(agent_id.clone(), value);
                }
                Err(message) => {
                    warn!(executor = %self.node_id, agent_id = %agent_id, error = %message, "Agent failed");
                    results.insert(agent_id.clone(), error_marker(&message));
                    errors.push(message);
                    if self.on_agent_failure == OnAgentFailure::Abort {
                        aborted = true;
                        break;
                    }
                }
            }
        }

        let status = if errors.is_empty() {
            PathStatus::Success
        } else if aborted {
            PathStatus::Error
        } else {
            PathStatus::Partial
        };
        info!(
            executor = %self.node_id,
            run_id = %ctx.run_id,
            executed = executed_path.len(),
            errors = errors.len(),
            status = ?status,
            "Path execution finished"
        );

        Ok(PathExecutionResult {
            error: aborted.then(|| errors.last().cloned()).flatten(),
            executed_path,
            results,
            status,
            errors,
        })
    }
}

impl Agent for PathExecutor {
    fn id(&self) -> &str {
        &self.node_id
    }

    fn agent_type(&self) -> &str {
        EXECUTOR_AGENT_TYPE
    }

    fn describe(&self) -> AgentHandle {
        AgentHandle::new(&self.node_id, EXECUTOR_AGENT_TYPE)
            .with_description(format!("Executes the path found at '{}'", self.path_source))
    }

    fn run(&self, ctx: ExecutionContext) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let result = self.execute(&ctx).await;
            Ok(serde_json::to_value(result)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use waypoint_core::types::is_error_marker;
    use waypoint_test_utils::{context_with, MockOrchestrator, ScriptedAgent};

    fn three_agents(middle: ScriptedAgent) -> Arc<MockOrchestrator> {
        Arc::new(
            MockOrchestrator::new()
                .with_agent(ScriptedAgent::echo("a"))
                .with_agent(middle)
                .with_agent(ScriptedAgent::echo("c")),
        )
    }

    fn routed(orch: Arc<MockOrchestrator>, path: Value) -> ExecutionContext {
        context_with(orch, json!("plan a trip")).with_output("router", json!({ "target": path }))
    }

    #[test]
    fn test_parse_rejects_unknown_policy() {
        let err = PathExecutor::parse("exec", "router", "retry").unwrap_err();
        assert!(matches!(err, WaypointError::Config(_)));
        let exec = PathExecutor::parse("exec", "router", "abort").unwrap();
        assert_eq!(exec.on_agent_failure(), OnAgentFailure::Abort);
    }

    #[tokio::test]
    async fn test_results_stored_verbatim() {
        let orch = three_agents(ScriptedAgent::returning("b", json!({"flights": 3, "cheapest": "LIS"})));
        let exec = PathExecutor::new("exec", "router", OnAgentFailure::Abort);
        let result = exec.execute(&routed(orch, json!(["a", "b", "c"]))).await;

        assert_eq!(result.status, PathStatus::Success);
        assert_eq!(result.results["b"], json!({"flights": 3, "cheapest": "LIS"}));
        assert_eq!(result.results["c"]["saw"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_all_agents_succeed() {
        let orch = three_agents(ScriptedAgent::echo("b"));
        let ctx = routed(orch.clone(), json!(["a", "b", "c"]));
        let exec = PathExecutor::new("exec", "router", OnAgentFailure::Continue);
        let result = exec.execute(&ctx).await;

        assert_eq!(result.status, PathStatus::Success);
        assert_eq!(result.executed_path, vec!["a", "b", "c"]);
        let keys: Vec<&String> = result.results.keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!(result.errors.is_empty());
        assert!(result.error.is_none());
        assert_eq!(orch.calls(), vec!["a", "b", "c"]);

        // Each agent sees the original input and what ran before it.
        assert_eq!(result.results["c"]["input"], "plan a trip");
        assert_eq!(result.results["c"]["saw"], json!(["a", "b"]));
        assert_eq!(result.results["a"]["saw"], json!([]));
    }

    #[tokio::test]
    async fn test_self_and_control_flow_filtered() {
        let orch = Arc::new(
            MockOrchestrator::new()
                .with_agent(ScriptedAgent::echo("a"))
                .with_agent(ScriptedAgent::echo("router2").with_type("GraphScoutAgent"))
                .with_agent(ScriptedAgent::echo("b")),
        );
        let ctx = routed(orch, json!(["exec", "a", "input_validator", "router2", "b"]));
        let result = PathExecutor::new("exec", "router", OnAgentFailure::Continue).execute(&ctx).await;

        assert_eq!(result.status, PathStatus::Success);
        assert_eq!(result.executed_path, vec!["a", "b"]);
        assert!(!result.executed_path.contains(&"exec".to_string()));
    }

    #[tokio::test]
    async fn test_middle_failure_continue() {
        let orch = three_agents(ScriptedAgent::failing("b", "rate limited"));
        let ctx = routed(orch, json!(["a", "b", "c"]));
        let result = PathExecutor::new("exec", "router", OnAgentFailure::Continue).execute(&ctx).await;

        assert_eq!(result.status, PathStatus::Partial);
        assert_eq!(result.executed_path.len(), 3);
        assert!(is_error_marker(&result.results["b"]));
        assert!(result.results["b"]["error"].as_str().unwrap().contains("rate limited"));
        assert_eq!(result.errors.len(), 1);
        // The failure marker is visible downstream.
        assert_eq!(result.results["c"]["saw"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_middle_failure_abort() {
        let orch = three_agents(ScriptedAgent::failing("b", "rate limited"));
        let ctx = routed(orch.clone(), json!(["a", "b", "c"]));
        let result = PathExecutor::new("exec", "router", OnAgentFailure::Abort).execute(&ctx).await;

        assert_eq!(result.status, PathStatus::Error);
        assert_eq!(result.executed_path, vec!["a", "b"]);
        assert!(!result.results.contains_key("c"));
        assert_eq!(orch.calls(), vec!["a", "b"]);
        assert!(result.error.unwrap().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_panicking_agent_is_contained() {
        let orch = three_agents(ScriptedAgent::panicking("b", "boom"));
        let ctx = routed(orch, json!(["a", "b", "c"]));
        let result = PathExecutor::new("exec", "router", OnAgentFailure::Continue).execute(&ctx).await;

        assert_eq!(result.status, PathStatus::Partial);
        assert!(result.errors[0].contains("boom"));
        assert!(result.results.contains_key("c"));
    }

    #[tokio::test]
    async fn test_unknown_agent_policies() {
        let orch = three_agents(ScriptedAgent::echo("b"));
        let ctx = routed(orch.clone(), json!(["a", "ghost", "c"]));

        let result = PathExecutor::new("exec", "router", OnAgentFailure::Continue).execute(&ctx).await;
        assert_eq!(result.status, PathStatus::Partial);
        assert_eq!(result.executed_path, vec!["a", "ghost", "c"]);
        assert!(is_error_marker(&result.results["ghost"]));
        assert!(result.errors[0].contains("ghost"));

        let result = PathExecutor::new("exec", "router", OnAgentFailure::Abort).execute(&ctx).await;
        assert_eq!(result.status, PathStatus::Error);
        assert_eq!(result.executed_path, vec!["a"]);
        assert!(!result.results.contains_key("ghost"));
    }

    #[tokio::test]
    async fn test_unknown_agent_without_registry() {
        let orch = Arc::new(MockOrchestrator::new().with_agent(ScriptedAgent::echo("a")).without_registry());
        let ctx = routed(orch, json!(["a", "ghost"]));
        let result = PathExecutor::new("exec", "router", OnAgentFailure::Continue).execute(&ctx).await;
        assert_eq!(result.status, PathStatus::Partial);
        assert!(is_error_marker(&result.results["ghost"]));
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let exec = PathExecutor::new("exec", "router", OnAgentFailure::Continue);

        let ctx = ExecutionContext::new(json!("q")).with_output("router", json!(["a"]));
        let result = exec.execute(&ctx).await;
        assert_eq!(result.status, PathStatus::Error);
        assert!(result.error.unwrap().contains("orchestrator"));

        let orch = Arc::new(MockOrchestrator::new().with_agent(ScriptedAgent::echo("a")).without_runner());
        let result = exec.execute(&routed(orch.clone(), json!(["a"]))).await;
        assert_eq!(result.status, PathStatus::Error);
        assert!(result.executed_path.is_empty());
        assert!(orch.calls().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_and_empty_path_errors() {
        let orch = three_agents(ScriptedAgent::echo("b"));
        let exec = PathExecutor::new("exec", "missing.target", OnAgentFailure::Continue);
        let result = exec.execute(&routed(orch.clone(), json!(["a"]))).await;
        assert_eq!(result.status, PathStatus::Error);
        assert!(result.error.unwrap().contains("missing"));

        let exec = PathExecutor::new("exec", "router", OnAgentFailure::Continue);
        let result = exec.execute(&routed(orch, json!(["exec", "path-executor-2"]))).await;
        assert_eq!(result.status, PathStatus::Error);
        assert!(result.error.unwrap().contains("no executable agents"));
    }

    #[tokio::test]
    async fn test_single_target_string() {
        let orch = three_agents(ScriptedAgent::echo("b"));
        let ctx = routed(orch, json!("b"));
        let result = PathExecutor::new("exec", "router", OnAgentFailure::Continue).execute(&ctx).await;
        assert_eq!(result.executed_path, vec!["b"]);
    }

    #[tokio::test]
    async fn test_runs_as_agent() {
        let orch = three_agents(ScriptedAgent::echo("b"));
        let exec = PathExecutor::new("exec", "router", OnAgentFailure::Continue);
        assert_eq!(exec.describe().agent_type, "path-executor");
        let value = Agent::run(&exec, routed(orch, json!(["a"]))).await.unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["executed_path"], json!(["a"]));
    }
}
