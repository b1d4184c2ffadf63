use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::traits::Orchestrator;
use crate::types::Outputs;

/// Everything one agent invocation sees.
///
/// A context is owned by the invocation that built it. Agents receive
/// their own copy; nothing here is shared mutably between executions.
#[derive(Clone)]
pub struct ExecutionContext {
    /// The workflow's original input.
    pub input: Value,
    /// Results of agents that ran before this one, in execution order.
    pub previous_outputs: Outputs,
    pub orchestrator: Option<Arc<dyn Orchestrator>>,
    pub run_id: String,
    pub step_index: usize,
    /// Id of the agent currently being served by this context, if known.
    pub current_agent_id: Option<String>,
}

impl ExecutionContext {
    /// Create a context for a fresh run.
    pub fn new(input: Value) -> Self {
        Self {
            input,
            previous_outputs: Outputs::new(),
            orchestrator: None,
            run_id: Uuid::new_v4().to_string(),
            step_index: 0,
            current_agent_id: None,
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: Arc<dyn Orchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn with_previous_outputs(mut self, outputs: Outputs) -> Self {
        self.previous_outputs = outputs;
        self
    }

    /// Record one agent's output, as the orchestrator does between steps.
    pub fn with_output(mut self, agent_id: impl Into<String>, output: Value) -> Self {
        self.previous_outputs.insert(agent_id.into(), output);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_step_index(mut self, step_index: usize) -> Self {
        self.step_index = step_index;
        self
    }

    pub fn with_current_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.current_agent_id = Some(agent_id.into());
        self
    }

    pub fn orchestrator(&self) -> Option<&Arc<dyn Orchestrator>> {
        self.orchestrator.as_ref()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("input", &self.input)
            .field("previous_outputs", &self.previous_outputs)
            .field("orchestrator", &self.orchestrator.as_ref().map(|_| ".."))
            .field("run_id", &self.run_id)
            .field("step_index", &self.step_index)
            .field("current_agent_id", &self.current_agent_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_builder() {
        let ctx = ExecutionContext::new(json!("find flights"))
            .with_run_id("run-1")
            .with_output("router", json!({"target": ["a"]}))
            .with_output("search", json!("results"))
            .with_step_index(2);

        assert_eq!(ctx.run_id, "run-1");
        assert_eq!(ctx.step_index, 2);
        let keys: Vec<&String> = ctx.previous_outputs.keys().collect();
        assert_eq!(keys, vec!["router", "search"]);
        assert!(ctx.orchestrator().is_none());
    }

    #[test]
    fn test_fresh_contexts_get_distinct_run_ids() {
        let a = ExecutionContext::new(Value::Null);
        let b = ExecutionContext::new(Value::Null);
        assert_ne!(a.run_id, b.run_id);
    }
}
