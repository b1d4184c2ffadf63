use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ModelConfig;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::types::{AgentHandle, AgentRegistry, Candidate, CandidateEvaluation, Outputs};

/// One executable unit of a workflow (LLM call, tool, local model,
/// or a routing node such as the scout).
pub trait Agent: Send + Sync + 'static {
    /// Unique id within the workflow.
    fn id(&self) -> &str;

    /// Configured type name, used for control-flow classification.
    fn agent_type(&self) -> &str;

    /// Registry entry for this agent.
    fn describe(&self) -> AgentHandle {
        AgentHandle::new(self.id(), self.agent_type())
    }

    /// Run the agent against a context and return its result.
    fn run(&self, ctx: ExecutionContext) -> BoxFuture<'_, Result<Value>>;
}

/// Async capability to invoke registered agents by id.
pub trait AgentRunner: Send + Sync + 'static {
    /// Run `agent_id` with the original input and the outputs accumulated so
    /// far. `payload` carries the full context the agent should see.
    fn run_agent(
        &self,
        agent_id: String,
        input: Value,
        previous_outputs: Outputs,
        payload: ExecutionContext,
    ) -> BoxFuture<'_, Result<Value>>;
}

/// The surrounding orchestrator, as seen from the routing core.
///
/// Both accessors are read-only. An orchestrator that cannot run agents
/// (a graph viewer, a dry-run planner) returns `None` from `runner`.
pub trait Orchestrator: Send + Sync + 'static {
    /// Registered agents, if a registry is reachable.
    fn agents(&self) -> Option<&AgentRegistry>;

    /// Agent invocation capability, if this orchestrator has one.
    fn runner(&self) -> Option<&dyn AgentRunner>;
}

/// Verdict of a second-pass validation of an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub approved: bool,
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
}

impl ValidationVerdict {
    pub fn approve() -> Self {
        Self {
            approved: true,
            confidence: 1.0,
            reason: String::new(),
        }
    }
}

/// The LLM seam used by the scout's evaluator.
pub trait CandidateJudge: Send + Sync + 'static {
    /// Simulate running `candidate` for `question`.
    fn evaluate(
        &self,
        question: String,
        candidate: Candidate,
        model: Option<ModelConfig>,
    ) -> BoxFuture<'_, Result<CandidateEvaluation>>;

    /// Double-check an evaluation. Approves everything by default.
    fn validate(
        &self,
        question: String,
        candidate: Candidate,
        evaluation: CandidateEvaluation,
        model: Option<ModelConfig>,
    ) -> BoxFuture<'_, Result<ValidationVerdict>> {
        let _ = (question, candidate, evaluation, model);
        Box::pin(async { Ok(ValidationVerdict::approve()) })
    }
}
