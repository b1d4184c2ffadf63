//! Mocks and fixtures shared by the Waypoint test suites.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::{json, Value};

use waypoint_core::config::ModelConfig;
use waypoint_core::error::{Result, WaypointError};
use waypoint_core::traits::{Agent, AgentRunner, CandidateJudge, Orchestrator, ValidationVerdict};
use waypoint_core::types::{
    AgentHandle, AgentRegistry, Candidate, CandidateEvaluation, EvaluationSource, Outputs,
};
use waypoint_core::ExecutionContext;

/// What a scripted agent does when run.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Return `{"agent", "input", "saw"}` where `saw` lists previous output keys.
    Echo,
    /// Return this value.
    Return(Value),
    /// Fail with an `AgentExecution` error.
    Fail(String),
    /// Panic with this message.
    Panic(String),
}

/// An agent whose behaviour is fixed up front.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    handle: AgentHandle,
    behavior: Behavior,
}

impl ScriptedAgent {
    pub fn new(id: &str, behavior: Behavior) -> Self {
        Self {
            handle: AgentHandle::new(id, "mock"),
            behavior,
        }
    }

    pub fn echo(id: &str) -> Self {
        Self::new(id, Behavior::Echo)
    }

    pub fn returning(id: &str, value: Value) -> Self {
        Self::new(id, Behavior::Return(value))
    }

    pub fn failing(id: &str, message: &str) -> Self {
        Self::new(id, Behavior::Fail(message.to_string()))
    }

    pub fn panicking(id: &str, message: &str) -> Self {
        Self::new(id, Behavior::Panic(message.to_string()))
    }

    pub fn with_type(mut self, agent_type: &str) -> Self {
        self.handle.agent_type = agent_type.to_string();
        self
    }

    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.handle.capabilities = capabilities.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.handle.description = description.to_string();
        self
    }

    pub fn with_successors(mut self, successors: &[&str]) -> Self {
        self.handle.successors = successors.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_cost(mut self, tokens: u64, latency_ms: u64) -> Self {
        self.handle = self.handle.with_cost(tokens, latency_ms);
        self
    }
}

impl Agent for ScriptedAgent {
    fn id(&self) -> &str {
        &self.handle.id
    }

    fn agent_type(&self) -> &str {
        &self.handle.agent_type
    }

    fn describe(&self) -> AgentHandle {
        self.handle.clone()
    }

    fn run(&self, ctx: ExecutionContext) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            match &self.behavior {
                Behavior::Echo => Ok(json!({
                    "agent": self.handle.id,
                    "input": ctx.input,
                    "saw": ctx.previous_outputs.keys().cloned().collect::<Vec<_>>(),
                })),
                Behavior::Return(value) => Ok(value.clone()),
                Behavior::Fail(message) => Err(WaypointError::agent(&self.handle.id, message)),
                Behavior::Panic(message) => panic!("{}", message),
            }
        })
    }
}

/// In-process orchestrator that dispatches to registered agents and
/// records every invocation.
pub struct MockOrchestrator {
    registry: AgentRegistry,
    agents: HashMap<String, Arc<dyn Agent>>,
    expose_registry: bool,
    expose_runner: bool,
    calls: Mutex<Vec<String>>,
}

impl MockOrchestrator {
    pub fn new() -> Self {
        Self {
            registry: AgentRegistry::new(),
            agents: HashMap::new(),
            expose_registry: true,
            expose_runner: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Register an agent; its `describe()` becomes the registry entry.
    pub fn with_agent(mut self, agent: impl Agent) -> Self {
        self.register(Arc::new(agent));
        self
    }

    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.registry.register(agent.describe());
        self.agents.insert(agent.id().to_string(), agent);
    }

    /// Hide the registry, as an orchestrator without introspection would.
    pub fn without_registry(mut self) -> Self {
        self.expose_registry = false;
        self
    }

    /// Hide the runner, as a read-only orchestrator would.
    pub fn without_runner(mut self) -> Self {
        self.expose_runner = false;
        self
    }

    pub fn into_arc(self) -> Arc<dyn Orchestrator> {
        Arc::new(self)
    }

    /// Agent ids in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for MockOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator for MockOrchestrator {
    fn agents(&self) -> Option<&AgentRegistry> {
        self.expose_registry.then_some(&self.registry)
    }

    fn runner(&self) -> Option<&dyn AgentRunner> {
        if self.expose_runner {
            Some(self)
        } else {
            None
        }
    }
}

impl AgentRunner for MockOrchestrator {
    fn run_agent(
        &self,
        agent_id: String,
        input: Value,
        previous_outputs: Outputs,
        payload: ExecutionContext,
    ) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(agent_id.clone());
            }
            let agent = self
                .agents
                .get(&agent_id)
                .cloned()
                .ok_or_else(|| WaypointError::AgentNotFound(agent_id.clone()))?;

            let mut ctx = payload.with_previous_outputs(previous_outputs).with_current_agent(&agent_id);
            ctx.input = input;
            agent.run(ctx).await
        })
    }
}

/// Candidate judge with canned answers.
#[derive(Debug, Clone, Default)]
pub struct ScriptedJudge {
    /// Relevance per first-hop node id; unlisted nodes get 0.1.
    pub relevance: HashMap<String, f64>,
    /// Fail every evaluation.
    pub fail: bool,
    /// Reject every validation.
    pub reject: bool,
    calls: Arc<Mutex<usize>>,
}

impl ScriptedJudge {
    pub fn new(relevance: &[(&str, f64)]) -> Self {
        Self {
            relevance: relevance.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    /// Number of `evaluate` calls seen so far.
    pub fn evaluations(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or(0)
    }
}

impl CandidateJudge for ScriptedJudge {
    fn evaluate(
        &self,
        _question: String,
        candidate: Candidate,
        _model: Option<ModelConfig>,
    ) -> BoxFuture<'_, Result<CandidateEvaluation>> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                *calls += 1;
            }
            if self.fail {
                return Err(WaypointError::Judge("model unavailable".into()));
            }
            let relevance = self.relevance.get(&candidate.node_id).copied().unwrap_or(0.1);
            Ok(CandidateEvaluation {
                relevance,
                confidence: 0.9,
                expected_outcome: format!("{} handles the request", candidate.node_id),
                reasoning: "scripted".into(),
                source: EvaluationSource::Llm,
                evaluated_by: None,
            })
        })
    }

    fn validate(
        &self,
        _question: String,
        _candidate: Candidate,
        _evaluation: CandidateEvaluation,
        _model: Option<ModelConfig>,
    ) -> BoxFuture<'_, Result<ValidationVerdict>> {
        Box::pin(async move {
            Ok(ValidationVerdict {
                approved: !self.reject,
                confidence: 0.8,
                reason: if self.reject { "rejected".into() } else { String::new() },
            })
        })
    }
}

/// Context with `input` and an orchestrator attached.
pub fn context_with(orchestrator: Arc<dyn Orchestrator>, input: Value) -> ExecutionContext {
    ExecutionContext::new(input)
        .with_orchestrator(orchestrator)
        .with_run_id("test-run")
}
