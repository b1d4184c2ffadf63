use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WaypointError;

/// Ordered map of agent id → result. Insertion order is preserved.
pub type Outputs = serde_json::Map<String, Value>;

/// Read-only view of an agent registered with an orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHandle {
    pub id: String,
    /// Configured type / class name (e.g. "openai-answer", "duckduckgo", "graph-scout").
    pub agent_type: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// Declared successors. Empty means "next in registration order".
    #[serde(default)]
    pub successors: Vec<String>,
    /// Expected token cost of one invocation.
    #[serde(default)]
    pub cost_tokens: Option<u64>,
    /// Expected latency of one invocation.
    #[serde(default)]
    pub latency_ms: Option<u64>,
}

impl AgentHandle {
    pub fn new(id: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent_type: agent_type.into(),
            capabilities: vec![],
            description: String::new(),
            successors: vec![],
            cost_tokens: None,
            latency_ms: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_successors(mut self, successors: Vec<String>) -> Self {
        self.successors = successors;
        self
    }

    pub fn with_cost(mut self, tokens: u64, latency_ms: u64) -> Self {
        self.cost_tokens = Some(tokens);
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Insertion-ordered agent registry owned by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    handles: Vec<AgentHandle>,
    index: HashMap<String, usize>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle. Re-registering an id replaces it in place.
    pub fn register(&mut self, handle: AgentHandle) {
        match self.index.get(&handle.id) {
            Some(&pos) => self.handles[pos] = handle,
            None => {
                self.index.insert(handle.id.clone(), self.handles.len());
                self.handles.push(handle);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&AgentHandle> {
        self.index.get(id).map(|&pos| &self.handles[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.handles.iter().map(|h| h.id.as_str())
    }

    pub fn handles(&self) -> &[AgentHandle] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl FromIterator<AgentHandle> for AgentRegistry {
    fn from_iter<I: IntoIterator<Item = AgentHandle>>(iter: I) -> Self {
        let mut registry = Self::new();
        for handle in iter {
            registry.register(handle);
        }
        registry
    }
}

/// What the path executor does when an agent fails or is missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnAgentFailure {
    #[default]
    Continue,
    Abort,
}

impl fmt::Display for OnAgentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

impl std::str::FromStr for OnAgentFailure {
    type Err = WaypointError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            other => Err(WaypointError::Config(format!(
                "invalid on_agent_failure '{}': expected 'continue' or 'abort'",
                other
            ))),
        }
    }
}

// ── Scout pipeline ──────────────────────────────────────────────

/// How a candidate was found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryInfo {
    /// Why this path was proposed ("successor of scout", "registry fallback").
    pub reason: String,
    /// Cheap keyword relevance used to rank the beam (0.0 to 1.0).
    pub relevance_hint: f64,
    /// Whether the last hop ends the workflow or builds the response.
    pub terminal: bool,
}

/// Estimated resource use of a whole candidate path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub tokens: u64,
    pub latency_ms: u64,
}

/// Where an evaluation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationSource {
    Llm,
    Heuristic,
}

/// Simulated outcome of running a candidate path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvaluation {
    /// How well the path fits the question (0.0 to 1.0).
    pub relevance: f64,
    /// Evaluator confidence in its own judgement (0.0 to 1.0).
    pub confidence: f64,
    pub expected_outcome: String,
    pub reasoning: String,
    pub source: EvaluationSource,
    /// Agent on whose behalf the evaluation ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluated_by: Option<String>,
}

/// Outcome of the safety filter for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyAssessment {
    pub score: f64,
    #[serde(default)]
    pub violations: Vec<String>,
}

/// A proposed next step plus the onward path it commits to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// First hop of the path.
    pub node_id: String,
    pub path: Vec<String>,
    pub depth: usize,
    pub discovery: DiscoveryInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<CostEstimate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<CandidateEvaluation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety: Option<SafetyAssessment>,
}

impl Candidate {
    /// Build a candidate for a non-empty path.
    pub fn from_path(path: Vec<String>, discovery: DiscoveryInfo) -> Option<Self> {
        let node_id = path.first()?.clone();
        Some(Self {
            node_id,
            depth: path.len(),
            path,
            discovery,
            estimate: None,
            evaluation: None,
            safety: None,
        })
    }

    pub fn last_node(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or(&self.node_id)
    }
}

/// A candidate with its combined score and per-metric contributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub score: f64,
    pub components: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    CommitNext,
    CommitPath,
    Shortlist,
    Abort,
    /// Emitted only when the pipeline itself failed.
    Fallback,
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CommitNext => "commit_next",
            Self::CommitPath => "commit_path",
            Self::Shortlist => "shortlist",
            Self::Abort => "abort",
            Self::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortlistEntry {
    pub node_id: String,
    pub path: Vec<String>,
    pub score: f64,
}

/// What a decision points at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecisionTarget {
    #[default]
    None,
    Node(String),
    Path(Vec<String>),
    Shortlist(Vec<ShortlistEntry>),
}

impl DecisionTarget {
    /// Every node id referenced by this target.
    pub fn node_ids(&self) -> Vec<&str> {
        match self {
            Self::None => vec![],
            Self::Node(id) => vec![id.as_str()],
            Self::Path(path) => path.iter().map(String::as_str).collect(),
            Self::Shortlist(entries) => entries.iter().map(|e| e.node_id.as_str()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision_type: DecisionType,
    pub target: DecisionTarget,
    pub confidence: f64,
    pub reasoning: String,
}

impl Decision {
    pub fn abort(confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            decision_type: DecisionType::Abort,
            target: DecisionTarget::None,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
        }
    }

    pub fn fallback(reasoning: impl Into<String>) -> Self {
        Self {
            decision_type: DecisionType::Fallback,
            target: DecisionTarget::None,
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }
}

// ── Path execution ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    Success,
    Partial,
    Error,
    NoCandidates,
    BudgetExceeded,
    SafetyViolation,
}

/// Result of executing a committed path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathExecutionResult {
    pub executed_path: Vec<String>,
    pub results: Outputs,
    pub status: PathStatus,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PathExecutionResult {
    /// A result for a run that failed before any agent executed.
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            executed_path: vec![],
            results: Outputs::new(),
            status: PathStatus::Error,
            errors: vec![error.clone()],
            error: Some(error),
        }
    }
}

/// Result slot stored for an agent that failed or could not be found.
pub fn error_marker(message: &str) -> Value {
    serde_json::json!({ "status": "error", "error": message })
}

/// Whether a stored result is an error marker.
pub fn is_error_marker(value: &Value) -> bool {
    value.get("status").and_then(Value::as_str) == Some("error") && value.get("error").is_some()
}
