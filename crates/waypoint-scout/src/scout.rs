use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use waypoint_core::config::ScoutConfig;
use waypoint_core::error::{panic_message, Result, WaypointError};
use waypoint_core::traits::{Agent, CandidateJudge};
use waypoint_core::types::{AgentHandle, Decision, DecisionTarget, DecisionType, ScoredCandidate};
use waypoint_core::ExecutionContext;

use crate::budget::BudgetController;
use crate::decision::{rank, DecisionEngine};
use crate::evaluator::PathEvaluator;
use crate::graph::{GraphApi, RegistryGraphApi};
use crate::introspector::Introspector;
use crate::safety::SafetyController;
use crate::scorer::{ComponentFn, PathScorer};

/// Agent type reported by the scout; classified as control flow.
pub const SCOUT_AGENT_TYPE: &str = "graph-scout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoutStatus {
    Success,
    NoCandidates,
    BudgetExceeded,
    SafetyViolation,
    Error,
}

/// One ranked candidate as recorded in the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub node_id: String,
    pub path: Vec<String>,
    pub score: f64,
    pub components: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringSummary {
    pub top_score: Option<f64>,
    pub ranked: Vec<RankedEntry>,
}

/// How a successful decision was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutTrace {
    pub question: String,
    pub candidate_count: usize,
    pub decision: DecisionType,
    pub scoring_summary: ScoringSummary,
}

/// Outcome of one scout invocation.
///
/// `target` mirrors `decision.target` at the top level so a path
/// executor can read a committed path straight from the stored output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutResult {
    pub status: ScoutStatus,
    pub decision: Decision,
    pub target: DecisionTarget,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<ScoutTrace>,
}

impl ScoutResult {
    fn from_decision(status: ScoutStatus, decision: Decision, trace: Option<ScoutTrace>) -> Self {
        Self {
            status,
            target: decision.target.clone(),
            confidence: decision.confidence,
            reasoning: decision.reasoning.clone(),
            decision,
            error: None,
            trace,
        }
    }

    /// A pipeline stage ran out of candidates.
    fn exhausted(status: ScoutStatus, reason: &str) -> Self {
        Self::from_decision(status, Decision::abort(0.0, reason), None)
    }

    fn failed(message: String) -> Self {
        let mut result = Self::from_decision(
            ScoutStatus::Error,
            Decision::fallback(format!("scout failed: {}", message)),
            None,
        );
        result.error = Some(message);
        result
    }
}

/// Pull the task description out of a workflow input.
pub fn extract_question(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("input") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => input.to_string(),
        },
        other => other.to_string(),
    }
}

/// Dynamic routing node: discovers, filters, scores and picks the next
/// step of the workflow.
pub struct Scout {
    id: String,
    config: ScoutConfig,
    graph_api: Arc<dyn GraphApi>,
    introspector: Introspector,
    budget: BudgetController,
    evaluator: PathEvaluator,
    safety: SafetyController,
    scorer: PathScorer,
    decision: DecisionEngine,
}

impl Scout {
    pub fn new(id: impl Into<String>, config: ScoutConfig) -> Self {
        Self {
            id: id.into(),
            graph_api: Arc::new(RegistryGraphApi),
            introspector: Introspector::new(&config),
            budget: BudgetController::new(config.budget.clone()),
            evaluator: PathEvaluator::new(&config),
            safety: SafetyController::new(&config.safety),
            scorer: PathScorer::new(&config),
            decision: DecisionEngine::new(&config),
            config,
        }
    }

    pub fn with_graph_api(mut self, graph_api: Arc<dyn GraphApi>) -> Self {
        self.graph_api = graph_api;
        self
    }

    pub fn with_judge(mut self, judge: Arc<dyn CandidateJudge>) -> Self {
        self.evaluator = self.evaluator.with_judge(judge);
        self
    }

    /// Add or replace a scoring component.
    pub fn with_scorer_component(mut self, name: &str, weight: f64, score: ComponentFn) -> Self {
        self.scorer = self.scorer.with_component(name, weight, score);
        self
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.config
    }

    /// Run the pipeline. Never fails: errors and panics come back as
    /// status `error` with a `fallback` decision.
    pub async fn evaluate(&self, ctx: &ExecutionContext) -> ScoutResult {
        match AssertUnwindSafe(self.run_pipeline(ctx)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(scout = %self.id, run_id = %ctx.run_id, error = %e, "Scout failed");
                ScoutResult::failed(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(scout = %self.id, run_id = %ctx.run_id, panic = %message, "Scout panicked");
                ScoutResult::failed(format!("panic: {}", message))
            }
        }
    }

    async fn run_pipeline(&self, ctx: &ExecutionContext) -> Result<ScoutResult> {
        let question = extract_question(&ctx.input);
        let orchestrator = ctx
            .orchestrator()
            .ok_or_else(|| WaypointError::Context("no orchestrator in execution context".into()))?;

        let graph = self.graph_api.get_graph_state(orchestrator.as_ref(), &ctx.run_id)?;
        info!(scout = %self.id, run_id = %ctx.run_id, nodes = graph.nodes.len(), "Graph snapshot taken");

        let candidates = self.introspector.discover_paths(&graph, &question, ctx, &self.id);
        if candidates.is_empty() {
            warn!(scout = %self.id, "No candidate paths discovered");
            return Ok(ScoutResult::exhausted(ScoutStatus::NoCandidates, "no candidate paths discovered"));
        }
        let discovered = candidates.len();

        let candidates = self.budget.filter_candidates(candidates, &graph, ctx);
        if candidates.is_empty() {
            warn!(scout = %self.id, discovered, "Every candidate exceeded the budget");
            return Ok(ScoutResult::exhausted(
                ScoutStatus::BudgetExceeded,
                "every candidate exceeded the cost or latency budget",
            ));
        }

        let evaluation_ctx = ctx.clone().with_current_agent(&self.id);
        let candidates = self
            .evaluator
            .simulate_candidates(candidates, &question, &graph, &evaluation_ctx)
            .await;

        let candidates = self.safety.assess_candidates(candidates, &graph, ctx);
        if candidates.is_empty() {
            warn!(scout = %self.id, "Every candidate failed the safety check");
            return Ok(ScoutResult::exhausted(
                ScoutStatus::SafetyViolation,
                "every candidate failed the safety check",
            ));
        }

        let ranked = rank(self.scorer.score_candidates(candidates, &question, ctx));
        let decision = self.decision.make_decision(ranked.clone(), ctx);

        let trace = ScoutTrace {
            question,
            candidate_count: discovered,
            decision: decision.decision_type,
            scoring_summary: summarize(&ranked),
        };
        info!(
            scout = %self.id,
            run_id = %ctx.run_id,
            decision = %decision.decision_type,
            target = ?decision.target.node_ids(),
            "Scout finished"
        );
        Ok(ScoutResult::from_decision(ScoutStatus::Success, decision, Some(trace)))
    }
}

fn summarize(ranked: &[ScoredCandidate]) -> ScoringSummary {
    ScoringSummary {
        top_score: ranked.first().map(|s| s.score),
        ranked: ranked
            .iter()
            .map(|s| RankedEntry {
                node_id: s.candidate.node_id.clone(),
                path: s.candidate.path.clone(),
                score: s.score,
                components: s.components.clone(),
            })
            .collect(),
    }
}

impl Agent for Scout {
    fn id(&self) -> &str {
        &self.id
    }

    fn agent_type(&self) -> &str {
        SCOUT_AGENT_TYPE
    }

    fn describe(&self) -> AgentHandle {
        AgentHandle::new(&self.id, SCOUT_AGENT_TYPE)
            .with_capabilities(vec!["routing".into()])
            .with_description("Chooses the next agent or path to run")
    }

    fn run(&self, ctx: ExecutionContext) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let result = self.evaluate(&ctx).await;
            Ok(serde_json::to_value(result)?)
        })
    }
}
