use tracing::debug;

use waypoint_core::config::BudgetConfig;
use waypoint_core::types::{AgentHandle, Candidate, CostEstimate};
use waypoint_core::ExecutionContext;

use crate::graph::GraphState;

/// Rough agent families used when a handle carries no cost hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentFamily {
    Llm,
    LocalModel,
    Tool,
    Other,
}

impl AgentFamily {
    pub fn of(agent_type: &str) -> Self {
        let t = agent_type.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| t.contains(w));
        // Local models first: "local-llm" is local, not hosted.
        if any(&["local", "ollama", "llama", "lmstudio"]) {
            Self::LocalModel
        } else if any(&["llm", "openai", "anthropic", "claude", "gpt", "gemini", "answer", "builder"]) {
            Self::Llm
        } else if any(&["tool", "search", "duckduckgo", "http", "memory", "fetch", "calc", "reader", "writer"]) {
            Self::Tool
        } else {
            Self::Other
        }
    }

    pub fn default_estimate(self) -> CostEstimate {
        let (tokens, latency_ms) = match self {
            Self::Llm => (350, 600),
            Self::LocalModel => (0, 900),
            Self::Tool => (0, 150),
            Self::Other => (100, 300),
        };
        CostEstimate { tokens, latency_ms }
    }
}

/// Per-node cost, preferring the handle's own hints.
pub fn node_estimate(handle: Option<&AgentHandle>) -> CostEstimate {
    let Some(handle) = handle else {
        return AgentFamily::Other.default_estimate();
    };
    let fallback = AgentFamily::of(&handle.agent_type).default_estimate();
    CostEstimate {
        tokens: handle.cost_tokens.unwrap_or(fallback.tokens),
        latency_ms: handle.latency_ms.unwrap_or(fallback.latency_ms),
    }
}

/// Drops candidates whose whole-path estimate exceeds the budget.
#[derive(Debug, Clone)]
pub struct BudgetController {
    budget: BudgetConfig,
}

impl BudgetController {
    pub fn new(budget: BudgetConfig) -> Self {
        Self { budget }
    }

    pub fn estimate_path(&self, graph: &GraphState, path: &[String]) -> CostEstimate {
        path.iter()
            .map(|id| node_estimate(graph.node(id)))
            .fold(CostEstimate::default(), |acc, e| CostEstimate {
                tokens: acc.tokens.saturating_add(e.tokens),
                latency_ms: acc.latency_ms.saturating_add(e.latency_ms),
            })
    }

    /// Whether an estimate fits. A zero budget is unlimited.
    pub fn within_budget(&self, estimate: &CostEstimate) -> bool {
        let tokens_ok = self.budget.cost_budget_tokens == 0
            || estimate.tokens <= self.budget.cost_budget_tokens;
        let latency_ok =
            self.budget.latency_budget_ms == 0 || estimate.latency_ms <= self.budget.latency_budget_ms;
        tokens_ok && latency_ok
    }

    pub fn filter_candidates(
        &self,
        candidates: Vec<Candidate>,
        graph: &GraphState,
        context: &ExecutionContext,
    ) -> Vec<Candidate> {
        let before = candidates.len();
        let kept: Vec<Candidate> = candidates
            .into_iter()
            .filter_map(|mut c| {
                let estimate = self.estimate_path(graph, &c.path);
                if self.within_budget(&estimate) {
                    c.estimate = Some(estimate);
                    Some(c)
                } else {
                    debug!(
                        node_id = %c.node_id,
                        tokens = estimate.tokens,
                        latency_ms = estimate.latency_ms,
                        "Candidate over budget"
                    );
                    None
                }
            })
            .collect();
        debug!(run_id = %context.run_id, before, after = kept.len(), "Budget filter applied");
        kept
    }

    pub fn budget(&self) -> &BudgetConfig {
        &self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use waypoint_core::types::DiscoveryInfo;

    fn graph() -> GraphState {
        GraphState::from_handles(&[
            AgentHandle::new("search", "duckduckgo"),
            AgentHandle::new("answer", "openai-answer"),
            AgentHandle::new("local", "local-llm"),
            AgentHandle::new("pricey", "custom").with_cost(5000, 100),
        ])
    }

    fn candidate(path: &[&str]) -> Candidate {
        Candidate::from_path(path.iter().map(|s| s.to_string()).collect(), DiscoveryInfo::default())
            .unwrap()
    }

    #[test]
    fn test_family_defaults() {
        assert_eq!(AgentFamily::of("local-llm"), AgentFamily::LocalModel);
        assert_eq!(AgentFamily::of("OpenAIAnswerBuilder"), AgentFamily::Llm);
        assert_eq!(AgentFamily::of("duckduckgo"), AgentFamily::Tool);
        assert_eq!(AgentFamily::of("router"), AgentFamily::Other);
    }

    #[test]
    fn test_estimate_sums_path() {
        let budget = BudgetController::new(BudgetConfig::default());
        let e = budget.estimate_path(&graph(), &["search".into(), "answer".into()]);
        assert_eq!(e, CostEstimate { tokens: 350, latency_ms: 750 });
        let e = budget.estimate_path(&graph(), &["pricey".into()]);
        assert_eq!(e, CostEstimate { tokens: 5000, latency_ms: 100 });
    }

    #[test]
    fn test_filter_drops_over_budget() {
        let budget = BudgetController::new(BudgetConfig {
            cost_budget_tokens: 800,
            latency_budget_ms: 1000,
        });
        let ctx = ExecutionContext::new(Value::Null);
        let kept = budget.filter_candidates(
            vec![
                candidate(&["search", "answer"]),
                candidate(&["pricey"]),
                candidate(&["local", "answer"]),
            ],
            &graph(),
            &ctx,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].path, vec!["search", "answer"]);
        assert_eq!(kept[0].estimate.unwrap().latency_ms, 750);
    }

    #[test]
    fn test_zero_budget_is_unlimited() {
        let budget = BudgetController::new(BudgetConfig {
            cost_budget_tokens: 0,
            latency_budget_ms: 0,
        });
        let ctx = ExecutionContext::new(Value::Null);
        let kept = budget.filter_candidates(vec![candidate(&["pricey"])], &graph(), &ctx);
        assert_eq!(kept.len(), 1);
    }
}
