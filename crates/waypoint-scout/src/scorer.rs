use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use waypoint_core::config::{BudgetConfig, ScoutConfig};
use waypoint_core::types::{Candidate, ScoredCandidate};
use waypoint_core::ExecutionContext;

/// Everything a scoring component may look at besides the candidate.
pub struct ScoringInput<'a> {
    pub question: &'a str,
    pub context: &'a ExecutionContext,
    pub priors: &'a HashMap<String, f64>,
    pub budget: &'a BudgetConfig,
}

/// A pure scoring component. Results are clamped to [0, 1] by the scorer.
pub type ComponentFn = fn(&Candidate, &ScoringInput<'_>) -> f64;

/// Relevance the evaluator assigned to the path.
pub fn llm_component(candidate: &Candidate, _input: &ScoringInput<'_>) -> f64 {
    candidate.evaluation.as_ref().map(|e| e.relevance).unwrap_or(0.0)
}

/// Prefers short paths and paths that end in a terminal node.
pub fn heuristics_component(candidate: &Candidate, _input: &ScoringInput<'_>) -> f64 {
    let depth = candidate.depth.max(1) as f64;
    let terminal = if candidate.discovery.terminal { 0.4 } else { 0.0 };
    0.6 / depth + terminal
}

/// Mean configured prior over the path's nodes (0.5 when unset).
pub fn prior_component(candidate: &Candidate, input: &ScoringInput<'_>) -> f64 {
    if candidate.path.is_empty() {
        return 0.5;
    }
    let total: f64 = candidate
        .path
        .iter()
        .map(|id| input.priors.get(id).copied().unwrap_or(0.5))
        .sum();
    total / candidate.path.len() as f64
}

fn remaining_share(used: u64, budget: u64) -> f64 {
    if budget == 0 {
        return 1.0;
    }
    1.0 - used as f64 / budget as f64
}

/// Share of the token budget left after the path.
pub fn cost_component(candidate: &Candidate, input: &ScoringInput<'_>) -> f64 {
    match candidate.estimate {
        Some(e) => remaining_share(e.tokens, input.budget.cost_budget_tokens),
        None => 0.5,
    }
}

/// Share of the latency budget left after the path.
pub fn latency_component(candidate: &Candidate, input: &ScoringInput<'_>) -> f64 {
    match candidate.estimate {
        Some(e) => remaining_share(e.latency_ms, input.budget.latency_budget_ms),
        None => 0.5,
    }
}

struct Component {
    name: String,
    weight: f64,
    score: ComponentFn,
}

/// Weighted combination of scoring components.
pub struct PathScorer {
    components: Vec<Component>,
    priors: HashMap<String, f64>,
    budget: BudgetConfig,
}

impl PathScorer {
    /// Scorer with the built-in components weighted from configuration.
    pub fn new(config: &ScoutConfig) -> Self {
        let w = &config.weights;
        Self {
            components: vec![],
            priors: config.priors.clone(),
            budget: config.budget.clone(),
        }
        .with_component("llm", w.llm, llm_component)
        .with_component("heuristics", w.heuristics, heuristics_component)
        .with_component("prior", w.prior, prior_component)
        .with_component("cost", w.cost, cost_component)
        .with_component("latency", w.latency, latency_component)
    }

    /// Register a component, replacing any existing one with the same name.
    /// Negative weights count as zero.
    pub fn with_component(mut self, name: &str, weight: f64, score: ComponentFn) -> Self {
        let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        let component = Component {
            name: name.to_string(),
            weight,
            score,
        };
        match self.components.iter_mut().find(|c| c.name == name) {
            Some(existing) => *existing = component,
            None => self.components.push(component),
        }
        self
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn score_candidate(&self, candidate: &Candidate, input: &ScoringInput<'_>) -> (f64, BTreeMap<String, f64>) {
        let total_weight: f64 = self.components.iter().map(|c| c.weight).sum();
        let mut components = BTreeMap::new();
        let mut weighted = 0.0;

        for c in &self.components {
            let value = clamp_unit((c.score)(candidate, input));
            weighted += c.weight * value;
            components.insert(c.name.clone(), value);
        }

        let score = if total_weight > 0.0 {
            clamp_unit(weighted / total_weight)
        } else {
            0.0
        };
        (score, components)
    }

    pub fn score_candidates(
        &self,
        candidates: Vec<Candidate>,
        question: &str,
        context: &ExecutionContext,
    ) -> Vec<ScoredCandidate> {
        let input = ScoringInput {
            question,
            context,
            priors: &self.priors,
            budget: &self.budget,
        };
        let scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|candidate| {
                let (score, components) = self.score_candidate(&candidate, &input);
                ScoredCandidate {
                    candidate,
                    score,
                    components,
                }
            })
            .collect();
        debug!(run_id = %context.run_id, scored = scored.len(), "Candidates scored");
        scored
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
