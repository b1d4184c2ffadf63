use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use waypoint_core::config::{ModelConfig, ScoutConfig};
use waypoint_core::traits::CandidateJudge;
use waypoint_core::types::{Candidate, CandidateEvaluation, EvaluationSource};
use waypoint_core::ExecutionContext;

use crate::graph::GraphState;
use crate::relevance::{keyword_relevance, tokenize};

/// Simulates what each candidate path would achieve.
///
/// With LLM evaluation enabled and a judge injected, every candidate is
/// sent to the judge concurrently and the judge's answer is double-checked
/// with a validation pass. Otherwise (or when the judge fails and
/// heuristics are allowed) relevance comes from keyword overlap.
#[derive(Clone)]
pub struct PathEvaluator {
    judge: Option<Arc<dyn CandidateJudge>>,
    llm_enabled: bool,
    fallback_to_heuristics: bool,
    evaluation_model: Option<ModelConfig>,
    validation_model: Option<ModelConfig>,
}

impl PathEvaluator {
    pub fn new(config: &ScoutConfig) -> Self {
        Self {
            judge: None,
            llm_enabled: config.llm_evaluation_enabled,
            fallback_to_heuristics: config.fallback_to_heuristics,
            evaluation_model: config.evaluation_model.clone(),
            validation_model: config.validation_model.clone(),
        }
    }

    pub fn with_judge(mut self, judge: Arc<dyn CandidateJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub async fn simulate_candidates(
        &self,
        candidates: Vec<Candidate>,
        question: &str,
        graph: &GraphState,
        context: &ExecutionContext,
    ) -> Vec<Candidate> {
        let current = context.current_agent_id.as_deref();
        let candidates: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| !current.is_some_and(|id| c.path.iter().any(|p| p == id)))
            .collect();

        let judge = self.judge.as_ref().filter(|_| self.llm_enabled);
        let mut evaluated = match judge {
            Some(judge) => {
                let futs = candidates.into_iter().map(|c| {
                    let judge = Arc::clone(judge);
                    async move {
                        let evaluation = self.judge_candidate(judge.as_ref(), question, &c, graph).await;
                        Candidate {
                            evaluation: Some(evaluation),
                            ..c
                        }
                    }
                });
                join_all(futs).await
            }
            None => candidates
                .into_iter()
                .map(|c| {
                    let evaluation = heuristic_evaluation(question, &c, graph);
                    Candidate {
                        evaluation: Some(evaluation),
                        ..c
                    }
                })
                .collect(),
        };

        for evaluation in evaluated.iter_mut().filter_map(|c| c.evaluation.as_mut()) {
            evaluation.evaluated_by = current.map(str::to_string);
        }

        debug!(
            run_id = %context.run_id,
            evaluated = evaluated.len(),
            llm = judge.is_some(),
            "Candidates evaluated"
        );
        evaluated
    }

    async fn judge_candidate(
        &self,
        judge: &dyn CandidateJudge,
        question: &str,
        candidate: &Candidate,
        graph: &GraphState,
    ) -> CandidateEvaluation {
        let result = judge
            .evaluate(question.to_string(), candidate.clone(), self.evaluation_model.clone())
            .await;

        let mut evaluation = match result {
            Ok(evaluation) => evaluation,
            Err(e) if self.fallback_to_heuristics => {
                warn!(node_id = %candidate.node_id, error = %e, "Judge failed, using heuristics");
                return heuristic_evaluation(question, candidate, graph);
            }
            Err(e) => {
                warn!(node_id = %candidate.node_id, error = %e, "Judge failed");
                return CandidateEvaluation {
                    relevance: 0.0,
                    confidence: 0.0,
                    expected_outcome: String::new(),
                    reasoning: format!("evaluation failed: {}", e),
                    source: EvaluationSource::Llm,
                    evaluated_by: None,
                };
            }
        };
        evaluation.relevance = evaluation.relevance.clamp(0.0, 1.0);
        evaluation.confidence = evaluation.confidence.clamp(0.0, 1.0);

        match judge
            .validate(
                question.to_string(),
                candidate.clone(),
                evaluation.clone(),
                self.validation_model.clone(),
            )
            .await
        {
            Ok(verdict) if !verdict.approved => {
                evaluation.relevance *= 0.5;
                evaluation.reasoning = format!("{} (validation rejected: {})", evaluation.reasoning, verdict.reason);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(node_id = %candidate.node_id, error = %e, "Validation failed, keeping evaluation");
            }
        }
        evaluation
    }
}

/// Keyword-overlap simulation of a path.
pub fn heuristic_evaluation(question: &str, candidate: &Candidate, graph: &GraphState) -> CandidateEvaluation {
    let keywords = tokenize(question);
    let per_node: Vec<f64> = candidate
        .path
        .iter()
        .map(|id| graph.node(id).map(|n| keyword_relevance(&keywords, n)).unwrap_or(0.0))
        .collect();
    let best = per_node.iter().copied().fold(0.0, f64::max);
    let mean = if per_node.is_empty() {
        0.0
    } else {
        per_node.iter().sum::<f64>() / per_node.len() as f64
    };

    CandidateEvaluation {
        relevance: (0.7 * best + 0.3 * mean).clamp(0.0, 1.0),
        confidence: 0.5,
        expected_outcome: format!("{} produces the result", candidate.last_node()),
        reasoning: format!("keyword overlap {:.2} across {} node(s)", best, per_node.len()),
        source: EvaluationSource::Heuristic,
        evaluated_by: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use waypoint_core::types::{AgentHandle, DiscoveryInfo};
    use waypoint_test_utils::ScriptedJudge;

    fn graph() -> GraphState {
        GraphState::from_handles(&[
            AgentHandle::new("search", "duckduckgo").with_capabilities(vec!["web".into(), "news".into()]),
            AgentHandle::new("math", "calculator"),
        ])
    }

    fn candidate(path: &[&str]) -> Candidate {
        Candidate::from_path(path.iter().map(|s| s.to_string()).collect(), DiscoveryInfo::default())
            .unwrap()
    }

    fn llm_config() -> ScoutConfig {
        ScoutConfig {
            llm_evaluation_enabled: true,
            ..ScoutConfig::default()
        }
    }

    #[tokio::test]
    async fn test_heuristic_evaluation() {
        let evaluator = PathEvaluator::new(&ScoutConfig::default());
        let ctx = ExecutionContext::new(Value::Null);
        let out = evaluator
            .simulate_candidates(vec![candidate(&["search"]), candidate(&["math"])], "web news today", &graph(), &ctx)
            .await;

        assert_eq!(out.len(), 2);
        let search = out[0].evaluation.as_ref().unwrap();
        let math = out[1].evaluation.as_ref().unwrap();
        assert_eq!(search.source, EvaluationSource::Heuristic);
        assert!(search.relevance > math.relevance);
    }

    #[tokio::test]
    async fn test_drops_paths_through_current_agent() {
        let evaluator = PathEvaluator::new(&ScoutConfig::default());
        let ctx = ExecutionContext::new(Value::Null).with_current_agent("math");
        let out = evaluator
            .simulate_candidates(vec![candidate(&["search"]), candidate(&["search", "math"])], "q", &graph(), &ctx)
            .await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, vec!["search"]);
        assert_eq!(out[0].evaluation.as_ref().unwrap().evaluated_by.as_deref(), Some("math"));
    }

    #[tokio::test]
    async fn test_judge_evaluations_and_rejection() {
        let judge = Arc::new(ScriptedJudge::new(&[("search", 0.8)]));
        let evaluator = PathEvaluator::new(&llm_config()).with_judge(judge.clone());
        let ctx = ExecutionContext::new(Value::Null);
        let out = evaluator
            .simulate_candidates(vec![candidate(&["search"]), candidate(&["math"])], "q", &graph(), &ctx)
            .await;
        assert_eq!(judge.evaluations(), 2);
        let search = out[0].evaluation.as_ref().unwrap();
        assert_eq!(search.source, EvaluationSource::Llm);
        assert!((search.relevance - 0.8).abs() < 1e-9);

        let rejecting = PathEvaluator::new(&llm_config())
            .with_judge(Arc::new(ScriptedJudge::new(&[("search", 0.8)]).rejecting()));
        let out = rejecting
            .simulate_candidates(vec![candidate(&["search"])], "q", &graph(), &ctx)
            .await;
        let search = out[0].evaluation.as_ref().unwrap();
        assert!((search.relevance - 0.4).abs() < 1e-9);
        assert!(search.reasoning.contains("rejected"));
    }

    #[tokio::test]
    async fn test_judge_disabled_uses_heuristics() {
        let judge = Arc::new(ScriptedJudge::new(&[]));
        let evaluator = PathEvaluator::new(&ScoutConfig::default()).with_judge(judge.clone());
        let ctx = ExecutionContext::new(Value::Null);
        evaluator.simulate_candidates(vec![candidate(&["search"])], "q", &graph(), &ctx).await;
        assert_eq!(judge.evaluations(), 0);
    }

    #[tokio::test]
    async fn test_judge_failure_fallback() {
        let ctx = ExecutionContext::new(Value::Null);

        let with_fallback = PathEvaluator::new(&llm_config()).with_judge(Arc::new(ScriptedJudge::failing()));
        let out = with_fallback
            .simulate_candidates(vec![candidate(&["search"])], "web news", &graph(), &ctx)
            .await;
        let eval = out[0].evaluation.as_ref().unwrap();
        assert_eq!(eval.source, EvaluationSource::Heuristic);
        assert!(eval.relevance > 0.0);

        let strict = PathEvaluator::new(&ScoutConfig {
            fallback_to_heuristics: false,
            ..llm_config()
        })
        .with_judge(Arc::new(ScriptedJudge::failing()));
        let out = strict
            .simulate_candidates(vec![candidate(&["search"])], "web news", &graph(), &ctx)
            .await;
        assert_eq!(out.len(), 1);
        let eval = out[0].evaluation.as_ref().unwrap();
        assert_eq!(eval.relevance, 0.0);
        assert!(eval.reasoning.contains("model unavailable"));
    }
}
