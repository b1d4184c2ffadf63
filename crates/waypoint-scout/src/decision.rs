use std::cmp::Ordering;

use tracing::info;

use waypoint_core::config::ScoutConfig;
use waypoint_core::types::{Decision, DecisionTarget, DecisionType, ScoredCandidate, ShortlistEntry};
use waypoint_core::ExecutionContext;

/// Sort best first: score descending, then shorter path, then node id.
pub fn rank(mut scored: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.candidate.path.len().cmp(&b.candidate.path.len()))
            .then_with(|| a.candidate.node_id.cmp(&b.candidate.node_id))
    });
    scored
}

/// Turns ranked candidates into exactly one routing decision.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    commit_margin: f64,
    min_score: f64,
    shortlist_size: usize,
}

impl DecisionEngine {
    pub fn new(config: &ScoutConfig) -> Self {
        Self {
            commit_margin: config.commit_margin,
            min_score: config.min_score,
            shortlist_size: config.shortlist_size.max(1),
        }
    }

    pub fn make_decision(&self, scored: Vec<ScoredCandidate>, context: &ExecutionContext) -> Decision {
        let ranked = rank(scored);
        let decision = self.decide(&ranked);
        info!(
            run_id = %context.run_id,
            decision = %decision.decision_type,
            confidence = decision.confidence,
            "Routing decision made"
        );
        decision
    }

    fn decide(&self, ranked: &[ScoredCandidate]) -> Decision {
        let Some(top) = ranked.first() else {
            return Decision::abort(0.0, "no scored candidates");
        };
        if top.score < self.min_score {
            return Decision::abort(
                1.0 - top.score,
                format!(
                    "best candidate {} scored {:.3}, below minimum {:.3}",
                    top.candidate.node_id, top.score, self.min_score
                ),
            );
        }

        let margin = ranked.get(1).map(|second| top.score - second.score);
        let clear = margin.map_or(true, |m| m >= self.commit_margin);
        if clear {
            let reasoning = match margin {
                Some(m) => format!("{} leads by {:.3}", top.candidate.node_id, m),
                None => format!("{} is the only candidate", top.candidate.node_id),
            };
            let (decision_type, target) = if top.candidate.depth <= 1 {
                (DecisionType::CommitNext, DecisionTarget::Node(top.candidate.node_id.clone()))
            } else {
                (DecisionType::CommitPath, DecisionTarget::Path(top.candidate.path.clone()))
            };
            return Decision {
                decision_type,
                target,
                confidence: top.score.clamp(0.0, 1.0),
                reasoning,
            };
        }

        let entries: Vec<ShortlistEntry> = ranked
            .iter()
            .take(self.shortlist_size)
            .map(|s| ShortlistEntry {
                node_id: s.candidate.node_id.clone(),
                path: s.candidate.path.clone(),
                score: s.score,
            })
            .collect();
        Decision {
            decision_type: DecisionType::Shortlist,
            reasoning: format!(
                "top {} candidates within margin {:.3}",
                entries.len(),
                self.commit_margin
            ),
            target: DecisionTarget::Shortlist(entries),
            confidence: top.score.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::collections::BTreeMap;
    use waypoint_core::types::{Candidate, DiscoveryInfo};

    fn scored(path: &[&str], score: f64) -> ScoredCandidate {
        ScoredCandidate {
            candidate: Candidate::from_path(
                path.iter().map(|s| s.to_string()).collect(),
                DiscoveryInfo::default(),
            )
            .unwrap(),
            score,
            components: BTreeMap::new(),
        }
    }

    fn engine() -> DecisionEngine {
        DecisionEngine::new(&ScoutConfig::default())
    }

    #[test]
    fn test_rank_tie_breaks() {
        let ranked = rank(vec![
            scored(&["b", "x"], 0.5),
            scored(&["c"], 0.5),
            scored(&["a"], 0.5),
            scored(&["z"], 0.9),
        ]);
        let ids: Vec<&str> = ranked.iter().map(|s| s.candidate.node_id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "c", "b"]);
    }

    #[test]
    fn test_commit_next_on_clear_margin() {
        let ctx = ExecutionContext::new(Value::Null);
        let d = engine().make_decision(vec![scored(&["search"], 0.8), scored(&["math"], 0.3)], &ctx);
        assert_eq!(d.decision_type, DecisionType::CommitNext);
        assert_eq!(d.target, DecisionTarget::Node("search".into()));
        assert!((d.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_commit_path_for_deeper_candidate() {
        let ctx = ExecutionContext::new(Value::Null);
        let d = engine().make_decision(vec![scored(&["search", "answer"], 0.7)], &ctx);
        assert_eq!(d.decision_type, DecisionType::CommitPath);
        assert_eq!(d.target, DecisionTarget::Path(vec!["search".into(), "answer".into()]));
        assert!(d.reasoning.contains("only candidate"));
    }

    #[test]
    fn test_shortlist_on_close_scores() {
        let ctx = ExecutionContext::new(Value::Null);
        let d = engine().make_decision(
            vec![
                scored(&["a"], 0.60),
                scored(&["b"], 0.55),
                scored(&["c"], 0.50),
                scored(&["d"], 0.45),
            ],
            &ctx,
        );
        assert_eq!(d.decision_type, DecisionType::Shortlist);
        match d.target {
            DecisionTarget::Shortlist(entries) => {
                assert_eq!(entries.len(), 3);
                assert_eq!(entries[0].node_id, "a");
                assert_eq!(entries[2].node_id, "c");
            }
            other => panic!("expected shortlist, got {:?}", other),
        }
    }

    #[test]
    fn test_abort_below_min_score() {
        let ctx = ExecutionContext::new(Value::Null);
        let d = engine().make_decision(vec![scored(&["a"], 0.1)], &ctx);
        assert_eq!(d.decision_type, DecisionType::Abort);
        assert_eq!(d.target, DecisionTarget::None);
        assert!(d.reasoning.contains("below minimum"));

        let d = engine().make_decision(vec![], &ctx);
        assert_eq!(d.decision_type, DecisionType::Abort);
        assert_eq!(d.confidence, 0.0);
    }
}
