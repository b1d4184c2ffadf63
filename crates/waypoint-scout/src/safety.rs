use tracing::{debug, warn};

use waypoint_core::config::{RiskyPattern, SafetyConfig};
use waypoint_core::types::{AgentHandle, Candidate, SafetyAssessment};
use waypoint_core::ExecutionContext;

use crate::graph::GraphState;

/// Penalty per risky pattern match.
const PATTERN_PENALTY: f64 = 0.3;

/// Compiled risky patterns. Invalid regexes are skipped with a warning.
#[derive(Debug, Clone)]
pub struct RiskyPatternMatcher {
    patterns: Vec<(regex::Regex, String)>,
}

impl RiskyPatternMatcher {
    pub fn new(patterns: &[RiskyPattern]) -> Self {
        let compiled = patterns
            .iter()
            .filter_map(|p| match regex::Regex::new(&p.pattern) {
                Ok(re) => Some((re, p.label.clone())),
                Err(e) => {
                    warn!(pattern = %p.pattern, error = %e, "Invalid risky pattern regex, skipping");
                    None
                }
            })
            .collect();
        Self { patterns: compiled }
    }

    /// Labels of every pattern matching `text`.
    pub fn matches<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.patterns
            .iter()
            .filter(move |(re, _)| re.is_match(text))
            .map(|(_, label)| label.as_str())
    }
}

/// Scores each candidate path and drops those below the profile threshold.
#[derive(Debug, Clone)]
pub struct SafetyController {
    threshold: f64,
    forbidden: Vec<String>,
    matcher: RiskyPatternMatcher,
}

impl SafetyController {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            threshold: config.threshold(),
            forbidden: config
                .forbidden_capabilities
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
            matcher: RiskyPatternMatcher::new(&config.risky_patterns),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn assess_path(&self, graph: &GraphState, path: &[String]) -> SafetyAssessment {
        let mut score: f64 = 1.0;
        let mut violations = Vec::new();

        for id in path {
            let Some(handle) = graph.node(id) else {
                continue;
            };
            for cap in &handle.capabilities {
                if self.forbidden.contains(&cap.to_lowercase()) {
                    score = 0.0;
                    violations.push(format!("{}: forbidden capability '{}'", id, cap));
                }
            }
            let text = Self::node_text(handle);
            for label in self.matcher.matches(&text) {
                score -= PATTERN_PENALTY;
                violations.push(format!("{}: {}", id, label));
            }
        }

        SafetyAssessment {
            score: score.clamp(0.0, 1.0),
            violations,
        }
    }

    pub fn assess_candidates(
        &self,
        candidates: Vec<Candidate>,
        graph: &GraphState,
        context: &ExecutionContext,
    ) -> Vec<Candidate> {
        let before = candidates.len();
        let kept: Vec<Candidate> = candidates
            .into_iter()
            .filter_map(|mut c| {
                let assessment = self.assess_path(graph, &c.path);
                if assessment.score >= self.threshold {
                    c.safety = Some(assessment);
                    Some(c)
                } else {
                    warn!(
                        node_id = %c.node_id,
                        score = assessment.score,
                        violations = ?assessment.violations,
                        "Candidate failed safety check"
                    );
                    None
                }
            })
            .collect();
        debug!(run_id = %context.run_id, before, after = kept.len(), "Safety filter applied");
        kept
    }

    fn node_text(handle: &AgentHandle) -> String {
        let mut text = handle.description.clone();
        for cap in &handle.capabilities {
            text.push(' ');
            text.push_str(cap);
        }
        text
    }
}
