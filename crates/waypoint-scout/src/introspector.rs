use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::debug;

use waypoint_core::config::ScoutConfig;
use waypoint_core::types::{Candidate, DiscoveryInfo};
use waypoint_core::ExecutionContext;

use crate::graph::GraphState;
use crate::relevance::{is_responder, keyword_relevance, tokenize};

/// Candidate discovery by beam search over the graph snapshot.
///
/// Start nodes are the executing node's successors, or every node when
/// none qualify. Each depth keeps the `k_beam` most relevant partial
/// paths and extends them along edges up to `max_depth` hops. Every
/// kept path, at every depth, becomes a candidate.
#[derive(Debug, Clone)]
pub struct Introspector {
    k_beam: usize,
    max_depth: usize,
}

impl Introspector {
    pub fn new(config: &ScoutConfig) -> Self {
        Self {
            k_beam: config.k_beam.max(1),
            max_depth: config.max_depth.max(1),
        }
    }

    pub fn discover_paths(
        &self,
        graph: &GraphState,
        question: &str,
        context: &ExecutionContext,
        executing_node: &str,
    ) -> Vec<Candidate> {
        let keywords = tokenize(question);
        let eligible = |id: &str| {
            id != executing_node && graph.node(id).is_some() && !graph.is_control_flow(id)
        };

        let mut starts: Vec<String> = Vec::new();
        for succ in graph.successors(executing_node) {
            if eligible(succ) && !starts.iter().any(|s| s == succ) {
                starts.push(succ.to_string());
            }
        }
        let reason = if starts.is_empty() {
            starts = graph
                .nodes
                .iter()
                .map(|n| n.id.clone())
                .filter(|id| eligible(id))
                .collect();
            "registry fallback".to_string()
        } else {
            format!("successor of {}", executing_node)
        };

        let hint = |path: &[String]| -> f64 {
            path.iter()
                .filter_map(|id| graph.node(id))
                .map(|n| keyword_relevance(&keywords, n))
                .fold(0.0, f64::max)
        };

        let mut beam: Vec<Vec<String>> = starts.into_iter().map(|s| vec![s]).collect();
        let mut discovered: Vec<Vec<String>> = Vec::new();

        for depth in 1..=self.max_depth {
            if depth > 1 {
                let mut extended = Vec::new();
                for path in &beam {
                    let last = path.last().map(String::as_str).unwrap_or_default();
                    for succ in graph.successors(last) {
                        if eligible(succ) && !path.iter().any(|p| p == succ) {
                            let mut next = path.clone();
                            next.push(succ.to_string());
                            extended.push(next);
                        }
                    }
                }
                beam = extended;
            }
            if beam.is_empty() {
                break;
            }

            let mut ranked: Vec<(f64, Vec<String>)> =
                beam.drain(..).map(|p| (hint(&p), p)).collect();
            ranked.sort_by(|(sa, pa), (sb, pb)| {
                sb.partial_cmp(sa).unwrap_or(Ordering::Equal).then_with(|| pa.cmp(pb))
            });
            ranked.truncate(self.k_beam);

            beam = ranked.into_iter().map(|(_, p)| p).collect();
            discovered.extend(beam.iter().cloned());
        }

        let candidates: Vec<Candidate> = discovered
            .into_iter()
            .filter_map(|path| {
                let terminal = self.is_terminal(graph, &path, &eligible);
                let info = DiscoveryInfo {
                    reason: reason.clone(),
                    relevance_hint: hint(&path),
                    terminal,
                };
                Candidate::from_path(path, info)
            })
            .collect();

        debug!(
            run_id = %context.run_id,
            executing_node,
            candidates = candidates.len(),
            "Discovered candidate paths"
        );
        candidates
    }

    /// A path is terminal when its last node answers or has nowhere to go.
    fn is_terminal(
        &self,
        graph: &GraphState,
        path: &[String],
        eligible: &impl Fn(&str) -> bool,
    ) -> bool {
        let Some(last) = path.last() else {
            return false;
        };
        if graph.node(last).is_some_and(is_responder) {
            return true;
        }
        let visited: BTreeSet<&str> = path.iter().map(String::as_str).collect();
        !graph
            .successors(last)
            .any(|s| eligible(s) && !visited.contains(s))
    }
}
