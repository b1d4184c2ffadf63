//! Control-flow node classification.
//!
//! Routing and validation nodes must never be re-entered by the path
//! executor or proposed by the scout. Classification is two-tier: a cheap
//! id heuristic, then the registered agent type when a registry is
//! reachable. Missing registries or entries leave the heuristic result
//! untouched, so classification never fails.

use crate::traits::Orchestrator;
use crate::types::{AgentHandle, AgentRegistry};

/// Keywords identifying control-flow agents, by id or by type name.
pub const CONTROL_FLOW_KEYWORDS: &[&str] = &["path-executor", "graph-scout", "validator", "classifier"];

/// Lowercase and drop separators so `PathExecutorNode`, `path_executor`
/// and `path-executor` all compare equal.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '-' | '_') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Tier one: does `name` contain a control-flow keyword?
pub fn matches_keyword(name: &str) -> bool {
    let name = normalize(name);
    CONTROL_FLOW_KEYWORDS
        .iter()
        .any(|kw| name.contains(&normalize(kw)))
}

/// Classify `agent_id` by its id, then by its handle's type if known.
pub fn is_control_flow_handle(agent_id: &str, handle: Option<&AgentHandle>) -> bool {
    matches_keyword(agent_id) || handle.is_some_and(|h| matches_keyword(&h.agent_type))
}

/// Classify `agent_id` using the heuristic and, if given, the registry.
pub fn is_control_flow(agent_id: &str, registry: Option<&AgentRegistry>) -> bool {
    is_control_flow_handle(agent_id, registry.and_then(|r| r.get(agent_id)))
}

/// Classify `agent_id` against whatever registry the orchestrator exposes.
pub fn is_control_flow_in(agent_id: &str, orchestrator: Option<&dyn Orchestrator>) -> bool {
    is_control_flow(agent_id, orchestrator.and_then(|o| o.agents()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentHandle;

    #[test]
    fn test_keyword_variants() {
        assert!(matches_keyword("path-executor"));
        assert!(matches_keyword("PathExecutorNode"));
        assert!(matches_keyword("my_graph_scout_1"));
        assert!(matches_keyword("Input Validator"));
        assert!(matches_keyword("intent-classifier"));
        assert!(!matches_keyword("web-search"));
        assert!(!matches_keyword("answer_builder"));
    }

    #[test]
    fn test_registry_type_override() {
        let registry: AgentRegistry = vec![
            AgentHandle::new("router", "GraphScoutAgent"),
            AgentHandle::new("search", "duckduckgo"),
        ]
        .into_iter()
        .collect();

        assert!(is_control_flow("router", Some(&registry)));
        assert!(!is_control_flow("search", Some(&registry)));
        // Unknown ids fall back to the heuristic.
        assert!(!is_control_flow("unknown", Some(&registry)));
        assert!(is_control_flow("fact-validator", Some(&registry)));
    }

    #[test]
    fn test_without_registry() {
        assert!(!is_control_flow("router", None));
        assert!(is_control_flow("graph-scout", None));
        assert!(!is_control_flow_in("router", None));
    }

    #[test]
    fn test_handle_classification() {
        let router = AgentHandle::new("router", "input-classifier");
        assert!(is_control_flow_handle("router", Some(&router)));
        assert!(!is_control_flow_handle("router", None));
        assert!(is_control_flow_handle("path_executor", None));
    }
}
