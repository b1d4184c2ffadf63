use serde::{Deserialize, Serialize};

use waypoint_core::control_flow::is_control_flow_handle;
use waypoint_core::error::{Result, WaypointError};
use waypoint_core::traits::Orchestrator;
use waypoint_core::types::AgentHandle;

/// A directed edge between two agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

/// Read-only snapshot of the workflow graph for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphState {
    pub nodes: Vec<AgentHandle>,
    pub edges: Vec<GraphEdge>,
}

impl GraphState {
    /// Build a snapshot from registry handles.
    ///
    /// A handle with declared successors gets an edge to each of them;
    /// otherwise it links to the next handle in registration order.
    pub fn from_handles(handles: &[AgentHandle]) -> Self {
        let mut edges = Vec::new();
        for (i, handle) in handles.iter().enumerate() {
            if handle.successors.is_empty() {
                if let Some(next) = handles.get(i + 1) {
                    edges.push(GraphEdge {
                        from: handle.id.clone(),
                        to: next.id.clone(),
                    });
                }
            } else {
                for succ in &handle.successors {
                    edges.push(GraphEdge {
                        from: handle.id.clone(),
                        to: succ.clone(),
                    });
                }
            }
        }
        Self {
            nodes: handles.to_vec(),
            edges,
        }
    }

    pub fn node(&self, id: &str) -> Option<&AgentHandle> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Outgoing neighbours of `id`, in edge order.
    pub fn successors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.from == id)
            .map(|e| e.to.as_str())
    }

    /// Whether `id` is a routing/validation node (by id or registered type).
    pub fn is_control_flow(&self, id: &str) -> bool {
        is_control_flow_handle(id, self.node(id))
    }
}

/// Graph snapshot accessor.
pub trait GraphApi: Send + Sync + 'static {
    fn get_graph_state(&self, orchestrator: &dyn Orchestrator, run_id: &str) -> Result<GraphState>;
}

/// Builds the snapshot from the orchestrator's agent registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryGraphApi;

impl GraphApi for RegistryGraphApi {
    fn get_graph_state(&self, orchestrator: &dyn Orchestrator, run_id: &str) -> Result<GraphState> {
        let registry = orchestrator.agents().ok_or_else(|| {
            WaypointError::Graph(format!("run {}: orchestrator exposes no agent registry", run_id))
        })?;
        Ok(GraphState::from_handles(registry.handles()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handles() -> Vec<AgentHandle> {
        vec![
            AgentHandle::new("scout", "graph-scout").with_successors(vec!["search".into(), "memory".into()]),
            AgentHandle::new("search", "duckduckgo"),
            AgentHandle::new("memory", "memory-reader"),
            AgentHandle::new("answer", "openai-answer"),
        ]
    }

    #[test]
    fn test_declared_and_sequential_edges() {
        let graph = GraphState::from_handles(&handles());
        let from_scout: Vec<&str> = graph.successors("scout").collect();
        assert_eq!(from_scout, vec!["search", "memory"]);

        let from_search: Vec<&str> = graph.successors("search").collect();
        assert_eq!(from_search, vec!["memory"]);

        assert_eq!(graph.successors("answer").count(), 0);
    }

    #[test]
    fn test_control_flow_by_type() {
        let graph = GraphState::from_handles(&handles());
        assert!(graph.is_control_flow("scout"));
        assert!(!graph.is_control_flow("search"));
        assert!(graph.is_control_flow("path_executor"));
    }
}
