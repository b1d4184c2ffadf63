use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use waypoint_core::config::ForkJoinConfig;
use waypoint_core::error::Result;

use crate::memory::MemoryGroupStore;
use crate::sqlite::SqliteGroupStore;
use crate::store::GroupStore;

/// A fork member: one agent, or a nested branch of agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BranchSpec {
    Agent(String),
    Branch(Vec<BranchSpec>),
}

impl BranchSpec {
    /// Every agent id in depth-first order.
    pub fn agent_ids(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<String>) {
        match self {
            Self::Agent(id) => out.push(id.clone()),
            Self::Branch(items) => items.iter().for_each(|b| b.collect_into(out)),
        }
    }
}

impl From<&str> for BranchSpec {
    fn from(id: &str) -> Self {
        Self::Agent(id.to_string())
    }
}

impl From<String> for BranchSpec {
    fn from(id: String) -> Self {
        Self::Agent(id)
    }
}

impl<T: Into<BranchSpec>> From<Vec<T>> for BranchSpec {
    fn from(items: Vec<T>) -> Self {
        Self::Branch(items.into_iter().map(Into::into).collect())
    }
}

/// Tracks which branches of a fork are still running and how agents
/// within a branch follow each other.
///
/// All state lives in the injected [`GroupStore`], so several managers
/// (in one process or many) coordinate through the same groups.
#[derive(Clone)]
pub struct ForkGroupManager {
    store: Arc<dyn GroupStore>,
}

impl ForkGroupManager {
    pub fn new(store: Arc<dyn GroupStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryGroupStore::new()))
    }

    /// Build a manager over the configured backend.
    pub fn from_config(config: &ForkJoinConfig) -> Result<Self> {
        let store: Arc<dyn GroupStore> = match config {
            ForkJoinConfig::Memory => Arc::new(MemoryGroupStore::new()),
            ForkJoinConfig::Sqlite { path } => Arc::new(SqliteGroupStore::open(Path::new(path))?),
        };
        Ok(Self::new(store))
    }

    pub fn store(&self) -> &Arc<dyn GroupStore> {
        &self.store
    }

    /// `base_<32 hex chars>`.
    pub fn generate_group_id(base: &str) -> String {
        format!("{}_{}", base, Uuid::new_v4().simple())
    }

    /// Register a fork. Nested branches are flattened; an existing group
    /// gains the new members.
    pub async fn create_group<I, B>(&self, group_id: &str, branches: I) -> Result<()>
    where
        I: IntoIterator<Item = B>,
        B: Into<BranchSpec>,
    {
        let members: Vec<String> = branches
            .into_iter()
            .flat_map(|b| b.into().agent_ids())
            .collect();
        self.store.add_members(group_id, &members).await?;
        info!(group_id, members = ?members, "Fork group created");
        Ok(())
    }

    /// Mark one member finished. Returns whether it was still pending;
    /// repeats and unknown groups are no-ops.
    pub async fn mark_agent_done(&self, group_id: &str, agent_id: &str) -> Result<bool> {
        let removed = self.store.remove_member(group_id, agent_id).await?;
        debug!(group_id, agent_id, removed, "Fork member done");
        Ok(removed)
    }

    /// True iff the group exists and nothing is pending. Unknown groups
    /// are never done.
    pub async fn is_group_done(&self, group_id: &str) -> Result<bool> {
        Ok(self
            .store
            .members(group_id)
            .await?
            .is_some_and(|pending| pending.is_empty()))
    }

    pub async fn list_pending_agents(&self, group_id: &str) -> Result<Vec<String>> {
        Ok(self
            .store
            .members(group_id)
            .await?
            .map(|pending| pending.into_iter().collect())
            .unwrap_or_default())
    }

    pub async fn delete_group(&self, group_id: &str) -> Result<()> {
        self.store.delete_group(group_id).await?;
        info!(group_id, "Fork group deleted");
        Ok(())
    }

    /// Remember that, within this group, each agent hands off to the next.
    pub async fn track_branch_sequence(&self, group_id: &str, agent_ids: &[String]) -> Result<()> {
        let pairs: Vec<(String, String)> = agent_ids
            .windows(2)
            .map(|w| (w[0].clone(), w[1].clone()))
            .collect();
        if pairs.is_empty() {
            return Ok(());
        }
        self.store.set_successors(group_id, pairs).await
    }

    pub async fn next_in_sequence(&self, group_id: &str, agent_id: &str) -> Result<Option<String>> {
        self.store.successor(group_id, agent_id).await
    }

    pub async fn created_at(&self, group_id: &str) -> Result<Option<DateTime<Utc>>> {
        self.store.created_at(group_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_branch_spec_flattening() {
        let spec: BranchSpec = serde_json::from_value(json!(["a", ["b", ["c"]], "d"])).unwrap();
        assert_eq!(spec.agent_ids(), vec!["a", "b", "c", "d"]);

        let spec = BranchSpec::from(vec![BranchSpec::from("x"), BranchSpec::from(vec!["y", "z"])]);
        assert_eq!(spec.agent_ids(), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_generate_group_id() {
        let a = ForkGroupManager::generate_group_id("fork");
        let b = ForkGroupManager::generate_group_id("fork");
        assert_ne!(a, b);
        let suffix = a.strip_prefix("fork_").unwrap();
        assert_eq!(suffix.len(), 32);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_from_config_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("forks.db");
        let config = ForkJoinConfig::Sqlite {
            path: path.to_string_lossy().into_owned(),
        };
        let manager = ForkGroupManager::from_config(&config).unwrap();
        manager.create_group("g", ["a"]).await.unwrap();
        assert!(path.exists());
        assert_eq!(manager.list_pending_agents("g").await.unwrap(), vec!["a"]);
    }
}
