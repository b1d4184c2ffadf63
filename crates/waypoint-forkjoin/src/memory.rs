use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use waypoint_core::error::{Result, WaypointError};

use crate::store::GroupStore;

#[derive(Debug)]
struct Group {
    pending: BTreeSet<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    groups: HashMap<String, Group>,
    sequences: HashMap<String, HashMap<String, String>>,
}

/// Single-process group store.
#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    inner: Mutex<Inner>,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| WaypointError::Unexpected(format!("fork group lock poisoned: {}", e)))
    }
}

impl GroupStore for MemoryGroupStore {
    fn add_members(&self, group_id: &str, members: &[String]) -> BoxFuture<'_, Result<()>> {
        let group_id = group_id.to_string();
        let members = members.to_vec();
        Box::pin(async move {
            let mut inner = self.lock()?;
            let group = inner.groups.entry(group_id).or_insert_with(|| Group {
                pending: BTreeSet::new(),
                created_at: Utc::now(),
            });
            group.pending.extend(members);
            Ok(())
        })
    }

    fn remove_member(&self, group_id: &str, member: &str) -> BoxFuture<'_, Result<bool>> {
        let group_id = group_id.to_string();
        let member = member.to_string();
        Box::pin(async move {
            let mut inner = self.lock()?;
            Ok(inner
                .groups
                .get_mut(&group_id)
                .is_some_and(|g| g.pending.remove(&member)))
        })
    }

    fn members(&self, group_id: &str) -> BoxFuture<'_, Result<Option<BTreeSet<String>>>> {
        let group_id = group_id.to_string();
        Box::pin(async move {
            let inner = self.lock()?;
            Ok(inner.groups.get(&group_id).map(|g| g.pending.clone()))
        })
    }

    fn delete_group(&self, group_id: &str) -> BoxFuture<'_, Result<()>> {
        let group_id = group_id.to_string();
        Box::pin(async move {
            let mut inner = self.lock()?;
            inner.groups.remove(&group_id);
            inner.sequences.remove(&group_id);
            Ok(())
        })
    }

    fn set_successors(&self, group_id: &str, pairs: Vec<(String, String)>) -> BoxFuture<'_, Result<()>> {
        let group_id = group_id.to_string();
        Box::pin(async move {
            let mut inner = self.lock()?;
            inner.sequences.entry(group_id).or_default().extend(pairs);
            Ok(())
        })
    }

    fn successor(&self, group_id: &str, agent_id: &str) -> BoxFuture<'_, Result<Option<String>>> {
        let group_id = group_id.to_string();
        let agent_id = agent_id.to_string();
        Box::pin(async move {
            let inner = self.lock()?;
            Ok(inner
                .sequences
                .get(&group_id)
                .and_then(|seq| seq.get(&agent_id))
                .cloned())
        })
    }

    fn created_at(&self, group_id: &str) -> BoxFuture<'_, Result<Option<DateTime<Utc>>>> {
        let group_id = group_id.to_string();
        Box::pin(async move {
            let inner = self.lock()?;
            Ok(inner.groups.get(&group_id).map(|g| g.created_at))
        })
    }
}
