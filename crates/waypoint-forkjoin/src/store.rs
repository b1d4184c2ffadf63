use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use waypoint_core::error::Result;

/// Set-membership store behind the fork/join coordinator.
///
/// A group exists from its first `add_members` call until
/// `delete_group`, even while its pending set is empty. Branch sequences
/// live beside the groups and never create one on their own.
/// Implementations must make `remove_member` atomic: concurrent callers
/// removing the same member see exactly one `true`.
pub trait GroupStore: Send + Sync + 'static {
    /// Create the group if needed and add `members` to its pending set.
    fn add_members(&self, group_id: &str, members: &[String]) -> BoxFuture<'_, Result<()>>;

    /// Remove one pending member. Returns whether it was present.
    fn remove_member(&self, group_id: &str, member: &str) -> BoxFuture<'_, Result<bool>>;

    /// Pending members, or `None` if the group does not exist.
    fn members(&self, group_id: &str) -> BoxFuture<'_, Result<Option<BTreeSet<String>>>>;

    /// Drop the group, its pending set and its branch sequence.
    fn delete_group(&self, group_id: &str) -> BoxFuture<'_, Result<()>>;

    /// Record `agent -> next` pairs for a group, replacing earlier entries
    /// for the same agents.
    fn set_successors(&self, group_id: &str, pairs: Vec<(String, String)>) -> BoxFuture<'_, Result<()>>;

    fn successor(&self, group_id: &str, agent_id: &str) -> BoxFuture<'_, Result<Option<String>>>;

    /// When the group was first created.
    fn created_at(&self, group_id: &str) -> BoxFuture<'_, Result<Option<DateTime<Utc>>>>;
}
