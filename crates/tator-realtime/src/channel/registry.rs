//! Subscription registry: group -> connections and connection -> groups.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::connection::handle::ConnectionId;

/// Two-way index of group memberships.
///
/// The broadcast receivers are what actually deliver messages; this index
/// exists so a disconnect can be checked for leftovers and so health
/// reporting can count listeners per group.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    by_group: DashMap<String, HashSet<ConnectionId>>,
    by_connection: DashMap<ConnectionId, HashSet<String>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `conn_id` joined `group`.
    pub fn join(&self, group: &str, conn_id: ConnectionId) {
        self.by_group
            .entry(group.to_string())
            .or_default()
            .insert(conn_id);
        self.by_connection
            .entry(conn_id)
            .or_default()
            .insert(group.to_string());
    }

    /// Remove every membership of `conn_id`, returning the groups it left.
    pub fn leave_all(&self, conn_id: ConnectionId) -> Vec<String> {
        let Some((_, groups)) = self.by_connection.remove(&conn_id) else {
            return Vec::new();
        };
        for group in &groups {
            let now_empty = match self.by_group.get_mut(group) {
                Some(mut members) => {
                    members.remove(&conn_id);
                    members.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.by_group.remove_if(group, |_, members| members.is_empty());
            }
        }
        let mut left: Vec<String> = groups.into_iter().collect();
        left.sort();
        left
    }

    /// Groups `conn_id` currently belongs to, sorted.
    pub fn groups_of(&self, conn_id: ConnectionId) -> Vec<String> {
        let mut groups: Vec<String> = self
            .by_connection
            .get(&conn_id)
            .map(|g| g.iter().cloned().collect())
            .unwrap_or_default();
        groups.sort();
        groups
    }

    /// Connections currently in `group`.
    pub fn member_count(&self, group: &str) -> usize {
        self.by_group.get(group).map(|m| m.len()).unwrap_or(0)
    }

    /// Number of groups with at least one member.
    pub fn group_count(&self) -> usize {
        self.by_group.len()
    }
}
