//! Ancestor closure over the role hierarchy.
//!
//! The traversal is iterative (explicit stack, no recursion) and de-duplicates
//! on role identifier, which makes it safe against cyclic and diamond-shaped
//! hierarchies: a role reachable by two paths is queued once.

use super::RoleStore;
use crate::error::AuthError;
use std::collections::HashSet;
use std::sync::Arc;

pub struct PrivilegeGraph {
    roles: Arc<dyn RoleStore>,
}

impl PrivilegeGraph {
    #[must_use]
    pub fn new(roles: Arc<dyn RoleStore>) -> Self {
        Self { roles }
    }

    /// Every role reachable from `member` by following parent links, each at
    /// most once.
    ///
    /// # Errors
    /// Propagates role-store failures.
    pub async fn ancestors(&self, member: &str) -> Result<HashSet<String>, AuthError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: Vec<String> = Vec::new();

        for parent in self.roles.parents_of(member).await? {
            if visited.insert(parent.clone()) {
                stack.push(parent);
            }
        }
        while let Some(role) = stack.pop() {
            for parent in self.roles.parents_of(&role).await? {
                // The visited set is the cycle guard: re-discovered roles are
                // never re-queued.
                if visited.insert(parent.clone()) {
                    stack.push(parent);
                }
            }
        }
        Ok(visited)
    }

    /// The same closure organized into discrete layers: layer 0 holds the
    /// direct parents, layer k the parents of layer k-1. Every layer is
    /// de-duplicated against one global seen set shared across layers, and
    /// the traversal stops after `depth` layers (0 or negative: unbounded).
    ///
    /// The returned stack, read far-ancestor-first (that is, in reverse), is
    /// the input the privilege evaluator consumes.
    ///
    /// # Errors
    /// Propagates role-store failures.
    pub async fn ancestor_layers(
        &self,
        member: &str,
        depth: i32,
    ) -> Result<Vec<HashSet<String>>, AuthError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut layers: Vec<HashSet<String>> = Vec::new();
        let mut frontier: Vec<String> = vec![member.to_string()];

        while depth <= 0 || (layers.len() as i32) < depth {
            let mut layer: HashSet<String> = HashSet::new();
            for identifier in &frontier {
                for parent in self.roles.parents_of(identifier).await? {
                    if seen.insert(parent.clone()) {
                        layer.insert(parent);
                    }
                }
            }
            if layer.is_empty() {
                break;
            }
            frontier = layer.iter().cloned().collect();
            layers.push(layer);
        }
        Ok(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::super::MemoryRoleStore;
    use super::*;
    use anyhow::Result;

    fn graph(store: MemoryRoleStore) -> PrivilegeGraph {
        PrivilegeGraph::new(Arc::new(store))
    }

    fn as_set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| (*id).to_string()).collect()
    }

    #[tokio::test]
    async fn diamond_hierarchy_yields_no_duplicates() -> Result<()> {
        // A -> B -> C -> D plus the shortcut A -> C.
        let store = MemoryRoleStore::new()
            .with_member("A", ["B", "C"])
            .with_member("B", ["C"])
            .with_member("C", ["D"]);
        let ancestors = graph(store).ancestors("A").await?;
        assert_eq!(ancestors, as_set(&["B", "C", "D"]));
        Ok(())
    }

    #[tokio::test]
    async fn cyclic_hierarchy_terminates() -> Result<()> {
        let store = MemoryRoleStore::new()
            .with_member("A", ["B"])
            .with_member("B", ["C"])
            .with_member("C", ["A"]);
        let ancestors = graph(store).ancestors("A").await?;
        assert_eq!(ancestors, as_set(&["A", "B", "C"]));
        Ok(())
    }

    #[tokio::test]
    async fn member_without_parents_has_no_ancestors() -> Result<()> {
        let store = MemoryRoleStore::new();
        assert!(graph(store).ancestors("loner").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn layers_are_ordered_nearest_first() -> Result<()> {
        let store = MemoryRoleStore::new()
            .with_member("alice", ["staff"])
            .with_member("staff", ["employees"])
            .with_member("employees", ["everyone"]);
        let layers = graph(store).ancestor_layers("alice", 0).await?;
        assert_eq!(
            layers,
            vec![
                as_set(&["staff"]),
                as_set(&["employees"]),
                as_set(&["everyone"]),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn layers_deduplicate_against_a_global_seen_set() -> Result<()> {
        // "shared" is both a direct parent and a grandparent; it must only
        // appear in the nearest layer.
        let store = MemoryRoleStore::new()
            .with_member("alice", ["shared", "staff"])
            .with_member("staff", ["shared", "managers"]);
        let layers = graph(store).ancestor_layers("alice", 0).await?;
        assert_eq!(
            layers,
            vec![as_set(&["shared", "staff"]), as_set(&["managers"])]
        );
        Ok(())
    }

    #[tokio::test]
    async fn depth_bounds_the_traversal() -> Result<()> {
        let store = MemoryRoleStore::new()
            .with_member("alice", ["staff"])
            .with_member("staff", ["employees"])
            .with_member("employees", ["everyone"]);
        let layers = graph(store).ancestor_layers("alice", 2).await?;
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[1], as_set(&["employees"]));
        Ok(())
    }

    #[tokio::test]
    async fn negative_depth_means_unbounded() -> Result<()> {
        let store = MemoryRoleStore::new()
            .with_member("alice", ["staff"])
            .with_member("staff", ["employees"]);
        let layers = graph(store).ancestor_layers("alice", -1).await?;
        assert_eq!(layers.len(), 2);
        Ok(())
    }
}
