//! Membership oracle: descendant-subtree queries over the account tree.
//!
//! Nearly every privileged operation is gated on "is the target inside
//! the actor's subtree". The tree is read through [`ChildSource`], which
//! returns all direct children of a batch of parents in one call, so the
//! closure computation below issues one query per tree *level* rather
//! than one per node.

use std::collections::HashSet;

use crate::domain::AccountId;
use crate::error::CoreError;
use crate::persistence::PostgresStore;

/// Batched parent→children edge lookup.
pub trait ChildSource {
    /// Returns the ids of all direct children of the given parents.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] when the edge source cannot be read.
    fn children_of(
        &self,
        parents: &[AccountId],
    ) -> impl Future<Output = Result<Vec<AccountId>, CoreError>> + Send;
}

impl ChildSource for PostgresStore {
    async fn children_of(&self, parents: &[AccountId]) -> Result<Vec<AccountId>, CoreError> {
        self.fetch_children(parents).await
    }
}

impl<S: ChildSource + Send + Sync> ChildSource for std::sync::Arc<S> {
    async fn children_of(&self, parents: &[AccountId]) -> Result<Vec<AccountId>, CoreError> {
        (**self).children_of(parents).await
    }
}

/// Descendant-membership oracle over a [`ChildSource`].
///
/// Both queries run the same iterative frontier expansion: start from the
/// root, repeatedly fetch the children of the current frontier, add
/// unseen ids to the visited set, and stop when a frontier comes back
/// empty (or, for the membership test, as soon as the target appears).
/// Cost is bounded by tree depth; the visited set makes the walk
/// terminate even if a corrupt store ever produced a cycle.
#[derive(Debug, Clone)]
pub struct HierarchyService<S> {
    source: S,
}

impl<S: ChildSource> HierarchyService<S> {
    /// Creates an oracle over the given edge source.
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// True iff `target` lies in `root`'s descendant subtree.
    ///
    /// `root == target` is trivially true (an account is in its own
    /// hierarchy). Unrelated accounts, ancestors of `root`, and ids not
    /// present in the tree all yield false.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on database failure.
    pub async fn is_descendant(
        &self,
        root: AccountId,
        target: AccountId,
    ) -> Result<bool, CoreError> {
        if root == target {
            return Ok(true);
        }

        let mut visited: HashSet<AccountId> = HashSet::from([root]);
        let mut frontier = vec![root];

        while !frontier.is_empty() {
            let children = self.source.children_of(&frontier).await?;
            frontier = children
                .into_iter()
                .filter(|child| visited.insert(*child))
                .collect();
            if frontier.contains(&target) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns the full descendant set of `root`, root included.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on database failure.
    pub async fn descendant_ids(&self, root: AccountId) -> Result<Vec<AccountId>, CoreError> {
        let mut visited: HashSet<AccountId> = HashSet::from([root]);
        let mut ordered = vec![root];
        let mut frontier = vec![root];

        while !frontier.is_empty() {
            let children = self.source.children_of(&frontier).await?;
            frontier = children
                .into_iter()
                .filter(|child| visited.insert(*child))
                .collect();
            ordered.extend_from_slice(&frontier);
        }
        Ok(ordered)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory edge map for tests.
    #[derive(Debug, Default)]
    struct TreeSource {
        children: HashMap<AccountId, Vec<AccountId>>,
    }

    impl ChildSource for TreeSource {
        async fn children_of(&self, parents: &[AccountId]) -> Result<Vec<AccountId>, CoreError> {
            Ok(parents
                .iter()
                .flat_map(|p| self.children.get(p).cloned().unwrap_or_default())
                .collect())
        }
    }

    /// admin ─ dist ─ sub ─ store ─ player
    ///            └─ store2
    fn fixture() -> (TreeSource, [AccountId; 6]) {
        let ids: [AccountId; 6] = std::array::from_fn(|_| AccountId::new());
        let [admin, dist, sub, store, player, store2] = ids;
        let mut children = HashMap::new();
        children.insert(admin, vec![dist]);
        children.insert(dist, vec![sub, store2]);
        children.insert(sub, vec![store]);
        children.insert(store, vec![player]);
        (TreeSource { children }, ids)
    }

    #[tokio::test]
    async fn self_is_always_a_descendant() {
        let (source, ids) = fixture();
        let oracle = HierarchyService::new(source);
        for id in ids {
            assert!(oracle.is_descendant(id, id).await.unwrap_or(false));
        }
    }

    #[tokio::test]
    async fn deep_descendant_is_found() {
        let (source, [admin, dist, _, _, player, _]) = fixture();
        let oracle = HierarchyService::new(source);
        assert!(oracle.is_descendant(admin, player).await.unwrap_or(false));
        assert!(oracle.is_descendant(dist, player).await.unwrap_or(false));
    }

    #[tokio::test]
    async fn ancestor_is_not_a_descendant() {
        let (source, [admin, _, _, store, player, _]) = fixture();
        let oracle = HierarchyService::new(source);
        assert!(!oracle.is_descendant(player, admin).await.unwrap_or(true));
        assert!(!oracle.is_descendant(store, admin).await.unwrap_or(true));
    }

    #[tokio::test]
    async fn sibling_branch_is_not_a_descendant() {
        let (source, [_, _, sub, _, _, store2]) = fixture();
        let oracle = HierarchyService::new(source);
        assert!(!oracle.is_descendant(sub, store2).await.unwrap_or(true));
        assert!(!oracle.is_descendant(store2, sub).await.unwrap_or(true));
    }

    #[tokio::test]
    async fn disconnected_id_is_not_a_descendant() {
        let (source, [admin, ..]) = fixture();
        let oracle = HierarchyService::new(source);
        let stranger = AccountId::new();
        assert!(!oracle.is_descendant(admin, stranger).await.unwrap_or(true));
    }

    #[tokio::test]
    async fn descendant_ids_covers_whole_subtree() {
        let (source, [admin, dist, sub, store, player, store2]) = fixture();
        let oracle = HierarchyService::new(source);

        let Ok(all) = oracle.descendant_ids(admin).await else {
            panic!("query failed");
        };
        let set: HashSet<_> = all.iter().copied().collect();
        assert_eq!(set.len(), 6);
        for id in [admin, dist, sub, store, player, store2] {
            assert!(set.contains(&id));
        }

        let Ok(branch) = oracle.descendant_ids(sub).await else {
            panic!("query failed");
        };
        let branch: HashSet<_> = branch.into_iter().collect();
        assert_eq!(branch, HashSet::from([sub, store, player]));
    }

    #[tokio::test]
    async fn cyclic_edges_still_terminate() {
        // Should be impossible by construction; the visited set keeps the
        // walk finite anyway.
        let a = AccountId::new();
        let b = AccountId::new();
        let mut children = HashMap::new();
        children.insert(a, vec![b]);
        children.insert(b, vec![a]);
        let oracle = HierarchyService::new(TreeSource { children });

        assert!(oracle.is_descendant(a, b).await.unwrap_or(false));
        let Ok(ids) = oracle.descendant_ids(a).await else {
            panic!("query failed");
        };
        assert_eq!(ids.len(), 2);
    }
}
