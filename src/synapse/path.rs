//! Per-stage, insertion-ordered branch collections.

use crate::synapse::branch::{Branch, BranchId};
use indexmap::IndexMap;
use std::sync::Arc;

/// The branch collections attached to a conversational path: one ordered
/// set per matching stage. `hear` and `respond`/`remember` don't take
/// branches — they run a single middleware chain and a fixed built-in
/// action instead (see [`Thoughts`](crate::synapse::thoughts::Thoughts)).
#[derive(Default, Clone)]
pub struct Path {
    pub listen: IndexMap<BranchId, Arc<Branch>>,
    pub understand: IndexMap<BranchId, Arc<Branch>>,
    pub serve: IndexMap<BranchId, Arc<Branch>>,
    pub act: IndexMap<BranchId, Arc<Branch>>,
}

/// Which of a [`Path`]'s branch collections a stage name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Listen,
    Understand,
    Serve,
    Act,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, stage: Stage) -> &IndexMap<BranchId, Arc<Branch>> {
        match stage {
            Stage::Listen => &self.listen,
            Stage::Understand => &self.understand,
            Stage::Serve => &self.serve,
            Stage::Act => &self.act,
        }
    }

    fn collection_mut(&mut self, stage: Stage) -> &mut IndexMap<BranchId, Arc<Branch>> {
        match stage {
            Stage::Listen => &mut self.listen,
            Stage::Understand => &mut self.understand,
            Stage::Serve => &mut self.serve,
            Stage::Act => &mut self.act,
        }
    }

    /// Install a branch on the named stage collection, keyed by its id. A
    /// second registration under the same id replaces the first.
    pub fn install(&mut self, stage: Stage, branch: Branch) {
        self.collection_mut(stage).insert(branch.id.clone(), Arc::new(branch));
    }

    /// Remove a branch by id from the named stage collection.
    pub fn remove(&mut self, stage: Stage, id: &BranchId) -> Option<Arc<Branch>> {
        self.collection_mut(stage).shift_remove(id)
    }

    /// Whether the named stage collection has any branches installed.
    pub fn has_branches(&self, stage: Stage) -> bool {
        !self.collection(stage).is_empty()
    }

    /// A stage's branches in insertion order.
    pub fn branches(&self, stage: Stage) -> impl Iterator<Item = &Arc<Branch>> {
        self.collection(stage).values()
    }

    /// Collapse a stage's branch map down to only its force-marked entries,
    /// in their existing relative order. Used by `listen`'s built-in action
    /// to restrict `understand` to forced branches after a listen match.
    pub fn forced(&mut self, stage: Stage) {
        self.collection_mut(stage).retain(|_, branch| branch.force);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synapse::branch::{BranchCallback, RegexMatcher};
    use crate::synapse::error::CoreError;
    use crate::synapse::state::State;
    use async_trait::async_trait;

    struct NoopCallback;

    #[async_trait]
    impl BranchCallback for NoopCallback {
        async fn call(&self, _state: &mut State) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn branch(id: &str, force: bool) -> Branch {
        let b = Branch::new(
            id,
            Arc::new(RegexMatcher::new(".*").unwrap()),
            Arc::new(NoopCallback),
        );
        if force {
            b.forced()
        } else {
            b
        }
    }

    #[test]
    fn install_and_has_branches() {
        let mut path = Path::new();
        assert!(!path.has_branches(Stage::Act));
        path.install(Stage::Act, branch("a1", false));
        assert!(path.has_branches(Stage::Act));
    }

    #[test]
    fn branches_iterate_in_insertion_order() {
        let mut path = Path::new();
        path.install(Stage::Act, branch("first", false));
        path.install(Stage::Act, branch("second", true));

        let order: Vec<String> = path
            .branches(Stage::Act)
            .map(|b| b.id.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn forced_collapses_to_force_marked_branches_only() {
        let mut path = Path::new();
        path.install(Stage::Understand, branch("normal", false));
        path.install(Stage::Understand, branch("forced", true));

        path.forced(Stage::Understand);

        let remaining: Vec<String> = path
            .branches(Stage::Understand)
            .map(|b| b.id.as_str().to_string())
            .collect();
        assert_eq!(remaining, vec!["forced".to_string()]);
    }

    #[test]
    fn remove_drops_from_collection() {
        let mut path = Path::new();
        path.install(Stage::Listen, branch("l1", false));
        assert!(path.remove(Stage::Listen, &BranchId::from("l1")).is_some());
        assert!(!path.has_branches(Stage::Listen));
    }
}
