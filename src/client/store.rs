//! Single-writer container for [`SnippetState`] with a ledger of optimistic mutations.
//!
//! Every optimistic change goes through [`Store::begin`], which snapshots what the
//! change is about to touch before applying it. [`Store::confirm`] and
//! [`Store::roll_back`] settle the mutation exactly once and drop it from the
//! ledger, so only pending mutations are held.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::client::reducer::{reduce, Action};
use crate::client::state::SnippetState;
use crate::db::models::Snippet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MutationId(u64);

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    ToggleFavourite { snippet_id: i32, user_id: String },
    Archive(i32),
    Restore(i32),
    Delete(i32),
}

impl MutationKind {
    /// The optimistic mutation an action stands for, if any.
    pub fn of(action: &Action) -> Option<Self> {
        match action {
            Action::ToggleFavourite { snippet_id, user_id } => Some(MutationKind::ToggleFavourite {
                snippet_id: *snippet_id,
                user_id: user_id.clone(),
            }),
            Action::ArchiveSnippetOptimistically(id) => Some(MutationKind::Archive(*id)),
            Action::RestoreSnippetOptimistically(id) => Some(MutationKind::Restore(*id)),
            Action::DeleteSnippet(id) => Some(MutationKind::Delete(*id)),
            _ => None,
        }
    }

    pub fn snippet_id(&self) -> i32 {
        match self {
            MutationKind::ToggleFavourite { snippet_id, .. } => *snippet_id,
            MutationKind::Archive(id) | MutationKind::Restore(id) | MutationKind::Delete(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Pending,
    Confirmed,
    RolledBack,
}

/// What the snippet looked like before the optimistic action ran.
#[derive(Debug, Clone)]
struct RollbackPayload {
    list_entry: Option<(usize, Snippet)>,
    selected: Option<Snippet>,
}

impl RollbackPayload {
    fn capture(state: &SnippetState, snippet_id: i32) -> Self {
        RollbackPayload {
            list_entry: state
                .position(snippet_id)
                .map(|index| (index, state.snippets[index].clone())),
            selected: state.selected_snippet.clone().filter(|s| s.id == snippet_id),
        }
    }

    fn restore(self, state: &mut SnippetState, snippet_id: i32) {
        if let Some((index, entry)) = self.list_entry {
            match state.position(snippet_id) {
                Some(current) => state.snippets[current] = entry,
                None => {
                    let index = index.min(state.snippets.len());
                    state.snippets.insert(index, entry);
                }
            }
        }
        if let Some(selected) = self.selected {
            // A different snippet selected since then wins.
            if state.selected_snippet.is_none() || state.is_selected(snippet_id) {
                state.selected_snippet = Some(selected);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Mutation {
    kind: MutationKind,
    rollback: RollbackPayload,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Action {0} is not an optimistic mutation")]
    NotOptimistic(String),
    #[error("Unknown mutation {0}")]
    UnknownMutation(MutationId),
    #[error("Mutation {0} is already settled")]
    AlreadySettled(MutationId),
}

#[derive(Debug, Default)]
pub struct Store {
    state: SnippetState,
    // Pending mutations only.
    mutations: BTreeMap<MutationId, Mutation>,
    next_id: u64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: SnippetState) -> Self {
        Store {
            state,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &SnippetState {
        &self.state
    }

    pub fn dispatch(&mut self, action: Action) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, action);
    }

    /// Captures the rollback payload, applies `action` and records it as pending.
    pub fn begin(&mut self, action: Action) -> Result<MutationId, StoreError> {
        let kind = MutationKind::of(&action).ok_or_else(|| StoreError::NotOptimistic(format!("{action:?}")))?;
        let rollback = RollbackPayload::capture(&self.state, kind.snippet_id());

        self.next_id += 1;
        let id = MutationId(self.next_id);
        self.dispatch(action);

        debug!(mutation = %id, ?kind, "Optimistic mutation applied.");
        self.mutations.insert(
            id,
            Mutation { kind, rollback },
        );
        Ok(id)
    }

    /// Removes a pending mutation from the ledger.
    fn settle(&mut self, id: MutationId) -> Result<Mutation, StoreError> {
        match self.mutations.remove(&id) {
            Some(mutation) => Ok(mutation),
            // Ids are handed out in order, so a lower one was issued and already settled.
            None if id.0 >= 1 && id.0 <= self.next_id => Err(StoreError::AlreadySettled(id)),
            None => Err(StoreError::UnknownMutation(id)),
        }
    }

    /// Settles the mutation as confirmed, reconciling the server copy when one is given.
    pub fn confirm(
        &mut self,
        id: MutationId,
        authoritative: Option<Snippet>,
    ) -> Result<MutationStatus, StoreError> {
        self.settle(id)?;
        debug!(mutation = %id, "Mutation confirmed.");

        if let Some(snippet) = authoritative {
            self.dispatch(Action::UpdateSnippet(snippet));
        }
        Ok(MutationStatus::Confirmed)
    }

    /// Undoes the optimistic action from the payload captured in [`Store::begin`].
    pub fn roll_back(&mut self, id: MutationId) -> Result<MutationStatus, StoreError> {
        let mutation = self.settle(id)?;
        let snippet_id = mutation.kind.snippet_id();
        debug!(mutation = %id, snippet_id, "Mutation rolled back.");

        mutation.rollback.restore(&mut self.state, snippet_id);
        Ok(MutationStatus::RolledBack)
    }

    /// `Pending` while the mutation is in flight, `None` once settled or never issued.
    pub fn status(&self, id: MutationId) -> Option<MutationStatus> {
        self.mutations.get(&id).map(|_| MutationStatus::Pending)
    }

    pub fn kind(&self, id: MutationId) -> Option<&MutationKind> {
        self.mutations.get(&id).map(|m| &m.kind)
    }

    pub fn pending(&self) -> impl Iterator<Item = (MutationId, &MutationKind)> {
        self.mutations.iter().map(|(id, m)| (*id, &m.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::reducer::tests::snippet;
    use crate::db::models::SnippetFilter;

    fn store_with(ids: &[i32]) -> Store {
        let mut store = Store::new();
        store.dispatch(Action::UpdateSnippetsData {
            snippets: ids.iter().map(|&id| snippet(id, &[])).collect(),
            total_pages: 1,
            current_page: 1,
        });
        store
    }

    fn ids(store: &Store) -> Vec<i32> {
        store.state().snippets.iter().map(|s| s.id).collect()
    }

    fn toggle(id: i32) -> Action {
        Action::ToggleFavourite {
            snippet_id: id,
            user_id: "alice".to_string(),
        }
    }

    #[test]
    fn begin_rejects_non_optimistic_actions() {
        let mut store = Store::new();
        let err = store.begin(Action::SetCurrentPage(2)).unwrap_err();
        assert!(matches!(err, StoreError::NotOptimistic(_)));
        assert_eq!(store.state().current_page, 1);
    }

    #[test]
    fn archive_rollback_reinserts_at_original_index() {
        let mut store = store_with(&[1, 2, 3]);
        store.dispatch(Action::SetSelectedSnippet(Some(snippet(2, &[]))));

        let id = store.begin(Action::ArchiveSnippetOptimistically(2)).unwrap();
        assert_eq!(ids(&store), vec![1, 3]);
        assert!(store.state().selected_snippet.is_none());
        assert_eq!(store.status(id), Some(MutationStatus::Pending));

        assert_eq!(store.roll_back(id), Ok(MutationStatus::RolledBack));
        assert_eq!(ids(&store), vec![1, 2, 3]);
        assert!(store.state().is_selected(2));
        assert_eq!(store.status(id), None);
    }

    #[test]
    fn favourite_rollback_restores_membership() {
        let mut store = store_with(&[1]);
        let id = store.begin(toggle(1)).unwrap();
        assert!(store.state().find(1).unwrap().is_favourite_of("alice"));

        store.roll_back(id).unwrap();
        assert!(store.state().find(1).unwrap().favourite_by.is_empty());
    }

    #[test]
    fn favourite_rollback_under_favourite_filter_brings_entry_back() {
        let mut store = Store::new();
        store.dispatch(Action::SetFilter(SnippetFilter::Favourite));
        store.dispatch(Action::UpdateSnippetsData {
            snippets: vec![snippet(1, &["alice"]), snippet(2, &["alice"])],
            total_pages: 1,
            current_page: 1,
        });

        let id = store.begin(toggle(1)).unwrap();
        assert_eq!(ids(&store), vec![2]);
        store.roll_back(id).unwrap();
        assert_eq!(ids(&store), vec![1, 2]);
        assert!(store.state().find(1).unwrap().is_favourite_of("alice"));
    }

    #[test]
    fn confirm_reconciles_and_settles_once() {
        let mut store = store_with(&[1]);
        let id = store.begin(toggle(1)).unwrap();

        let server_copy = snippet(1, &["alice", "bob"]);
        assert_eq!(store.confirm(id, Some(server_copy.clone())), Ok(MutationStatus::Confirmed));
        assert_eq!(store.state().find(1), Some(&server_copy));

        assert_eq!(store.confirm(id, None), Err(StoreError::AlreadySettled(id)));
        assert_eq!(store.roll_back(id), Err(StoreError::AlreadySettled(id)));
        assert_eq!(store.state().find(1), Some(&server_copy));
    }

    #[test]
    fn unknown_mutations_are_errors() {
        let mut store = Store::new();
        let bogus = MutationId(42);
        assert_eq!(store.roll_back(MutationId(0)), Err(StoreError::UnknownMutation(MutationId(0))));
        assert_eq!(store.roll_back(bogus), Err(StoreError::UnknownMutation(bogus)));
        assert_eq!(store.confirm(bogus, None), Err(StoreError::UnknownMutation(bogus)));
    }

    #[test]
    fn rollback_index_is_clamped_when_list_shrank() {
        let mut store = store_with(&[1, 2, 3]);
        let id = store.begin(Action::DeleteSnippet(3)).unwrap();
        store.dispatch(Action::UpdateSnippetsData {
            snippets: vec![snippet(7, &[])],
            total_pages: 1,
            current_page: 1,
        });
        store.roll_back(id).unwrap();
        assert_eq!(ids(&store), vec![7, 3]);
    }

    #[test]
    fn rollback_leaves_a_newer_selection_alone() {
        let mut store = store_with(&[1, 2]);
        store.dispatch(Action::SetSelectedSnippet(Some(snippet(1, &[]))));
        let id = store.begin(Action::DeleteSnippet(1)).unwrap();
        store.dispatch(Action::SetSelectedSnippet(Some(snippet(2, &[]))));

        store.roll_back(id).unwrap();
        assert!(store.state().is_selected(2));
        assert_eq!(ids(&store), vec![1, 2]);
    }

    #[test]
    fn ledger_tracks_pending_only() {
        let mut store = store_with(&[1, 2]);
        let a = store.begin(toggle(1)).unwrap();
        let b = store.begin(Action::ArchiveSnippetOptimistically(2)).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.pending().count(), 2);
        assert_eq!(store.kind(b), Some(&MutationKind::Archive(2)));

        store.confirm(a, None).unwrap();
        assert_eq!(store.status(a), None);
        assert_eq!(store.kind(a), None);
        assert_eq!(store.status(b), Some(MutationStatus::Pending));

        store.roll_back(b).unwrap();
        assert!(store.mutations.is_empty());
    }

    #[test]
    fn settled_mutations_do_not_accumulate() {
        let mut store = store_with(&[1]);
        for round in 0..1000 {
            let id = store.begin(toggle(1)).unwrap();
            if round % 2 == 0 {
                store.confirm(id, None).unwrap();
            } else {
                store.roll_back(id).unwrap();
            }
        }
        assert!(store.mutations.is_empty());
        assert_eq!(store.pending().count(), 0);
    }
}
