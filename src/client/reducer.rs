//! The pure transition function over [`SnippetState`].

use crate::client::state::{EditData, SnippetState};
use crate::db::models::{Snippet, SnippetFilter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetSearchTerm(String),
    SetTags(Vec<String>),
    SetSelectedTags(Vec<String>),
    SetSelectedSnippet(Option<Snippet>),
    SetEditData(EditData),
    /// Reconciles an authoritative copy into the list, the selection and the edit buffer.
    UpdateSnippet(Snippet),
    ToggleFavourite { snippet_id: i32, user_id: String },
    DeleteSnippet(i32),
    /// Re-inserts a snippet at the front of the list.
    RestoreSnippet(Snippet),
    AddSnippet(Snippet),
    SetFilter(SnippetFilter),
    ArchiveSnippetOptimistically(i32),
    /// Clears the archived flag on a still-listed copy. Does not re-insert.
    RollbackSnippet(i32),
    RestoreSnippetOptimistically(i32),
    SetCurrentPage(u64),
    ClearStateByFilter(SnippetFilter),
    UpdateSnippetsData {
        snippets: Vec<Snippet>,
        total_pages: u64,
        current_page: u64,
    },
}

/// Flips `user_id` in the favourite set and returns the new membership.
fn flip_favourite(snippet: &mut Snippet, user_id: &str) -> bool {
    if let Some(pos) = snippet.favourite_by.iter().position(|id| id == user_id) {
        snippet.favourite_by.remove(pos);
        false
    } else {
        snippet.favourite_by.push(user_id.to_owned());
        true
    }
}

fn remove_snippet(state: &mut SnippetState, snippet_id: i32) {
    state.snippets.retain(|s| s.id != snippet_id);
    state.clear_selection_of(snippet_id);
}

pub fn reduce(mut state: SnippetState, action: Action) -> SnippetState {
    match action {
        Action::SetSearchTerm(term) => state.search_term = term,
        Action::SetTags(tags) => state.tags = tags,
        Action::SetSelectedTags(tags) => state.selected_tags = tags,
        Action::SetSelectedSnippet(snippet) => state.selected_snippet = snippet,
        Action::SetEditData(edit_data) => state.edit_data = edit_data,
        Action::UpdateSnippet(updated) => {
            if let Some(entry) = state.snippets.iter_mut().find(|s| s.id == updated.id) {
                *entry = updated.clone();
            }
            if state.is_selected(updated.id) {
                state.selected_snippet = Some(updated.clone());
            }
            if state.edit_data.snippet.as_ref().is_some_and(|s| s.id == updated.id) {
                state.edit_data.snippet = Some(updated);
            }
        }
        Action::ToggleFavourite { snippet_id, user_id } => {
            let mut now_favourite = None;
            if let Some(entry) = state.snippets.iter_mut().find(|s| s.id == snippet_id) {
                now_favourite = Some(flip_favourite(entry, &user_id));
            }
            if let Some(selected) = state.selected_snippet.as_mut().filter(|s| s.id == snippet_id) {
                let flipped = flip_favourite(selected, &user_id);
                now_favourite.get_or_insert(flipped);
            }
            if state.filter == SnippetFilter::Favourite && now_favourite == Some(false) {
                remove_snippet(&mut state, snippet_id);
            }
        }
        Action::DeleteSnippet(snippet_id)
        | Action::ArchiveSnippetOptimistically(snippet_id)
        | Action::RestoreSnippetOptimistically(snippet_id) => remove_snippet(&mut state, snippet_id),
        Action::RestoreSnippet(snippet) | Action::AddSnippet(snippet) => {
            state.snippets.insert(0, snippet);
        }
        Action::SetFilter(filter) => state.filter = filter,
        Action::RollbackSnippet(snippet_id) => {
            if let Some(entry) = state.snippets.iter_mut().find(|s| s.id == snippet_id) {
                entry.is_archived = false;
            }
            state.clear_selection_of(snippet_id);
        }
        Action::SetCurrentPage(page) => state.current_page = page,
        Action::ClearStateByFilter(filter) => {
            state.filter = filter;
            state.snippets.clear();
            state.selected_snippet = None;
        }
        Action::UpdateSnippetsData {
            snippets,
            total_pages,
            current_page,
        } => {
            state.snippets = snippets;
            state.total_pages = total_pages;
            state.current_page = current_page;
        }
    }
    state
}
