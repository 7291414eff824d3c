use crate::db::models::{Snippet, SnippetFilter, ALL_TAGS};

/// The snippet staged for the edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditData {
    pub is_edit_mode: bool,
    pub snippet: Option<Snippet>,
}

impl EditData {
    pub fn editing(snippet: Snippet) -> Self {
        EditData {
            is_edit_mode: true,
            snippet: Some(snippet),
        }
    }
}

/// Everything the snippet views render from. Only [`super::reducer::reduce`] changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetState {
    pub search_term: String,
    /// Known tag names, for the tag picker.
    pub tags: Vec<String>,
    /// `["all"]` means no tag restriction.
    pub selected_tags: Vec<String>,
    /// The visible page, newest first.
    pub snippets: Vec<Snippet>,
    pub selected_snippet: Option<Snippet>,
    pub edit_data: EditData,
    pub filter: SnippetFilter,
    pub current_page: u64,
    pub total_pages: u64,
}

impl Default for SnippetState {
    fn default() -> Self {
        SnippetState {
            search_term: String::new(),
            tags: Vec::new(),
            selected_tags: vec![ALL_TAGS.to_string()],
            snippets: Vec::new(),
            selected_snippet: None,
            edit_data: EditData::default(),
            filter: SnippetFilter::All,
            current_page: 1,
            total_pages: 1,
        }
    }
}

impl SnippetState {
    pub fn position(&self, snippet_id: i32) -> Option<usize> {
        self.snippets.iter().position(|s| s.id == snippet_id)
    }

    pub fn find(&self, snippet_id: i32) -> Option<&Snippet> {
        self.snippets.iter().find(|s| s.id == snippet_id)
    }

    pub fn is_selected(&self, snippet_id: i32) -> bool {
        self.selected_snippet.as_ref().is_some_and(|s| s.id == snippet_id)
    }

    pub(crate) fn clear_selection_of(&mut self, snippet_id: i32) {
        if self.is_selected(snippet_id) {
            self.selected_snippet = None;
        }
    }

    /// The selected tags as the list endpoints expect them.
    pub fn tags_param(&self) -> String {
        if self.selected_tags.is_empty() {
            return ALL_TAGS.to_string();
        }
        self.selected_tags.join(",")
    }
}
