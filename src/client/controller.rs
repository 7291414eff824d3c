use tracing::{debug, info, warn};

use crate::client::api::{ApiError, SnippetApi};
use crate::client::reducer::Action;
use crate::client::state::{EditData, SnippetState};
use crate::client::store::{Store, StoreError};
use crate::db::models::{Snippet, SnippetFilter, SnippetInput, SnippetQuery, DEFAULT_PAGE_SIZE};
use crate::web::models::PageResponse;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("No snippet is being edited")]
    NotEditing,
}

/// A list fetch in flight. Only the most recently prepared ticket may apply its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub filter: SnippetFilter,
    pub query: SnippetQuery,
}

/// Drives the snippet views: builds list requests from the filter state, runs
/// optimistic mutations through the store, and settles them from API results.
pub struct SnippetController<A> {
    api: A,
    store: Store,
    user_id: String,
    page_size: u64,
    fetch_generation: u64,
}

impl<A: SnippetApi> SnippetController<A> {
    pub fn new(api: A, user_id: impl Into<String>) -> Self {
        SnippetController {
            api,
            store: Store::new(),
            user_id: user_id.into(),
            page_size: DEFAULT_PAGE_SIZE,
            fetch_generation: 0,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn state(&self) -> &SnippetState {
        self.store.state()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Clears the visible list for the current filter and stamps a new fetch.
    /// Any ticket prepared earlier becomes stale.
    pub fn prepare_fetch(&mut self) -> FetchTicket {
        let filter = self.state().filter;
        self.store.dispatch(Action::ClearStateByFilter(filter));
        self.fetch_generation += 1;

        let state = self.state();
        let search = state.search_term.trim();
        FetchTicket {
            generation: self.fetch_generation,
            filter,
            query: SnippetQuery {
                search: (!search.is_empty()).then(|| search.to_string()),
                tags: Some(state.tags_param()),
                page: Some(state.current_page.max(1)),
                limit: Some(self.page_size),
            },
        }
    }

    /// Applies a fetch result. Returns `Ok(false)` when the ticket was superseded
    /// and the result was dropped.
    pub fn apply_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<PageResponse<Snippet>, ApiError>,
    ) -> Result<bool, ControllerError> {
        if ticket.generation != self.fetch_generation {
            debug!(
                stale = ticket.generation,
                current = self.fetch_generation,
                "Dropping superseded fetch result."
            );
            return Ok(false);
        }
        let page = result?;
        self.store.dispatch(Action::UpdateSnippetsData {
            snippets: page.data,
            total_pages: page.total_pages,
            current_page: page.current_page,
        });
        Ok(true)
    }

    pub async fn load_page(&mut self) -> Result<(), ControllerError> {
        let ticket = self.prepare_fetch();
        let result = self.api.list_snippets(ticket.filter, &ticket.query).await;
        self.apply_fetch(&ticket, result)?;
        Ok(())
    }

    /// Refreshes the tag picker from the server.
    pub async fn load_tags(&mut self) -> Result<(), ControllerError> {
        let tags = self.api.list_tags().await?;
        self.store
            .dispatch(Action::SetTags(tags.into_iter().map(|t| t.name).collect()));
        Ok(())
    }

    pub async fn set_filter(&mut self, filter: SnippetFilter) -> Result<(), ControllerError> {
        self.store.dispatch(Action::ClearStateByFilter(filter));
        self.store.dispatch(Action::SetCurrentPage(1));
        self.load_page().await
    }

    pub async fn search(&mut self, term: impl Into<String>) -> Result<(), ControllerError> {
        self.store.dispatch(Action::SetSearchTerm(term.into()));
        self.store.dispatch(Action::SetCurrentPage(1));
        self.load_page().await
    }

    pub async fn select_tags(&mut self, tags: Vec<String>) -> Result<(), ControllerError> {
        self.store.dispatch(Action::SetSelectedTags(tags));
        self.store.dispatch(Action::SetCurrentPage(1));
        self.load_page().await
    }

    pub async fn go_to_page(&mut self, page: u64) -> Result<(), ControllerError> {
        self.store.dispatch(Action::SetCurrentPage(page.max(1)));
        self.load_page().await
    }

    pub fn select(&mut self, snippet: Option<Snippet>) {
        self.store.dispatch(Action::SetSelectedSnippet(snippet));
    }

    /// Creates on the server first; the list only shows confirmed snippets.
    pub async fn create_snippet(&mut self, input: &SnippetInput) -> Result<Snippet, ControllerError> {
        let snippet = self.api.create_snippet(input).await?;
        if self.state().filter == SnippetFilter::All {
            self.store.dispatch(Action::AddSnippet(snippet.clone()));
        }
        info!(snippet_id = snippet.id, "Snippet created.");
        Ok(snippet)
    }

    pub fn start_edit(&mut self, snippet: Snippet) {
        self.store.dispatch(Action::SetEditData(EditData::editing(snippet)));
    }

    pub fn cancel_edit(&mut self) {
        self.store.dispatch(Action::SetEditData(EditData::default()));
    }

    /// Saves the staged snippet, reconciles the server copy and closes the edit form.
    pub async fn save_edit(&mut self, input: &SnippetInput) -> Result<Snippet, ControllerError> {
        let snippet_id = self
            .state()
            .edit_data
            .snippet
            .as_ref()
            .map(|s| s.id)
            .ok_or(ControllerError::NotEditing)?;

        let updated = self.api.update_snippet(snippet_id, input).await?;
        self.store.dispatch(Action::UpdateSnippet(updated.clone()));
        self.store.dispatch(Action::SetEditData(EditData::default()));
        Ok(updated)
    }

    /// Returns the confirmed membership.
    pub async fn toggle_favourite(&mut self, snippet_id: i32) -> Result<bool, ControllerError> {
        let mutation = self.store.begin(Action::ToggleFavourite {
            snippet_id,
            user_id: self.user_id.clone(),
        })?;
        match self.api.toggle_favourite(snippet_id).await {
            Ok(response) => {
                self.store.confirm(mutation, Some(response.data))?;
                Ok(response.is_favourite)
            }
            Err(e) => {
                warn!(snippet_id, error = %e, "Favourite toggle failed, rolling back.");
                self.store.roll_back(mutation)?;
                Err(e.into())
            }
        }
    }

    pub async fn move_to_trash(&mut self, snippet_id: i32) -> Result<(), ControllerError> {
        let mutation = self
            .store
            .begin(Action::ArchiveSnippetOptimistically(snippet_id))?;
        match self.api.archive_snippet(snippet_id).await {
            Ok(snippet) => {
                self.store.confirm(mutation, Some(snippet))?;
                Ok(())
            }
            Err(e) => {
                warn!(snippet_id, error = %e, "Move to trash failed, rolling back.");
                self.store.roll_back(mutation)?;
                Err(e.into())
            }
        }
    }

    /// The trash list drops the snippet only once the server has restored it.
    pub async fn restore_from_trash(&mut self, snippet_id: i32) -> Result<(), ControllerError> {
        self.api.restore_snippet(snippet_id).await?;
        self.store
            .dispatch(Action::RestoreSnippetOptimistically(snippet_id));
        Ok(())
    }

    pub async fn delete_snippet(&mut self, snippet_id: i32) -> Result<(), ControllerError> {
        let mutation = self.store.begin(Action::DeleteSnippet(snippet_id))?;
        match self.api.delete_snippet(snippet_id).await {
            Ok(()) => {
                self.store.confirm(mutation, None)?;
                Ok(())
            }
            Err(e) => {
                warn!(snippet_id, error = %e, "Delete failed, rolling back.");
                self.store.roll_back(mutation)?;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::client::reducer::tests::snippet;
    use crate::db::models::{LanguageCount, TagWithCount};
    use crate::web::models::FavouriteToggleResponse;

    /// In-memory stand-in for the server. `fail` makes every mutation answer 500.
    #[derive(Default)]
    struct FakeApi {
        snippets: Mutex<Vec<Snippet>>,
        queries: Mutex<Vec<(SnippetFilter, SnippetQuery)>>,
        fail: AtomicBool,
    }

    impl FakeApi {
        fn seeded(ids: &[i32]) -> Self {
            FakeApi {
                snippets: Mutex::new(ids.iter().map(|&id| snippet(id, &[])).collect()),
                ..Default::default()
            }
        }

        fn check(&self) -> Result<(), ApiError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::Status {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(())
        }

        fn with_snippet<T>(&self, id: i32, f: impl FnOnce(&mut Snippet) -> T) -> Result<T, ApiError> {
            self.check()?;
            let mut snippets = self.snippets.lock().unwrap();
            let snippet = snippets.iter_mut().find(|s| s.id == id).ok_or(ApiError::Status {
                status: 404,
                message: "Snippet not found".to_string(),
            })?;
            Ok(f(snippet))
        }
    }

    #[async_trait]
    impl SnippetApi for FakeApi {
        async fn list_snippets(
            &self,
            filter: SnippetFilter,
            query: &SnippetQuery,
        ) -> Result<PageResponse<Snippet>, ApiError> {
            self.queries.lock().unwrap().push((filter, query.clone()));
            let items: Vec<Snippet> = self
                .snippets
                .lock()
                .unwrap()
                .iter()
                .filter(|s| match filter {
                    SnippetFilter::All => s.is_active(),
                    SnippetFilter::Favourite => s.is_favourite_of("alice"),
                    SnippetFilter::Trash => s.is_archived,
                })
                .cloned()
                .collect();
            Ok(PageResponse {
                success: true,
                total: items.len() as u64,
                current_page: query.page.unwrap_or(1),
                total_pages: if items.is_empty() { 0 } else { 1 },
                data: items,
            })
        }

        async fn create_snippet(&self, input: &SnippetInput) -> Result<Snippet, ApiError> {
            self.check()?;
            let mut snippets = self.snippets.lock().unwrap();
            let mut created = snippet(snippets.len() as i32 + 100, &[]);
            created.title = input.title.clone();
            snippets.push(created.clone());
            Ok(created)
        }

        async fn update_snippet(&self, snippet_id: i32, input: &SnippetInput) -> Result<Snippet, ApiError> {
            self.with_snippet(snippet_id, |s| {
                s.title = input.title.clone();
                s.clone()
            })
        }

        async fn delete_snippet(&self, snippet_id: i32) -> Result<(), ApiError> {
            self.with_snippet(snippet_id, |_| ())?;
            self.snippets.lock().unwrap().retain(|s| s.id != snippet_id);
            Ok(())
        }

        async fn toggle_favourite(&self, snippet_id: i32) -> Result<FavouriteToggleResponse, ApiError> {
            self.with_snippet(snippet_id, |s| {
                let is_favourite = if s.is_favourite_of("alice") {
                    s.favourite_by.retain(|u| u != "alice");
                    false
                } else {
                    s.favourite_by.push("alice".to_string());
                    true
                };
                FavouriteToggleResponse {
                    success: true,
                    is_favourite,
                    data: s.clone(),
                }
            })
        }

        async fn archive_snippet(&self, snippet_id: i32) -> Result<Snippet, ApiError> {
            self.with_snippet(snippet_id, |s| {
                s.is_archived = true;
                s.clone()
            })
        }

        async fn restore_snippet(&self, snippet_id: i32) -> Result<Snippet, ApiError> {
            self.with_snippet(snippet_id, |s| {
                s.is_archived = false;
                s.clone()
            })
        }

        async fn get_shared_snippet(&self, share_id: &str) -> Result<Snippet, ApiError> {
            self.snippets
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.share_id == share_id)
                .cloned()
                .ok_or(ApiError::MissingData)
        }

        async fn list_tags(&self) -> Result<Vec<TagWithCount>, ApiError> {
            Ok(vec![TagWithCount {
                id: 1,
                name: "rust".to_string(),
                created_by: "owner".to_string(),
                snippet_count: 2,
            }])
        }

        async fn list_languages(&self) -> Result<Vec<LanguageCount>, ApiError> {
            Ok(vec![])
        }
    }

    async fn controller(ids: &[i32]) -> SnippetController<FakeApi> {
        let mut controller = SnippetController::new(FakeApi::seeded(ids), "alice");
        controller.load_page().await.unwrap();
        controller
    }

    fn ids<A: SnippetApi>(controller: &SnippetController<A>) -> Vec<i32> {
        controller.state().snippets.iter().map(|s| s.id).collect()
    }

    fn input(title: &str) -> SnippetInput {
        SnippetInput {
            title: title.to_string(),
            description: "d".to_string(),
            code: "c".to_string(),
            language: "rust".to_string(),
            tags: "x".to_string(),
        }
    }

    #[tokio::test]
    async fn fetch_request_reflects_filter_state() {
        let mut c = controller(&[1, 2]).await;
        assert_eq!(ids(&c), vec![1, 2]);

        c.select_tags(vec!["rust".into(), "cli".into()]).await.unwrap();
        c.search("  sort ").await.unwrap();
        c.go_to_page(3).await.unwrap();

        let (filter, query) = c.api().queries.lock().unwrap().last().cloned().unwrap();
        assert_eq!(filter, SnippetFilter::All);
        assert_eq!(query.search.as_deref(), Some("sort"));
        assert_eq!(query.tags.as_deref(), Some("rust,cli"));
        assert_eq!(query.page, Some(3));
        assert_eq!(query.limit, Some(DEFAULT_PAGE_SIZE));
    }

    #[tokio::test]
    async fn superseded_fetch_is_discarded() {
        let mut c = controller(&[1]).await;

        let stale = c.prepare_fetch();
        let fresh = c.prepare_fetch();
        let page = |ids: &[i32]| PageResponse {
            success: true,
            data: ids.iter().map(|&id| snippet(id, &[])).collect(),
            total: ids.len() as u64,
            current_page: 1,
            total_pages: 1,
        };

        assert!(c.apply_fetch(&fresh, Ok(page(&[7]))).unwrap());
        assert!(!c.apply_fetch(&stale, Ok(page(&[9]))).unwrap());
        assert_eq!(ids(&c), vec![7]);
    }

    #[tokio::test]
    async fn changing_filter_clears_then_loads() {
        let mut c = controller(&[1, 2]).await;
        c.api().snippets.lock().unwrap()[1].is_archived = true;

        c.set_filter(SnippetFilter::Trash).await.unwrap();
        assert_eq!(c.state().filter, SnippetFilter::Trash);
        assert_eq!(ids(&c), vec![2]);
        assert_eq!(c.state().current_page, 1);
    }

    #[tokio::test]
    async fn favourite_toggle_confirms_with_server_copy() {
        let mut c = controller(&[1]).await;
        assert!(c.toggle_favourite(1).await.unwrap());
        assert!(c.state().find(1).unwrap().is_favourite_of("alice"));
        assert!(c.store().pending().next().is_none());

        assert!(!c.toggle_favourite(1).await.unwrap());
        assert!(c.state().find(1).unwrap().favourite_by.is_empty());
    }

    #[tokio::test]
    async fn failed_favourite_toggle_rolls_back() {
        let mut c = controller(&[1]).await;
        c.api().fail.store(true, Ordering::SeqCst);

        let err = c.toggle_favourite(1).await.unwrap_err();
        assert!(matches!(err, ControllerError::Api(ApiError::Status { status: 500, .. })));
        assert!(c.state().find(1).unwrap().favourite_by.is_empty());
        assert_eq!(c.store().pending().count(), 0);
    }

    #[tokio::test]
    async fn failed_move_to_trash_reinserts_entry() {
        let mut c = controller(&[1, 2, 3]).await;
        c.select(c.state().find(2).cloned());
        c.api().fail.store(true, Ordering::SeqCst);

        assert!(c.move_to_trash(2).await.is_err());
        assert_eq!(ids(&c), vec![1, 2, 3]);
        assert!(c.state().is_selected(2));
        assert_eq!(c.store().pending().count(), 0);
    }

    #[tokio::test]
    async fn move_to_trash_and_restore() {
        let mut c = controller(&[1, 2]).await;
        c.move_to_trash(2).await.unwrap();
        assert_eq!(ids(&c), vec![1]);

        c.set_filter(SnippetFilter::Trash).await.unwrap();
        assert_eq!(ids(&c), vec![2]);

        c.restore_from_trash(2).await.unwrap();
        assert!(ids(&c).is_empty());

        c.set_filter(SnippetFilter::All).await.unwrap();
        assert_eq!(ids(&c), vec![1, 2]);
    }

    #[tokio::test]
    async fn failed_restore_keeps_trash_entry() {
        let mut c = controller(&[1]).await;
        c.api().snippets.lock().unwrap()[0].is_archived = true;
        c.set_filter(SnippetFilter::Trash).await.unwrap();
        c.api().fail.store(true, Ordering::SeqCst);

        assert!(c.restore_from_trash(1).await.is_err());
        assert_eq!(ids(&c), vec![1]);
    }

    #[tokio::test]
    async fn delete_rolls_back_on_failure_and_sticks_on_success() {
        let mut c = controller(&[1, 2]).await;
        c.api().fail.store(true, Ordering::SeqCst);
        assert!(c.delete_snippet(1).await.is_err());
        assert_eq!(ids(&c), vec![1, 2]);

        c.api().fail.store(false, Ordering::SeqCst);
        c.delete_snippet(1).await.unwrap();
        assert_eq!(ids(&c), vec![2]);
        assert!(c.store().pending().next().is_none());
    }

    #[tokio::test]
    async fn create_prepends_and_edit_reconciles() {
        let mut c = controller(&[1]).await;
        let created = c.create_snippet(&input("fresh")).await.unwrap();
        assert_eq!(ids(&c)[0], created.id);

        assert!(matches!(c.save_edit(&input("x")).await, Err(ControllerError::NotEditing)));

        c.start_edit(created.clone());
        let saved = c.save_edit(&input("renamed")).await.unwrap();
        assert_eq!(saved.title, "renamed");
        assert_eq!(c.state().find(created.id).unwrap().title, "renamed");
        assert!(!c.state().edit_data.is_edit_mode);
        assert!(c.state().edit_data.snippet.is_none());
    }

    #[tokio::test]
    async fn tags_load_into_picker() {
        let mut c = controller(&[]).await;
        c.load_tags().await.unwrap();
        assert_eq!(c.state().tags, vec!["rust".to_string()]);
    }
}
