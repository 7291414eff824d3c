//! Wire-level shapes shared by the HTTP layer and the client store.

use chrono::{DateTime, Utc};
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};

use crate::db::entities::{snippet, tag};

/// Page size used when the caller does not pass `limit`.
pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Tag-filter value that means "no tag restriction".
pub const ALL_TAGS: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i32,
    pub name: String,
    pub created_by: String,
}

impl From<tag::Model> for Tag {
    fn from(model: tag::Model) -> Self {
        Tag {
            id: model.id,
            name: model.name,
            created_by: model.created_by,
        }
    }
}

/// A tag together with the number of snippets referencing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct TagWithCount {
    pub id: i32,
    pub name: String,
    pub created_by: String,
    pub snippet_count: i64,
}

/// A snippet with its tags resolved and its favourite set loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub id: i32,
    pub share_id: String,
    pub title: String,
    pub description: String,
    pub code: String,
    pub language: String,
    pub tags: Vec<Tag>,
    pub created_by: String,
    pub favourite_by: Vec<String>,
    pub is_deleted: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Snippet {
    pub(crate) fn from_parts(model: snippet::Model, tags: Vec<Tag>, favourite_by: Vec<String>) -> Self {
        Snippet {
            id: model.id,
            share_id: model.share_id,
            title: model.title,
            description: model.description,
            code: model.code,
            language: model.language,
            tags,
            created_by: model.created_by,
            favourite_by,
            is_deleted: model.is_deleted,
            is_archived: model.is_archived,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub fn is_favourite_of(&self, user_id: &str) -> bool {
        self.favourite_by.iter().any(|id| id == user_id)
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted && !self.is_archived
    }
}

/// Body of snippet create and update requests. `tags` is a comma-separated list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetInput {
    pub title: String,
    pub description: String,
    pub code: String,
    pub language: String,
    pub tags: String,
}

/// Which slice of the snippet table a list request reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetFilter {
    /// Neither deleted nor archived.
    #[default]
    All,
    /// Bookmarked by the caller, archived or not.
    Favourite,
    /// Archived and not deleted.
    Trash,
}

impl SnippetFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnippetFilter::All => "all",
            SnippetFilter::Favourite => "favourite",
            SnippetFilter::Trash => "trash",
        }
    }

    /// Path of the list endpoint serving this filter.
    pub fn api_path(&self) -> &'static str {
        match self {
            SnippetFilter::All => "/api/snippets",
            SnippetFilter::Favourite => "/api/snippets/favourite",
            SnippetFilter::Trash => "/api/snippets/trash",
        }
    }
}

/// Query string of the snippet list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetPage {
    pub items: Vec<Snippet>,
    pub total: u64,
    pub current_page: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromQueryResult)]
pub struct LanguageCount {
    pub name: String,
    pub count: i64,
}

/// `ceil(total / page_size)`; no rows means no pages.
pub fn total_pages(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}
