//! Data access for snippets and tags. Handlers and tests go through these services
//! rather than touching entities directly.
//!
//! Each service exposes its own error enum; the web layer maps them onto HTTP statuses.

pub mod snippet_query_service;
pub mod snippet_service;
pub mod tag_service;

pub use snippet_query_service::SnippetQueryService;
pub use snippet_service::*;
pub use tag_service::*;
