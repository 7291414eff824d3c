use chrono::Utc;
use rand::Rng;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbConn, DbErr,
    EntityTrait, ModelTrait, QueryFilter, Set, TransactionTrait,
};
use tracing::{debug, info, warn};

use crate::db::entities::{
    prelude::{Snippet as SnippetEntity, SnippetFavourite, SnippetTag},
    snippet, snippet_favourite, snippet_tag,
};
use crate::db::models::{Snippet, SnippetInput};
use crate::db::services::snippet_query_service::hydrate_one;
use crate::db::services::tag_service::{parse_tag_names, TagService};

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const CODE_MAX_CHARS: usize = 2000;

pub const SHARE_ID_LEN: usize = 10;
const SHARE_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";
const SHARE_ID_ATTEMPTS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum SnippetServiceError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Snippet not found: {0}")]
    NotFound(i32),
    #[error("No snippet is shared under '{0}'")]
    ShareIdNotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("Could not allocate a unique share id after {0} attempts")]
    ShareIdExhausted(usize),
}

/// Create/update fields after validation and normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSnippet {
    pub title: String,
    pub description: String,
    pub code: String,
    pub language: String,
    pub tag_names: Vec<String>,
}

fn required_text(field: &str, value: &str, max_chars: usize) -> Result<(), SnippetServiceError> {
    if value.trim().is_empty() {
        return Err(SnippetServiceError::Validation(format!("{field} is required")));
    }
    if value.chars().count() > max_chars {
        return Err(SnippetServiceError::Validation(format!(
            "{field} is too long (max {max_chars} characters)"
        )));
    }
    Ok(())
}

impl ValidatedSnippet {
    pub fn parse(input: &SnippetInput) -> Result<Self, SnippetServiceError> {
        let title = input.title.trim();
        required_text("Title", title, TITLE_MAX_CHARS)?;
        required_text("Description", &input.description, DESCRIPTION_MAX_CHARS)?;
        required_text("Code snippet", &input.code, CODE_MAX_CHARS)?;

        let language = input.language.trim().to_lowercase();
        if language.is_empty() {
            return Err(SnippetServiceError::Validation("Language is required".to_string()));
        }

        let tag_names = parse_tag_names(&input.tags);
        if tag_names.is_empty() {
            return Err(SnippetServiceError::Validation(
                "At least one tag is required".to_string(),
            ));
        }

        Ok(ValidatedSnippet {
            title: title.to_owned(),
            description: input.description.clone(),
            code: input.code.clone(),
            language,
            tag_names,
        })
    }
}

/// Case fold used for title search. SQL `lower()` only folds ASCII on SQLite,
/// so the folded title is computed here and stored beside the title.
pub(crate) fn fold_title(title: &str) -> String {
    title.to_lowercase()
}

fn random_share_id() -> String {
    let mut rng = rand::rng();
    (0..SHARE_ID_LEN)
        .map(|_| SHARE_ID_ALPHABET[rng.random_range(0..SHARE_ID_ALPHABET.len())] as char)
        .collect()
}

/// Draws share ids until one is unused. The unique column still guards the insert.
async fn allocate_share_id<C: ConnectionTrait>(db: &C) -> Result<String, SnippetServiceError> {
    for attempt in 1..=SHARE_ID_ATTEMPTS {
        let candidate = random_share_id();
        let taken = SnippetEntity::find()
            .filter(snippet::Column::ShareId.eq(candidate.as_str()))
            .one(db)
            .await?
            .is_some();
        if !taken {
            return Ok(candidate);
        }
        warn!(attempt, "Share id collision, drawing again.");
    }
    Err(SnippetServiceError::ShareIdExhausted(SHARE_ID_ATTEMPTS))
}

async fn resolve_tag_ids<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    names: &[String],
) -> Result<Vec<i32>, DbErr> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        ids.push(TagService::upsert_by_name(db, user_id, name).await?.id);
    }
    Ok(ids)
}

async fn link_tags<C: ConnectionTrait>(db: &C, snippet_id: i32, tag_ids: &[i32]) -> Result<(), DbErr> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    let links = tag_ids.iter().map(|&tag_id| snippet_tag::ActiveModel {
        snippet_id: Set(snippet_id),
        tag_id: Set(tag_id),
    });
    SnippetTag::insert_many(links).exec_without_returning(db).await?;
    Ok(())
}

async fn find_snippet<C: ConnectionTrait>(db: &C, snippet_id: i32) -> Result<snippet::Model, SnippetServiceError> {
    SnippetEntity::find_by_id(snippet_id)
        .one(db)
        .await?
        .ok_or(SnippetServiceError::NotFound(snippet_id))
}

pub struct SnippetService;

impl SnippetService {
    pub async fn create(db: &DbConn, user_id: &str, input: &SnippetInput) -> Result<Snippet, SnippetServiceError> {
        let fields = ValidatedSnippet::parse(input)?;

        let txn = db.begin().await?;
        let tag_ids = resolve_tag_ids(&txn, user_id, &fields.tag_names).await?;
        let share_id = allocate_share_id(&txn).await?;
        let now = Utc::now();

        let new_snippet = snippet::ActiveModel {
            share_id: Set(share_id),
            title_folded: Set(fold_title(&fields.title)),
            title: Set(fields.title),
            description: Set(fields.description),
            code: Set(fields.code),
            language: Set(fields.language),
            created_by: Set(user_id.to_owned()),
            is_deleted: Set(false),
            is_archived: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = new_snippet.insert(&txn).await?;
        link_tags(&txn, model.id, &tag_ids).await?;
        let snippet = hydrate_one(&txn, model).await?;
        txn.commit().await?;

        info!(
            snippet_id = snippet.id,
            share_id = %snippet.share_id,
            user_id,
            tags = snippet.tags.len(),
            "Snippet created."
        );
        Ok(snippet)
    }

    /// Replaces the editable fields and the whole tag set.
    pub async fn update(
        db: &DbConn,
        snippet_id: i32,
        user_id: &str,
        input: &SnippetInput,
    ) -> Result<Snippet, SnippetServiceError> {
        let fields = ValidatedSnippet::parse(input)?;

        let txn = db.begin().await?;
        let existing = find_snippet(&txn, snippet_id).await?;
        let tag_ids = resolve_tag_ids(&txn, user_id, &fields.tag_names).await?;

        let mut active_snippet: snippet::ActiveModel = existing.into();
        active_snippet.title_folded = Set(fold_title(&fields.title));
        active_snippet.title = Set(fields.title);
        active_snippet.description = Set(fields.description);
        active_snippet.code = Set(fields.code);
        active_snippet.language = Set(fields.language);
        active_snippet.updated_at = Set(Utc::now());
        let model = active_snippet.update(&txn).await?;

        SnippetTag::delete_many()
            .filter(snippet_tag::Column::SnippetId.eq(snippet_id))
            .exec(&txn)
            .await?;
        link_tags(&txn, snippet_id, &tag_ids).await?;

        let snippet = hydrate_one(&txn, model).await?;
        txn.commit().await?;

        info!(snippet_id, user_id, "Snippet updated.");
        Ok(snippet)
    }

    /// Permanent removal, including tag links and favourites.
    pub async fn delete(db: &DbConn, snippet_id: i32) -> Result<(), SnippetServiceError> {
        let txn = db.begin().await?;
        let existing = find_snippet(&txn, snippet_id).await?;

        SnippetTag::delete_many()
            .filter(snippet_tag::Column::SnippetId.eq(snippet_id))
            .exec(&txn)
            .await?;
        SnippetFavourite::delete_many()
            .filter(snippet_favourite::Column::SnippetId.eq(snippet_id))
            .exec(&txn)
            .await?;
        existing.delete(&txn).await?;
        txn.commit().await?;

        info!(snippet_id, "Snippet deleted.");
        Ok(())
    }

    /// Moves a snippet to the trash.
    pub async fn archive(db: &DbConn, snippet_id: i32) -> Result<Snippet, SnippetServiceError> {
        Self::set_archived(db, snippet_id, true).await
    }

    /// Takes a snippet back out of the trash.
    pub async fn restore(db: &DbConn, snippet_id: i32) -> Result<Snippet, SnippetServiceError> {
        Self::set_archived(db, snippet_id, false).await
    }

    async fn set_archived(db: &DbConn, snippet_id: i32, archived: bool) -> Result<Snippet, SnippetServiceError> {
        let existing = find_snippet(db, snippet_id).await?;

        let mut active_snippet: snippet::ActiveModel = existing.into();
        active_snippet.is_archived = Set(archived);
        active_snippet.updated_at = Set(Utc::now());
        let model = active_snippet.update(db).await?;

        info!(snippet_id, archived, "Snippet archive flag changed.");
        Ok(hydrate_one(db, model).await?)
    }

    /// Adds `user_id` to the favourites of the snippet, or removes it if present.
    /// Returns the new membership and the updated snippet.
    pub async fn toggle_favourite(
        db: &DbConn,
        snippet_id: i32,
        user_id: &str,
    ) -> Result<(bool, Snippet), SnippetServiceError> {
        let txn = db.begin().await?;
        let model = find_snippet(&txn, snippet_id).await?;

        let existing = SnippetFavourite::find_by_id((snippet_id, user_id.to_owned()))
            .one(&txn)
            .await?;
        let is_favourite = match existing {
            Some(favourite) => {
                favourite.delete(&txn).await?;
                false
            }
            None => {
                let favourite = snippet_favourite::ActiveModel {
                    snippet_id: Set(snippet_id),
                    user_id: Set(user_id.to_owned()),
                };
                SnippetFavourite::insert(favourite)
                    .on_conflict(
                        OnConflict::columns([
                            snippet_favourite::Column::SnippetId,
                            snippet_favourite::Column::UserId,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(&txn)
                    .await?;
                true
            }
        };

        let snippet = hydrate_one(&txn, model).await?;
        txn.commit().await?;

        debug!(snippet_id, user_id, is_favourite, "Favourite toggled.");
        Ok((is_favourite, snippet))
    }
}
