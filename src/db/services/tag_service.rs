use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbConn, DbErr, EntityTrait, JoinType,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, SqlErr,
};
use tracing::{debug, info};

use crate::db::entities::{
    prelude::{SnippetTag, Tag},
    snippet_tag, tag,
};
use crate::db::models::TagWithCount;

#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Tag not found: {0}")]
    NotFound(i32),
    #[error("Tag name is required")]
    EmptyName,
    #[error("A tag named '{0}' already exists")]
    DuplicateName(String),
    #[error("Tag '{0}' is used by {1} snippet(s) and cannot be deleted")]
    InUse(String, u64),
}

/// Tag names are compared and stored trimmed and lowercased.
pub fn normalize_tag_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Splits a comma-separated tag list into normalized, non-empty, distinct names,
/// keeping first-seen order.
pub fn parse_tag_names(csv: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in csv.split(',').map(normalize_tag_name) {
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn duplicate_or_db_err(err: DbErr, name: &str) -> TagServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => TagServiceError::DuplicateName(name.to_owned()),
        _ => TagServiceError::DbErr(err),
    }
}

pub struct TagService;

impl TagService {
    /// Every tag, ordered by name, with the number of snippets that reference it.
    pub async fn list_with_counts(db: &DbConn) -> Result<Vec<TagWithCount>, TagServiceError> {
        let tags = Tag::find()
            .select_only()
            .column(tag::Column::Id)
            .column(tag::Column::Name)
            .column(tag::Column::CreatedBy)
            .column_as(
                Expr::col((SnippetTag, snippet_tag::Column::SnippetId)).count(),
                "snippet_count",
            )
            .join(JoinType::LeftJoin, tag::Relation::SnippetTag.def())
            .group_by(tag::Column::Id)
            .group_by(tag::Column::Name)
            .group_by(tag::Column::CreatedBy)
            .order_by_asc(tag::Column::Name)
            .into_model::<TagWithCount>()
            .all(db)
            .await?;
        Ok(tags)
    }

    pub async fn get(db: &DbConn, tag_id: i32) -> Result<tag::Model, TagServiceError> {
        Tag::find_by_id(tag_id)
            .one(db)
            .await?
            .ok_or(TagServiceError::NotFound(tag_id))
    }

    pub async fn create(db: &DbConn, user_id: &str, name: &str) -> Result<tag::Model, TagServiceError> {
        let name = normalize_tag_name(name);
        if name.is_empty() {
            return Err(TagServiceError::EmptyName);
        }

        if Tag::find()
            .filter(tag::Column::Name.eq(name.as_str()))
            .one(db)
            .await?
            .is_some()
        {
            return Err(TagServiceError::DuplicateName(name));
        }

        let new_tag = tag::ActiveModel {
            name: Set(name.clone()),
            created_by: Set(user_id.to_owned()),
            ..Default::default()
        };
        // A concurrent insert of the same name lands on the unique index.
        let tag = new_tag
            .insert(db)
            .await
            .map_err(|e| duplicate_or_db_err(e, &name))?;

        info!(tag_id = tag.id, name = %tag.name, "Tag created.");
        Ok(tag)
    }

    pub async fn update(db: &DbConn, tag_id: i32, name: &str) -> Result<tag::Model, TagServiceError> {
        let name = normalize_tag_name(name);
        if name.is_empty() {
            return Err(TagServiceError::EmptyName);
        }

        let existing = Self::get(db, tag_id).await?;

        if Tag::find()
            .filter(tag::Column::Name.eq(name.as_str()))
            .filter(tag::Column::Id.ne(tag_id))
            .one(db)
            .await?
            .is_some()
        {
            return Err(TagServiceError::DuplicateName(name));
        }

        let mut active_tag: tag::ActiveModel = existing.into();
        active_tag.name = Set(name.clone());
        let tag = active_tag
            .update(db)
            .await
            .map_err(|e| duplicate_or_db_err(e, &name))?;

        info!(tag_id = tag.id, name = %tag.name, "Tag renamed.");
        Ok(tag)
    }

    pub async fn delete(db: &DbConn, tag_id: i32) -> Result<(), TagServiceError> {
        let existing = Self::get(db, tag_id).await?;

        let usage = SnippetTag::find()
            .filter(snippet_tag::Column::TagId.eq(tag_id))
            .count(db)
            .await?;
        if usage > 0 {
            return Err(TagServiceError::InUse(existing.name, usage));
        }

        existing.delete(db).await?;
        info!(tag_id, "Tag deleted.");
        Ok(())
    }

    /// Find-or-create by name in one atomic step: the insert is a no-op when the
    /// name already exists, so concurrent callers converge on the same row.
    /// `name` must already be normalized.
    pub async fn upsert_by_name<C: ConnectionTrait>(
        db: &C,
        user_id: &str,
        name: &str,
    ) -> Result<tag::Model, DbErr> {
        let candidate = tag::ActiveModel {
            name: Set(name.to_owned()),
            created_by: Set(user_id.to_owned()),
            ..Default::default()
        };

        let inserted = Tag::insert(candidate)
            .on_conflict(OnConflict::column(tag::Column::Name).do_nothing().to_owned())
            .exec_without_returning(db)
            .await?;
        debug!(name, inserted, "Tag upsert.");

        Tag::find()
            .filter(tag::Column::Name.eq(name))
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("tag '{name}' missing after upsert")))
    }
}
