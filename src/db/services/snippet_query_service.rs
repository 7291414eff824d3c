use std::collections::HashMap;

use sea_orm::{
    sea_query::{Expr, LikeExpr, Query, SimpleExpr},
    ColumnTrait, Condition, ConnectionTrait, DbConn, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use tracing::debug;

use crate::db::entities::{
    prelude::{Snippet as SnippetEntity, SnippetFavourite, SnippetTag, Tag as TagEntity},
    snippet, snippet_favourite, snippet_tag, tag,
};
use crate::db::models::{
    total_pages, LanguageCount, Snippet, SnippetFilter, SnippetPage, SnippetQuery, Tag, ALL_TAGS,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use crate::db::services::snippet_service::{fold_title, SnippetServiceError};
use crate::db::services::tag_service::parse_tag_names;

/// Loads tags and favourites for a batch of snippet rows, preserving row order.
pub(crate) async fn hydrate<C: ConnectionTrait>(
    db: &C,
    models: Vec<snippet::Model>,
) -> Result<Vec<Snippet>, DbErr> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = models.iter().map(|m| m.id).collect();

    let links = SnippetTag::find()
        .filter(snippet_tag::Column::SnippetId.is_in(ids.clone()))
        .find_also_related(TagEntity)
        .all(db)
        .await?;
    let mut tags_by_snippet: HashMap<i32, Vec<Tag>> = HashMap::new();
    for (link, tag) in links {
        if let Some(tag) = tag {
            tags_by_snippet.entry(link.snippet_id).or_default().push(tag.into());
        }
    }

    let favourites = SnippetFavourite::find()
        .filter(snippet_favourite::Column::SnippetId.is_in(ids))
        .all(db)
        .await?;
    let mut favourites_by_snippet: HashMap<i32, Vec<String>> = HashMap::new();
    for favourite in favourites {
        favourites_by_snippet
            .entry(favourite.snippet_id)
            .or_default()
            .push(favourite.user_id);
    }

    Ok(models
        .into_iter()
        .map(|model| {
            let mut tags = tags_by_snippet.remove(&model.id).unwrap_or_default();
            tags.sort_by(|a, b| a.name.cmp(&b.name));
            let mut favourite_by = favourites_by_snippet.remove(&model.id).unwrap_or_default();
            favourite_by.sort();
            Snippet::from_parts(model, tags, favourite_by)
        })
        .collect())
}

pub(crate) async fn hydrate_one<C: ConnectionTrait>(
    db: &C,
    model: snippet::Model,
) -> Result<Snippet, DbErr> {
    let id = model.id;
    hydrate(db, vec![model])
        .await?
        .pop()
        .ok_or_else(|| DbErr::RecordNotFound(format!("snippet {id} missing after load")))
}

fn visibility_condition(filter: SnippetFilter, user_id: &str) -> Condition {
    let not_deleted = snippet::Column::IsDeleted.eq(false);
    match filter {
        SnippetFilter::All => Condition::all()
            .add(not_deleted)
            .add(snippet::Column::IsArchived.eq(false)),
        SnippetFilter::Favourite => Condition::all().add(not_deleted).add(
            snippet::Column::Id.in_subquery(
                Query::select()
                    .column(snippet_favourite::Column::SnippetId)
                    .from(SnippetFavourite)
                    .and_where(snippet_favourite::Column::UserId.eq(user_id))
                    .to_owned(),
            ),
        ),
        SnippetFilter::Trash => Condition::all()
            .add(not_deleted)
            .add(snippet::Column::IsArchived.eq(true)),
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive substring match on the title, folded the same way on both sides.
fn title_contains(term: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(&fold_title(term)));
    Expr::col((SnippetEntity, snippet::Column::TitleFolded)).like(LikeExpr::new(pattern).escape('\\'))
}

/// `None` when the request carries no tag restriction.
fn requested_tag_names(raw: Option<&str>) -> Option<Vec<String>> {
    let names = parse_tag_names(raw?);
    if names.is_empty() || names.iter().any(|n| n == ALL_TAGS) {
        return None;
    }
    Some(names)
}

pub struct SnippetQueryService;

impl SnippetQueryService {
    /// One page of snippets for `filter`, newest first.
    pub async fn list(
        db: &DbConn,
        filter: SnippetFilter,
        query: &SnippetQuery,
        user_id: &str,
    ) -> Result<SnippetPage, SnippetServiceError> {
        let page = query.page.unwrap_or(1);
        if page == 0 {
            return Err(SnippetServiceError::Validation(
                "page must be 1 or greater".to_string(),
            ));
        }
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(SnippetServiceError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        // The binder hands offsets to the driver as i64.
        let offset = (page - 1)
            .checked_mul(limit)
            .filter(|&offset| i64::try_from(offset).is_ok())
            .ok_or_else(|| SnippetServiceError::Validation("page is out of range".to_string()))?;

        let mut condition = visibility_condition(filter, user_id);

        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            condition = condition.add(title_contains(term));
        }

        if let Some(names) = requested_tag_names(query.tags.as_deref()) {
            let tag_ids: Vec<i32> = TagEntity::find()
                .filter(tag::Column::Name.is_in(names))
                .all(db)
                .await?
                .into_iter()
                .map(|t| t.id)
                .collect();

            if tag_ids.is_empty() {
                debug!(filter = filter.as_str(), "Tag filter matched no tags.");
                return Ok(SnippetPage {
                    items: Vec::new(),
                    total: 0,
                    current_page: page,
                    total_pages: 0,
                });
            }

            // Any of the requested tags qualifies a snippet.
            condition = condition.add(
                snippet::Column::Id.in_subquery(
                    Query::select()
                        .column(snippet_tag::Column::SnippetId)
                        .from(SnippetTag)
                        .and_where(snippet_tag::Column::TagId.is_in(tag_ids))
                        .to_owned(),
                ),
            );
        }

        let total = SnippetEntity::find()
            .filter(condition.clone())
            .count(db)
            .await?;

        let models = SnippetEntity::find()
            .filter(condition)
            .order_by_desc(snippet::Column::CreatedAt)
            .order_by_desc(snippet::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?;
        let items = hydrate(db, models).await?;

        debug!(
            filter = filter.as_str(),
            page,
            total,
            returned = items.len(),
            "Listed snippets."
        );
        Ok(SnippetPage {
            items,
            total,
            current_page: page,
            total_pages: total_pages(total, limit),
        })
    }

    pub async fn get_by_share_id(db: &DbConn, share_id: &str) -> Result<Snippet, SnippetServiceError> {
        let model = SnippetEntity::find()
            .filter(snippet::Column::ShareId.eq(share_id))
            .one(db)
            .await?
            .ok_or_else(|| SnippetServiceError::ShareIdNotFound(share_id.to_owned()))?;
        Ok(hydrate_one(db, model).await?)
    }

    /// Distinct languages with how many snippets use each, most used first.
    pub async fn list_languages(db: &DbConn) -> Result<Vec<LanguageCount>, SnippetServiceError> {
        let mut languages = SnippetEntity::find()
            .select_only()
            .column_as(snippet::Column::Language, "name")
            .column_as(Expr::col((SnippetEntity, snippet::Column::Id)).count(), "count")
            .filter(snippet::Column::IsDeleted.eq(false))
            .group_by(snippet::Column::Language)
            .into_model::<LanguageCount>()
            .all(db)
            .await?;

        languages.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        Ok(languages)
    }
}
