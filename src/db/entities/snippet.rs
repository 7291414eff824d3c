use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "snippets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    // Public lookup key, handed out in share links
    #[sea_orm(unique)]
    pub share_id: String,
    pub title: String,
    // Lowercased title for search. Written with every title change.
    pub title_folded: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Text")]
    pub code: String,
    pub language: String,
    pub created_by: String,
    pub is_deleted: bool,
    pub is_archived: bool,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::snippet_tag::Entity")]
    SnippetTag,
    #[sea_orm(has_many = "super::snippet_favourite::Entity")]
    SnippetFavourite,
}

impl Related<super::snippet_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SnippetTag.def()
    }
}

impl Related<super::snippet_favourite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SnippetFavourite.def()
    }
}

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        super::snippet_tag::Relation::Tag.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::snippet_tag::Relation::Snippet.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Shown in the default explore view.
    pub fn is_active(&self) -> bool {
        !self.is_deleted && !self.is_archived
    }
}
