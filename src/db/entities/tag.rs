use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tags")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    // Stored lowercased; the unique index backs the atomic upsert
    #[sea_orm(unique)]
    pub name: String,
    pub created_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::snippet_tag::Entity")]
    SnippetTag,
}

impl Related<super::snippet_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SnippetTag.def()
    }
}

impl Related<super::snippet::Entity> for Entity {
    fn to() -> RelationDef {
        super::snippet_tag::Relation::Snippet.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::snippet_tag::Relation::Tag.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
