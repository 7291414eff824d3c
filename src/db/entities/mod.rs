//! SeaORM entities for the snippet and tag tables.

pub mod snippet;
pub mod snippet_favourite;
pub mod snippet_tag;
pub mod tag;

pub mod prelude {
    pub use super::snippet::Entity as Snippet;
    pub use super::snippet::Model as SnippetModel;
    pub use super::snippet::ActiveModel as SnippetActiveModel;
    pub use super::snippet::Column as SnippetColumn;

    pub use super::tag::Entity as Tag;
    pub use super::tag::Model as TagModel;
    pub use super::tag::ActiveModel as TagActiveModel;
    pub use super::tag::Column as TagColumn;

    pub use super::snippet_tag::Entity as SnippetTag;
    pub use super::snippet_tag::Model as SnippetTagModel;
    pub use super::snippet_tag::ActiveModel as SnippetTagActiveModel;
    pub use super::snippet_tag::Column as SnippetTagColumn;

    pub use super::snippet_favourite::Entity as SnippetFavourite;
    pub use super::snippet_favourite::Model as SnippetFavouriteModel;
    pub use super::snippet_favourite::ActiveModel as SnippetFavouriteActiveModel;
    pub use super::snippet_favourite::Column as SnippetFavouriteColumn;
}
