pub mod language_routes;
pub mod snippet_routes;
pub mod tag_routes;
