//! Client side of the snippet API: the view state, its reducer, the optimistic
//! mutation store and the controller that drives them over HTTP.

pub mod api;
pub mod controller;
pub mod reducer;
pub mod state;
pub mod store;

pub use api::{ApiError, HttpSnippetApi, SnippetApi};
pub use controller::{ControllerError, FetchTicket, SnippetController};
pub use reducer::{reduce, Action};
pub use state::{EditData, SnippetState};
pub use store::{MutationId, MutationKind, MutationStatus, Store, StoreError};
