pub mod db;
pub mod server;
pub mod web;
pub mod client; // Client-side state container and API driver
pub mod version;
