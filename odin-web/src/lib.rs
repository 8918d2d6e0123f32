//! Odin Web - JSON/HTML API server
//!
//! Exposes torrent downloads, range streaming, subtitle conversion and
//! uploads, and the `<video>` player markup over HTTP.

pub mod errors;
pub mod handlers;
pub mod server;
pub mod templates;

pub use errors::{ApiError, ServerError};
pub use server::{AppState, router, run_server};
