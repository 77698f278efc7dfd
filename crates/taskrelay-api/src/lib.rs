//! Taskrelay API Library
//!
//! This crate provides the HTTP boundary (`POST /task`, health probes, OpenAPI docs)
//! and the application setup that wires publisher, consumer and listener together.

mod api_doc;
mod handlers;

pub mod error;
pub mod setup;
pub mod state;

pub use error::{HttpAppError, ValidatedJson};
pub use setup::{build_app, initialize_app, App};
pub use state::AppState;
