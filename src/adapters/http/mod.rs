//! HTTP adapter. axum router exposing the dispatch pipeline.

pub mod routes;

pub use routes::{AppState, router};
