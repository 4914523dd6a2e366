//! # reliefnet-server
//!
//! HTTP server for the ReliefNet disaster-response coordination backend:
//! record CRUD over the storage layer, geocoding / content analysis /
//! update aggregation over the provider chains, and a realtime WebSocket
//! event feed.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod realtime;
pub mod server;
pub mod state;

pub use config::AppConfig;
pub use error::ApiError;
pub use server::{ReliefnetServer, ServerBuilder, build_app};
pub use state::{AppState, build_state};
