//! HTTP surface for the Vitrine storefront backend.
//!
//! Routes, per-scope rate limiting, the credential-guarded order and
//! profile endpoints, and the server builder live here; the catalog
//! logic itself is in `vitrine-catalog`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod state;

pub use config::{load_config, AppConfig, ConfigError};
pub use server::{build_app, ServerBuilder, VitrineServer};
pub use state::AppState;
