//! # Glossar Axum Integration
//!
//! Axum routes for the glossary login form. A `POST /login` is checked
//! against the account store, recorded by the login outcome handlers and
//! answered with a `303 See Other` to the configured success or failure
//! page. `GET /health` reports whether the account store is reachable.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use axum::Router;
//! use glossar::{AccountSecurityConfig, GlossarBuilder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let glossar = GlossarBuilder::new()
//!         .with_sqlite("sqlite://glossar.db?mode=rwc")
//!         .await
//!         .unwrap()
//!         .with_config(AccountSecurityConfig::default().with_max_failed_login_attempts(3))
//!         .apply_migrations(true)
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let app = Router::new().merge(glossar_axum::routes(Arc::new(glossar)));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

mod error;
mod routes;
mod types;

pub use error::{AppError, Result};
pub use routes::{AppState, create_router};
pub use types::{HealthResponse, LoginRequest};

use axum::Router;
use glossar::{AccountRepository, Glossar, PasswordEncoder};
use std::sync::Arc;

/// Create the login routes for your Axum application.
///
/// # Arguments
///
/// * `glossar` - The Glossar instance that checks and records logins
///
/// # Returns
///
/// A router with `POST /login` and `GET /health`, ready to be merged or nested
pub fn routes<R, E>(glossar: Arc<Glossar<R, E>>) -> Router
where
    R: AccountRepository,
    E: PasswordEncoder,
{
    create_router(glossar)
}
