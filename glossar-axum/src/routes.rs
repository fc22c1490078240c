use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::State,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use glossar::{AccountRepository, Glossar, PasswordEncoder};

use crate::{
    error::{AppError, Result},
    types::{HealthResponse, LoginRequest},
};

pub struct AppState<R: AccountRepository, E: PasswordEncoder> {
    pub glossar: Arc<Glossar<R, E>>,
}

impl<R: AccountRepository, E: PasswordEncoder> Clone for AppState<R, E> {
    fn clone(&self) -> Self {
        Self {
            glossar: Arc::clone(&self.glossar),
        }
    }
}

pub fn create_router<R, E>(glossar: Arc<Glossar<R, E>>) -> Router
where
    R: AccountRepository,
    E: PasswordEncoder,
{
    let state = AppState { glossar };

    Router::new()
        .route("/login", post(login_handler::<R, E>))
        .route("/health", get(health_handler::<R, E>))
        .with_state(state)
}

async fn login_handler<R, E>(
    State(state): State<AppState<R, E>>,
    Form(request): Form<LoginRequest>,
) -> Result<Redirect>
where
    R: AccountRepository,
    E: PasswordEncoder,
{
    let redirect = state
        .glossar
        .login(&request.username, &request.password)
        .await?;

    tracing::debug!(update = ?redirect.update, location = %redirect.location, "Login handled");
    Ok(Redirect::to(&redirect.location))
}

async fn health_handler<R, E>(State(state): State<AppState<R, E>>) -> Result<impl IntoResponse>
where
    R: AccountRepository,
    E: PasswordEncoder,
{
    state
        .glossar
        .health_check()
        .await
        .map_err(|e| AppError::Unavailable(e.to_string()))?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
