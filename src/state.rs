// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    config::Config,
    error::DraftError,
    services::{
        ai_drafts::AiClient,
        session_manager::{SessionManager, SessionSettings},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub sessions: SessionManager,
    pub ai: AiClient,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Result<Self, DraftError> {
        let sessions = SessionManager::new(
            Arc::new(pool.clone()),
            SessionSettings::from_config(&config),
        );
        let ai = AiClient::from_config(&config)?;

        Ok(Self {
            pool,
            config,
            sessions,
            ai,
        })
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for AiClient {
    fn from_ref(state: &AppState) -> Self {
        state.ai.clone()
    }
}
