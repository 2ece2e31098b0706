// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Account API: user registration, sessions and profile management.
//!
//! Sessions use short-lived access tokens and single-use, rotating refresh
//! tokens stored per user. Profile images are pushed to an external media
//! host.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod uploads;

use config::Config;
use db::FirestoreDb;
use services::{AccountService, MediaService, SessionManager, TokenService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub tokens: TokenService,
    pub sessions: SessionManager,
    pub accounts: AccountService,
}

impl AppState {
    /// Wire the services together from their leaf dependencies.
    pub fn new(config: Config, db: FirestoreDb, media: MediaService) -> Self {
        let tokens = TokenService::from_config(&config);
        let sessions = SessionManager::new(db.clone(), tokens.clone());
        let accounts = AccountService::new(db.clone(), media);
        Self {
            config,
            db,
            tokens,
            sessions,
            accounts,
        }
    }
}
