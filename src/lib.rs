// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Carter Care: workout, nutrition and progress tracking
//!
//! This crate provides the backend API: session management on top of an
//! email/password identity provider, per-user entry storage, progress photo
//! storage, and an admin console gated by effective permission tier.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::{BackendKind, Config};
use db::FirestoreDb;
use services::{
    AdminService, GcpTokenProvider, IdentityProvider, PhotoStore, RecordService, SessionManager,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub identity: IdentityProvider,
    pub sessions: SessionManager,
    pub records: RecordService,
    pub admin: AdminService,
}

impl AppState {
    /// Wire services on top of already-built gateways.
    pub fn new(
        config: Config,
        db: FirestoreDb,
        identity: IdentityProvider,
        photos: PhotoStore,
    ) -> Self {
        Self {
            sessions: SessionManager::new(db.clone(), identity.clone(), &config),
            records: RecordService::new(db.clone(), photos),
            admin: AdminService::new(db.clone(), identity.clone(), &config),
            identity,
            db,
            config,
        }
    }

    /// Build state for the configured backend.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        match config.backend {
            BackendKind::Memory => {
                tracing::warn!("Using in-memory backends; data is lost on restart");
                let db = FirestoreDb::new_in_memory();
                let identity = IdentityProvider::in_memory();
                let photos = PhotoStore::in_memory(&config);
                Ok(Self::new(config, db, identity, photos))
            }
            BackendKind::Gcp => {
                let db = FirestoreDb::new(&config.gcp_project_id).await?;
                let tokens = Arc::new(GcpTokenProvider::from_env().await?);
                let identity = IdentityProvider::toolkit(&config, tokens.clone());
                let photos = PhotoStore::gcs(&config, tokens)?;
                Ok(Self::new(config, db, identity, photos))
            }
        }
    }
}
