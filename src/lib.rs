pub mod api;
pub mod commands;
pub mod config;
pub mod controller;
pub mod db;
pub mod metrics;
pub mod models;
pub mod server;
pub mod state;

use std::path::Path;

use actix_web::web;
use anyhow::Context;

use crate::config::{BackendKind, Config};
use crate::state::AppState;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::from_env().map_err(anyhow::Error::msg)?;
    config.log_summary();

    let backend = config.backend;
    let db_path = config.db_path.clone();

    let state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            if backend == BackendKind::Local {
                let backups = Path::new(&db_path)
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join("backups");
                log::error!("Database initialization failed: {}", e);
                log::error!("A failed migration or a corrupted file are the usual causes.");
                log::error!("Pre-migration backups are kept in {:?}.", backups);
                log::error!("Restore the newest backup over {} and restart.", db_path);
            }
            return Err(e).context("Failed to initialize the journal backend");
        }
    };

    server::server_task(web::Data::new(state))
        .await
        .context("HTTP server stopped with an error")
}
