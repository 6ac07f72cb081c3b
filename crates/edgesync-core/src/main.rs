// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! edgesync Core - diagnostic delta runner
//!
//! Computes the inventory delta an edge would receive, impersonating it as an
//! infra admin. The reported inventory is read from `--payload` or stdin and
//! the response is printed as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

use edgesync_core::config::Config;
use edgesync_core::engine::InventoryDeltaEngine;
use edgesync_core::handlers::{DeltaHandlerState, ErrorResponse, handle_inventory_delta};
use edgesync_core::identity::{CallerIdentity, EDGE_ID_PARAM};
use edgesync_core::persistence::SqlitePersistence;

/// Compute the inventory delta for one edge.
#[derive(Parser, Debug)]
#[command(name = "edgesync-core", version, about, long_about = None)]
struct Cli {
    /// Tenant of the edge
    #[arg(long, env = "EDGESYNC_TENANT")]
    tenant: String,

    /// Edge (service domain) to impersonate
    #[arg(long)]
    edge: String,

    /// File with the reported inventory JSON (stdin if omitted)
    #[arg(long)]
    payload: Option<PathBuf>,

    /// Print compact JSON
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing (stderr, so stdout stays valid JSON)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("edgesync_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        max_db_connections = config.max_db_connections,
        send_categories_delta = config.send_categories_delta,
        "Configuration loaded"
    );

    let store = Arc::new(
        SqlitePersistence::connect(&config.database_url, config.max_db_connections).await?,
    );
    let engine = InventoryDeltaEngine::new(store.clone(), store, config.delta_options());
    let state = DeltaHandlerState::new(Arc::new(engine));

    let body = match &cli.payload {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read payload {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read payload from stdin")?;
            buf
        }
    };

    let caller = CallerIdentity::infra_admin(cli.tenant.as_str());
    let params = vec![(EDGE_ID_PARAM.to_string(), cli.edge.clone())];

    match handle_inventory_delta(&state, &caller, &params, &body).await {
        Ok(response) => {
            let json = if cli.compact {
                serde_json::to_string(&response)?
            } else {
                serde_json::to_string_pretty(&response)?
            };
            println!("{}", json);
            Ok(())
        }
        Err(e) => {
            let body = ErrorResponse::from(&e);
            eprintln!("{}", serde_json::to_string_pretty(&body)?);
            Err(e.into())
        }
    }
}
