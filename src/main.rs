// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{process::ExitCode, sync::Arc, time::Duration};

use axum_server::Handle;
use taskdesk_server::{
    api::router,
    config::Config,
    logging::init_tracing,
    state::AppState,
    storage::PgStore,
};

/// In-flight requests get this long to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server exited with error");
            eprintln!("taskdesk-server: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    init_tracing(config.log_format)?;

    tracing::info!(
        environment = ?config.environment,
        schemes = ?config.auth.accepted,
        "Starting TaskDesk server"
    );

    let store = PgStore::connect(&config.database_url).await?;
    if config.run_migrations {
        store.migrate().await?;
    }

    let verifier = config.auth.build_verifier()?;
    let state = AppState::new(Arc::new(store), verifier);
    let app = router(state);

    let addr = config.bind_addr()?;
    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, draining connections");
        shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });

    tracing::info!(%addr, "Listening");
    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
