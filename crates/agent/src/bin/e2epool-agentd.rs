// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `e2epool-agentd`: the runner-host daemon. Maintains the reconnecting
//! WebSocket channel to the controller and serves the local IPC socket the
//! `e2epool` CLI talks to.

use std::sync::Arc;

use e2epool_agent::{Config, IpcServer, ShellCommandExecutor};
use e2epool_channel::AgentChannelClient;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "e2epool-agentd exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let executor: Arc<dyn e2epool_channel::CommandExecutor> =
        Arc::new(ShellCommandExecutor::new(config.readiness_cmd.clone()));
    let channel = AgentChannelClient::spawn(
        config.controller_ws_url.clone(),
        config.runner_id.clone(),
        config.token.clone(),
        executor,
    );

    let cancel = CancellationToken::new();
    let ipc_cancel = cancel.clone();
    let ipc_server = IpcServer::new(config.socket_path.clone(), channel);
    let ipc_task = tokio::spawn(async move { ipc_server.serve(ipc_cancel).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
        _ = terminate_signal() => {
            tracing::info!("received terminate signal");
        }
    }
    cancel.cancel();

    if let Ok(Err(e)) = ipc_task.await {
        tracing::warn!(error = %e, "ipc server shut down with error");
    }

    Ok(())
}

#[cfg(unix)]
async fn terminate_signal() {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");
    sigterm.recv().await;
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}
