// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `e2epoold`: the stateless controller binary. Wires the Postgres pool, the
//! runner registry, the meshed executor, the checkpoint service, the agent
//! WebSocket endpoint, the internal cross-replica endpoint, the public HTTP
//! API, and the background workers (C8 finalize, C9b poller, C10 GC, C11
//! reconciler) into one process and serves two listeners until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use e2epool_channel::{internal_router, router as channel_router, ChannelState, MeshedExecutor};
use e2epool_controller::{
    http, webhooks, CheckpointService, Config, ControllerChannelHandler,
    ControllerRunnerAuthenticator, FinalizeWorker, GarbageCollector, Poller, Reconciler,
};
use e2epool_store::{connect, PoolConfig, RunnerRegistry};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "e2epoold exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let pool_config = PoolConfig::from_env()?;
    let pool = connect(&pool_config).await?;
    tracing::info!(database_url = %e2epool_store::mask_database_url(&pool_config.database_url), "connected to database");

    let runner_registry = Arc::new(RunnerRegistry::new(pool.clone()));

    let local_connections = e2epool_channel::ConnectionRegistry::new();
    let executor: Arc<dyn e2epool_backends::RunnerExecutor> = Arc::new(MeshedExecutor::new(
        local_connections.clone(),
        config.peer_internal_base_urls.clone(),
    ));

    let checkpoints = Arc::new(CheckpointService::new(
        pool.clone(),
        runner_registry.clone(),
        executor.clone(),
        config.finalize_cooldown_seconds,
    ));

    let channel_handler = Arc::new(ControllerChannelHandler::new(
        checkpoints.clone(),
        runner_registry.clone(),
    ));
    let channel_authenticator =
        Arc::new(ControllerRunnerAuthenticator::new(runner_registry.clone()));
    let channel_state = ChannelState {
        registry: local_connections.clone(),
        handler: channel_handler,
        authenticator: channel_authenticator,
    };

    let public_router = channel_router(channel_state).merge(http::router(http::AppState {
        checkpoints: checkpoints.clone(),
        runner_registry: runner_registry.clone(),
        pool: pool.clone(),
        admin_token: config.admin_token.clone(),
    }));
    let webhook_state = webhooks::WebhookState::new(checkpoints.clone(), &config);
    let public_router = public_router.merge(webhooks::router(webhook_state));

    let internal_router = internal_router(local_connections.clone());

    let cancel = CancellationToken::new();

    let public_listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "public listener bound");
    let internal_listener = tokio::net::TcpListener::bind(&config.internal_bind_addr).await?;
    tracing::info!(addr = %config.internal_bind_addr, "internal listener bound");

    let public_cancel = cancel.clone();
    let public_server = tokio::spawn(async move {
        axum::serve(public_listener, public_router)
            .with_graceful_shutdown(async move { public_cancel.cancelled().await })
            .await
    });

    let internal_cancel = cancel.clone();
    let internal_server = tokio::spawn(async move {
        axum::serve(internal_listener, internal_router)
            .with_graceful_shutdown(async move { internal_cancel.cancelled().await })
            .await
    });

    let finalize_worker = FinalizeWorker::new(
        pool.clone(),
        runner_registry.clone(),
        executor.clone(),
        config.readiness_timeout,
        format!("e2epoold-{}", nanoid::nanoid!(8)),
    );
    let finalize_cancel = cancel.clone();
    let finalize_task = tokio::spawn(async move {
        loop {
            if finalize_cancel.is_cancelled() {
                break;
            }
            match finalize_worker.run_once().await {
                Ok(true) => continue,
                Ok(false) => tokio::time::sleep(Duration::from_secs(2)).await,
                Err(e) => {
                    tracing::error!(error = %e, "finalize worker iteration failed");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });

    let gc = GarbageCollector::new(pool.clone(), runner_registry.clone(), executor.clone(), &config);
    let gc_cancel = cancel.clone();
    let gc_interval = Duration::from_secs(config.gc_interval_seconds);
    let gc_task = tokio::spawn(async move {
        loop_until_cancelled(gc_cancel, gc_interval, || async {
            match gc.run_once().await {
                Ok(reaped) if reaped > 0 => tracing::info!(reaped, "gc reaped stale checkpoints"),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "gc pass failed"),
            }
        })
        .await;
    });

    let reconciler = Reconciler::new(pool.clone(), &config);
    let reconciler_cancel = cancel.clone();
    let reconcile_interval = Duration::from_secs(config.reconcile_interval_seconds);
    let reconciler_task = tokio::spawn(async move {
        loop_until_cancelled(reconciler_cancel, reconcile_interval, || async {
            match reconciler.run_once().await {
                Ok((requeued, released)) if requeued > 0 || released > 0 => {
                    tracing::info!(requeued, released, "reconciler pass completed")
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "reconciler pass failed"),
            }
        })
        .await;
    });

    let poller_task = if config.poller_enabled {
        let poller = Poller::new(pool.clone(), checkpoints.clone(), runner_registry.clone(), &config);
        let poller_cancel = cancel.clone();
        let poller_interval = Duration::from_secs(config.poller_interval_seconds);
        Some(tokio::spawn(async move {
            loop_until_cancelled(poller_cancel, poller_interval, || async {
                match poller.run_once().await {
                    Ok(queued) if queued > 0 => tracing::info!(queued, "poller queued finalizes"),
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "poller pass failed"),
                }
            })
            .await;
        }))
    } else {
        None
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
        _ = terminate_signal() => {
            tracing::info!("received terminate signal");
        }
    }
    cancel.cancel();

    let _ = public_server.await;
    let _ = internal_server.await;
    let _ = finalize_task.await;
    let _ = gc_task.await;
    let _ = reconciler_task.await;
    if let Some(t) = poller_task {
        let _ = t.await;
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

async fn loop_until_cancelled<F, Fut>(cancel: CancellationToken, interval: Duration, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => tick().await,
        }
    }
}
