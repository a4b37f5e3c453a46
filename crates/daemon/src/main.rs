// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! letod: the leto tracking daemon.

use std::io::Write;
use std::sync::Arc;

use fs2::FileExt;
use leto_daemon::advertise::Advertiser;
use leto_daemon::listener;
use leto_daemon::orchestrator::{Config, Orchestrator};
use leto_daemon::resolver::AvahiResolver;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Unhandled error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    // Log to stderr and to a rotating daemon log under the data dir
    let log_dir = config.data_dir.join("fort").join("leto");
    std::fs::create_dir_all(&log_dir)?;
    let appender = tracing_appender::rolling::daily(&log_dir, "letod.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr.and(file_writer))
        .init();

    // One daemon per node
    let lock_path = log_dir.join("letod.pid");
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| format!("could not lock {}: daemon already running?", lock_path.display()))?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    let resolver = Arc::new(AvahiResolver::new());
    let orchestrator = Arc::new(Orchestrator::new(config.clone(), resolver).await?);

    let advertiser = Advertiser::start(&config.hostname, config.rpc_port);

    // A crash during a previous run left a marker to restore from
    orchestrator.restore().await;

    let rpc = TcpListener::bind(("0.0.0.0", config.rpc_port)).await?;
    info!(
        version = leto_daemon::env::LETO_VERSION,
        port = config.rpc_port,
        node = %config.hostname,
        "listening for rpc"
    );

    let shutdown = CancellationToken::new();
    let serve = tokio::spawn(listener::run(rpc, Arc::clone(&orchestrator), shutdown.clone()));

    wait_for_signal().await;
    info!("shutting down");
    shutdown.cancel();
    let _ = serve.await;

    // A clean daemon shutdown also ends the experiment cleanly
    match orchestrator.stop().await {
        Ok(()) => info!("experiment stopped"),
        Err(leto_daemon::orchestrator::ExperimentError::NotRunning) => {}
        Err(err) => warn!(error = %err, "could not stop the running experiment"),
    }

    advertiser.stop().await;
    let _ = std::fs::remove_file(&lock_path);
    Ok(())
}

async fn wait_for_signal() {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(sigterm) => sigterm,
        Err(err) => {
            warn!(error = %err, "could not install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
