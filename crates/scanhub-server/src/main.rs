// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Scanhub server binary
//!
//! Loads the YAML configuration, wires sensors → tick → detection →
//! publishers + live WebSocket, serves the control plane, and shuts the
//! tick down before the drivers on exit.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use scanhub_api::{build_router, ControlAdapter, WsHub};
use scanhub_config::load_app_config;
use scanhub_core::{
    tick::DEFAULT_TICK_HZ, DbscanHandle, DetectionPipeline, FilterManager, SlotManager,
    TickRunner,
};
use scanhub_io::PublisherManager;
use scanhub_sensors::DriverRegistry;
use scanhub_types::{Cluster, ScanFrame};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scanhub-server", about = "Multi-sensor laser-scan detection hub")]
struct Args {
    /// Initial configuration file
    #[arg(long, default_value = "./config/default.yaml")]
    config: PathBuf,

    /// Override the HTTP/WS listen address (host:port)
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_app_config(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;

    let slots = Arc::new(SlotManager::new(DriverRegistry::with_builtin()));
    let pipeline = Arc::new(DetectionPipeline::new(
        Arc::new(FilterManager::new(
            config.prefilter.clone(),
            config.postfilter.clone(),
        )),
        Arc::new(DbscanHandle::new(config.dbscan.clone())),
        config.world_mask.clone(),
        Arc::new(PublisherManager::new()),
    ));

    // Live streams into the WebSocket hub.
    let hub = WsHub::new();
    let raw_hub = hub.clone();
    pipeline.set_raw_tap(Arc::new(move |frame: &ScanFrame| {
        raw_hub.push_raw_lite(frame);
    }));
    let filtered_hub = hub.clone();
    pipeline.set_filtered_tap(Arc::new(move |frame: &ScanFrame| {
        filtered_hub.push_filtered_lite(frame);
    }));
    let cluster_hub = hub.clone();
    pipeline.set_cluster_tap(Arc::new(move |t_ns, seq, clusters: &[Cluster]| {
        cluster_hub.push_clusters_lite(t_ns, seq, clusters);
    }));

    let listen = args
        .listen
        .clone()
        .unwrap_or_else(|| config.ui.listen.clone());

    let adapter = Arc::new(ControlAdapter::new(
        config,
        slots.clone(),
        pipeline.clone(),
        hub,
        PathBuf::from("configs"),
    ));
    adapter.apply_initial_runtime();

    let mut tick = TickRunner::new(slots.clone(), DEFAULT_TICK_HZ);
    let pipeline_for_tick = pipeline.clone();
    tick.start(Arc::new(move |frame: &ScanFrame| {
        pipeline_for_tick.process_frame(frame);
    }))
    .map_err(|e| anyhow!(e))?;

    let router = build_router(adapter);
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("binding {}", listen))?;
    info!(%listen, "scanhub listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    // Tick first so no frame is mid-flight when drivers go down.
    info!("shutting down");
    tick.stop();
    slots.stop_all();
    pipeline.publishers().stop_all();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
