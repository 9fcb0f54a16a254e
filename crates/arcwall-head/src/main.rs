mod cluster;
mod config;
mod frame;
mod metrics;

use crate::cluster::ClusterLauncher;
use crate::config::HeadConfig;
use crate::frame::{run_frame_loop, FrameSync, PacedFrameSync};
use crate::metrics::HeadMetrics;
use anyhow::Context;
use arcwall::partition::{node_is_active, write_cluster_config};
use arcwall::{bind_tile_cameras, CameraRegistry, CylindricalProjector};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

/// Frame sync wrapper that counts started frames.
struct MeteredFrameSync {
    inner: PacedFrameSync,
    metrics: Arc<HeadMetrics>,
}

impl FrameSync for MeteredFrameSync {
    fn start_frame(&mut self, frame: u32) -> anyhow::Result<()> {
        self.metrics.frames_total.inc();
        self.inner.start_frame(frame)
    }

    fn finish_frame(&mut self) -> anyhow::Result<()> {
        self.inner.finish_frame()
    }

    fn finish_all_frames(&mut self) -> anyhow::Result<()> {
        self.inner.finish_all_frames()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = HeadConfig::parse();
    tracing::info!(config = ?config, "arcwall head starting");

    // Build the canvas tables and place the tiles on the cylinder. This is
    // the only point where the tables are mutable; afterwards they are
    // shared read-only.
    let mut canvas = config.build_canvas().context("invalid display configuration")?;
    CylindricalProjector::build(&config.cylinder_settings(), &mut canvas);

    let mut cameras = CameraRegistry::new();
    let default_id = cameras.get_or_create("default");
    cameras.set_default(default_id);
    bind_tile_cameras(&mut canvas, &mut cameras);

    let enabled_tiles = canvas.tiles().filter(|(_, t)| t.enabled).count();
    tracing::info!(
        tiles = canvas.num_tiles(),
        enabled_tiles,
        canvas_pixels = ?canvas.canvas_pixel_size,
        "canvas built"
    );

    let executable = config.executable()?;
    let canvas = Arc::new(canvas);
    let launcher = ClusterLauncher::new(canvas.clone(), executable);

    if config.kill_cluster {
        launcher.kill_cluster().await;
        return Ok(());
    }

    match write_cluster_config(&canvas) {
        Ok(Some(path)) => tracing::info!(path = %path.display(), "cluster configuration written"),
        Ok(None) => tracing::debug!("cluster configuration generation disabled"),
        Err(e) => return Err(e).context("failed to write cluster configuration"),
    }

    let metrics = Arc::new(HeadMetrics::new());
    metrics.tiles_enabled.set(enabled_tiles as i64);
    let remote_nodes = canvas
        .nodes
        .iter()
        .filter(|n| n.is_remote() && node_is_active(&canvas, n))
        .count();
    metrics.nodes_launched.set(remote_nodes as i64);

    // Metrics server
    {
        let router = metrics.router();
        let addr: std::net::SocketAddr = config
            .metrics_listen_addr
            .parse()
            .context("failed to parse metrics listen address")?;
        tokio::spawn(async move {
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    tracing::info!(addr = %addr, "metrics server started");
                    if let Err(e) = axum::serve(listener, router.into_make_service()).await {
                        tracing::error!(error = %e, "metrics server failed");
                    }
                }
                Err(e) => tracing::error!(addr = %addr, error = %e, "failed to bind metrics server"),
            }
        });
    }

    launcher.launch_remote_nodes().await?;

    // Cooperative exit: signals set the flag, the frame loop observes it at
    // the next frame boundary.
    let exit = Arc::new(AtomicBool::new(false));
    {
        let exit = exit.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received, exiting at next frame boundary");
            exit.store(true, Ordering::Relaxed);
        });
    }

    let frames = {
        let exit = exit.clone();
        let metrics = metrics.clone();
        let period = Duration::from_millis(config.frame_ms);
        tokio::task::spawn_blocking(move || {
            let mut sync = MeteredFrameSync {
                inner: PacedFrameSync::new(period),
                metrics,
            };
            run_frame_loop(&mut sync, &exit)
        })
        .await
        .context("frame loop task panicked")??
    };
    tracing::info!(frames, "frame loop finished");

    launcher.kill_remote_nodes().await;
    tracing::info!("head shut down gracefully");
    Ok(())
}

/// Listens for OS shutdown signals (SIGINT, SIGTERM) and resolves when one
/// is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
