use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use env_logger::Builder;
use log::{error, info, trace};

use bgp_pulse::capability::VisualQueueSink;
use bgp_pulse::cli::CliArgs;
use bgp_pulse::config;
use bgp_pulse::pacer::Pulse;
use bgp_pulse::supervisor::LifecycleSupervisor;

/// Stand-in for the real renderer (external collaborator, §6): logs every
/// pulse instead of drawing it, so this binary runs end to end on its own.
struct LoggingVisualSink;

impl VisualQueueSink for LoggingVisualSink {
    fn push(&self, pulse: Pulse) {
        trace!(
            "pulse lat={:.2} lng={:.2} color={:?} count={} flare={}",
            pulse.lat,
            pulse.lng,
            pulse.color,
            pulse.count,
            pulse.is_flare
        );
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = CliArgs::parse();
    let (crate_level, other_level) = args.log_levels();
    Builder::new()
        .filter(Some("bgp_pulse"), crate_level)
        .filter(None, other_level)
        .init();
    info!("logging at levels {}/{}", crate_level, other_level);

    let config = match config::from_file(&args.config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("fatal config error: {}", err);
            return std::process::ExitCode::FAILURE;
        }
    };

    let (width, height) = args.canvas_dimensions();
    info!("canvas {}x{} quality={:?} headless={}", width, height, args.quality, args.headless);

    let supervisor = LifecycleSupervisor::new(config, Arc::new(LoggingVisualSink));
    let running = match supervisor.run().await {
        Ok(running) => running,
        Err(err) => {
            error!("fatal startup error: {}", err);
            return std::process::ExitCode::FAILURE;
        }
    };

    let cancel = supervisor.cancel_handle();
    let tick_period = Duration::from_millis(1000 / args.tps.max(1) as u64);
    let mut interval = tokio::time::interval(tick_period);
    while !cancel.load(Ordering::Relaxed) {
        interval.tick().await;
        running.pacer.tick();
    }

    info!("shutdown signal received, draining");
    running.shutdown().await;
    std::process::ExitCode::SUCCESS
}
