//! Wires the full component graph together and drives it until a
//! termination signal arrives (§4.9). The only component allowed to end the
//! process; every other failure mode is absorbed and logged where it occurs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::capability::{
    EventEmitter, FanOutEmitter, GeoResolveQuery, SeenStoreQuery, SecondaryClassifier,
    VisualQueueSink,
};
use crate::classifier::AnomalyClassifier;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::geo::{build_resolver, JsonFileLoader};
use crate::ingest::IngestDriver;
use crate::metrics::MetricsAggregator;
use crate::pacer::Pacer;
use crate::shaper::EventShaper;
use crate::store::{LongestPrefixStore, SeenStore};
use crate::utils::{ClockSource, SystemClock};

const MAINTENANCE_TICK: Duration = Duration::from_secs(1);
const DRAIN_TICK: Duration = Duration::from_millis(500);
const SHUTDOWN_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Startup and shutdown ordering for the whole pipeline, not a god-object:
/// every component it constructs only knows the narrow capability traits in
/// `capability.rs`, same as if they'd been wired up by hand one at a time.
pub struct LifecycleSupervisor {
    config: PipelineConfig,
    sink: Arc<dyn VisualQueueSink>,
    cancel: Arc<AtomicBool>,
}

/// Handle to a running pipeline. The renderer (external, §6) pulls
/// `metrics`/`pacer` at its own frame rate; this crate only pushes into the
/// `VisualQueueSink` it was given at construction.
pub struct RunningPipeline {
    pub metrics: Arc<MetricsAggregator>,
    pub pacer: Arc<Pacer>,
    seen_store: Arc<SeenStore>,
    cancel: Arc<AtomicBool>,
    ingest_task: tokio::task::JoinHandle<()>,
    maintenance_task: tokio::task::JoinHandle<()>,
    drain_task: tokio::task::JoinHandle<()>,
}

impl LifecycleSupervisor {
    pub fn new(config: PipelineConfig, sink: Arc<dyn VisualQueueSink>) -> Self {
        Self {
            config,
            sink,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The flag every long-lived loop reacts to at its next suspension point
    /// (§5). Exposed so a caller driving its own signal loop can flip it too.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Registers SIGTERM/SIGINT handlers that flip the shared cancellation
    /// flag; a repeated signal does nothing new, it's already set.
    fn install_signal_handlers(&self) -> Result<(), PipelineError> {
        signal_hook::flag::register(signal_hook::consts::SIGTERM, self.cancel.clone())?;
        signal_hook::flag::register(signal_hook::consts::SIGINT, self.cancel.clone())?;
        Ok(())
    }

    /// Opens persistent stores, loads geo reference data, constructs every
    /// component, and spawns the maintenance/ingest loops. Only startup
    /// failures (an unreadable data dir, a corrupt config) are fatal; nothing
    /// after this point can bring the process down on its own.
    pub async fn run(&self) -> Result<RunningPipeline, PipelineError> {
        self.install_signal_handlers()?;

        std::fs::create_dir_all(&self.config.data_dir)
            .map_err(|err| PipelineError::Config(format!("creating data dir: {}", err)))?;

        let seen_db = LongestPrefixStore::open(
            &self.config.data_dir.join("seen-prefixes.db"),
            self.config.lpm_cache_size,
            self.config.cache_evict_fraction,
        )?;
        // Opened for the persisted-state compatibility surface (§6) but not
        // yet read from or written to: EventShaper/AnomalyClassifier state is
        // in-memory only, so a restart currently re-learns it from scratch.
        let _prefix_state_db = LongestPrefixStore::open(
            &self.config.data_dir.join("prefix-state.db"),
            self.config.lpm_cache_size,
            self.config.cache_evict_fraction,
        )?;
        let seen_store = Arc::new(SeenStore::new(seen_db));

        let loader = JsonFileLoader::new(&self.config.geo);
        let geo_resolver = Arc::new(build_resolver(
            &loader,
            self.config.geo_cache_size,
            self.config.cache_evict_fraction,
        ));

        let clock: Arc<dyn ClockSource> = Arc::new(SystemClock);
        let classifier = Arc::new(AnomalyClassifier::new(self.config.idle_eviction));
        let metrics = Arc::new(MetricsAggregator::new(clock.clone(), self.config.ui_tick));
        let pacer = Arc::new(Pacer::new(
            clock.clone(),
            seen_store.clone(),
            self.sink.clone(),
            self.config.max_visual_queue,
            self.config.max_active_pulses,
        ));

        let fan_out: Arc<dyn EventEmitter> = Arc::new(FanOutEmitter::new(vec![
            metrics.clone() as Arc<dyn EventEmitter>,
            pacer.clone() as Arc<dyn EventEmitter>,
        ]));

        let shaper = Arc::new(EventShaper::new(
            clock.clone(),
            seen_store.clone() as Arc<dyn SeenStoreQuery>,
            geo_resolver as Arc<dyn GeoResolveQuery>,
            classifier.clone() as Arc<dyn SecondaryClassifier>,
            fan_out,
            self.config.dedupe_window,
            self.config.withdrawal_grace,
        ));

        let maintenance_task = self.spawn_maintenance(shaper.clone(), classifier, metrics.clone(), clock);
        let drain_task = self.spawn_drain(pacer.clone());
        let ingest_task = self.spawn_ingest(shaper);

        info!("pipeline started, data dir {}", self.config.data_dir.display());
        Ok(RunningPipeline {
            metrics,
            pacer,
            seen_store,
            cancel: self.cancel.clone(),
            ingest_task,
            maintenance_task,
            drain_task,
        })
    }

    /// 1 Hz: shaper grace-period withdrawals, metrics ring snapshot, and
    /// classifier idle eviction all share this cadence (§4.9).
    fn spawn_maintenance(
        &self,
        shaper: Arc<EventShaper>,
        classifier: Arc<AnomalyClassifier>,
        metrics: Arc<MetricsAggregator>,
        clock: Arc<dyn ClockSource>,
    ) -> tokio::task::JoinHandle<()> {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(MAINTENANCE_TICK);
            while !cancel.load(Ordering::Relaxed) {
                interval.tick().await;
                shaper.tick();
                metrics.snapshot_tick();
                classifier.evict_idle(clock.now_millis());
            }
        })
    }

    /// 2 Hz: Pacer's own city-buffer drain cycle (§4.7). Pacer's per-frame
    /// `tick()` is pulled by the renderer at its own cadence, not driven here.
    fn spawn_drain(&self, pacer: Arc<Pacer>) -> tokio::task::JoinHandle<()> {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(DRAIN_TICK);
            while !cancel.load(Ordering::Relaxed) {
                interval.tick().await;
                pacer.drain();
            }
        })
    }

    fn spawn_ingest(&self, shaper: Arc<EventShaper>) -> tokio::task::JoinHandle<()> {
        let cancel = self.cancel.clone();
        let driver = IngestDriver::new(self.config.client_id.clone(), shaper);
        tokio::spawn(async move { driver.run(cancel).await })
    }
}

impl RunningPipeline {
    /// Flips the cancellation flag, waits up to 1 s for the ingest reader to
    /// exit, then flushes whatever SeenStore writes are still pending (§5).
    pub async fn shutdown(self) {
        self.cancel.store(true, Ordering::Relaxed);
        if tokio::time::timeout(SHUTDOWN_DRAIN_GRACE, self.ingest_task).await.is_err() {
            log::warn!("ingest task did not exit within the shutdown grace period");
        }
        self.maintenance_task.abort();
        self.drain_task.abort();
        self.seen_store.flush();
    }
}
