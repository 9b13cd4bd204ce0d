mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::error::PipelineError;

/// Parse a TOML config file and return a resolved `PipelineConfig`.
pub fn from_file(path: &str) -> Result<PipelineConfig, PipelineError> {
    let spec = file::PipelineConfigSpec::from_file(path)?;
    Ok(PipelineConfig::from_spec(spec))
}

/// In-memory, fully-resolved pipeline configuration. Missing `PipelineConfigSpec`
/// fields have already been defaulted by the time this is built.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub client_id: String,
    pub idle_eviction: Duration,
    pub dedupe_window: Duration,
    pub withdrawal_grace: Duration,
    pub geo_cache_size: usize,
    pub lpm_cache_size: usize,
    pub cache_evict_fraction: f32,
    pub ui_tick: Duration,
    pub max_visual_queue: usize,
    pub max_active_pulses: usize,
    pub geo: GeoConfig,
}

/// Paths to the pre-fetched reference data files each geo resolution layer
/// consumes. Any path left unset disables that layer rather than erroring.
#[derive(Debug, Clone, Default)]
pub struct GeoConfig {
    pub cloud_ranges_path: Option<PathBuf>,
    pub rir_stats_path: Option<PathBuf>,
    pub offline_geoip_path: Option<PathBuf>,
}

impl PipelineConfig {
    fn from_spec(spec: file::PipelineConfigSpec) -> Self {
        Self {
            data_dir: PathBuf::from(spec.data_dir),
            client_id: spec.client_id,
            idle_eviction: Duration::from_secs(spec.idle_eviction_secs.into()),
            dedupe_window: Duration::from_secs(spec.dedupe_window_secs.into()),
            withdrawal_grace: Duration::from_secs(spec.withdrawal_grace_secs.into()),
            geo_cache_size: spec.geo_cache_size,
            lpm_cache_size: spec.lpm_cache_size,
            cache_evict_fraction: spec.cache_evict_fraction,
            ui_tick: Duration::from_secs(spec.ui_tick_secs.into()),
            max_visual_queue: spec.max_visual_queue,
            max_active_pulses: spec.max_active_pulses,
            geo: GeoConfig {
                cloud_ranges_path: spec.cloud_ranges_path.map(PathBuf::from),
                rir_stats_path: spec.rir_stats_path.map(PathBuf::from),
                offline_geoip_path: spec.offline_geoip_path.map(PathBuf::from),
            },
        }
    }
}
