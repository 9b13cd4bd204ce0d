use std::fs::File;
use std::io::Read;

use serde::Deserialize;

use crate::error::PipelineError;

struct Defaults {}

impl Defaults {
    fn data_dir() -> String {
        "./data".to_string()
    }

    fn client_id() -> String {
        "bgp-pulse".to_string()
    }

    fn idle_eviction_secs() -> u32 {
        600
    }

    fn dedupe_window_secs() -> u32 {
        15
    }

    fn withdrawal_grace_secs() -> u32 {
        10
    }

    fn geo_cache_size() -> usize {
        100_000
    }

    fn lpm_cache_size() -> usize {
        100_000
    }

    fn cache_evict_fraction() -> f32 {
        0.2
    }

    fn ui_tick_secs() -> u64 {
        20
    }

    fn max_visual_queue() -> usize {
        15_000
    }

    fn max_active_pulses() -> usize {
        4_500
    }

    fn cloud_ranges_path() -> Option<String> {
        None
    }

    fn rir_stats_path() -> Option<String> {
        None
    }

    fn offline_geoip_path() -> Option<String> {
        None
    }
}

/// TOML (on-disk) representation of the pipeline config. Missing fields fall
/// back to `Defaults`; `super::PipelineConfig` is the resolved, in-memory form.
#[derive(Debug, Deserialize)]
pub(super) struct PipelineConfigSpec {
    #[serde(default = "Defaults::data_dir")]
    pub(super) data_dir: String,
    // Sent as the `client=` query param on the upstream websocket URL
    #[serde(default = "Defaults::client_id")]
    pub(super) client_id: String,
    #[serde(default = "Defaults::idle_eviction_secs")]
    pub(super) idle_eviction_secs: u32,
    #[serde(default = "Defaults::dedupe_window_secs")]
    pub(super) dedupe_window_secs: u32,
    #[serde(default = "Defaults::withdrawal_grace_secs")]
    pub(super) withdrawal_grace_secs: u32,
    #[serde(default = "Defaults::geo_cache_size")]
    pub(super) geo_cache_size: usize,
    #[serde(default = "Defaults::lpm_cache_size")]
    pub(super) lpm_cache_size: usize,
    #[serde(default = "Defaults::cache_evict_fraction")]
    pub(super) cache_evict_fraction: f32,
    #[serde(default = "Defaults::ui_tick_secs")]
    pub(super) ui_tick_secs: u64,
    #[serde(default = "Defaults::max_visual_queue")]
    pub(super) max_visual_queue: usize,
    #[serde(default = "Defaults::max_active_pulses")]
    pub(super) max_active_pulses: usize,
    // Each of these is an optional path to a pre-fetched data file; a missing
    // path simply disables that layer of the geo resolution chain (§4.2).
    #[serde(default = "Defaults::cloud_ranges_path")]
    pub(super) cloud_ranges_path: Option<String>,
    #[serde(default = "Defaults::rir_stats_path")]
    pub(super) rir_stats_path: Option<String>,
    #[serde(default = "Defaults::offline_geoip_path")]
    pub(super) offline_geoip_path: Option<String>,
}

impl PipelineConfigSpec {
    pub(super) fn from_file(path: &str) -> Result<Self, PipelineError> {
        let mut file = File::open(path)
            .map_err(|err| PipelineError::Config(format!("{}: {}", path, err)))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|err| PipelineError::Config(format!("{}: {}", path, err)))?;
        let config: PipelineConfigSpec = toml::from_str(&contents)?;
        Ok(config)
    }
}

impl Default for PipelineConfigSpec {
    fn default() -> Self {
        Self {
            data_dir: Defaults::data_dir(),
            client_id: Defaults::client_id(),
            idle_eviction_secs: Defaults::idle_eviction_secs(),
            dedupe_window_secs: Defaults::dedupe_window_secs(),
            withdrawal_grace_secs: Defaults::withdrawal_grace_secs(),
            geo_cache_size: Defaults::geo_cache_size(),
            lpm_cache_size: Defaults::lpm_cache_size(),
            cache_evict_fraction: Defaults::cache_evict_fraction(),
            ui_tick_secs: Defaults::ui_tick_secs(),
            max_visual_queue: Defaults::max_visual_queue(),
            max_active_pulses: Defaults::max_active_pulses(),
            cloud_ranges_path: Defaults::cloud_ranges_path(),
            rir_stats_path: Defaults::rir_stats_path(),
            offline_geoip_path: Defaults::offline_geoip_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_src = r#"
            data_dir = "/var/lib/bgp-pulse"
            client_id = "test-client"
            geo_cache_size = 5000
        "#;
        let spec: PipelineConfigSpec = toml::from_str(toml_src).unwrap();
        assert_eq!(spec.data_dir, "/var/lib/bgp-pulse");
        assert_eq!(spec.client_id, "test-client");
        assert_eq!(spec.geo_cache_size, 5000);
        // Unset fields fall back to defaults
        assert_eq!(spec.dedupe_window_secs, 15);
        assert_eq!(spec.max_visual_queue, 15_000);
    }

    #[test]
    fn test_empty_config_uses_all_defaults() {
        let spec: PipelineConfigSpec = toml::from_str("").unwrap();
        assert_eq!(spec.data_dir, Defaults::data_dir());
        assert_eq!(spec.idle_eviction_secs, 600);
    }
}
