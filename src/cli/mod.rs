use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::LevelFilter;

/// Output resolution preset for the renderer; the core only threads this
/// through to `width`/`height` defaults when the caller doesn't override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum Quality {
    #[clap(name = "1080p")]
    Hd,
    #[clap(name = "4k")]
    Uhd,
}

impl Quality {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Quality::Hd => (1920, 1080),
            Quality::Uhd => (3840, 2160),
        }
    }
}

#[derive(Parser, Debug)]
#[clap(name = "bgp-pulse", rename_all = "kebab-case")]
/// Streaming BGP anomaly classifier and paced event feed for live visualization
pub struct CliArgs {
    /// Path to the pipeline config.toml
    pub config_path: String,

    /// Canvas width in pixels (overrides --quality)
    #[clap(long)]
    pub width: Option<u32>,
    /// Canvas height in pixels (overrides --quality)
    #[clap(long)]
    pub height: Option<u32>,
    /// Mollweide projection scale
    #[clap(long, default_value_t = 400.0)]
    pub scale: f64,
    /// Target pulse throughput, ticks per second
    #[clap(long, default_value_t = 2)]
    pub tps: u32,
    /// Resolution preset, used when --width/--height aren't set
    #[clap(long, value_enum, default_value = "1080p")]
    pub quality: Quality,

    /// Interval between frame captures for recording (e.g. "30s")
    #[clap(long)]
    pub capture_interval: Option<String>,
    /// Directory to write captured frames to
    #[clap(long)]
    pub capture_dir: Option<PathBuf>,
    /// File descriptor to write raw PCM audio to
    #[clap(long)]
    pub audio_fd: Option<i32>,

    /// Suppress chrome/HUD, show only the pulse canvas
    #[clap(long)]
    pub minimal_ui: bool,
    /// Hide window minimize/maximize/close controls
    #[clap(long)]
    pub hide_window_controls: bool,
    /// Request an always-on-top floating window
    #[clap(long)]
    pub floating: bool,
    /// Run without a display (rendering handled by an external collaborator)
    #[clap(long)]
    pub headless: bool,

    /// Logging verbosity (repeatable: -v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl CliArgs {
    /// Mirrors the teacher's `main.rs` level mapping: more `-v`s raise this
    /// crate's own log level before raising everything else's.
    pub fn log_levels(&self) -> (LevelFilter, LevelFilter) {
        match self.verbose {
            0 => (LevelFilter::Info, LevelFilter::Warn),
            1 => (LevelFilter::Debug, LevelFilter::Warn),
            2 => (LevelFilter::Trace, LevelFilter::Warn),
            _ => (LevelFilter::Trace, LevelFilter::Trace),
        }
    }

    pub fn canvas_dimensions(&self) -> (u32, u32) {
        let (w, h) = self.quality.dimensions();
        (self.width.unwrap_or(w), self.height.unwrap_or(h))
    }
}
