use serde::{Deserialize, Serialize};

use crate::assets::DEFAULT_FONT_FILE;
use crate::renderer::RenderOptions;
use crate::video::{DEFAULT_BITRATE_BPS, DEFAULT_FPS};

/// Renderer configuration, loadable from a TOML file.
///
/// All fields default to their standard values. CLI flags override config file values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    // Display toggles (all default true)
    pub show_ship_names: bool,
    pub show_capture_points: bool,
    pub show_dead_ships: bool,
    pub show_hidden_ships: bool,
    pub show_timer: bool,
    pub show_grid: bool,

    /// Seconds of game time between rendered frames.
    pub sample_interval_seconds: f32,
    pub fps: u32,
    pub bitrate_bps: u32,
    /// Compositing threads; 0 lets rayon decide.
    pub worker_threads: usize,
    /// Frames composited per batch before they are handed to the encoder.
    pub frame_batch: usize,
    /// Font path relative to the asset directory.
    pub font_file: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            show_ship_names: true,
            show_capture_points: true,
            show_dead_ships: true,
            show_hidden_ships: true,
            show_timer: true,
            show_grid: true,
            sample_interval_seconds: wows_replay_core::analyzer::battle_controller::DEFAULT_SAMPLE_INTERVAL,
            fps: DEFAULT_FPS,
            bitrate_bps: DEFAULT_BITRATE_BPS,
            worker_threads: 0,
            frame_batch: 64,
            font_file: DEFAULT_FONT_FILE.to_string(),
        }
    }
}

impl RendererConfig {
    /// Load config from a TOML file.
    #[cfg(feature = "bin")]
    pub fn load(path: &std::path::Path) -> Result<Self, rootcause::Report> {
        use rootcause::prelude::*;
        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Display options for the renderer.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            show_ship_names: self.show_ship_names,
            show_capture_points: self.show_capture_points,
            show_dead_ships: self.show_dead_ships,
            show_hidden_ships: self.show_hidden_ships,
            show_timer: self.show_timer,
        }
    }

    /// Generate a commented default TOML config string.
    pub fn generate_default_toml() -> String {
        format!(
            r#"# Minimap Renderer Configuration
# Specify with --config <path>.

# Display toggles (true = show, false = hide)

# Show short ship names under ship icons
show_ship_names = true

# Show capture point zones with progress
show_capture_points = true

# Show wrecks of sunk ships
show_dead_ships = true

# Show last known positions of ships that are out of sight
show_hidden_ships = true

# Show game timer
show_timer = true

# Show the lettered map grid
show_grid = true

# Seconds of game time between frames
sample_interval_seconds = {interval:.1}

# Output video
fps = {fps}
bitrate_bps = {bitrate}

# Compositing threads (0 = one per CPU)
worker_threads = 0

# Frames composited together before encoding
frame_batch = 64

# Font path relative to the asset directory
font_file = "{font}"
"#,
            interval = wows_replay_core::analyzer::battle_controller::DEFAULT_SAMPLE_INTERVAL,
            fps = DEFAULT_FPS,
            bitrate = DEFAULT_BITRATE_BPS,
            font = DEFAULT_FONT_FILE,
        )
    }

    /// Apply CLI flag overrides. Flags use negative form (--no-X disables).
    #[cfg(feature = "bin")]
    pub fn apply_cli_overrides(&mut self, matches: &clap::ArgMatches) {
        if matches.is_present("NO_SHIP_NAMES") {
            self.show_ship_names = false;
        }
        if matches.is_present("NO_CAPTURE_POINTS") {
            self.show_capture_points = false;
        }
        if matches.is_present("NO_DEAD_SHIPS") {
            self.show_dead_ships = false;
        }
        if matches.is_present("NO_HIDDEN_SHIPS") {
            self.show_hidden_ships = false;
        }
        if matches.is_present("NO_GRID") {
            self.show_grid = false;
        }
    }
}
