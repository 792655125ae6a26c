use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use eyre::{Result, anyhow};
use serde::Deserialize;

use crate::util::search_upward;

pub static PROJECT_DIR: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("org", "telegraph-project", "telegraph"));
const CONFIG_FILE: &str = "config.toml";
pub const LOCAL_DIR: &str = ".telegraph";

#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    pub server: ServerConfig,
    pub poll: PollConfig,
    pub view: ViewConfig,
    pub chart: ChartConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the range endpoint
    pub url: String,
    pub request_timeout_ms: u64,
}

impl ServerConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    pub interval_ms: u64,
    /// Period at which a LiveScroll axis is moved to the newest buffered sample
    pub scroll_interval_ms: u64,
    /// Start polling when the first signal is added
    #[serde(default = "default_true")]
    pub autostart: bool,
}

impl PollConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[must_use]
    pub fn scroll_interval(&self) -> Duration {
        Duration::from_millis(self.scroll_interval_ms)
    }
}

/// Window geometry of the view modes. All times are in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewConfig {
    pub live_window_seconds: f64,
    pub live_buffer_seconds: f64,
    pub live_axis_padding_seconds: f64,
    pub live_zoom_level: u8,
    pub zoom_margin_seconds: f64,
    pub zoom_min_zoom_level: u8,
    pub show_all_margin_fraction: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartConfig {
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    pub warning_after_ms: u64,
    pub inactive_after_ms: u64,
}

fn default_true() -> bool {
    true
}

impl GraphConfig {
    pub fn new(force_default_config: bool) -> Result<Self> {
        let default_config = String::from(include_str!("../../default_config.toml"));

        let mut config = Config::builder().add_source(config::File::from_str(
            &default_config,
            config::FileFormat::Toml,
        ));

        let config = if force_default_config {
            config
        } else {
            if let Some(proj_dirs) = &*PROJECT_DIR {
                let config_file = proj_dirs.config_dir().join(CONFIG_FILE);
                config = config.add_source(File::from(config_file).required(false));
            }

            // Add configs from most top-level to most local. This allows overwriting of
            // higher-level settings with a local `.telegraph` directory.
            find_local_configs()
                .into_iter()
                .fold(config, |c, p| {
                    c.add_source(File::from(p.join(CONFIG_FILE)).required(false))
                })
                .add_source(
                    Environment::with_prefix("telegraph")
                        .prefix_separator("_")
                        .separator("__")
                        .try_parsing(true),
                )
        };

        config
            .build()?
            .try_deserialize()
            .map_err(|e| anyhow!("Failed to parse config {e}"))
    }

    pub fn new_from_toml(config: &str) -> Result<Self> {
        Ok(toml::from_str(config)?)
    }

    /// Configuration from the embedded defaults only, ignoring user files.
    pub fn builtin() -> Result<Self> {
        Self::new_from_toml(include_str!("../../default_config.toml"))
    }
}

/// Searches for `.telegraph` directories upward from the current location until it reaches
/// root. Returns them from most top-level to most local, or an empty vector if the search
/// fails.
fn find_local_configs() -> Vec<PathBuf> {
    match std::env::current_dir() {
        Ok(dir) => search_upward(dir, "/", LOCAL_DIR)
            .into_iter()
            .filter(|p| p.is_dir()) // Only keep directories and ignore plain files.
            .rev() // Reverse for pre-order traversal of directories.
            .collect(),
        Err(_) => vec![],
    }
}
