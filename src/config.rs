use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::download::{DownloadOptions, DEFAULT_DOWNLOAD_LABELS};
use crate::duration::deserialize_duration;
use crate::links::STRIPE_INVOICE_PREFIX;

fn default_link_prefix() -> String {
    STRIPE_INVOICE_PREFIX.to_string()
}

fn default_download_labels() -> Vec<String> {
    DEFAULT_DOWNLOAD_LABELS
        .iter()
        .map(|label| label.to_string())
        .collect()
}

fn default_render_wait() -> Duration {
    Duration::from_secs(5)
}

fn default_link_delay() -> Duration {
    Duration::from_millis(400)
}

fn default_click_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(15)
}

/// Waits and timeouts used while driving the browser.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Flat wait after navigation so the invoice page can render.
    #[serde(
        default = "default_render_wait",
        deserialize_with = "deserialize_duration"
    )]
    pub render_wait: Duration,

    /// Pause between invoice links.
    #[serde(
        default = "default_link_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub link_delay: Duration,

    /// How long to look for a clickable element per label and strategy.
    #[serde(
        default = "default_click_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub click_timeout: Duration,

    /// How long to wait for a download after a successful click.
    #[serde(
        default = "default_download_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub download_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            render_wait: default_render_wait(),
            link_delay: default_link_delay(),
            click_timeout: default_click_timeout(),
            download_timeout: default_download_timeout(),
        }
    }
}

/// Browser launch settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Chrome/Chromium executable. Searched for on PATH when unset.
    pub chrome_path: Option<PathBuf>,

    /// Chrome user-data dir, e.g. one where you're already signed in.
    pub profile_dir: Option<PathBuf>,

    /// Extra Chrome command-line switches.
    pub args: Vec<String>,
}

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Only links starting with this prefix are downloaded.
    #[serde(default = "default_link_prefix")]
    pub link_prefix: String,

    /// Download button texts, highest priority first.
    #[serde(default = "default_download_labels")]
    pub download_labels: Vec<String>,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub browser: BrowserSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            link_prefix: default_link_prefix(),
            download_labels: default_download_labels(),
            timing: TimingConfig::default(),
            browser: BrowserSettings::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if config.download_labels.is_empty() {
            anyhow::bail!(
                "download_labels must not be empty in config file: {}",
                path.display()
            );
        }

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Driver options for a run writing into `out_dir`.
    pub fn download_options(&self, out_dir: impl Into<PathBuf>, early_stop: bool) -> DownloadOptions {
        DownloadOptions {
            out_dir: out_dir.into(),
            early_stop,
            render_wait: self.timing.render_wait,
            link_delay: self.timing.link_delay,
            click_timeout: self.timing.click_timeout,
            download_timeout: self.timing.download_timeout,
            labels: self.download_labels.clone(),
        }
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./stripe-receipts.toml` if it exists in current directory
/// 2. `~/.config/stripe-receipts/config.toml`
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("stripe-receipts.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("stripe-receipts").join("config.toml");
    }

    local_config
}
