//! Run configuration: defaults, then `expedientes.toml`, then `EXPEDIENTES_*` env.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use crate::dedup::DedupPolicy;

const CONFIG_FILE: &str = "expedientes";

pub const LISTING_URL: &str =
    "https://www.csjn.gov.ar/tribunales-federales-nacionales/causas-de-corrupcion.html";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Build(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub listing_url: String,
    pub db_path: PathBuf,
    pub csv_dir: PathBuf,
    pub csv_prefix: String,
    pub sinks: SinkToggles,
    pub tabs: Vec<TabSpec>,
    pub expand_history: bool,
    pub dedup: DedupPolicy,
    pub timing: Timing,
    pub headless: bool,
    pub progress: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listing_url: LISTING_URL.to_string(),
            db_path: PathBuf::from("data/expedientes.db"),
            csv_dir: PathBuf::from("data/csv"),
            csv_prefix: String::new(),
            sinks: SinkToggles::default(),
            tabs: vec![
                TabSpec::new("#btn-solapa-1", "#solapa-1", "En trámite"),
                TabSpec::new("#btn-solapa-2", "#solapa-2", "Terminadas"),
            ],
            expand_history: true,
            dedup: DedupPolicy::default(),
            timing: Timing::default(),
            headless: true,
            progress: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkToggles {
    pub db: bool,
    pub csv: bool,
}

impl Default for SinkToggles {
    fn default() -> Self {
        Self { db: true, csv: true }
    }
}

/// One status tab of the listing.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TabSpec {
    /// Clicked before scanning; `None` scans whatever is showing.
    #[serde(default)]
    pub button: Option<String>,
    /// Scopes every block/pagination selector to this tab's panel.
    pub container: String,
    pub status_label: String,
}

impl TabSpec {
    pub fn new(button: &str, container: &str, status_label: &str) -> Self {
        Self {
            button: Some(button.to_string()),
            container: container.to_string(),
            status_label: status_label.to_string(),
        }
    }

    pub fn block_selector(&self) -> String {
        format!("{} div.result", self.container)
    }

    pub fn next_selector(&self) -> String {
        format!("{} a.page-link.next", self.container)
    }

    pub fn active_page_selector(&self) -> String {
        format!("{} span.page-link.active", self.container)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub content_timeout_ms: u64,
    pub settle_ms: u64,
    pub expand_settle_ms: u64,
    pub page_change_timeout_ms: u64,
    pub poll_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            content_timeout_ms: 10_000,
            settle_ms: 2_000,
            expand_settle_ms: 300,
            page_change_timeout_ms: 10_000,
            poll_ms: 250,
        }
    }
}

impl Timing {
    pub fn content_timeout(&self) -> Duration {
        Duration::from_millis(self.content_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn expand_settle(&self) -> Duration {
        Duration::from_millis(self.expand_settle_ms)
    }

    pub fn page_change_timeout(&self) -> Duration {
        Duration::from_millis(self.page_change_timeout_ms)
    }

    /// Never zero, or page-change polling would spin.
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(10))
    }
}

pub fn load() -> Result<AppConfig, ConfigError> {
    let cfg = Config::builder()
        .add_source(File::with_name(CONFIG_FILE).required(false))
        .add_source(
            Environment::with_prefix("EXPEDIENTES")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    Ok(cfg)
}

pub fn from_toml(text: &str) -> Result<AppConfig, ConfigError> {
    let cfg = Config::builder()
        .add_source(File::from_str(text, FileFormat::Toml))
        .build()?
        .try_deserialize()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = from_toml("").unwrap();
        assert_eq!(cfg.listing_url, LISTING_URL);
        assert_eq!(cfg.tabs.len(), 2);
        assert_eq!(cfg.tabs[1].status_label, "Terminadas");
        assert_eq!(cfg.dedup, DedupPolicy::CaseNumberAndStatus);
        assert!(cfg.sinks.db && cfg.sinks.csv);
        assert_eq!(cfg.timing.expand_settle(), Duration::from_millis(300));
    }

    #[test]
    fn file_overrides_selected_fields() {
        let cfg = from_toml(
            r##"
            dedup = "case_number"
            expand_history = false

            [sinks]
            csv = false

            [timing]
            settle_ms = 0
            poll_ms = 0

            [[tabs]]
            container = "#listado"
            status_label = "Todas"
            "##,
        )
        .unwrap();
        assert_eq!(cfg.dedup, DedupPolicy::CaseNumber);
        assert!(!cfg.expand_history);
        assert!(cfg.sinks.db);
        assert!(!cfg.sinks.csv);
        assert_eq!(cfg.timing.settle(), Duration::ZERO);
        assert_eq!(cfg.timing.poll(), Duration::from_millis(10));
        assert_eq!(cfg.timing.content_timeout_ms, 10_000);
        assert_eq!(cfg.tabs, vec![TabSpec {
            button: None,
            container: "#listado".into(),
            status_label: "Todas".into(),
        }]);
        assert_eq!(cfg.tabs[0].block_selector(), "#listado div.result");
    }
}
