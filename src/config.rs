//! YAML configuration: page parameters and controller tuning.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the production values.
//!
//! ```yaml
//! page:
//!   isMgid: 1
//!   mgWidgetId1: "1903360"
//! controller:
//!   trigger:
//!     rootMargin: "600px 0px"
//!     thresholdFraction: 0.7
//!   midSlot:
//!     strategy: observe
//!     timeout_ms: 2000
//! ```

use crate::error::Result;
use crate::models::{AdNetwork, ViewportTriggerConfig};
use crate::reveal::iframes::MOBILE_BREAKPOINT;
use crate::reveal::resolver::AwaitStrategy;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Site-wide ad identifiers passed to every article page.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageParameters {
    /// MGID widget for the mid-article slot.
    pub mg_widget_id1: String,
    /// MGID widget for the end-of-article feed.
    pub mg_widget_feed_id: String,
    /// `1` selects MGID for both slots, anything else Taboola.
    #[serde(deserialize_with = "number_or_string")]
    pub is_mgid: i64,
    pub feji_hb_zone: String,
    pub feji_player_id: String,
    pub taboola_publisher_id: String,
    pub ads_keeper_src: String,
    pub rewarded_ad_unit: String,
}

impl Default for PageParameters {
    fn default() -> Self {
        Self {
            mg_widget_id1: "1903360".into(),
            mg_widget_feed_id: "1903357".into(),
            is_mgid: 0,
            feji_hb_zone: "feji.io_long".into(),
            feji_player_id: "feji.io_1723454353847".into(),
            taboola_publisher_id: "topnewsusfejiio".into(),
            ads_keeper_src: "https://jsc.mgid.com/site/1066309.js".into(),
            rewarded_ad_unit: "/23207117756/lifenews.livextop.com/lifenews.livextop.com_rewarded_2".into(),
        }
    }
}

impl PageParameters {
    pub fn network(&self) -> AdNetwork {
        AdNetwork::from_is_mgid(self.is_mgid)
    }
}

/// The API sends `isMgid` as either `1` or `"1"`.
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s.trim().parse().unwrap_or(0),
    })
}

/// Timings and thresholds for the reveal controller and the fetch edge.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControllerConfig {
    pub trigger: ViewportTriggerConfig,
    /// How the mid-article slot waits for `#qctaboo-mid`.
    pub mid_slot: AwaitStrategy,
    pub scripts_start_delay_ms: u64,
    pub scripts_timeout_ms: u64,
    pub mobile_breakpoint: f64,
    pub fetch_timeout_ms: u64,
    pub fetch_retries: usize,
    pub fetch_backoff_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            trigger: ViewportTriggerConfig::default(),
            mid_slot: AwaitStrategy::default(),
            scripts_start_delay_ms: 50,
            scripts_timeout_ms: 2000,
            mobile_breakpoint: MOBILE_BREAKPOINT,
            fetch_timeout_ms: 5000,
            fetch_retries: 2,
            fetch_backoff_ms: 100,
        }
    }
}

impl ControllerConfig {
    pub fn scripts_start_delay(&self) -> Duration {
        Duration::from_millis(self.scripts_start_delay_ms)
    }

    pub fn scripts_timeout(&self) -> Duration {
        Duration::from_millis(self.scripts_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn fetch_backoff(&self) -> Duration {
        Duration::from_millis(self.fetch_backoff_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub page: PageParameters,
    pub controller: ControllerConfig,
}

/// Parse an [`AppConfig`] from YAML text.
pub fn parse_config(yaml: &str) -> Result<AppConfig> {
    if yaml.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/// Read and parse the config file at `path`.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let config = parse_config(&text)?;
    info!(network = ?config.page.network(), "Loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::reveal::sentinel::RootMargin;

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(parse_config("").unwrap(), AppConfig::default());
        let config = parse_config("page: {}\n").unwrap();
        assert_eq!(config.page.mg_widget_id1, "1903360");
        assert_eq!(config.controller.trigger.threshold_fraction, 0.7);
    }

    #[test]
    fn test_is_mgid_number_or_string() {
        let a = parse_config("page:\n  isMgid: 1\n").unwrap();
        let b = parse_config("page:\n  isMgid: \"1\"\n").unwrap();
        let c = parse_config("page:\n  isMgid: \"nope\"\n").unwrap();
        assert_eq!(a.page.network(), AdNetwork::Mgid);
        assert_eq!(b.page.network(), AdNetwork::Mgid);
        assert_eq!(c.page.network(), AdNetwork::Taboola);
    }

    #[test]
    fn test_controller_overrides() {
        let yaml = r#"
controller:
  trigger:
    rootMargin: "300px 0px"
    thresholdFraction: 0.5
    requirePositiveTop: false
  midSlot:
    strategy: observe
    timeout_ms: 1500
  fetchRetries: 4
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.controller.trigger.root_margin, RootMargin::vertical(300.0));
        assert!(!config.controller.trigger.require_positive_top);
        assert_eq!(config.controller.mid_slot, AwaitStrategy::Observe { timeout_ms: 1500 });
        assert_eq!(config.controller.fetch_retries, 4);
        assert_eq!(config.controller.fetch_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_bad_root_margin_is_config_error() {
        let err = parse_config("controller:\n  trigger:\n    rootMargin: \"lots\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config("/nonexistent/article_reveal.yaml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
