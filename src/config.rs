use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::{
    classifier::ColorClassifier,
    control::ApiConfig,
    dispatch::{ChannelAddresses, TwoBitAddresses, DEFAULT_DEACTIVATE_DELAY},
    sampler::{Region, Thresholds},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub camera: CameraConfig,
    pub region: Region,
    pub detection: DetectionConfig,
    pub policy: PolicyConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: i32,
    /// Flip frames horizontally before sampling.
    pub mirror: bool,
    pub frame_interval_ms: u64,
}

impl CameraConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig {
            index: 0,
            mirror: true,
            frame_interval_ms: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub thresholds: Thresholds,
    /// Share of the region, in percent, a channel must cover.
    pub min_area_percent: f64,
    /// `null` disables the separation check.
    pub min_color_distance: Option<f64>,
}

impl DetectionConfig {
    pub fn classifier(&self) -> ColorClassifier {
        ColorClassifier::new(self.min_area_percent, self.min_color_distance)
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            thresholds: Thresholds::default(),
            min_area_percent: 30.,
            min_color_distance: Some(2.),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    TwoBit(TwoBitAddresses),
    PerChannel(PerChannelConfig),
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::TwoBit(TwoBitAddresses::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerChannelConfig {
    /// `red`, `green` and `blue` sit next to `kind` in the policy object.
    #[serde(flatten)]
    pub addresses: ChannelAddresses,
    pub deactivate_delay_ms: u64,
}

impl PerChannelConfig {
    pub fn deactivate_delay(&self) -> Duration {
        Duration::from_millis(self.deactivate_delay_ms)
    }
}

impl Default for PerChannelConfig {
    fn default() -> Self {
        PerChannelConfig {
            addresses: ChannelAddresses::default(),
            deactivate_delay_ms: DEFAULT_DEACTIVATE_DELAY.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.region, Region::new(130, 365, 80, 80));
        assert_eq!(config.api.timeout_ms, 3000);
        assert_eq!(config.policy, PolicyConfig::TwoBit(TwoBitAddresses::default()));
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = serde_json::from_str(
            r#"{
                "api": { "base_url": "http://localhost:8080", "login": false },
                "region": { "width": 30, "height": 20 },
                "detection": { "thresholds": { "red": 120 }, "min_color_distance": null }
            }"#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "http://localhost:8080");
        assert!(!config.api.login);
        assert_eq!(config.api.username, "openplc");
        assert_eq!(config.region, Region::new(130, 365, 30, 20));
        assert_eq!(config.detection.thresholds.red, 120);
        assert_eq!(config.detection.thresholds.green, 100);
        assert_eq!(config.detection.min_color_distance, None);
    }

    #[test]
    fn test_per_channel_policy() {
        let config: Config = serde_json::from_str(
            r#"{
                "policy": {
                    "kind": "per_channel",
                    "red": "%QX1.0",
                    "deactivate_delay_ms": 2500
                }
            }"#,
        )
        .unwrap();

        match config.policy {
            PolicyConfig::PerChannel(policy) => {
                assert_eq!(policy.addresses.red, "%QX1.0");
                assert_eq!(policy.addresses.green, "%QX0.1");
                assert_eq!(policy.deactivate_delay(), Duration::from_millis(2500));
            }
            other => panic!("unexpected policy {:?}", other),
        }
    }

    #[test]
    fn test_per_channel_policy_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "policy": { "kind": "per_channel" } }"#).unwrap();

        assert_eq!(config.policy, PolicyConfig::PerChannel(PerChannelConfig::default()));
    }

    #[test]
    fn test_two_bit_policy() {
        let config: Config =
            serde_json::from_str(r#"{ "policy": { "kind": "two_bit", "pin2": "%QX0.7" } }"#).unwrap();

        assert_eq!(
            config.policy,
            PolicyConfig::TwoBit(TwoBitAddresses {
                pin1: "%QX0.4".to_string(),
                pin2: "%QX0.7".to_string(),
            })
        );
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.json")).unwrap();

        assert_eq!(config.detection.min_area_percent, 30.);
        assert_eq!(config.policy, PolicyConfig::default());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = Config::load("/nonexistent/config.json").unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/config.json"));
    }
}
