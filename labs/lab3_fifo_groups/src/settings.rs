//! Lab configuration: the shared `AppConfig` plus the `[groups]`,
//! `[producer]` and `[consumers]` sections, validated once into an immutable
//! [`RunSettings`] that is handed to every component.

use std::time::Duration;

use anyhow::{Result, bail};
use serde::Deserialize;
use shared::cli::CommonArgs;
use shared::config::{AppConfig, load_layered};

use crate::consumer::ConsumerSettings;
use crate::envelope::GroupRegistry;
use crate::pool::FanOut;
use crate::producer::{ProducerMode, ProducerSettings};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GroupsConfig {
    pub count: usize,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self { count: 6 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub mode: ProducerMode,
    pub messages_per_group: usize,
    pub total_messages: usize,
    pub publish_delay_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            mode: ProducerMode::RoundRobin,
            messages_per_group: 10,
            total_messages: 60,
            publish_delay_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumersConfig {
    pub group_specific: bool,
    pub general_consumers: usize,
    pub group1_consumers: usize,
    pub work_ms: u64,
    pub error_backoff_ms: u64,
    pub drain_on_empty: bool,
}

impl Default for ConsumersConfig {
    fn default() -> Self {
        Self {
            group_specific: false,
            general_consumers: 3,
            group1_consumers: 1,
            work_ms: 200,
            error_backoff_ms: 1000,
            drain_on_empty: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabConfig {
    #[serde(flatten)]
    pub app: AppConfig,
    #[serde(default)]
    pub groups: GroupsConfig,
    #[serde(default)]
    pub producer: ProducerConfig,
    #[serde(default)]
    pub consumers: ConsumersConfig,
}

impl LabConfig {
    /// Root + lab + `APP_*` env, same layering as every other binary.
    pub fn load(common: &CommonArgs, default_lab_cfg: &str) -> Result<Self> {
        load_layered(&common.config, Some(&common.lab_config_path(default_lab_cfg)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub registry: GroupRegistry,
    pub producer: ProducerSettings,
    pub fan_out: FanOut,
    pub consumer: ConsumerSettings,
}

impl RunSettings {
    pub fn from_config(cfg: &LabConfig) -> Result<Self> {
        if cfg.groups.count == 0 {
            bail!("[groups].count must be at least 1");
        }

        let fan_out = if cfg.consumers.group_specific {
            if cfg.consumers.group1_consumers == 0 {
                bail!("[consumers].group1_consumers must be at least 1 in group-specific mode");
            }
            FanOut::GroupSpecific {
                group1_consumers: cfg.consumers.group1_consumers,
            }
        } else {
            if cfg.consumers.general_consumers == 0 {
                bail!("[consumers].general_consumers must be at least 1");
            }
            FanOut::General {
                consumers: cfg.consumers.general_consumers,
            }
        };

        let wait_secs = cfg.app.recv_wait_secs();
        if !(0..=20).contains(&wait_secs) {
            bail!("[recv].wait_secs must be between 0 and 20, got {wait_secs}");
        }

        Ok(Self {
            registry: GroupRegistry::generate(cfg.groups.count),
            producer: ProducerSettings {
                mode: cfg.producer.mode,
                messages_per_group: cfg.producer.messages_per_group,
                total_messages: cfg.producer.total_messages,
                publish_delay: Duration::from_millis(cfg.producer.publish_delay_ms),
            },
            fan_out,
            consumer: ConsumerSettings {
                wait: Duration::from_secs(wait_secs as u64),
                work: Duration::from_millis(cfg.consumers.work_ms),
                error_backoff: Duration::from_millis(cfg.consumers.error_backoff_ms),
                drain_on_empty: cfg.consumers.drain_on_empty,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    const BASE: &str = r#"
        [runtime]
        mode = "local"
        region = "us-east-1"
    "#;

    fn parse(extra: &str) -> LabConfig {
        Config::builder()
            .add_source(File::from_str(BASE, FileFormat::Toml))
            .add_source(File::from_str(extra, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = parse("");
        let run = RunSettings::from_config(&cfg).unwrap();
        assert_eq!(run.registry.len(), 6);
        assert_eq!(run.fan_out, FanOut::General { consumers: 3 });
        assert_eq!(run.producer.mode, ProducerMode::RoundRobin);
        assert_eq!(run.producer.messages_per_group, 10);
        assert_eq!(run.consumer.wait, Duration::from_secs(10));
        assert_eq!(run.consumer.work, Duration::from_millis(200));
        assert!(!run.consumer.drain_on_empty);
    }

    #[test]
    fn lab_sections_override_defaults() {
        let cfg = parse(
            r#"
            [recv]
            wait_secs = 2

            [groups]
            count = 3

            [producer]
            mode = "random"
            total_messages = 25

            [consumers]
            group_specific = true
            group1_consumers = 2
            drain_on_empty = true
            "#,
        );
        let run = RunSettings::from_config(&cfg).unwrap();
        assert_eq!(run.registry.groups(), ["group-1", "group-2", "group-3"]);
        assert_eq!(run.fan_out, FanOut::GroupSpecific { group1_consumers: 2 });
        assert_eq!(run.producer.mode, ProducerMode::Random);
        assert_eq!(run.producer.total_messages, 25);
        assert_eq!(run.consumer.wait, Duration::from_secs(2));
        assert!(run.consumer.drain_on_empty);
        assert_eq!(cfg.app.runtime.region, "us-east-1");
    }

    #[test]
    fn rejects_zero_groups() {
        let cfg = parse("[groups]\ncount = 0\n");
        assert!(RunSettings::from_config(&cfg).is_err());
    }

    #[test]
    fn rejects_zero_consumers_in_active_mode_only() {
        let cfg = parse("[consumers]\ngeneral_consumers = 0\n");
        assert!(RunSettings::from_config(&cfg).is_err());

        let cfg = parse("[consumers]\ngeneral_consumers = 0\ngroup_specific = true\n");
        assert!(RunSettings::from_config(&cfg).is_ok());
    }

    #[test]
    fn rejects_out_of_range_wait() {
        let cfg = parse("[recv]\nwait_secs = 30\n");
        assert!(RunSettings::from_config(&cfg).is_err());
    }
}
