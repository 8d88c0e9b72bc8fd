use anyhow::{Result, anyhow};
use aws_sdk_sqs as sqs;
use clap::Args as ClapArgs;

use crate::config::AppConfig;

/// Common flags shared by all binaries. They only locate configuration;
/// run behaviour is selected entirely through config files and `APP_*` env.
/// Use with `#[command(flatten)] common: CommonArgs`.
#[derive(Clone, Debug, ClapArgs)]
pub struct CommonArgs {
    /// Path to the root config (required)
    #[arg(long, default_value = "config.toml")]
    pub config: String,

    /// Path to the lab-scoped config (defaults to <lab_dir>/config.toml)
    #[arg(long)]
    pub lab_config: Option<String>,

    /// Ad-hoc override for the queue name
    #[arg(long)]
    pub queue_name: Option<String>,
}

impl CommonArgs {
    /// Lab config path, falling back to `default_lab_cfg`.
    pub fn lab_config_path(&self, default_lab_cfg: &str) -> String {
        self.lab_config
            .clone()
            .unwrap_or_else(|| default_lab_cfg.to_string())
    }
}

/// Merge root + lab + env into an AppConfig.
/// `default_lab_cfg` should be "<this_lab_dir>/config.toml".
pub fn merged_config(common: &CommonArgs, default_lab_cfg: &str) -> Result<AppConfig> {
    let lab_cfg_path = common.lab_config_path(default_lab_cfg);
    AppConfig::load_merged(&common.config, Some(&lab_cfg_path))
}

/// Require a queue name from either CLI or config; otherwise fail.
pub fn require_queue_name(common: &CommonArgs, cfg: &AppConfig) -> Result<String> {
    common
        .queue_name
        .clone()
        .or_else(|| cfg.sqs.queue_name.clone())
        .ok_or_else(|| {
            anyhow!(
                "Queue name is required. Pass --queue-name or set [sqs].queue_name in the lab config."
            )
        })
}

/// Queue URL from config when given verbatim, otherwise looked up by name.
pub async fn resolve_queue_url(
    common: &CommonArgs,
    cfg: &AppConfig,
    client: &sqs::Client,
) -> Result<String> {
    if common.queue_name.is_none() {
        if let Some(url) = &cfg.sqs.queue_url {
            return Ok(url.clone());
        }
    }
    let qname = require_queue_name(common, cfg)?;
    crate::sqs::get_queue_url(client, &qname).await
}

/// Topic ARN is mandatory for anything that publishes.
pub fn require_topic_arn(cfg: &AppConfig) -> Result<String> {
    cfg.sns
        .topic_arn
        .clone()
        .ok_or_else(|| anyhow!("Topic ARN is required. Set [sns].topic_arn or APP_SNS__TOPIC_ARN."))
}
