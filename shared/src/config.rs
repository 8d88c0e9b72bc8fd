use anyhow::{Context, Result, anyhow};
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::{Credentials, provider::SharedCredentialsProvider};
use aws_sdk_sns as sns;
use aws_sdk_sqs as sqs;
use config::{Config, Environment, File};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Local,
    Aws,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    pub mode: RuntimeMode,
    pub region: String,
    /// Named credentials profile, only consulted in `aws` mode
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SqsConfig {
    pub queue_name: Option<String>,
    /// Takes precedence over `queue_name` when set
    pub queue_url: Option<String>,
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SnsConfig {
    pub topic_arn: Option<String>,
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RecvConfig {
    pub wait_secs: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub sqs: SqsConfig,
    #[serde(default)]
    pub sns: SnsConfig,
    #[serde(default)]
    pub recv: RecvConfig,
}

/// Load and MERGE into any deserializable shape:
///  - root_config (e.g., config.toml at repo root)
///  - lab_config  (e.g., labs/<lab>/config.toml)  — later source overrides earlier
///  - environment (APP_* with "__" nesting)       — highest precedence
pub fn load_layered<T: DeserializeOwned>(root_config: &str, lab_config: Option<&str>) -> Result<T> {
    let mut builder = Config::builder();

    // Root config (required)
    if !Path::new(root_config).exists() {
        return Err(anyhow!(
            "Root config not found at '{}'. Create it (e.g. copy config.toml from the repo root) or pass --config <path>.",
            root_config
        ));
    }
    builder = builder.add_source(File::with_name(root_config));

    // Lab config (optional, overrides root)
    if let Some(lab_path) = lab_config {
        if Path::new(lab_path).exists() {
            builder = builder.add_source(File::with_name(lab_path));
        }
    }

    // Environment overrides (e.g., APP_RUNTIME__REGION=eu-west-1)
    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder.build().context("building merged config")?;
    cfg.try_deserialize().context("deserializing merged config")
}

impl AppConfig {
    pub fn load_merged(root_config: &str, lab_config: Option<&str>) -> Result<Self> {
        load_layered(root_config, lab_config)
    }

    pub fn recv_wait_secs(&self) -> i32 {
        self.recv.wait_secs.unwrap_or(10)
    }

    pub fn is_local(&self) -> bool {
        matches!(self.runtime.mode, RuntimeMode::Local)
    }
}

/// Shared SDK config for every AWS client we build.
async fn load_sdk_config(cfg: &AppConfig, endpoint_override: bool) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(cfg.runtime.region.clone()));

    // If we're on LocalStack (runtime=local) OR an explicit endpoint is provided,
    // use static dummy creds to bypass SSO/profile resolution.
    if cfg.is_local() || endpoint_override {
        let creds = Credentials::new("test", "test", None, None, "localstack");
        loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
    } else if let Some(profile) = &cfg.runtime.profile {
        loader = loader.profile_name(profile);
    }

    loader.load().await
}

pub async fn build_sqs_client(cfg: &AppConfig) -> Result<sqs::Client> {
    let shared_cfg = load_sdk_config(cfg, cfg.sqs.endpoint_url.is_some()).await;

    let mut b = sqs::config::Builder::from(&shared_cfg);
    if let Some(ep) = &cfg.sqs.endpoint_url {
        b = b.endpoint_url(ep.clone());
    }
    Ok(sqs::Client::from_conf(b.build()))
}

pub async fn build_sns_client(cfg: &AppConfig) -> Result<sns::Client> {
    let shared_cfg = load_sdk_config(cfg, cfg.sns.endpoint_url.is_some()).await;

    let mut b = sns::config::Builder::from(&shared_cfg);
    if let Some(ep) = &cfg.sns.endpoint_url {
        b = b.endpoint_url(ep.clone());
    }
    Ok(sns::Client::from_conf(b.build()))
}
