use std::fs::read_to_string;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use queue_balancer_core::BalancerPolicy;
use queue_balancer_semp::SempConfig;
use serde::Deserialize;

/// Environment variable consulted when no password is given on the command line or in the file.
pub(crate) const PASSWORD_ENV: &str = "QUEUE_BALANCER_SEMP_PASSWORD";

/// Connection and queue selection flags shared by every subcommand.
#[derive(Debug, Default, Args)]
pub(crate) struct ConnectionArgs {
    /// Path to a YAML configuration file, flags override its values
    #[arg(long, global = true)]
    pub config_file: Option<String>,

    /// Any SEMPv2 url of the broker, e.g. https://mysolace:943/SEMP/v2/config
    #[arg(long, global = true)]
    pub semp_base: Option<String>,

    /// Name of the message VPN
    #[arg(long, global = true)]
    pub message_vpn: Option<String>,

    /// Admin user with read/write permission for the VPN
    #[arg(long, global = true)]
    pub semp_user: Option<String>,

    /// Password of the admin user (or QUEUE_BALANCER_SEMP_PASSWORD)
    #[arg(long, global = true)]
    pub semp_password: Option<String>,

    /// Comma separated list of queue names, e.g. queue1,queue2,queue3
    #[arg(long, global = true, value_delimiter = ',')]
    pub queues_list: Option<Vec<String>>,

    /// Percentage a bound queue may deviate from its fair share before it is flagged
    #[arg(long, global = true)]
    pub tolerance_percent: Option<f64>,
}

/// Layout of the YAML configuration file, every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    #[serde(default)]
    pub semp: FileSemp,
    #[serde(default)]
    pub queues: Vec<String>,
    #[serde(default)]
    pub policy: BalancerPolicy,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileSemp {
    pub semp_base: Option<String>,
    pub message_vpn: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scan_depth: Option<u32>,
    pub allow_delivered_fallback: Option<bool>,
    pub request_timeout_ms: Option<u64>,
}

/// Everything one run of the balancer needs.
#[derive(Debug)]
pub(crate) struct ResolvedConfig {
    pub semp: SempConfig,
    pub queues: Vec<String>,
    pub policy: BalancerPolicy,
}

impl FileConfig {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let content = read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

impl ConnectionArgs {
    /// Layers the file, then the flags, then the password variable.
    pub(crate) fn resolve(&self) -> Result<ResolvedConfig> {
        let file = match &self.config_file {
            Some(path) => FileConfig::load(Path::new(path))?,
            None => FileConfig::default(),
        };
        self.merge(file, std::env::var(PASSWORD_ENV).ok())
    }

    fn merge(&self, file: FileConfig, env_password: Option<String>) -> Result<ResolvedConfig> {
        let FileConfig {
            semp,
            queues,
            mut policy,
        } = file;

        let required = |flag: &Option<String>, from_file: Option<String>, name: &str| {
            flag.clone()
                .or(from_file)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| anyhow!("missing {name}: pass --{name} or set it in the config file"))
        };

        let semp_base = required(&self.semp_base, semp.semp_base, "semp-base")?;
        let message_vpn = required(&self.message_vpn, semp.message_vpn, "message-vpn")?;
        let username = required(&self.semp_user, semp.username, "semp-user")?;
        let password = self
            .semp_password
            .clone()
            .or(semp.password)
            .or(env_password)
            .ok_or_else(|| {
                anyhow!("missing semp-password: pass --semp-password or set {PASSWORD_ENV}")
            })?;

        let queues: Vec<String> = self
            .queues_list
            .clone()
            .unwrap_or(queues)
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if queues.is_empty() {
            bail!("no queues to balance: pass --queues-list or list them under `queues`");
        }

        if let Some(tolerance) = self.tolerance_percent {
            policy.tolerance_percent = tolerance;
        }

        let mut semp_config = SempConfig::new(semp_base, message_vpn, username, password);
        if let Some(scan_depth) = semp.scan_depth {
            semp_config.scan_depth = scan_depth;
        }
        if let Some(fallback) = semp.allow_delivered_fallback {
            semp_config.allow_delivered_fallback = fallback;
        }
        if let Some(timeout) = semp.request_timeout_ms {
            semp_config.request_timeout_ms = timeout;
        }

        Ok(ResolvedConfig {
            semp: semp_config,
            queues,
            policy,
        })
    }
}
