use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How many messages deep to look for one never delivered to a consumer.
pub const DEFAULT_SCAN_DEPTH: u32 = 20;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

const SEMP_V2_PATH: &str = "/SEMP/v2";

/// Connection settings for the SEMPv2 APIs of one message VPN
#[derive(Clone, Deserialize, Serialize)]
pub struct SempConfig {
    /// Any SEMPv2 url of the broker, e.g. `https://broker:943/SEMP/v2/config`
    pub semp_base: String,
    pub message_vpn: String,
    pub username: String,
    pub password: String,
    /// Messages fetched per selection when looking for an undelivered one
    #[serde(default = "default_scan_depth")]
    pub scan_depth: u32,
    /// Fall back to the oldest message when none in the scan window is undelivered
    #[serde(default = "default_delivered_fallback")]
    pub allow_delivered_fallback: bool,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl SempConfig {
    pub fn new(
        semp_base: impl Into<String>,
        message_vpn: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            semp_base: semp_base.into(),
            message_vpn: message_vpn.into(),
            username: username.into(),
            password: password.into(),
            scan_depth: DEFAULT_SCAN_DEPTH,
            allow_delivered_fallback: true,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl std::fmt::Debug for SempConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SempConfig")
            .field("semp_base", &self.semp_base)
            .field("message_vpn", &self.message_vpn)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("scan_depth", &self.scan_depth)
            .field("allow_delivered_fallback", &self.allow_delivered_fallback)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

fn default_scan_depth() -> u32 {
    DEFAULT_SCAN_DEPTH
}

fn default_delivered_fallback() -> bool {
    true
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Monitor and action API roots derived from a SEMPv2 base url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SempEndpoints {
    pub monitor: Url,
    pub action: Url,
}

impl SempEndpoints {
    /// Keeps everything before `/SEMP/v2/` and derives the monitor and action roots from it.
    pub fn from_base(semp_base: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidBaseUrl {
            url: semp_base.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = semp_base.trim().trim_end_matches('/');
        let prefix = match trimmed.find(&format!("{SEMP_V2_PATH}/")) {
            Some(index) => &trimmed[..index],
            None => trimmed
                .strip_suffix(SEMP_V2_PATH)
                .ok_or_else(|| invalid("expected a path containing /SEMP/v2/"))?,
        };

        let parse = |api: &str| -> Result<Url> {
            let url = Url::parse(&format!("{prefix}{SEMP_V2_PATH}/{api}"))
                .map_err(|e| invalid(&e.to_string()))?;
            if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
                return Err(invalid("expected an http or https url"));
            }
            Ok(url)
        };

        Ok(Self {
            monitor: parse("monitor")?,
            action: parse("action")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_from_config_url() {
        let endpoints = SempEndpoints::from_base("https://broker:943/SEMP/v2/config").unwrap();
        assert_eq!(endpoints.monitor.as_str(), "https://broker:943/SEMP/v2/monitor");
        assert_eq!(endpoints.action.as_str(), "https://broker:943/SEMP/v2/action");
    }

    #[test]
    fn test_endpoints_keep_path_prefix() {
        let endpoints =
            SempEndpoints::from_base("http://gateway:8080/solace/SEMP/v2/monitor/msgVpns").unwrap();
        assert_eq!(
            endpoints.monitor.as_str(),
            "http://gateway:8080/solace/SEMP/v2/monitor"
        );
        assert_eq!(
            endpoints.action.as_str(),
            "http://gateway:8080/solace/SEMP/v2/action"
        );
    }

    #[test]
    fn test_endpoints_accept_bare_version_path() {
        let endpoints = SempEndpoints::from_base("http://localhost:8080/SEMP/v2/").unwrap();
        assert_eq!(endpoints.monitor.as_str(), "http://localhost:8080/SEMP/v2/monitor");
    }

    #[test]
    fn test_endpoints_reject_non_semp_urls() {
        assert!(matches!(
            SempEndpoints::from_base("https://broker:943/api/v1"),
            Err(Error::InvalidBaseUrl { .. })
        ));
        assert!(SempEndpoints::from_base("ftp://broker/SEMP/v2/config").is_err());
    }

    #[test]
    fn test_config_defaults_and_redaction() {
        let config: SempConfig = serde_json::from_str(
            r#"{"semp_base":"http://b:8080/SEMP/v2/config","message_vpn":"default","username":"admin","password":"secret"}"#,
        )
        .unwrap();
        assert_eq!(config.scan_depth, 20);
        assert!(config.allow_delivered_fallback);
        assert_eq!(config.request_timeout_ms, 10_000);
        assert!(!format!("{config:?}").contains("secret"));
    }
}
