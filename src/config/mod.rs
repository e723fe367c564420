//! Process configuration (§10.3), loaded once at startup and never mutated.
//! Structure follows the teacher's `app/config.rs`: a top-level config type
//! assembled by the `config` crate from a YAML file, environment-flag
//! overrides layered on top of the file for the handful of booleans the
//! deployment environment is expected to flip without a redeploy.

use crate::auction::bid_validator::FloorMode;
use crate::auction::privacy::PrivacyConfig;
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One configured bidder: its code, the endpoint `SimpleJsonAdapter` should
/// POST to, and the sync pixel template it advertises through
/// `/cookie_sync` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidderConfig {
    pub code: String,
    pub endpoint: String,
    #[serde(default)]
    pub gvl_id: Option<u16>,
    #[serde(default)]
    pub sync_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub floor_cache_entries: u64,
    #[serde(with = "humantime_serde")]
    pub floor_cache_ttl: std::time::Duration,
    pub cookie_store_entries: u64,
    #[serde(with = "humantime_serde")]
    pub cookie_store_ttl: std::time::Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            floor_cache_entries: 50_000,
            floor_cache_ttl: std::time::Duration::from_secs(300),
            cookie_store_entries: 1_000_000,
            cookie_store_ttl: std::time::Duration::from_secs(60 * 60 * 24 * 7),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtelProto {
    Http,
    Grpc,
}

impl Default for OtelProto {
    fn default() -> Self {
        OtelProto::Grpc
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    Daily,
    Hourly,
    Never,
}

impl Default for FileRotation {
    fn default() -> Self {
        FileRotation::Daily
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSink {
    pub spans: bool,
    pub dest: LogType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogType {
    Stdout {
        #[serde(default = "default_logtype_color")]
        color: bool,
        #[serde(default)]
        json: bool,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        json: bool,
        #[serde(default)]
        rotation: FileRotation,
        #[serde(default)]
        max_files: usize,
    },
    Otel {
        endpoint: String,
        #[serde(default)]
        proto: OtelProto,
    },
}

fn default_logtype_color() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub span_sample_rate: f32,
    #[serde(default)]
    pub sinks: Vec<LogSink>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            span_sample_rate: 0.01,
            sinks: vec![LogSink { spans: true, dest: LogType::Stdout { color: true, json: false } }],
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.sinks.is_empty() {
            anyhow::bail!("at least one logging sink must be configured");
        }
        self.level
            .parse::<tracing::Level>()
            .map_err(|_| anyhow::anyhow!("invalid log level '{}'", self.level))?;
        if !(0.0..=1.0).contains(&self.span_sample_rate) {
            anyhow::bail!("span_sample_rate must be between 0.0 and 1.0, got {}", self.span_sample_rate);
        }
        Ok(())
    }
}

/// Mirrors §6's "Environment flags" table. Every flag defaults to enforcing,
/// so an unconfigured deployment fails safe toward more privacy protection,
/// not less.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyFlags {
    #[serde(default = "t")]
    pub pbs_enforce_gdpr: bool,
    #[serde(default = "t")]
    pub pbs_enforce_coppa: bool,
    #[serde(default = "t")]
    pub pbs_enforce_ccpa: bool,
    #[serde(default = "t")]
    pub pbs_geo_enforcement: bool,
    #[serde(default = "t")]
    pub pbs_privacy_strict_mode: bool,
    #[serde(default = "t")]
    pub pbs_anonymize_ip: bool,
}

fn t() -> bool {
    true
}

impl Default for PrivacyFlags {
    fn default() -> Self {
        Self {
            pbs_enforce_gdpr: true,
            pbs_enforce_coppa: true,
            pbs_enforce_ccpa: true,
            pbs_geo_enforcement: true,
            pbs_privacy_strict_mode: true,
            pbs_anonymize_ip: true,
        }
    }
}

impl PrivacyFlags {
    /// Env vars, when present, override whatever the config file set —
    /// operators flip these without a redeploy (§6).
    pub fn apply_env_overrides(&mut self) {
        apply_bool_env("PBS_ENFORCE_GDPR", &mut self.pbs_enforce_gdpr);
        apply_bool_env("PBS_ENFORCE_COPPA", &mut self.pbs_enforce_coppa);
        apply_bool_env("PBS_ENFORCE_CCPA", &mut self.pbs_enforce_ccpa);
        apply_bool_env("PBS_GEO_ENFORCEMENT", &mut self.pbs_geo_enforcement);
        apply_bool_env("PBS_PRIVACY_STRICT_MODE", &mut self.pbs_privacy_strict_mode);
        apply_bool_env("PBS_ANONYMIZE_IP", &mut self.pbs_anonymize_ip);
    }

    pub fn to_privacy_config(&self) -> PrivacyConfig {
        PrivacyConfig {
            enforce_gdpr: self.pbs_enforce_gdpr,
            enforce_coppa: self.pbs_enforce_coppa,
            enforce_ccpa: self.pbs_enforce_ccpa,
            geo_enforcement: self.pbs_geo_enforcement,
            strict_mode: self.pbs_privacy_strict_mode,
            anonymize_ip: self.pbs_anonymize_ip,
        }
    }
}

fn apply_bool_env(name: &str, field: &mut bool) {
    if let Ok(value) = std::env::var(name) {
        if let Ok(parsed) = value.trim().parse::<bool>() {
            *field = parsed;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub http_port: u16,
    #[serde(default)]
    pub request_body_limit_bytes: usize,
    /// Whether `?debug=1` requires `X-API-Key`/`Authorization: Bearer` (§6);
    /// env-overridable via `DEBUG_REQUIRES_AUTH`.
    #[serde(default = "t")]
    pub debug_requires_auth: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { http_port: 8080, request_body_limit_bytes: 1 << 20, debug_requires_auth: true }
    }
}

impl ServerConfig {
    pub fn apply_env_overrides(&mut self) {
        apply_bool_env("DEBUG_REQUIRES_AUTH", &mut self.debug_requires_auth);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HbxConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub caches: CacheConfig,
    pub bidders: Vec<BidderConfig>,
    #[serde(default)]
    pub privacy: PrivacyFlags,
    #[serde(default)]
    pub floor_mode: FloorModeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Base directory for the stored-config filesystem backend (§6).
    #[serde(default = "default_stored_config_dir")]
    pub stored_config_dir: PathBuf,
}

fn default_stored_config_dir() -> PathBuf {
    PathBuf::from("./stored-config")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FloorModeConfig {
    #[default]
    Hard,
    Soft,
}

impl From<FloorModeConfig> for FloorMode {
    fn from(value: FloorModeConfig) -> Self {
        match value {
            FloorModeConfig::Hard => FloorMode::Hard,
            FloorModeConfig::Soft => FloorMode::Soft,
        }
    }
}

impl HbxConfig {
    pub fn load(path: &Path) -> Result<Self, anyhow::Error> {
        let cfg = Config::builder().add_source(config::File::from(path.to_path_buf())).build()?;
        let mut parsed: HbxConfig = cfg.try_deserialize()?;
        parsed.privacy.apply_env_overrides();
        parsed.server.apply_env_overrides();
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.logging.validate()?;
        if self.server.request_body_limit_bytes == 0 {
            anyhow::bail!("server.request_body_limit_bytes must be non-zero");
        }
        let mut codes = self.bidders.iter().map(|b| b.code.as_str()).collect::<Vec<_>>();
        codes.sort();
        let before = codes.len();
        codes.dedup();
        if codes.len() != before {
            anyhow::bail!("duplicate bidder code in configuration");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_privacy_flags_enforce_everything() {
        let flags = PrivacyFlags::default();
        assert!(flags.pbs_enforce_gdpr);
        assert!(flags.pbs_anonymize_ip);
    }

    #[test]
    fn duplicate_bidder_codes_fail_validation() {
        let config = HbxConfig {
            bidders: vec![
                BidderConfig { code: "acme".into(), endpoint: "https://a".into(), gvl_id: None, sync_url: None },
                BidderConfig { code: "acme".into(), endpoint: "https://b".into(), gvl_id: None, sync_url: None },
            ],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_body_limit_fails_validation() {
        let config =
            HbxConfig { server: ServerConfig { request_body_limit_bytes: 0, ..Default::default() }, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn logging_config_rejects_bad_level() {
        let logging = LoggingConfig { level: "not-a-level".into(), ..LoggingConfig::default() };
        assert!(logging.validate().is_err());
    }
}
