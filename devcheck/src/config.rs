//! Process-wide audit configuration.
//!
//! Defaults reproduce the fixed NTP candidate list and timezone directive.
//! A JSON file can override any subset of fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::transport::HostKeyVerification;

/// NTP servers probed at the start of every run.
pub const DEFAULT_NTP_SERVERS: [&str; 4] = [
    "37.193.156.169",
    "78.36.18.184",
    "89.221.207.113",
    "192.36.143.130",
];

/// First line of every configuration baseline.
pub const DEFAULT_TIMEZONE: &str = "clock timezone GMT 0 0";

/// Settings for one audit run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// NTP candidates, in the order their `ntp server` lines are pushed.
    pub ntp_candidates: Vec<String>,

    /// UDP port probed on each candidate.
    pub ntp_port: u16,

    /// How long to wait for each NTP reply.
    pub probe_timeout_ms: u64,

    /// Timezone directive that opens the baseline.
    pub timezone: String,

    /// Devices processed at the same time.
    pub concurrency: usize,

    pub connect_timeout_secs: u64,

    pub command_timeout_secs: u64,

    pub host_key_verification: HostKeyVerification,

    /// known_hosts file; the user's default when unset.
    pub known_hosts_path: Option<PathBuf>,

    /// Directory holding the TextFSM templates; bundled templates when unset.
    pub template_dir: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            ntp_candidates: DEFAULT_NTP_SERVERS.iter().map(|s| s.to_string()).collect(),
            ntp_port: 123,
            probe_timeout_ms: 1000,
            timezone: DEFAULT_TIMEZONE.to_string(),
            concurrency: 4,
            connect_timeout_secs: 15,
            command_timeout_secs: 30,
            host_key_verification: HostKeyVerification::AcceptNew,
            known_hosts_path: None,
            template_dir: None,
        }
    }
}

impl AuditConfig {
    /// Load overrides from a JSON file and validate the result.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the orchestrator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };

        if self.concurrency == 0 {
            return invalid("concurrency must be at least 1");
        }
        if self.probe_timeout_ms == 0 {
            return invalid("probe_timeout_ms must be positive");
        }
        if self.connect_timeout_secs == 0 || self.command_timeout_secs == 0 {
            return invalid("session timeouts must be positive");
        }
        if self.timezone.trim().is_empty() {
            return invalid("timezone directive is empty");
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
