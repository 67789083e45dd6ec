//! SSH connection configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For lab use only.
    Disabled,
}

/// SSH connection configuration for one device.
#[derive(Debug)]
pub struct SshConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port (default: 22).
    pub port: u16,

    /// Username for authentication.
    pub username: String,

    /// Authentication method.
    pub auth: AuthMethod,

    /// Timeout for TCP connect, key exchange and authentication.
    pub connect_timeout: Duration,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file. `None` uses the user's default file.
    pub known_hosts_path: Option<PathBuf>,
}

impl SshConfig {
    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Authentication method for SSH connections.
///
/// Network gear in this workflow authenticates with passwords only.
#[derive(Debug)]
pub enum AuthMethod {
    /// No authentication (for testing only).
    None,

    /// Password authentication.
    Password(SecretString),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = SshConfig {
            host: "10.0.0.1".to_string(),
            port: 2222,
            username: "admin".to_string(),
            auth: AuthMethod::Password(SecretString::from("hunter2".to_string())),
            connect_timeout: Duration::from_secs(10),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::Disabled,
            known_hosts_path: None,
        };
        assert_eq!(config.socket_addr(), "10.0.0.1:2222");
    }

    #[test]
    fn test_password_is_redacted_in_debug() {
        let auth = AuthMethod::Password(SecretString::from("hunter2".to_string()));
        assert!(!format!("{auth:?}").contains("hunter2"));
    }

    #[test]
    fn test_host_key_verification_from_json() {
        let mode: HostKeyVerification = serde_json::from_str("\"accept_new\"").unwrap();
        assert_eq!(mode, HostKeyVerification::AcceptNew);
        let mode: HostKeyVerification = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(mode, HostKeyVerification::Strict);
    }
}
