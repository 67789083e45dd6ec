//! Builder for creating device drivers.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::generic::GenericDriver;
use crate::error::{DriverError, Result};
use crate::platform::PlatformRegistry;
use crate::transport::{AuthMethod, HostKeyVerification, SshConfig};

/// Builder for constructing device drivers.
///
/// # Example
///
/// ```rust,no_run
/// use devcheck::driver::{Driver, DriverBuilder};
/// use devcheck::platform::PlatformRegistry;
///
/// # async fn example() -> Result<(), devcheck::Error> {
/// let registry = PlatformRegistry::with_builtins();
/// let mut driver = DriverBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .enable_secret("enable")
///     .platform("cisco_ios")
///     .build(&registry)?;
/// driver.open().await?;
/// # Ok(())
/// # }
/// ```
pub struct DriverBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    enable_secret: Option<SecretString>,
    platform_name: Option<String>,
    connect_timeout: Duration,
    command_timeout: Duration,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
}

impl DriverBuilder {
    /// Create a new driver builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            auth: AuthMethod::None,
            enable_secret: None,
            platform_name: None,
            connect_timeout: Duration::from_secs(15),
            command_timeout: Duration::from_secs(30),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set the secret answered at the enable prompt.
    ///
    /// Without one, the login password is tried.
    pub fn enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Set the platform name (e.g., "cisco_ios").
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform_name = Some(platform.into());
        self
    }

    /// Bound on TCP connect, key exchange and authentication.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bound on each command's wait for the prompt.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Build the driver.
    ///
    /// This resolves the platform and validates the settings but does not
    /// connect. Call `open()` on the returned driver to establish the
    /// connection.
    pub fn build(self, registry: &PlatformRegistry) -> Result<GenericDriver> {
        let username = self.username.ok_or_else(|| DriverError::InvalidConfig {
            message: "username is required".to_string(),
        })?;

        let name = self.platform_name.ok_or_else(|| DriverError::InvalidConfig {
            message: "platform must be specified".to_string(),
        })?;
        let platform = registry.resolve(&name)?.clone();

        let ssh_config = SshConfig {
            host: self.host,
            port: self.port,
            username,
            auth: self.auth,
            connect_timeout: self.connect_timeout,
            terminal_width: platform.terminal_width,
            terminal_height: platform.terminal_height,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
        };

        GenericDriver::new(ssh_config, self.enable_secret, platform, self.command_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::driver::Driver;
    use crate::error::PlatformError;

    #[test]
    fn test_build_resolves_platform() {
        let registry = PlatformRegistry::with_builtins();
        let driver = DriverBuilder::new("10.0.0.1")
            .username("admin")
            .password("secret")
            .platform("cisco_xe")
            .build(&registry)
            .unwrap();

        assert_eq!(driver.platform().name, "cisco_xe");
        assert_eq!(driver.default_privilege(), "privilege_exec");
        assert!(!driver.is_open());
    }

    #[test]
    fn test_build_requires_username() {
        let registry = PlatformRegistry::with_builtins();
        let result = DriverBuilder::new("10.0.0.1")
            .platform("cisco_ios")
            .build(&registry);
        assert!(matches!(
            result,
            Err(Error::Driver(DriverError::InvalidConfig { .. }))
        ));
    }

    #[test]
    fn test_build_rejects_unknown_device_type() {
        let registry = PlatformRegistry::with_builtins();
        let result = DriverBuilder::new("10.0.0.1")
            .username("admin")
            .platform("cisco_ios_telnet")
            .build(&registry);
        assert!(matches!(
            result,
            Err(Error::Platform(PlatformError::UnknownPlatform { .. }))
        ));
    }

    #[tokio::test]
    async fn test_commands_require_open() {
        let registry = PlatformRegistry::with_builtins();
        let mut driver = DriverBuilder::new("10.0.0.1")
            .username("admin")
            .platform("cisco_ios")
            .build(&registry)
            .unwrap();

        let result = driver.send_command("show version").await;
        assert!(matches!(
            result,
            Err(Error::Driver(DriverError::NotConnected))
        ));
        assert!(driver.close().await.is_ok());
    }
}
