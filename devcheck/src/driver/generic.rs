//! Generic driver implementation that works with any platform.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use regex::bytes::Regex;
use secrecy::SecretString;

use super::Driver;
use super::privilege::PrivilegeManager;
use super::response::Response;
use crate::channel::PtyChannel;
use crate::error::{DriverError, PlatformError, Result};
use crate::platform::{DefaultBehavior, PlatformDefinition, VendorBehavior};
use crate::transport::{AuthMethod, SshConfig, SshTransport};

/// Bytes from the end of the output searched for the prompt.
const SEARCH_DEPTH: usize = 1000;

/// Enable prompts re-asked before giving up on a wrong secret.
const MAX_SECRET_RETRIES: usize = 3;

/// An open SSH connection plus its shell channel.
struct Session {
    transport: SshTransport,
    channel: PtyChannel,
}

/// SSH driver that works with any platform definition.
///
/// Handles:
/// - SSH transport management
/// - Command execution with prompt detection
/// - Privilege level navigation, including the enable secret
/// - Vendor-specific output normalization
pub struct GenericDriver {
    ssh_config: SshConfig,
    enable_secret: Option<SecretString>,
    platform: PlatformDefinition,
    behavior: Arc<dyn VendorBehavior>,
    session: Option<Session>,
    privilege_manager: PrivilegeManager,

    /// Read timeout for each command.
    timeout: Duration,

    /// Matches the prompt of any privilege level.
    prompt_pattern: Regex,
}

impl GenericDriver {
    /// Create a new generic driver. Nothing is connected until [`Driver::open`].
    pub fn new(
        ssh_config: SshConfig,
        enable_secret: Option<SecretString>,
        platform: PlatformDefinition,
        timeout: Duration,
    ) -> Result<Self> {
        let privilege_manager = PrivilegeManager::new(platform.privilege_levels.clone());
        let behavior: Arc<dyn VendorBehavior> = Arc::new(DefaultBehavior);
        let prompt_pattern = Self::build_combined_pattern(&platform)?;

        Ok(Self {
            ssh_config,
            enable_secret,
            platform,
            behavior,
            session: None,
            privilege_manager,
            timeout,
            prompt_pattern,
        })
    }

    /// Build a combined regex pattern that matches any privilege level's prompt.
    fn build_combined_pattern(platform: &PlatformDefinition) -> Result<Regex> {
        if platform.privilege_levels.is_empty() {
            return Err(PlatformError::InvalidDefinition {
                message: format!("platform '{}' has no privilege levels", platform.name),
            }
            .into());
        }

        let combined = platform
            .privilege_levels
            .values()
            .map(|level| format!("(?:{})", level.pattern.as_str()))
            .collect::<Vec<_>>()
            .join("|");

        Regex::new(&combined).map_err(|e| {
            PlatformError::InvalidDefinition {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Get a reference to the platform definition.
    pub fn platform(&self) -> &PlatformDefinition {
        &self.platform
    }

    /// Everything in `open()` after the transport is up.
    async fn start_shell(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or(DriverError::NotConnected)?;
        let banner = session
            .channel
            .read_until(&self.prompt_pattern, self.timeout)
            .await?;

        let host = &self.ssh_config.host;
        match self.privilege_manager.observe_prompt(&banner.prompt) {
            Some(level) => debug!("{}: initial prompt {:?} ({})", host, banner.prompt, level),
            None => warn!("{}: unrecognised prompt {:?}", host, banner.prompt),
        }

        for command in self.platform.on_open_commands.clone() {
            let response = self.send_command(&command).await?;
            if !response.is_success() {
                debug!("{}: '{}' rejected by device", self.ssh_config.host, command);
            }
        }

        Ok(())
    }
}

impl Driver for GenericDriver {
    async fn open(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(DriverError::AlreadyConnected.into());
        }

        let transport = SshTransport::connect(&self.ssh_config).await?;
        let channel = match transport.open_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                let _ = transport.close().await;
                return Err(e);
            }
        };

        self.session = Some(Session {
            transport,
            channel: PtyChannel::new(channel, SEARCH_DEPTH),
        });

        if let Err(e) = self.start_shell().await {
            if let Err(close_err) = self.close().await {
                debug!("{}: close after failed open: {}", self.ssh_config.host, close_err);
            }
            return Err(e);
        }

        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.channel.close().await {
                debug!("{}: channel close: {}", self.ssh_config.host, e);
            }
            session.transport.close().await?;
        }
        Ok(())
    }

    async fn find_prompt(&mut self) -> Result<String> {
        let session = self.session.as_mut().ok_or(DriverError::NotConnected)?;
        session.channel.clear_buffer();
        session.channel.send("").await?;
        let read = session
            .channel
            .read_until(&self.prompt_pattern, self.timeout)
            .await?;

        self.privilege_manager.observe_prompt(&read.prompt);
        Ok(read.prompt)
    }

    async fn send_command(&mut self, command: &str) -> Result<Response> {
        let session = self.session.as_mut().ok_or(DriverError::NotConnected)?;
        let start = Instant::now();

        session.channel.send(command).await?;
        let read = session
            .channel
            .read_until(&self.prompt_pattern, self.timeout)
            .await?;
        let elapsed = start.elapsed();

        self.privilege_manager.observe_prompt(&read.prompt);

        let result = self.behavior.normalize_output(&read.as_str(), command);
        let failure = self.behavior.detect_failure(&result).or_else(|| {
            self.platform
                .failed_when_contains
                .iter()
                .find(|pattern| result.contains(pattern.as_str()))
                .cloned()
        });

        let response = Response::new(command, result, read.prompt, elapsed);
        Ok(match failure {
            Some(message) => response.with_failure(message),
            None => response,
        })
    }

    async fn send_config(&mut self, commands: &[String]) -> Result<Vec<Response>> {
        let previous = self.privilege_manager.current().map(str::to_string);
        let configuration = self.platform.configuration_privilege.clone();

        self.acquire_privilege(&configuration).await?;

        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            responses.push(self.send_command(command).await?);
        }

        if let Some(previous) = previous {
            self.acquire_privilege(&previous).await?;
        }

        Ok(responses)
    }

    async fn acquire_privilege(&mut self, target: &str) -> Result<()> {
        if self.privilege_manager.current() == Some(target) {
            return Ok(());
        }

        for hop in self.privilege_manager.plan(target)? {
            debug!("{}: '{}' -> {}", self.ssh_config.host, hop.command, hop.target);
            // The enable secret, else the login password
            let secret = self.enable_secret.as_ref().or(match &self.ssh_config.auth {
                AuthMethod::Password(password) => Some(password),
                AuthMethod::None => None,
            });
            let session = self.session.as_mut().ok_or(DriverError::NotConnected)?;
            session.channel.send(&hop.command).await?;

            let read = match &hop.auth_prompt {
                Some(auth) => {
                    // Devices without an enable secret skip the password prompt
                    let either = Regex::new(&format!(
                        "(?:{})|(?:{})",
                        auth.as_str(),
                        self.prompt_pattern.as_str()
                    ))
                    .map_err(|e| DriverError::InvalidConfig {
                        message: e.to_string(),
                    })?;

                    let mut read = session.channel.read_until(&either, self.timeout).await?;
                    let mut attempts = 0;
                    while auth.is_match(read.prompt.as_bytes()) {
                        if attempts == 0 {
                            match secret {
                                Some(secret) => session.channel.send_secret(secret).await?,
                                None => session.channel.send("").await?,
                            }
                        } else if attempts > MAX_SECRET_RETRIES {
                            break;
                        } else {
                            session.channel.send("").await?;
                        }
                        attempts += 1;
                        read = session.channel.read_until(&either, self.timeout).await?;
                    }
                    read
                }
                None => {
                    session
                        .channel
                        .read_until(&self.prompt_pattern, self.timeout)
                        .await?
                }
            };

            let reached = self.privilege_manager.observe_prompt(&read.prompt);
            if reached != Some(hop.target.as_str()) {
                return Err(DriverError::PrivilegeAcquisitionFailed {
                    target: target.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    fn default_privilege(&self) -> &str {
        &self.platform.default_privilege
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn current_privilege(&self) -> Option<&str> {
        self.privilege_manager.current()
    }
}
