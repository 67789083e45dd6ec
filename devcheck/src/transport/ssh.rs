//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use russh::Channel;
use russh::client::{self, Handle, Msg};
use russh::keys::{HashAlg, PublicKey};
use secrecy::ExposeSecret;

use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::error::{Result, TransportError};

/// An authenticated SSH connection to one device.
pub struct SshTransport {
    session: Handle<SshHandler>,
    terminal_width: u32,
    terminal_height: u32,
    peer: String,
}

impl SshTransport {
    /// Connect to the device and authenticate.
    ///
    /// The whole handshake (TCP connect, key exchange, authentication) is
    /// bounded by `config.connect_timeout`.
    pub async fn connect(config: &SshConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(config.connect_timeout),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification,
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("Connecting to {}", config.socket_addr());

        let handshake = async {
            let mut session =
                client::connect(ssh_config, (config.host.as_str(), config.port), handler)
                    .await
                    .map_err(|e| {
                        // Prefer the detailed host key error over russh's generic UnknownKey
                        host_key_error
                            .lock()
                            .ok()
                            .and_then(|mut slot| slot.take())
                            .unwrap_or(TransportError::Ssh(e))
                    })?;
            Self::authenticate(&mut session, config).await?;
            Ok::<_, crate::Error>(session)
        };

        let session = tokio::time::timeout(config.connect_timeout, handshake)
            .await
            .map_err(|_| TransportError::Timeout(config.connect_timeout))??;

        info!("Authenticated to {} as '{}'", config.socket_addr(), config.username);

        Ok(Self {
            session,
            terminal_width: config.terminal_width,
            terminal_height: config.terminal_height,
            peer: config.socket_addr(),
        })
    }

    /// Open a PTY shell channel on this connection.
    pub async fn open_channel(&self) -> Result<Channel<Msg>> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "vt100",
                self.terminal_width,
                self.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(channel)
    }

    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::None => session
                .authenticate_none(&config.username)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        debug!("Disconnecting from {}", self.peer);
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Detailed host key failure, surfaced by connect() in place of
    /// russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> std::result::Result<bool, TransportError> {
        let result = match &self.known_hosts_path {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, pubkey),
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = match &self.known_hosts_path {
            Some(path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey),
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let accepted = match self.host_key_verification {
            HostKeyVerification::Disabled => true,

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => {
                    info!(
                        "Learning host key for {}:{} ({})",
                        self.host,
                        self.port,
                        server_public_key.fingerprint(HashAlg::Sha256)
                    );
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    true
                }
                Err(e) => self.reject(e),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                }),
                Err(e) => self.reject(e),
            },
        };

        Ok(accepted)
    }
}
