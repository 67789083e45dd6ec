//! Error types for devcheck.
//!
//! The SSH session stack (transport, channel, driver, platform) reports
//! through [`Error`]. The audit workflow has its own enums, and everything a
//! single device can run into is folded into [`DeviceError`] at the task
//! boundary.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Error type for the SSH session stack.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Driver-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Platform/vendor errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl Error {
    /// Whether the underlying SSH session can no longer be used.
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::Channel(ChannelError::Closed)
                | Error::Channel(ChannelError::PatternTimeout(_))
                | Error::Channel(ChannelError::Ssh(_))
                | Error::Driver(DriverError::NotConnected)
        )
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host is not present in known_hosts and verification is strict
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Channel layer errors (pattern matching, PTY operations).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Pattern matching timed out
    #[error("Pattern not found within {0:?}")]
    PatternTimeout(Duration),

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    Closed,

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),
}

/// Driver layer errors (command execution, privilege escalation).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Driver not connected
    #[error("Driver not connected - call open() first")]
    NotConnected,

    /// Driver already connected
    #[error("Driver already connected")]
    AlreadyConnected,

    /// Failed to acquire target privilege level
    #[error("Failed to acquire privilege level '{target}'")]
    PrivilegeAcquisitionFailed { target: String },

    /// Invalid configuration in the driver builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Unknown privilege level detected
    #[error("Unknown privilege level from prompt: '{prompt}'")]
    UnknownPrivilege { prompt: String },

    /// No path found between privilege levels
    #[error("No path from privilege '{from}' to '{to}'")]
    NoPrivilegePath { from: String, to: String },
}

/// Platform/vendor definition errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Invalid platform definition
    #[error("Invalid platform definition: {message}")]
    InvalidDefinition { message: String },

    /// No platform registered under this protocol type
    #[error("Unsupported device type '{name}'")]
    UnknownPlatform { name: String },

    /// A platform with this name is already registered
    #[error("Platform '{name}' is already registered")]
    AlreadyRegistered { name: String },
}

/// Why a single NTP probe did not succeed.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Candidate did not resolve to any address
    #[error("could not resolve '{server}'")]
    Resolve { server: String },

    /// Socket level failure (bind, send, receive)
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    /// No reply before the deadline
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// Reply too short to be an NTP packet
    #[error("reply of {0} bytes is not an NTP packet")]
    Truncated(usize),

    /// Reply was not sent in server or broadcast mode
    #[error("reply has unexpected mode {0}")]
    UnexpectedMode(u8),
}

/// Template store errors, fatal at start-up.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Template file could not be read
    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Template text did not compile
    #[error("invalid {kind} template: {message}")]
    Template { kind: &'static str, message: String },
}

/// Backup persistence errors.
#[derive(Error, Debug)]
pub enum BackupError {
    /// Hostname cannot be used as a path component
    #[error("hostname '{hostname}' cannot be used as a backup directory")]
    InvalidHostname { hostname: String },

    /// Backup directory could not be created
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Backup file could not be written or moved into place
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Inventory file errors.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Inventory file could not be read
    #[error("failed to read inventory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Inventory has no header row
    #[error("inventory is empty")]
    Empty,

    /// Required column absent from the header
    #[error("inventory header has no '{column}' column")]
    MissingColumn { column: &'static str },

    /// Row field count differs from the header
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// A quoted field is not closed before the end of the line
    #[error("line {line}: unterminated quoted field")]
    UnterminatedQuote { line: usize },

    /// Port column is not a valid port number
    #[error("line {line}: invalid port '{value}'")]
    InvalidPort { line: usize, value: String },
}

/// Process configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration file is not valid JSON for [`AuditConfig`](crate::config::AuditConfig)
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range
    #[error("invalid config: {message}")]
    Invalid { message: String },
}

/// Everything that can go wrong while processing one device.
///
/// These never leave the device's task: the orchestrator turns each of them
/// into a [`RunResult`](crate::report::RunResult) entry.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Device unreachable, authentication failed, or unsupported type
    #[error("connection failed: {0}")]
    Connection(#[source] Error),

    /// Could not enter privileged mode
    #[error("privilege escalation failed: {0}")]
    Privilege(#[source] Error),

    /// A show command returned nothing usable
    #[error("command '{command}' returned no usable output: {detail}")]
    Command { command: String, detail: String },

    /// The baseline push did not apply cleanly
    #[error("configuration push failed: {detail}")]
    ConfigPush { detail: String },

    /// The running configuration could not be persisted
    #[error("backup failed: {0}")]
    Backup(#[from] BackupError),

    /// The session died after it was established
    #[error("session lost: {0}")]
    Lost(#[source] Error),

    /// The device task never ran to completion
    #[error("{detail}")]
    Dispatch { detail: String },
}

/// Result type alias for the session stack.
pub type Result<T> = std::result::Result<T, Error>;
