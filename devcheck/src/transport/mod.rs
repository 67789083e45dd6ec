//! SSH transport layer wrapping russh.
//!
//! Connection setup, host key verification, password authentication and
//! PTY shell creation for a single device.

pub mod config;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use ssh::SshTransport;
