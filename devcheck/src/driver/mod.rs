//! High-level driver for device interaction.
//!
//! The driver layer provides the API the audit session talks to: open a
//! shell, run show commands, move between privilege levels and push
//! configuration lines.

mod builder;
mod generic;
mod privilege;
mod response;

pub use builder::DriverBuilder;
pub use generic::GenericDriver;
pub use privilege::{PrivilegeManager, Transition};
pub use response::Response;

use std::future::Future;

use crate::error::Result;

/// Trait for device drivers.
///
/// [`GenericDriver`] is the SSH implementation; the audit session is
/// written against this trait so it can also run over scripted drivers.
pub trait Driver: Send {
    /// Open the connection to the device and wait for the first prompt.
    fn open(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Close the connection. Closing a closed driver is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Send an empty line and return the prompt the device answers with.
    fn find_prompt(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// Send a command and wait for the prompt.
    fn send_command(&mut self, command: &str) -> impl Future<Output = Result<Response>> + Send;

    /// Send lines in configuration mode.
    ///
    /// This method:
    /// 1. Acquires the configuration privilege level
    /// 2. Sends all the provided lines
    /// 3. Returns to the privilege level it started from
    fn send_config(
        &mut self,
        commands: &[String],
    ) -> impl Future<Output = Result<Vec<Response>>> + Send;

    /// Acquire a specific privilege level.
    fn acquire_privilege(&mut self, privilege: &str) -> impl Future<Output = Result<()>> + Send;

    /// Privilege level show commands are meant to run at.
    fn default_privilege(&self) -> &str;

    /// Check if the driver is connected.
    fn is_open(&self) -> bool;

    /// Get the current privilege level name.
    fn current_privilege(&self) -> Option<&str>;
}
