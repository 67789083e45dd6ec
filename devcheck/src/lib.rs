//! # devcheck
//!
//! Concurrent backup and audit of Cisco IOS device fleets over SSH.
//!
//! For every device in an inventory, devcheck opens an SSH session, saves
//! the running configuration, reads the software version, CDP neighbors and
//! NTP status, and pushes a shared baseline of a timezone directive plus the
//! NTP servers that answered a probe at the start of the run.
//!
//! ## Layers
//!
//! - [`transport`], [`channel`], [`driver`], [`platform`]: async SSH CLI
//!   scraping with prompt detection and privilege navigation
//! - [`ntp`]: SNTP reachability probe and the [`ConfigBaseline`]
//! - [`extract`]: TextFSM extraction of show command output
//! - [`backup`]: timestamped running-configuration files
//! - [`session`]: the per-device workflow
//! - [`fleet`]: bounded concurrent dispatch over the inventory
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use devcheck::{AuditConfig, BackupWriter, Extractor, FleetOrchestrator, SshConnector};
//! use devcheck::platform::PlatformRegistry;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuditConfig::default();
//! let devices = devcheck::inventory::load("devices.txt".as_ref())?;
//!
//! let orchestrator = FleetOrchestrator::new(
//!     SshConnector::new(PlatformRegistry::with_builtins(), config.clone()),
//!     Extractor::builtin()?,
//!     BackupWriter::new("backups"),
//!     config,
//! );
//!
//! for result in orchestrator.run(devices).await {
//!     println!("{result}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod fleet;
pub mod inventory;
pub mod ntp;
pub mod platform;
pub mod report;
pub mod session;
pub mod transport;

pub use backup::{BackupArtifact, BackupWriter, RunTimestamp};
pub use config::AuditConfig;
pub use driver::{Driver, DriverBuilder, GenericDriver, Response};
pub use error::{DeviceError, Error};
pub use extract::{Extractor, Record, TemplateKind};
pub use fleet::{CancelHandle, Connector, FleetOrchestrator, SshConnector};
pub use inventory::DeviceDescriptor;
pub use ntp::{ConfigBaseline, NtpProbe, NtpProber};
pub use report::{
    DeviceAuditRecord, DeviceFailure, DeviceReport, Edition, RunResult, RunSummary, Stage,
    StageIssue,
};
pub use session::{DeviceSession, RunContext};
