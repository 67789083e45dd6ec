//! Audit workflow for a single device.
//!
//! A [`DeviceSession`] walks one device through
//! `Disconnected -> Connected -> PrivilegeEscalated -> CommandsExecuting ->
//! ConfigPushed -> Disconnected`. Problems that leave the session usable are
//! recorded as issues and processing continues; a dead transport ends the
//! device at the current stage. Once the driver is open, it is always closed
//! again before the result is returned.

use std::path::PathBuf;

use log::{debug, error, info, warn};

use crate::backup::{BackupWriter, RunTimestamp};
use crate::driver::Driver;
use crate::error::{DeviceError, Error};
use crate::extract::{self, Extractor, Record, TemplateKind};
use crate::inventory::DeviceDescriptor;
use crate::ntp::ConfigBaseline;
use crate::report::{
    DeviceAuditRecord, DeviceFailure, DeviceReport, Edition, RunResult, Stage, StageIssue,
};

/// Command whose output is written to the backup.
pub const RUNNING_CONFIG_COMMAND: &str = "show running-config";

/// Inputs shared by every device in a run.
#[derive(Debug)]
pub struct RunContext {
    pub baseline: ConfigBaseline,
    pub extractor: Extractor,
    pub writer: BackupWriter,
    pub timestamp: RunTimestamp,
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    PrivilegeEscalated,
    CommandsExecuting,
    ConfigPushed,
}

/// Fatal outcome of a stage.
type Abort = (Stage, DeviceError);

/// One device's trip through the audit workflow.
pub struct DeviceSession<'a, D: Driver> {
    driver: D,
    device: &'a DeviceDescriptor,
    context: &'a RunContext,
    state: SessionState,
    hostname: Option<String>,
    issues: Vec<StageIssue>,
}

impl<'a, D: Driver> DeviceSession<'a, D> {
    pub fn new(driver: D, device: &'a DeviceDescriptor, context: &'a RunContext) -> Self {
        Self {
            driver,
            device,
            context,
            state: SessionState::Disconnected,
            hostname: None,
            issues: Vec::new(),
        }
    }

    /// Run the whole workflow and report the outcome.
    pub async fn run(mut self) -> RunResult {
        if let Err(e) = self.driver.open().await {
            error!("{}: connection failed: {}", self.device.address, e);
            return self.failed(Stage::Connect, DeviceError::Connection(e), self.state);
        }
        self.enter(SessionState::Connected);

        let outcome = self.process().await;
        let reached = self.state;
        self.disconnect().await;

        match outcome {
            Ok(report) => RunResult::Completed(report),
            Err((stage, e)) => {
                error!("{}: failed at {}: {}", self.device.address, stage, e);
                self.failed(stage, e, reached)
            }
        }
    }

    async fn process(&mut self) -> Result<DeviceReport, Abort> {
        let hostname = self.identify().await?;
        let escalated = self.escalate().await?;

        let mut audit = DeviceAuditRecord::new(hostname, self.context.timestamp.clone());
        self.enter(SessionState::CommandsExecuting);
        let backup = self.collect(&mut audit).await?;

        let baseline_applied = if escalated {
            self.configure().await
        } else {
            self.issue(
                Stage::Configure,
                DeviceError::ConfigPush {
                    detail: "skipped without privileged access".to_string(),
                },
            );
            false
        };

        info!(
            "{}: audit complete ({} issues)",
            audit.hostname,
            self.issues.len()
        );
        Ok(DeviceReport {
            address: self.device.address.clone(),
            audit,
            backup,
            baseline_applied,
            issues: std::mem::take(&mut self.issues),
        })
    }

    async fn identify(&mut self) -> Result<String, Abort> {
        let prompt = self
            .driver
            .find_prompt()
            .await
            .map_err(|e| (Stage::Identify, lost_or_command(e, "<prompt>")))?;

        let hostname = hostname_from_prompt(&prompt);
        if hostname.is_empty() {
            return Err((
                Stage::Identify,
                DeviceError::Command {
                    command: "<prompt>".to_string(),
                    detail: format!("no hostname in prompt {prompt:?}"),
                },
            ));
        }

        info!("{}: connected to {}", self.device.address, hostname);
        self.hostname = Some(hostname.clone());
        Ok(hostname)
    }

    /// True when the default privilege level was reached.
    async fn escalate(&mut self) -> Result<bool, Abort> {
        let target = self.driver.default_privilege().to_string();
        match self.driver.acquire_privilege(&target).await {
            Ok(()) => {
                debug!(
                    "{}: now at {}",
                    self.device.address,
                    self.driver.current_privilege().unwrap_or(&target)
                );
                self.enter(SessionState::PrivilegeEscalated);
                Ok(true)
            }
            Err(e) if e.is_session_lost() => Err((Stage::Escalate, DeviceError::Lost(e))),
            Err(e) => {
                self.issue(Stage::Escalate, DeviceError::Privilege(e));
                Ok(false)
            }
        }
    }

    /// Back up the running configuration, then fill in the audit record.
    async fn collect(
        &mut self,
        audit: &mut DeviceAuditRecord,
    ) -> Result<Option<PathBuf>, Abort> {
        let context = self.context;
        let backup = match self.show(RUNNING_CONFIG_COMMAND).await? {
            Some(config) => match context
                .writer
                .write(&audit.hostname, &audit.timestamp, config)
                .await
            {
                Ok(artifact) => {
                    info!("{}: backup written to {}", audit.hostname, artifact.path.display());
                    Some(artifact.path)
                }
                Err(e) => {
                    self.issue(Stage::Backup, e.into());
                    None
                }
            },
            None => None,
        };

        let command = TemplateKind::CdpNeighbors.command();
        if let Some(raw) = self.show(command).await? {
            let enabled = extract::cdp_enabled(&raw);
            if enabled {
                audit.cdp_neighbors = self.extract(TemplateKind::CdpNeighbors, &raw).len();
            }
            audit.cdp_enabled = Some(enabled);
        }

        let command = TemplateKind::Version.command();
        if let Some(raw) = self.show(command).await? {
            audit.edition = Edition::from_version_text(&raw);
            if let Some(mut version) = self.extract(TemplateKind::Version, &raw).into_iter().next()
            {
                audit.version = take_field(&mut version, "version");
                audit.hardware = take_field(&mut version, "hardware");
                audit.serial = take_field(&mut version, "serial");
                audit.uptime = take_field(&mut version, "uptime");
                audit.running_image = take_field(&mut version, "running_image");
            }
        }

        let command = TemplateKind::NtpStatus.command();
        if let Some(raw) = self.show(command).await? {
            audit.ntp_synced = extract::ntp_synchronized(&raw);
            if let Some(mut status) = self.extract(TemplateKind::NtpStatus, &raw).into_iter().next()
            {
                audit.ntp_stratum = take_field(&mut status, "stratum").and_then(|s| s.parse().ok());
                audit.ntp_reference = take_field(&mut status, "reference");
            }
        }

        Ok(backup)
    }

    /// True when every baseline line was accepted.
    async fn configure(&mut self) -> bool {
        let context = self.context;
        let commands = context.baseline.commands();
        match self.driver.send_config(commands).await {
            Ok(responses) => {
                let rejected: Vec<String> = responses
                    .iter()
                    .filter(|response| !response.is_success())
                    .map(|response| {
                        format!(
                            "'{}': {}",
                            response.command,
                            response.failure_message.as_deref().unwrap_or_default()
                        )
                    })
                    .collect();

                if rejected.is_empty() {
                    self.enter(SessionState::ConfigPushed);
                    info!(
                        "{}: baseline applied ({} lines)",
                        self.device.address,
                        commands.len()
                    );
                    true
                } else {
                    self.issue(
                        Stage::Configure,
                        DeviceError::ConfigPush {
                            detail: rejected.join("; "),
                        },
                    );
                    false
                }
            }
            Err(e) => {
                self.issue(
                    Stage::Configure,
                    DeviceError::ConfigPush {
                        detail: e.to_string(),
                    },
                );
                false
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.driver.close().await {
            warn!("{}: disconnect failed: {}", self.device.address, e);
        }
        self.enter(SessionState::Disconnected);
    }

    /// Run a show command. `None` means the output is unusable and an issue
    /// was recorded.
    async fn show(&mut self, command: &str) -> Result<Option<String>, Abort> {
        let response = match self.driver.send_command(command).await {
            Ok(response) => response,
            Err(e) if e.is_session_lost() => return Err((Stage::Collect, DeviceError::Lost(e))),
            Err(e) => {
                self.issue(
                    Stage::Collect,
                    DeviceError::Command {
                        command: command.to_string(),
                        detail: e.to_string(),
                    },
                );
                return Ok(None);
            }
        };

        if let Some(message) = &response.failure_message {
            self.issue(
                Stage::Collect,
                DeviceError::Command {
                    command: command.to_string(),
                    detail: message.clone(),
                },
            );
            return Ok(None);
        }
        if response.is_blank() {
            self.issue(
                Stage::Collect,
                DeviceError::Command {
                    command: command.to_string(),
                    detail: "empty output".to_string(),
                },
            );
            return Ok(None);
        }

        Ok(Some(response.result))
    }

    fn extract(&self, kind: TemplateKind, raw: &str) -> Vec<Record> {
        self.context.extractor.extract(kind, raw)
    }

    fn enter(&mut self, next: SessionState) {
        debug!("{}: {:?} -> {:?}", self.device.address, self.state, next);
        self.state = next;
    }

    fn issue(&mut self, stage: Stage, error: DeviceError) {
        warn!("{}: {} issue: {}", self.device.address, stage, error);
        self.issues.push(StageIssue { stage, error });
    }

    fn failed(&self, stage: Stage, error: DeviceError, reached: SessionState) -> RunResult {
        RunResult::Failed(DeviceFailure {
            address: self.device.address.clone(),
            hostname: self.hostname.clone(),
            stage,
            error,
            reached,
        })
    }
}

/// Hostname shown in a CLI prompt: `R1#`, `R1>` and `R1(config-if)#` all
/// give `R1`.
pub fn hostname_from_prompt(prompt: &str) -> String {
    let prompt = prompt.trim();
    let prompt = prompt
        .strip_suffix('#')
        .or_else(|| prompt.strip_suffix('>'))
        .unwrap_or(prompt);
    let prompt = match prompt.find("(conf") {
        Some(start) if prompt.ends_with(')') => &prompt[..start],
        _ => prompt,
    };
    prompt.trim().to_string()
}

fn lost_or_command(e: Error, command: &str) -> DeviceError {
    if e.is_session_lost() {
        DeviceError::Lost(e)
    } else {
        DeviceError::Command {
            command: command.to_string(),
            detail: e.to_string(),
        }
    }
}

fn take_field(record: &mut Record, field: &str) -> Option<String> {
    record.remove(field).filter(|value| !value.is_empty())
}
