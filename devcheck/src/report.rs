//! Per-device outcomes and the run report.

use std::fmt;
use std::path::PathBuf;

use crate::backup::RunTimestamp;
use crate::error::DeviceError;
use crate::session::SessionState;

/// Hardware edition reported by `show version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edition {
    /// Payload encryption
    Pe,
    /// No payload encryption
    Npe,
}

impl Edition {
    pub fn from_version_text(raw: &str) -> Self {
        if raw.contains("NPE") {
            Edition::Npe
        } else {
            Edition::Pe
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edition::Pe => f.write_str("PE"),
            Edition::Npe => f.write_str("NPE"),
        }
    }
}

/// Step of the per-device workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    Identify,
    Escalate,
    Collect,
    Configure,
    Backup,
    Dispatch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connect => "connect",
            Stage::Identify => "identify",
            Stage::Escalate => "escalate",
            Stage::Collect => "collect",
            Stage::Configure => "configure",
            Stage::Backup => "backup",
            Stage::Dispatch => "dispatch",
        };
        f.write_str(name)
    }
}

/// Observed state of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAuditRecord {
    pub hostname: String,
    pub timestamp: RunTimestamp,
    pub version: Option<String>,
    pub edition: Edition,
    /// `None` when `show cdp neighbors` gave nothing usable.
    pub cdp_enabled: Option<bool>,
    pub cdp_neighbors: usize,
    pub ntp_synced: bool,

    pub hardware: Option<String>,
    pub serial: Option<String>,
    pub uptime: Option<String>,
    pub running_image: Option<String>,
    pub ntp_stratum: Option<u8>,
    pub ntp_reference: Option<String>,
}

impl DeviceAuditRecord {
    /// Record with every observed field at its unknown value.
    pub fn new(hostname: impl Into<String>, timestamp: RunTimestamp) -> Self {
        Self {
            hostname: hostname.into(),
            timestamp,
            version: None,
            edition: Edition::Pe,
            cdp_enabled: None,
            cdp_neighbors: 0,
            ntp_synced: false,
            hardware: None,
            serial: None,
            uptime: None,
            running_image: None,
            ntp_stratum: None,
            ntp_reference: None,
        }
    }
}

/// A non-fatal problem hit while processing a device.
#[derive(Debug)]
pub struct StageIssue {
    pub stage: Stage,
    pub error: DeviceError,
}

impl fmt::Display for StageIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.error)
    }
}

/// A device that was audited, possibly with issues along the way.
#[derive(Debug)]
pub struct DeviceReport {
    pub address: String,
    pub audit: DeviceAuditRecord,
    pub backup: Option<PathBuf>,
    pub baseline_applied: bool,
    pub issues: Vec<StageIssue>,
}

impl DeviceReport {
    pub fn is_success(&self) -> bool {
        self.issues.is_empty()
    }
}

/// A device that could not be audited.
#[derive(Debug)]
pub struct DeviceFailure {
    pub address: String,
    pub hostname: Option<String>,
    pub stage: Stage,
    pub error: DeviceError,
    /// Furthest lifecycle state reached before the failure.
    pub reached: SessionState,
}

/// Outcome for one inventory entry.
#[derive(Debug)]
pub enum RunResult {
    Completed(DeviceReport),
    Failed(DeviceFailure),
}

impl RunResult {
    pub fn address(&self) -> &str {
        match self {
            RunResult::Completed(report) => &report.address,
            RunResult::Failed(failure) => &failure.address,
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        match self {
            RunResult::Completed(report) => Some(&report.audit.hostname),
            RunResult::Failed(failure) => failure.hostname.as_deref(),
        }
    }

    /// Completed without any issue.
    pub fn is_success(&self) -> bool {
        matches!(self, RunResult::Completed(report) if report.is_success())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunResult::Failed(_))
    }
}

/// One report line: `host|version|hardware|PE|CDP is ON,3 peers|Clock in Sync`
/// or `address|FAILED at <stage>: <error>`.
impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunResult::Completed(report) => {
                let audit = &report.audit;
                write!(
                    f,
                    "{}|{}|{}|{}|",
                    audit.hostname,
                    audit.version.as_deref().unwrap_or("unknown"),
                    audit.hardware.as_deref().unwrap_or("unknown"),
                    audit.edition,
                )?;
                match audit.cdp_enabled {
                    Some(true) => write!(f, "CDP is ON,{} peers|", audit.cdp_neighbors)?,
                    Some(false) => f.write_str("CDP is OFF,0 peers|")?,
                    None => f.write_str("CDP unknown|")?,
                }
                f.write_str(if audit.ntp_synced {
                    "Clock in Sync"
                } else {
                    "Clock not in Sync"
                })
            }
            RunResult::Failed(failure) => {
                write!(
                    f,
                    "{}|FAILED at {}: {}",
                    failure.address, failure.stage, failure.error
                )
            }
        }
    }
}

/// Counts over a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub with_issues: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_results(results: &[RunResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            summary.total += 1;
            match result {
                RunResult::Completed(report) if report.is_success() => summary.succeeded += 1,
                RunResult::Completed(_) => summary.with_issues += 1,
                RunResult::Failed(_) => summary.failed += 1,
            }
            summary
        })
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} devices: {} ok, {} with issues, {} failed",
            self.total, self.succeeded, self.with_issues, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::error::BackupError;

    fn timestamp() -> RunTimestamp {
        RunTimestamp::from_naive(
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        )
    }

    fn completed(issues: Vec<StageIssue>) -> RunResult {
        let mut audit = DeviceAuditRecord::new("R1", timestamp());
        audit.version = Some("15.5(3)S5".to_string());
        audit.hardware = Some("CSR1000V".to_string());
        audit.cdp_enabled = Some(true);
        audit.cdp_neighbors = 3;
        audit.ntp_synced = true;

        RunResult::Completed(DeviceReport {
            address: "10.0.0.1".to_string(),
            audit,
            backup: None,
            baseline_applied: true,
            issues,
        })
    }

    #[test]
    fn test_edition() {
        assert_eq!(
            Edition::from_version_text("Cisco IOS Software, C2951 Software (C2951-UNIVERSALK9_NPE-M)"),
            Edition::Npe
        );
        assert_eq!(
            Edition::from_version_text("Cisco IOS Software, C2951 Software (C2951-UNIVERSALK9-M)"),
            Edition::Pe
        );
    }

    #[test]
    fn test_completed_line() {
        assert_eq!(
            completed(Vec::new()).to_string(),
            "R1|15.5(3)S5|CSR1000V|PE|CDP is ON,3 peers|Clock in Sync"
        );
    }

    #[test]
    fn test_unknown_fields_line() {
        let result = RunResult::Completed(DeviceReport {
            address: "10.0.0.2".to_string(),
            audit: DeviceAuditRecord::new("R2", timestamp()),
            backup: None,
            baseline_applied: false,
            issues: Vec::new(),
        });
        assert_eq!(
            result.to_string(),
            "R2|unknown|unknown|PE|CDP unknown|Clock not in Sync"
        );
    }

    #[test]
    fn test_cdp_disabled_line() {
        let mut audit = DeviceAuditRecord::new("R3", timestamp());
        audit.cdp_enabled = Some(false);
        let result = RunResult::Completed(DeviceReport {
            address: "10.0.0.3".to_string(),
            audit,
            backup: None,
            baseline_applied: true,
            issues: Vec::new(),
        });
        assert_eq!(
            result.to_string(),
            "R3|unknown|unknown|PE|CDP is OFF,0 peers|Clock not in Sync"
        );
    }

    #[test]
    fn test_failed_line() {
        let result = RunResult::Failed(DeviceFailure {
            address: "10.0.0.9".to_string(),
            hostname: None,
            stage: Stage::Dispatch,
            error: DeviceError::Dispatch {
                detail: "cancelled before start".to_string(),
            },
            reached: SessionState::Disconnected,
        });
        assert_eq!(
            result.to_string(),
            "10.0.0.9|FAILED at dispatch: cancelled before start"
        );
        assert_eq!(result.address(), "10.0.0.9");
        assert!(result.is_failed());
    }

    #[test]
    fn test_summary() {
        let issue = StageIssue {
            stage: Stage::Backup,
            error: DeviceError::Backup(BackupError::InvalidHostname {
                hostname: String::new(),
            }),
        };
        let results = vec![
            completed(Vec::new()),
            completed(vec![issue]),
            RunResult::Failed(DeviceFailure {
                address: "10.0.0.3".to_string(),
                hostname: None,
                stage: Stage::Connect,
                error: DeviceError::Dispatch {
                    detail: "x".to_string(),
                },
                reached: SessionState::Disconnected,
            }),
        ];

        let summary = RunSummary::from_results(&results);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.with_issues, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.to_string(), "3 devices: 1 ok, 1 with issues, 1 failed");
    }
}
