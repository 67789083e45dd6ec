//! Structured extraction of show command output.
//!
//! Each [`TemplateKind`] has one TextFSM template. Output that does not
//! match yields no records; only a bad template is an error, and that is
//! caught when the templates are loaded.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use log::debug;
use textfsm_rust::Template;

use crate::error::ExtractError;

/// One extracted row, keyed by lower-case field name.
pub type Record = BTreeMap<String, String>;

/// Marker printed by `show cdp neighbors` when CDP is off.
pub const CDP_DISABLED_MARKER: &str = "CDP is not enabled";

/// Markers in `show ntp status` output meaning the clock is not in sync.
pub const NTP_UNSYNCED_MARKERS: [&str; 2] = ["Clock is unsynchronized", "NTP is not enabled"];

/// The commands whose output is extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    CdpNeighbors,
    Version,
    NtpStatus,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 3] = [Self::CdpNeighbors, Self::Version, Self::NtpStatus];

    /// Command whose output this template parses.
    pub fn command(self) -> &'static str {
        match self {
            Self::CdpNeighbors => "show cdp neighbors",
            Self::Version => "show version",
            Self::NtpStatus => "show ntp status",
        }
    }

    /// File name of the template in a template directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::CdpNeighbors => "cisco_ios_show_cdp_neighbors.textfsm",
            Self::Version => "cisco_ios_show_version.textfsm",
            Self::NtpStatus => "cisco_ios_show_ntp_status.textfsm",
        }
    }

    fn bundled(self) -> &'static str {
        match self {
            Self::CdpNeighbors => {
                include_str!("../templates/cisco_ios_show_cdp_neighbors.textfsm")
            }
            Self::Version => include_str!("../templates/cisco_ios_show_version.textfsm"),
            Self::NtpStatus => include_str!("../templates/cisco_ios_show_ntp_status.textfsm"),
        }
    }
}

/// Validated templates for every [`TemplateKind`].
#[derive(Debug, Clone)]
pub struct Extractor {
    templates: HashMap<TemplateKind, String>,
}

impl Extractor {
    /// Load templates from `dir`, failing on a missing or invalid one.
    pub fn load(dir: &Path) -> Result<Self, ExtractError> {
        let mut templates = HashMap::new();
        for kind in TemplateKind::ALL {
            let path = dir.join(kind.file_name());
            let source =
                std::fs::read_to_string(&path).map_err(|source| ExtractError::Io { path, source })?;
            templates.insert(kind, source);
        }
        Self::from_sources(templates)
    }

    /// The templates shipped with the crate.
    pub fn builtin() -> Result<Self, ExtractError> {
        let templates = TemplateKind::ALL
            .into_iter()
            .map(|kind| (kind, kind.bundled().to_string()))
            .collect();
        Self::from_sources(templates)
    }

    fn from_sources(templates: HashMap<TemplateKind, String>) -> Result<Self, ExtractError> {
        for (kind, source) in &templates {
            Template::parse_str(source).map_err(|e| ExtractError::Template {
                kind: kind.file_name(),
                message: e.to_string(),
            })?;
        }
        Ok(Self { templates })
    }

    /// Parse `raw` with the template for `kind`.
    ///
    /// Rows whose fields are all empty are dropped.
    pub fn extract(&self, kind: TemplateKind, raw: &str) -> Vec<Record> {
        let Some(source) = self.templates.get(&kind) else {
            return Vec::new();
        };

        match parse(source, raw) {
            Ok(rows) => rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|(field, value)| (field.to_lowercase(), value))
                        .collect::<Record>()
                })
                .filter(|record| record.values().any(|value| !value.is_empty()))
                .collect(),
            Err(message) => {
                debug!("{} output not parsed: {}", kind.command(), message);
                Vec::new()
            }
        }
    }
}

fn parse(source: &str, raw: &str) -> Result<Vec<HashMap<String, String>>, String> {
    let template = Template::parse_str(source).map_err(|e| e.to_string())?;
    let mut parser = template.parser();
    parser.parse_text_to_dicts(raw).map_err(|e| e.to_string())
}

/// Whether CDP is running, judged from `show cdp neighbors` output.
pub fn cdp_enabled(raw: &str) -> bool {
    !raw.contains(CDP_DISABLED_MARKER)
}

/// Whether the clock is NTP synchronized, judged from `show ntp status` output.
pub fn ntp_synchronized(raw: &str) -> bool {
    !raw.trim().is_empty() && !NTP_UNSYNCED_MARKERS.iter().any(|marker| raw.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CDP_OUTPUT: &str = "\
Capability Codes: R - Router, T - Trans Bridge, B - Source Route Bridge
                  S - Switch, H - Host, I - IGMP, r - Repeater, P - Phone,
                  D - Remote, C - CVTA, M - Two-port Mac Relay

Device ID        Local Intrfce     Holdtme    Capability  Platform  Port ID
R2               Gig 0/0           156              R B   CSR1000V  Gig 0/0
SW1              Gig 0/1           170              S I   WS-C3750  Gig 1/0/1
R3               Gig 0/2           141              R B   CSR1000V  Gig 0/3

Total cdp entries displayed : 3
";

    const VERSION_OUTPUT: &str = "\
Cisco IOS Software, CSR1000V Software (X86_64_LINUX_IOSD-UNIVERSALK9-M), Version 15.5(3)S5, RELEASE SOFTWARE (fc2)
Technical Support: http://www.cisco.com/techsupport
Copyright (c) 1986-2017 by Cisco Systems, Inc.

R1 uptime is 1 hour, 12 minutes
System returned to ROM by reload
System image file is \"bootflash:packages.conf\"

cisco CSR1000V (VXE) processor (revision VXE) with 2190795K/3075K bytes of memory.
Processor board ID 9KIBQAQ3OPE
3 Gigabit Ethernet interfaces

Configuration register is 0x2102
";

    fn extractor() -> Extractor {
        Extractor::builtin().unwrap()
    }

    #[test]
    fn test_cdp_neighbors() {
        let records = extractor().extract(TemplateKind::CdpNeighbors, CDP_OUTPUT);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["neighbor_name"], "R2");
        assert_eq!(records[1]["neighbor_name"], "SW1");
        assert_eq!(records[2]["platform"], "CSR1000V");
    }

    #[test]
    fn test_no_cdp_neighbors() {
        let raw = "Device ID        Local Intrfce     Holdtme    Capability  Platform  Port ID\n\nTotal cdp entries displayed : 0\n";
        assert!(extractor().extract(TemplateKind::CdpNeighbors, raw).is_empty());
    }

    #[test]
    fn test_version_fields() {
        let records = extractor().extract(TemplateKind::Version, VERSION_OUTPUT);
        assert_eq!(records.len(), 1);
        let version = &records[0];
        assert_eq!(version["version"], "15.5(3)S5");
        assert_eq!(version["hostname"], "R1");
        assert_eq!(version["hardware"], "CSR1000V");
        assert_eq!(version["serial"], "9KIBQAQ3OPE");
        assert_eq!(version["running_image"], "bootflash:packages.conf");
        assert_eq!(version["config_register"], "0x2102");
    }

    #[test]
    fn test_garbage_version_yields_nothing() {
        let extractor = extractor();
        assert!(extractor.extract(TemplateKind::Version, "").is_empty());
        assert!(
            extractor
                .extract(TemplateKind::Version, "% Invalid input detected at '^' marker.\n")
                .is_empty()
        );
    }

    #[test]
    fn test_ntp_status_fields() {
        let raw = "Clock is synchronized, stratum 3, reference is 10.1.1.1\n\
                   nominal freq is 250.0000 Hz, actual freq is 250.0000 Hz, precision is 2**10\n";
        let records = extractor().extract(TemplateKind::NtpStatus, raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["status"], "synchronized");
        assert_eq!(records[0]["stratum"], "3");
        assert_eq!(records[0]["reference"], "10.1.1.1");
    }

    #[test]
    fn test_cdp_enabled() {
        assert!(cdp_enabled(CDP_OUTPUT));
        assert!(cdp_enabled(""));
        assert!(!cdp_enabled("% CDP is not enabled\n"));
        assert!(!cdp_enabled("header\n% CDP is not enabled\ntrailer"));
    }

    #[test]
    fn test_ntp_synchronized() {
        assert!(ntp_synchronized(
            "Clock is synchronized, stratum 3, reference is 10.1.1.1"
        ));
        assert!(!ntp_synchronized(
            "Clock is unsynchronized, stratum 16, no reference clock"
        ));
        assert!(!ntp_synchronized("%NTP is not enabled."));
        assert!(!ntp_synchronized("  \n"));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        for kind in TemplateKind::ALL {
            std::fs::write(dir.path().join(kind.file_name()), kind.bundled()).unwrap();
        }
        let loaded = Extractor::load(dir.path()).unwrap();
        assert_eq!(
            loaded.extract(TemplateKind::CdpNeighbors, CDP_OUTPUT).len(),
            3
        );
    }

    #[test]
    fn test_load_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let err = Extractor::load(dir.path()).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}
