//! Platform definitions keyed by inventory protocol type.
//!
//! A platform describes prompts, privilege levels and failure strings for
//! one kind of device.

mod definition;
mod privilege_level;
mod registry;
pub mod vendors;

pub use definition::PlatformDefinition;
pub use privilege_level::PrivilegeLevel;
pub use registry::PlatformRegistry;

/// Trait for vendor-specific output handling.
pub trait VendorBehavior: Send + Sync {
    /// Normalize command output (strip command echo, fix line endings).
    fn normalize_output(&self, raw: &str, command: &str) -> String;

    /// Detect command failure from output.
    fn detect_failure(&self, output: &str) -> Option<String>;
}

/// Default vendor behavior implementation.
pub struct DefaultBehavior;

impl VendorBehavior for DefaultBehavior {
    fn normalize_output(&self, raw: &str, command: &str) -> String {
        let text = raw.replace("\r\n", "\n").replace('\r', "");

        // The device echoes the command back on the first line
        let body = match text.split_once('\n') {
            Some((first, rest)) if !command.is_empty() && first.trim_end().ends_with(command) => {
                rest
            }
            _ if text.trim() == command => "",
            _ => text.as_str(),
        };

        body.trim_end_matches('\n').to_string()
    }

    fn detect_failure(&self, _output: &str) -> Option<String> {
        None
    }
}
