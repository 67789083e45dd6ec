//! Platform definition for vendor-specific configurations.

use indexmap::IndexMap;

use super::privilege_level::PrivilegeLevel;

/// Everything the driver needs to know about one device type.
#[derive(Debug, Clone)]
pub struct PlatformDefinition {
    /// Protocol type as written in the inventory (e.g., "cisco_ios").
    pub name: String,

    /// Privilege levels for this platform.
    pub privilege_levels: IndexMap<String, PrivilegeLevel>,

    /// Level that show commands and escalation aim for.
    pub default_privilege: String,

    /// Level configuration lines are entered in.
    pub configuration_privilege: String,

    /// Patterns that indicate command failure.
    pub failed_when_contains: Vec<String>,

    /// Commands to run when connection is established.
    pub on_open_commands: Vec<String>,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,
}

impl PlatformDefinition {
    /// Create a new platform definition with minimal required fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            privilege_levels: IndexMap::new(),
            default_privilege: String::new(),
            configuration_privilege: String::new(),
            failed_when_contains: vec![],
            on_open_commands: vec![],
            terminal_width: 511,
            terminal_height: 24,
        }
    }

    /// Add a privilege level.
    pub fn with_privilege(mut self, level: PrivilegeLevel) -> Self {
        self.privilege_levels.insert(level.name.clone(), level);
        self
    }

    /// Set the default privilege level.
    pub fn with_default_privilege(mut self, name: impl Into<String>) -> Self {
        self.default_privilege = name.into();
        self
    }

    /// Set the configuration privilege level.
    pub fn with_configuration_privilege(mut self, name: impl Into<String>) -> Self {
        self.configuration_privilege = name.into();
        self
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Set terminal dimensions.
    pub fn with_terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Same definition registered under another protocol type.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Get a privilege level by name.
    pub fn get_privilege(&self, name: &str) -> Option<&PrivilegeLevel> {
        self.privilege_levels.get(name)
    }

    /// Check that the named default and configuration levels exist.
    pub fn validate(&self) -> Result<(), String> {
        for level in [&self.default_privilege, &self.configuration_privilege] {
            if !self.privilege_levels.contains_key(level) {
                return Err(format!(
                    "platform '{}' has no privilege level '{}'",
                    self.name, level
                ));
            }
        }
        Ok(())
    }
}
