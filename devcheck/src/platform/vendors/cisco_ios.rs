//! Cisco IOS / IOS-XE platform definition.
//!
//! Privilege levels:
//! - `exec` - User EXEC mode with `>` prompt
//! - `privilege_exec` - Privileged EXEC mode with `#` prompt
//! - `configuration` - Configuration mode with `(config*)#` prompt
//!
//! # Prompt Examples
//!
//! ```text
//! R1>                     # exec mode
//! R1#                     # privilege_exec mode
//! R1(config)#             # configuration mode
//! R1(config-if)#          # config sub-mode (interface)
//! ```
//!
//! # Privilege Graph
//!
//! ```text
//! ┌──────┐  enable     ┌────────────────┐  configure terminal  ┌───────────────┐
//! │ exec ├──────────────► privilege_exec ├──────────────────────► configuration │
//! │  >   │   disable   │       #        │        end           │  (config*)#   │
//! └──────┘◄────────────┴────────────────┘◄─────────────────────┴───────────────┘
//! ```

use crate::platform::{PlatformDefinition, PrivilegeLevel};

/// Inventory protocol type for classic IOS.
pub const PLATFORM_NAME: &str = "cisco_ios";

/// Inventory protocol type for IOS-XE, which shares the IOS prompts.
pub const XE_PLATFORM_NAME: &str = "cisco_xe";

pub const EXEC: &str = "exec";
pub const PRIVILEGE_EXEC: &str = "privilege_exec";
pub const CONFIGURATION: &str = "configuration";

/// Create the Cisco IOS platform definition.
pub fn platform() -> PlatformDefinition {
    let exec = PrivilegeLevel::new(EXEC, r"(?mi)^[\w.\-@/: ]{1,63}>\s?$").unwrap();

    let privilege_exec = PrivilegeLevel::new(PRIVILEGE_EXEC, r"(?mi)^[\w.\-@/: ]{1,63}#\s?$")
        .unwrap()
        .with_parent(EXEC)
        .with_escalate("enable")
        .with_deescalate("disable")
        .with_auth(r"(?mi)^password:\s?$")
        .unwrap()
        .with_not_contains("(conf");

    let configuration = PrivilegeLevel::new(
        CONFIGURATION,
        r"(?mi)^[\w.\-@/: ]{1,63}\(conf[\w.\-@/:+]{0,63}\)#\s?$",
    )
    .unwrap()
    .with_parent(PRIVILEGE_EXEC)
    .with_escalate("configure terminal")
    .with_deescalate("end");

    PlatformDefinition::new(PLATFORM_NAME)
        .with_privilege(exec)
        .with_privilege(privilege_exec)
        .with_privilege(configuration)
        .with_default_privilege(PRIVILEGE_EXEC)
        .with_configuration_privilege(CONFIGURATION)
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Invalid input detected")
        .with_failure_pattern("% Unknown command")
        .with_failure_pattern("% Bad secrets")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 511")
        .with_terminal_size(511, 24)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cisco_ios_platform() {
        let platform = platform();
        assert_eq!(platform.name, "cisco_ios");
        assert_eq!(platform.privilege_levels.len(), 3);
        assert_eq!(platform.default_privilege, PRIVILEGE_EXEC);
        assert_eq!(platform.configuration_privilege, CONFIGURATION);
        assert!(platform.validate().is_ok());
    }

    #[test]
    fn test_exec_prompt_match() {
        let platform = platform();
        let exec = platform.get_privilege(EXEC).unwrap();

        assert!(exec.matches("R1>"));
        assert!(exec.matches("core-sw01.lab>"));
        assert!(!exec.matches("R1#"));
        assert!(!exec.matches("R1(config)#"));
    }

    #[test]
    fn test_privilege_exec_prompt_match() {
        let platform = platform();
        let priv_exec = platform.get_privilege(PRIVILEGE_EXEC).unwrap();

        assert!(priv_exec.matches("R1#"));
        assert!(priv_exec.matches("R1# "));
        assert!(priv_exec.matches("some output\nR1#"));
        assert!(!priv_exec.matches("R1(config)#"));
        assert!(!priv_exec.matches("R1(config-if)#"));
        assert!(!priv_exec.matches("R1>"));
    }

    #[test]
    fn test_configuration_prompt_match() {
        let platform = platform();
        let config = platform.get_privilege(CONFIGURATION).unwrap();

        assert!(config.matches("R1(config)#"));
        assert!(config.matches("R1(config-line)#"));
        assert!(config.matches("R1(config-router)# "));
        assert!(!config.matches("R1#"));
        assert!(!config.matches("R1>"));
    }

    #[test]
    fn test_privilege_graph() {
        let platform = platform();

        let exec = platform.get_privilege(EXEC).unwrap();
        assert!(exec.previous_priv.is_none());

        let priv_exec = platform.get_privilege(PRIVILEGE_EXEC).unwrap();
        assert_eq!(priv_exec.previous_priv.as_deref(), Some(EXEC));
        assert_eq!(priv_exec.escalate_command.as_deref(), Some("enable"));
        assert!(priv_exec.escalate_prompt.is_some());

        let config = platform.get_privilege(CONFIGURATION).unwrap();
        assert_eq!(config.previous_priv.as_deref(), Some(PRIVILEGE_EXEC));
        assert_eq!(config.escalate_command.as_deref(), Some("configure terminal"));
        assert_eq!(config.deescalate_command.as_deref(), Some("end"));
    }

    #[test]
    fn test_enable_password_prompt() {
        let platform = platform();
        let prompt = platform
            .get_privilege(PRIVILEGE_EXEC)
            .and_then(|l| l.escalate_prompt.as_ref())
            .unwrap();
        assert!(prompt.is_match(b"R1>enable\r\nPassword: "));
    }

    #[test]
    fn test_failure_patterns() {
        let platform = platform();
        assert!(
            platform
                .failed_when_contains
                .contains(&"% Invalid input detected".to_string())
        );
        assert_eq!(
            platform.on_open_commands,
            vec!["terminal length 0".to_string(), "terminal width 511".to_string()]
        );
    }
}
