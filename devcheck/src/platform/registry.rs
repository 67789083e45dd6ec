//! Platform registry for looking up platform definitions by protocol type.

use std::collections::HashMap;

use super::definition::PlatformDefinition;
use super::vendors;
use crate::error::{PlatformError, Result};

/// Registry for platform definitions.
///
/// Built once at start-up and handed to whoever constructs drivers.
#[derive(Debug, Default, Clone)]
pub struct PlatformRegistry {
    platforms: HashMap<String, PlatformDefinition>,
}

impl PlatformRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            platforms: HashMap::new(),
        }
    }

    /// Registry with every built-in platform.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let ios = vendors::cisco_ios::platform();
        let xe = ios.renamed(vendors::cisco_ios::XE_PLATFORM_NAME);
        for platform in [ios, xe] {
            registry.platforms.insert(platform.name.clone(), platform);
        }
        registry
    }

    /// Register a platform definition.
    pub fn register(&mut self, platform: PlatformDefinition) -> Result<()> {
        if self.platforms.contains_key(&platform.name) {
            return Err(PlatformError::AlreadyRegistered {
                name: platform.name.clone(),
            }
            .into());
        }
        platform
            .validate()
            .map_err(|message| PlatformError::InvalidDefinition { message })?;
        self.platforms.insert(platform.name.clone(), platform);
        Ok(())
    }

    /// Get a platform by name.
    pub fn get(&self, name: &str) -> Option<&PlatformDefinition> {
        self.platforms.get(name)
    }

    /// Get a platform by name, or fail with [`PlatformError::UnknownPlatform`].
    pub fn resolve(&self, name: &str) -> Result<&PlatformDefinition> {
        self.get(name).ok_or_else(|| {
            PlatformError::UnknownPlatform {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Check if a platform is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.platforms.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_builtins_registered() {
        let registry = PlatformRegistry::with_builtins();
        assert!(registry.contains("cisco_ios"));
        assert!(registry.contains("cisco_xe"));
        assert_eq!(registry.get("cisco_xe").unwrap().name, "cisco_xe");
    }

    #[test]
    fn test_unknown_platform() {
        let registry = PlatformRegistry::with_builtins();
        let err = registry.resolve("cisco_ios_telnet").unwrap_err();
        assert!(matches!(
            err,
            Error::Platform(PlatformError::UnknownPlatform { .. })
        ));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = PlatformRegistry::with_builtins();
        let err = registry
            .register(vendors::cisco_ios::platform())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Platform(PlatformError::AlreadyRegistered { .. })
        ));
    }

    #[test]
    fn test_register_rejects_missing_levels() {
        let mut registry = PlatformRegistry::new();
        let broken = PlatformDefinition::new("broken").with_default_privilege("nowhere");
        assert!(registry.register(broken).is_err());
        assert!(!registry.contains("broken"));
    }
}
