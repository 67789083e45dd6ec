//! Privilege level tracking and navigation.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use regex::bytes::Regex;

use crate::error::{DriverError, Result};
use crate::platform::PrivilegeLevel;

/// Tracks the current privilege level and plans moves between levels.
///
/// Levels link to their parent through `previous_priv`; moving up uses the
/// child's escalate command, moving down uses its deescalate command.
#[derive(Debug)]
pub struct PrivilegeManager {
    levels: IndexMap<String, PrivilegeLevel>,
    current: Option<String>,
}

/// One hop between adjacent privilege levels.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Level this hop lands on.
    pub target: String,

    /// Command to execute for the transition.
    pub command: String,

    /// Password prompt to answer, for escalations that ask for a secret.
    pub auth_prompt: Option<Regex>,
}

impl PrivilegeManager {
    pub fn new(levels: IndexMap<String, PrivilegeLevel>) -> Self {
        Self {
            levels,
            current: None,
        }
    }

    /// Determine the privilege level a prompt belongs to.
    pub fn determine_from_prompt(&self, prompt: &str) -> Result<&PrivilegeLevel> {
        self.levels
            .values()
            .find(|level| level.matches(prompt))
            .ok_or_else(|| {
                DriverError::UnknownPrivilege {
                    prompt: prompt.to_string(),
                }
                .into()
            })
    }

    /// Record the level a freshly read prompt belongs to.
    ///
    /// Returns the level name, or `None` if the prompt matches no level.
    pub fn observe_prompt(&mut self, prompt: &str) -> Option<&str> {
        let name = self.determine_from_prompt(prompt).ok()?.name.clone();
        self.current = Some(name);
        self.current.as_deref()
    }

    /// Name of the current privilege level.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&PrivilegeLevel> {
        self.levels.get(name)
    }

    /// Neighbors of a level: its parent and its children.
    fn neighbors<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let parent = self
            .levels
            .get(name)
            .and_then(|level| level.previous_priv.as_deref());
        let children = self
            .levels
            .values()
            .filter(move |level| level.previous_priv.as_deref() == Some(name))
            .map(|level| level.name.as_str());
        parent.into_iter().chain(children)
    }

    /// Shortest sequence of levels from `from` to `to`, both included.
    pub fn find_path(&self, from: &str, to: &str) -> Result<Vec<String>> {
        let no_path = || DriverError::NoPrivilegePath {
            from: from.to_string(),
            to: to.to_string(),
        };
        if !self.levels.contains_key(from) || !self.levels.contains_key(to) {
            return Err(no_path().into());
        }

        let mut came_from: HashMap<&str, &str> = HashMap::new();
        let mut queue = VecDeque::from([from]);

        while let Some(node) = queue.pop_front() {
            if node == to {
                let mut path = vec![to.to_string()];
                let mut cursor = to;
                while let Some(&prev) = came_from.get(cursor) {
                    path.push(prev.to_string());
                    cursor = prev;
                }
                path.reverse();
                return Ok(path);
            }

            for next in self.neighbors(node) {
                if next != from && !came_from.contains_key(next) {
                    came_from.insert(next, node);
                    queue.push_back(next);
                }
            }
        }

        Err(no_path().into())
    }

    /// Command needed to move between two adjacent levels.
    pub fn transition(&self, from: &str, to: &str) -> Option<Transition> {
        let from_level = self.levels.get(from)?;
        let to_level = self.levels.get(to)?;

        if to_level.previous_priv.as_deref() == Some(from) {
            return Some(Transition {
                target: to.to_string(),
                command: to_level.escalate_command.clone()?,
                auth_prompt: to_level.escalate_prompt.clone(),
            });
        }

        if from_level.previous_priv.as_deref() == Some(to) {
            return Some(Transition {
                target: to.to_string(),
                command: from_level.deescalate_command.clone()?,
                auth_prompt: None,
            });
        }

        None
    }

    /// Full list of hops from the current level to `target`.
    pub fn plan(&self, target: &str) -> Result<Vec<Transition>> {
        let current = self.current.as_deref().ok_or_else(|| DriverError::UnknownPrivilege {
            prompt: String::new(),
        })?;
        let path = self.find_path(current, target)?;

        path.windows(2)
            .map(|hop| {
                self.transition(&hop[0], &hop[1]).ok_or_else(|| {
                    DriverError::NoPrivilegePath {
                        from: hop[0].clone(),
                        to: hop[1].clone(),
                    }
                    .into()
                })
            })
            .collect()
    }
}
