//! Projects: a root path, its targets, and shared settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::target::Target;

/// A project of the workspace.
///
/// Project-level settings are shared by every target and therefore part of
/// each target's fingerprint; target settings override them key by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Root directory identifying the project.
    pub path: PathBuf,
    /// Display name.
    pub name: String,
    /// Targets keyed by name.
    #[serde(default)]
    pub targets: BTreeMap<String, Target>,
    /// Settings applied to every target.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl Project {
    /// Creates an empty project.
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            targets: BTreeMap::new(),
            settings: BTreeMap::new(),
        }
    }

    /// Adds a target, replacing any target with the same name.
    pub fn with_target(mut self, target: Target) -> Self {
        self.targets.insert(target.name.clone(), target);
        self
    }

    /// Sets a project-level setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Looks up a target by name.
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    /// Returns the project settings overlaid with the target's own settings.
    pub fn effective_settings(&self, target: &Target) -> BTreeMap<String, String> {
        let mut settings = self.settings.clone();
        for (key, value) in &target.settings {
            settings.insert(key.clone(), value.clone());
        }
        settings
    }
}
