//! Per-target build settings.
//!
//! A unit compiles up to two bundles: `server` and `client`. Each target
//! is configured at three levels, from weakest to strongest:
//!
//! 1. Built-in defaults ([`Target::default_platform`] and friends)
//! 2. `[build.server]` / `[build.client]` tables ([`TargetDefaults`])
//! 3. Per-unit `server = ...` / `client = ...` ([`TargetSetting`])
//!
//! ```toml
//! [[resources.units]]
//! path = "resources/admin"
//! server = false                                  # Disabled
//! client = true                                   # UseDefault
//! # client = { entry = "src/ui/main.ts" }         # Custom
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bundle target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Server,
    Client,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Server, Target::Client];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }

    pub const fn default_platform(self) -> &'static str {
        match self {
            Self::Server => "node",
            Self::Client => "browser",
        }
    }

    pub const fn default_format(self) -> &'static str {
        match self {
            Self::Server => "cjs",
            Self::Client => "iife",
        }
    }

    pub const fn default_entry(self) -> &'static str {
        match self {
            Self::Server => "src/server/index.ts",
            Self::Client => "src/client/index.ts",
        }
    }

    pub const fn default_dir(self) -> &'static str {
        match self {
            Self::Server => "src/server",
            Self::Client => "src/client",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `[build.server]` / `[build.client]` table.
///
/// Keys left out fall back to the built-in value for the target, so a
/// partial table only changes what it names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    /// Source subdirectory whose presence enables the target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl TargetDefaults {
    pub fn resolve(&self, target: Target) -> TargetOptions {
        TargetOptions {
            platform: self
                .platform
                .clone()
                .unwrap_or_else(|| target.default_platform().to_string()),
            format: self
                .format
                .clone()
                .unwrap_or_else(|| target.default_format().to_string()),
            entry: self
                .entry
                .clone()
                .unwrap_or_else(|| target.default_entry().to_string()),
        }
    }
}

/// Fully resolved options for one target of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetOptions {
    pub platform: String,
    pub format: String,
    pub entry: String,
}

impl TargetOptions {
    /// Apply the keys a unit sets explicitly.
    pub fn apply(mut self, custom: &TargetOverride) -> Self {
        if let Some(platform) = &custom.platform {
            self.platform.clone_from(platform);
        }
        if let Some(format) = &custom.format {
            self.format.clone_from(format);
        }
        if let Some(entry) = &custom.entry {
            self.entry.clone_from(entry);
        }
        self
    }
}

/// Inline table form of a per-unit target setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

/// Per-unit target setting: `false`, `true`, or an inline table.
///
/// An absent key (`None` at the use site) means "detect from the source
/// tree"; that decision belongs to the task graph builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTargetSetting", into = "RawTargetSetting")]
pub enum TargetSetting {
    Disabled,
    UseDefault,
    Custom(TargetOverride),
}

impl TargetSetting {
    pub const fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawTargetSetting {
    Flag(bool),
    Custom(TargetOverride),
}

impl From<RawTargetSetting> for TargetSetting {
    fn from(raw: RawTargetSetting) -> Self {
        match raw {
            RawTargetSetting::Flag(false) => Self::Disabled,
            RawTargetSetting::Flag(true) => Self::UseDefault,
            RawTargetSetting::Custom(custom) => Self::Custom(custom),
        }
    }
}

impl From<TargetSetting> for RawTargetSetting {
    fn from(setting: TargetSetting) -> Self {
        match setting {
            TargetSetting::Disabled => Self::Flag(false),
            TargetSetting::UseDefault => Self::Flag(true),
            TargetSetting::Custom(custom) => Self::Custom(custom),
        }
    }
}
