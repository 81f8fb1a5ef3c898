//! Configuration section definitions.
//!
//! Each module corresponds to a section in `resforge.toml`:
//!
//! | Module  | TOML Section                          | Purpose                         |
//! |---------|---------------------------------------|---------------------------------|
//! | `build` | `[build]`                             | Compiler, target defaults       |
//! | `dev`   | `[dev]`                               | Watch mode, hot reload          |
//! | `unit`  | `[core]`, `[resources]`, `[standalone]` | Unit declarations             |

pub mod build;
mod dev;
mod unit;

// Re-export section configs
pub use build::{
    BuildSectionConfig, DEFAULT_COMPILER, Target, TargetDefaults, TargetOptions, TargetOverride,
    TargetSetting,
};
pub use dev::{Credentials, DEFAULT_DEV_PORT, DevConfig, RemoteConfig};
pub use unit::{DEFAULT_CORE_PATH, UnitConfig, UnitGroupConfig, ViewsConfig};
