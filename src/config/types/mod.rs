//! Configuration utility types.
//!
//! | Module   | Purpose                                  |
//! |----------|------------------------------------------|
//! | `error`  | `ConfigError` and batched diagnostics    |
//! | `field`  | Field paths shown in diagnostics         |

mod error;
mod field;

pub use error::{ConfigDiagnostics, ConfigError};
pub use field::FieldPath;
