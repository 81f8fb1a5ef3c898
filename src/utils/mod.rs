//! Shared helpers with no knowledge of tasks or configuration.

pub mod exec;
pub mod hash;
pub mod path;
mod plural;

pub use plural::plural_count;
