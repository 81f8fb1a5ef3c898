//! Path utilities.
//!
//! - [`fs`]: filesystem path normalization (`normalize_path`, `expand_path`) and noise directories

pub mod fs;

pub use fs::{NOISE_DIRS, expand_path, is_noise_dir, normalize_path, relative_display};
