//! Platform abstraction layer.
//!
//! Every `#[cfg]` block for OS-specific file locations lives here rather than
//! in the stores.
//!
//! # Architecture
//!
//! - `paths` - default locations of the file-backed store

pub mod paths;

pub use paths::{config_dir, machine_store_path, user_store_path};
