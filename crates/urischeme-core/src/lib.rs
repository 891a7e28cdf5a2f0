//! urischeme - register custom URI scheme handlers in the OS registry.
//!
//! An application registers itself as the handler for a scheme such as
//! `myapp://` so that opening a link of that scheme launches it. The crate
//! validates the request, lays out the handler keys under the per-user or
//! machine-wide classes subtree, and supports query, update and removal of
//! the registration.
//!
//! The registry is reached through the [`RegistryStore`] adapter trait:
//! [`WindowsRegistry`] on Windows, [`FileStore`] elsewhere, and
//! [`MemoryStore`] for tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use urischeme::{ArgumentSpec, MemoryStore, RegistrationScope, SchemeManager};
//!
//! fn main() -> urischeme::Result<()> {
//!     let manager = SchemeManager::new(MemoryStore::new());
//!     manager.register(
//!         "myapp://",
//!         "/usr/bin/myapp",
//!         RegistrationScope::CurrentUser,
//!         ArgumentSpec::PositionalCount(1),
//!         None,
//!     )?;
//!     assert!(manager.exists("myapp", "myapp", RegistrationScope::CurrentUser)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod parser;
pub mod platform;
pub mod scheme;
pub mod scope;
pub mod store;

mod api;

// Re-export commonly used types
pub use api::{SchemeManager, SchemeManagerBuilder};
pub use engine::RegistrationEngine;
pub use error::{Result, SchemeError, StoreAction};
pub use models::{ArgumentSpec, IconRef, SchemeRecord, SchemeRecordBuilder, SchemeUpdate};
pub use parser::{parse_uri, parse_uris, ParsedUri};
pub use scheme::KnownSchemes;
pub use scope::{Hive, RegistrationScope, RootLocation};
pub use store::{FileStore, MemoryStore, RegistryKey, RegistryStore, StoreError};
#[cfg(windows)]
pub use store::WindowsRegistry;
