//! Caller-facing facade over the registration engine.
//!
//! [`SchemeManager`] exposes the five legacy entry points (two register
//! variants, unregister, update, exists) with positional arguments, and can be
//! configured to swallow errors instead of returning them.

mod builder;
mod manager;

pub use builder::SchemeManagerBuilder;
pub use manager::SchemeManager;
