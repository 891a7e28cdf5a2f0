//! Builder for configuring a SchemeManager.

use crate::api::SchemeManager;
use crate::engine::RegistrationEngine;
use crate::scheme::KnownSchemes;
use crate::store::RegistryStore;

/// Builder for configuring a [`SchemeManager`].
///
/// # Example
///
/// ```rust,ignore
/// use urischeme::{MemoryStore, SchemeManager};
///
/// let manager = SchemeManager::builder(MemoryStore::new())
///     .throw_errors(false)
///     .build();
/// ```
pub struct SchemeManagerBuilder<S: RegistryStore> {
    store: S,
    throw_errors: bool,
    known_schemes: KnownSchemes,
}

impl<S: RegistryStore> SchemeManagerBuilder<S> {
    /// Create a new builder over `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            throw_errors: true,
            known_schemes: KnownSchemes::builtin(),
        }
    }

    /// Return errors to the caller (`true`) or log and suppress them (`false`).
    ///
    /// When suppressed, failed operations return `Ok(())`, `exists` returns
    /// `Ok(false)` and `read_back` returns `Ok(None)`.
    ///
    /// Default: `true`
    pub fn throw_errors(mut self, enable: bool) -> Self {
        self.throw_errors = enable;
        self
    }

    /// Replace the set of schemes treated as built in.
    ///
    /// Default: [`KnownSchemes::builtin`]
    pub fn known_schemes(mut self, known_schemes: KnownSchemes) -> Self {
        self.known_schemes = known_schemes;
        self
    }

    pub fn build(self) -> SchemeManager<S> {
        SchemeManager::from_engine(
            RegistrationEngine::with_known_schemes(self.store, self.known_schemes),
            self.throw_errors,
        )
    }
}
