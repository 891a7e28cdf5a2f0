//! The scheme manager facade.

use crate::api::SchemeManagerBuilder;
use crate::engine::RegistrationEngine;
use crate::error::Result;
use crate::models::{ArgumentSpec, IconRef, SchemeRecord, SchemeUpdate};
use crate::scheme;
use crate::scope::RegistrationScope;
use crate::store::RegistryStore;
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

/// Forwards the registration operations to a [`RegistrationEngine`].
///
/// With `throw_errors` disabled every failure is logged at `warn` level and
/// replaced by a neutral result.
pub struct SchemeManager<S: RegistryStore> {
    engine: RegistrationEngine<S>,
    throw_errors: bool,
}

impl<S: RegistryStore> SchemeManager<S> {
    /// Create a manager that returns errors and knows the built-in schemes.
    pub fn new(store: S) -> Self {
        Self::from_engine(RegistrationEngine::new(store), true)
    }

    pub fn builder(store: S) -> SchemeManagerBuilder<S> {
        SchemeManagerBuilder::new(store)
    }

    pub(crate) fn from_engine(engine: RegistrationEngine<S>, throw_errors: bool) -> Self {
        Self {
            engine,
            throw_errors,
        }
    }

    pub fn engine(&self) -> &RegistrationEngine<S> {
        &self.engine
    }

    pub fn throw_errors(&self) -> bool {
        self.throw_errors
    }

    pub fn set_throw_errors(&mut self, enable: bool) {
        self.throw_errors = enable;
    }

    /// Register `protocol` with the scheme itself as the handler name.
    pub fn register(
        &self,
        protocol: &str,
        executable_path: impl Into<PathBuf>,
        scope: RegistrationScope,
        arguments: ArgumentSpec,
        icon: Option<IconRef>,
    ) -> Result<()> {
        let handler_name = scheme::normalize(protocol).to_string();
        let record = SchemeRecord {
            scheme: protocol.to_string(),
            executable_path: executable_path.into(),
            port: None,
            arguments,
            icon,
        };
        let result = self.engine.register(&handler_name, &record, scope);
        self.settle("register", result, ())
    }

    /// Register the networked variant of `protocol` under `handler_name`.
    #[allow(clippy::too_many_arguments)]
    pub fn register_with_port(
        &self,
        protocol: &str,
        executable_path: impl Into<PathBuf>,
        port: u16,
        handler_name: &str,
        arguments: ArgumentSpec,
        icon: Option<IconRef>,
        scope: RegistrationScope,
    ) -> Result<()> {
        let record = SchemeRecord {
            scheme: protocol.to_string(),
            executable_path: executable_path.into(),
            port: Some(port),
            arguments,
            icon,
        };
        let result = self.engine.register(handler_name, &record, scope);
        self.settle("register", result, ())
    }

    /// Register a prepared record under `handler_name`.
    pub fn register_record(
        &self,
        handler_name: &str,
        record: &SchemeRecord,
        scope: RegistrationScope,
    ) -> Result<()> {
        let result = self.engine.register(handler_name, record, scope);
        self.settle("register", result, ())
    }

    pub fn unregister(
        &self,
        protocol: &str,
        handler_name: &str,
        scope: RegistrationScope,
    ) -> Result<()> {
        let result = self.engine.unregister(protocol, handler_name, scope);
        self.settle("unregister", result, ())
    }

    /// Point an existing registration at `executable_path`. Arguments and icon
    /// keep their stored values unless supplied.
    pub fn update(
        &self,
        protocol: &str,
        executable_path: impl Into<PathBuf>,
        handler_name: &str,
        arguments: Option<ArgumentSpec>,
        icon: Option<IconRef>,
        scope: RegistrationScope,
    ) -> Result<()> {
        let mut changes = SchemeUpdate::new().executable_path(executable_path);
        if let Some(arguments) = arguments {
            changes = changes.arguments(arguments);
        }
        if let Some(icon) = icon {
            changes = changes.icon(icon);
        }
        self.apply_update(protocol, handler_name, changes, scope)
    }

    /// Apply an arbitrary set of changes to an existing registration.
    pub fn apply_update(
        &self,
        protocol: &str,
        handler_name: &str,
        changes: SchemeUpdate,
        scope: RegistrationScope,
    ) -> Result<()> {
        let result = self.engine.update(protocol, handler_name, changes, scope);
        self.settle("update", result, ())
    }

    pub fn exists(
        &self,
        protocol: &str,
        handler_name: &str,
        scope: RegistrationScope,
    ) -> Result<bool> {
        let result = self.engine.exists(protocol, handler_name, scope);
        self.settle("exists", result, false)
    }

    pub fn read_back(
        &self,
        handler_name: &str,
        scope: RegistrationScope,
    ) -> Result<Option<SchemeRecord>> {
        let result = self.engine.read_back(handler_name, scope);
        self.settle("read_back", result, None)
    }

    fn settle<T>(&self, operation: &str, result: Result<T>, fallback: T) -> Result<T> {
        match result {
            Err(e) if !self.throw_errors => {
                warn!("{} failed, error suppressed: {}", operation, e);
                Ok(fallback)
            }
            other => other,
        }
    }
}

impl<S: RegistryStore> fmt::Display for SchemeManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SchemeManager")
    }
}
