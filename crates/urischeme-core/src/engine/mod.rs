//! Registration engine.
//!
//! Validates inputs, lays out the handler key hierarchy and performs
//! register / update / unregister / exists against a [`RegistryStore`].
//!
//! The engine holds no state of its own besides the store and the set of
//! known schemes. Every validation step runs before the first store write, so
//! a rejected call leaves the store untouched. Store failures in the middle of
//! a write sequence are reported as they are and never rolled back.
//!
//! A class key that already exists under the handler name but is not a scheme
//! registration is written into, keeping its other values and subkeys. Only a
//! key left behind by an interrupted registration is removed first.
//!
//! # Layout
//!
//! ```text
//! <classes>\<handlerName>
//!   (default)      = "URL:<scheme> Protocol"      written last
//!   "URL Protocol" = ""
//!   DefaultIcon\(default)        = "<file>,<index>"   optional
//!   shell\open\command\(default) = "<executable><suffix>"
//! ```

pub mod command;

pub use command::{parse_command, ParsedCommand};

use crate::config::RegistryLayout;
use crate::error::{Result, SchemeError, StoreAction};
use crate::models::{
    describe_scheme, scheme_from_description, ArgumentSpec, IconRef, SchemeRecord, SchemeUpdate,
};
use crate::scheme::{self, KnownSchemes};
use crate::scope::{RegistrationScope, RootLocation};
use crate::store::{RegistryKey, RegistryStore, StoreError, StoreResult};
use tracing::{debug, info, warn};

/// What a handler key currently holds.
enum HandlerState {
    Absent,
    /// Layout keys and the `URL Protocol` marker of an interrupted
    /// registration, but no description.
    Partial,
    /// Some other class key (a ProgID or file association). Written into,
    /// never removed.
    Foreign,
    Registered,
}

/// Scheme registration engine over a store adapter.
pub struct RegistrationEngine<S: RegistryStore> {
    store: S,
    known_schemes: KnownSchemes,
}

impl<S: RegistryStore> RegistrationEngine<S> {
    /// Create an engine with the built-in known-scheme list.
    pub fn new(store: S) -> Self {
        Self::with_known_schemes(store, KnownSchemes::builtin())
    }

    pub fn with_known_schemes(store: S, known_schemes: KnownSchemes) -> Self {
        Self {
            store,
            known_schemes,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn known_schemes(&self) -> &KnownSchemes {
        &self.known_schemes
    }

    /// Register `record` under `handler_name` in `scope`.
    ///
    /// # Errors
    ///
    /// In the order they are checked:
    /// - [`SchemeError::NotFound`] if the executable does not exist
    /// - [`SchemeError::InvalidArgument`] for an empty scheme or handler name
    /// - [`SchemeError::MalformedScheme`] if the scheme fails the URI grammar
    /// - [`SchemeError::AlreadyRegistered`] for a known scheme, an existing
    ///   handler of that name, or another handler claiming the scheme
    /// - [`SchemeError::NotFound`] if the icon file does not exist
    /// - store failures, classified by [`SchemeError::from_store`]
    pub fn register(
        &self,
        handler_name: &str,
        record: &SchemeRecord,
        scope: RegistrationScope,
    ) -> Result<()> {
        let scheme = self.validate_record(handler_name, record)?;
        let root = scope.root();

        let state = self.handler_state(&root, handler_name, scope)?;
        if let HandlerState::Registered = state {
            return Err(SchemeError::AlreadyRegistered {
                scheme,
                reason: format!("handler '{}' already exists in {}", handler_name, root),
            });
        }
        self.check_claims(&root, handler_name, &scheme, scope)?;
        check_icon(record.icon.as_ref())?;

        match state {
            HandlerState::Partial => {
                warn!(
                    "Reclaiming half-written handler key {}\\{}",
                    root, handler_name
                );
                self.store
                    .delete_tree(root.hive, &root.handler_path(handler_name))
                    .map_err(write_error(scope))?;
            }
            HandlerState::Foreign => {
                debug!(
                    "Writing scheme layout into existing key {}\\{}",
                    root, handler_name
                );
            }
            HandlerState::Absent | HandlerState::Registered => {}
        }

        self.write_registration(&root, handler_name, &scheme, record, scope)?;
        info!(
            "Registered scheme '{}' as handler '{}' in {}",
            scheme, handler_name, scope
        );
        Ok(())
    }

    /// Whether `handler_name` is registered for `protocol` in `scope`.
    ///
    /// Schemes the URI subsystem already knows are always reported as present.
    pub fn exists(
        &self,
        protocol: &str,
        handler_name: &str,
        scope: RegistrationScope,
    ) -> Result<bool> {
        if protocol.trim().is_empty() {
            return Err(SchemeError::invalid_argument("protocol", "must not be empty"));
        }
        validate_handler_name(handler_name)?;
        let scheme = scheme::parse_scheme(protocol)
            .map_err(|e| SchemeError::invalid_argument("protocol", e.to_string()))?;

        if self.known_schemes.contains(&scheme) {
            return Ok(true);
        }

        let root = scope.root();
        let Some(key) = self
            .store
            .open_key(root.hive, &root.handler_path(handler_name))
            .map_err(read_error(scope))?
        else {
            return Ok(false);
        };
        let description = key
            .get_value(RegistryLayout::DEFAULT_VALUE)
            .map_err(read_error(scope))?;

        Ok(description.is_some_and(|d| scheme_from_description(&d) == scheme))
    }

    /// Remove the registration of `handler_name` for `protocol` in `scope`.
    ///
    /// Fails with [`SchemeError::NotRegistered`] when there is nothing to remove.
    pub fn unregister(
        &self,
        protocol: &str,
        handler_name: &str,
        scope: RegistrationScope,
    ) -> Result<()> {
        let scheme = scheme::normalize(protocol).to_string();
        if !self.exists(protocol, handler_name, scope)? {
            return Err(not_registered(&scheme, handler_name));
        }

        let root = scope.root();
        match self
            .store
            .delete_tree(root.hive, &root.handler_path(handler_name))
        {
            Ok(()) => {}
            Err(StoreError::KeyNotFound { .. }) => {
                return Err(not_registered(&scheme, handler_name))
            }
            Err(e) => return Err(SchemeError::from_store(e, scope, StoreAction::Delete)),
        }

        info!(
            "Unregistered scheme '{}' handler '{}' from {}",
            scheme, handler_name, scope
        );
        Ok(())
    }

    /// Change the supplied fields of an existing registration.
    ///
    /// The merged record is fully validated before anything is touched; the
    /// change itself is an unregister followed by a register and is not
    /// atomic.
    pub fn update(
        &self,
        protocol: &str,
        handler_name: &str,
        changes: SchemeUpdate,
        scope: RegistrationScope,
    ) -> Result<()> {
        if !self.exists(protocol, handler_name, scope)? {
            return Err(not_registered(scheme::normalize(protocol), handler_name));
        }

        let current = self.read_back(handler_name, scope)?.ok_or_else(|| {
            SchemeError::InternalInconsistency {
                message: format!(
                    "handler '{}' exists but its registration could not be read back",
                    handler_name
                ),
            }
        })?;

        let mut merged = changes.merge_into(current);
        merged.scheme = scheme::normalize(protocol).to_string();
        let scheme = self.validate_record(handler_name, &merged)?;
        self.check_claims(&scope.root(), handler_name, &scheme, scope)?;
        check_icon(merged.icon.as_ref())?;

        self.unregister(protocol, handler_name, scope)?;
        self.register(handler_name, &merged, scope)?;
        info!("Updated handler '{}' for scheme '{}'", handler_name, scheme);
        Ok(())
    }

    /// Rebuild the record stored under `handler_name`, or `None` if there is
    /// no complete registration.
    ///
    /// The port is not part of the stored layout and always reads back as
    /// `None`.
    pub fn read_back(
        &self,
        handler_name: &str,
        scope: RegistrationScope,
    ) -> Result<Option<SchemeRecord>> {
        validate_handler_name(handler_name)?;
        let root = scope.root();
        let read = read_error(scope);

        let Some(key) = self
            .store
            .open_key(root.hive, &root.handler_path(handler_name))
            .map_err(&read)?
        else {
            return Ok(None);
        };
        let Some(description) = key
            .get_value(RegistryLayout::DEFAULT_VALUE)
            .map_err(&read)?
        else {
            return Ok(None);
        };
        if !is_description(&description) {
            return Ok(None);
        }

        let icon = match key
            .open_subkey(RegistryLayout::DEFAULT_ICON_KEY)
            .map_err(&read)?
        {
            Some(icon_key) => icon_key
                .get_value(RegistryLayout::DEFAULT_VALUE)
                .map_err(&read)?
                .and_then(|value| IconRef::parse(&value)),
            None => None,
        };

        let command = match key.open_subkey(RegistryLayout::COMMAND_KEY).map_err(&read)? {
            Some(command_key) => command_key
                .get_value(RegistryLayout::DEFAULT_VALUE)
                .map_err(&read)?,
            None => None,
        };
        let Some(parsed) = command.as_deref().and_then(parse_command) else {
            debug!("Handler '{}' has no usable command value", handler_name);
            return Ok(None);
        };

        Ok(Some(SchemeRecord {
            scheme: scheme_from_description(&description),
            executable_path: parsed.executable_path,
            port: None,
            arguments: parsed.arguments,
            icon,
        }))
    }

    /// Input checks shared by register and update. Returns the normalized scheme.
    fn validate_record(&self, handler_name: &str, record: &SchemeRecord) -> Result<String> {
        if !record.executable_path.is_file() {
            return Err(SchemeError::NotFound(record.executable_path.clone()));
        }
        if record.scheme.trim().is_empty() {
            return Err(SchemeError::invalid_argument("scheme", "must not be empty"));
        }
        validate_handler_name(handler_name)?;
        if let ArgumentSpec::Literal(text) = &record.arguments {
            if text.trim().is_empty() {
                return Err(SchemeError::invalid_argument(
                    "arguments",
                    "literal argument text must not be empty",
                ));
            }
        }

        let scheme = scheme::parse_scheme(&record.scheme)?;
        if self.known_schemes.contains(&scheme) {
            return Err(SchemeError::AlreadyRegistered {
                reason: format!("'{}' is a built-in scheme", scheme),
                scheme,
            });
        }
        Ok(scheme)
    }

    fn handler_state(
        &self,
        root: &RootLocation,
        handler_name: &str,
        scope: RegistrationScope,
    ) -> Result<HandlerState> {
        let read = read_error(scope);
        let Some(key) = self
            .store
            .open_key(root.hive, &root.handler_path(handler_name))
            .map_err(&read)?
        else {
            return Ok(HandlerState::Absent);
        };
        let description = key
            .get_value(RegistryLayout::DEFAULT_VALUE)
            .map_err(&read)?;
        if description.as_deref().is_some_and(is_description) {
            Ok(HandlerState::Registered)
        } else if is_partial_layout(&key).map_err(&read)? {
            Ok(HandlerState::Partial)
        } else {
            Ok(HandlerState::Foreign)
        }
    }

    /// Fail if a handler other than `handler_name` already claims `scheme`.
    fn check_claims(
        &self,
        root: &RootLocation,
        handler_name: &str,
        scheme: &str,
        scope: RegistrationScope,
    ) -> Result<()> {
        let read = read_error(scope);
        let Some(classes) = self
            .store
            .open_key(root.hive, root.classes_path)
            .map_err(&read)?
        else {
            return Ok(());
        };

        for name in classes.subkey_names().map_err(&read)? {
            if name.eq_ignore_ascii_case(handler_name) {
                continue;
            }
            let description = match sibling_description(&classes, &name) {
                Ok(description) => description,
                Err(
                    e @ (StoreError::PermissionDenied { .. }
                    | StoreError::KeyNotFound { .. }
                    | StoreError::KeyDeleted { .. }),
                ) => {
                    debug!("Skipping unreadable class key '{}': {}", name, e);
                    continue;
                }
                Err(e) => return Err(read(e)),
            };
            let claimed = description
                .filter(|d| is_description(d))
                .is_some_and(|d| scheme_from_description(&d).eq_ignore_ascii_case(scheme));
            if claimed {
                return Err(SchemeError::AlreadyRegistered {
                    scheme: scheme.to_string(),
                    reason: format!("handler '{}' already claims it in {}", name, root),
                });
            }
        }
        Ok(())
    }

    fn write_registration(
        &self,
        root: &RootLocation,
        handler_name: &str,
        scheme: &str,
        record: &SchemeRecord,
        scope: RegistrationScope,
    ) -> Result<()> {
        let write = write_error(scope);
        let path = root.handler_path(handler_name);

        let key = self.store.create_key(root.hive, &path).map_err(&write)?;
        debug!("Opened {}\\{}", root.hive, path);

        let command = key
            .create_subkey(RegistryLayout::COMMAND_KEY)
            .map_err(&write)?;
        command
            .set_value(RegistryLayout::DEFAULT_VALUE, &record.command_line())
            .map_err(&write)?;
        debug!("Wrote command for '{}': {}", handler_name, record.command_line());

        if let Some(icon) = &record.icon {
            let icon_key = key
                .create_subkey(RegistryLayout::DEFAULT_ICON_KEY)
                .map_err(&write)?;
            icon_key
                .set_value(RegistryLayout::DEFAULT_VALUE, &icon.to_registry_value())
                .map_err(&write)?;
            debug!("Wrote icon for '{}': {}", handler_name, icon);
        }

        key.set_value(RegistryLayout::URL_PROTOCOL_VALUE, "")
            .map_err(&write)?;
        key.set_value(RegistryLayout::DEFAULT_VALUE, &describe_scheme(scheme))
            .map_err(&write)?;
        Ok(())
    }
}

fn validate_handler_name(handler_name: &str) -> Result<()> {
    if handler_name.trim().is_empty() {
        return Err(SchemeError::invalid_argument("handler_name", "must not be empty"));
    }
    if handler_name.contains(RegistryLayout::SEPARATOR) {
        return Err(SchemeError::invalid_argument(
            "handler_name",
            format!("must not contain '{}'", RegistryLayout::SEPARATOR),
        ));
    }
    Ok(())
}

fn check_icon(icon: Option<&IconRef>) -> Result<()> {
    match icon {
        Some(icon) if !icon.file.is_file() => Err(SchemeError::NotFound(icon.file.clone())),
        _ => Ok(()),
    }
}

/// Default value of the class key `name`, or `None` if it has none.
fn sibling_description<K: RegistryKey>(classes: &K, name: &str) -> StoreResult<Option<String>> {
    match classes.open_subkey(name)? {
        Some(key) => key.get_value(RegistryLayout::DEFAULT_VALUE),
        None => Ok(None),
    }
}

/// Whether `key` holds the `URL Protocol` marker and nothing but the
/// registration layout below it.
fn is_partial_layout<K: RegistryKey>(key: &K) -> StoreResult<bool> {
    if key.get_value(RegistryLayout::URL_PROTOCOL_VALUE)?.is_none() {
        return Ok(false);
    }
    for name in key.subkey_names()? {
        if name.eq_ignore_ascii_case(RegistryLayout::DEFAULT_ICON_KEY) {
            continue;
        }
        if !name.eq_ignore_ascii_case(RegistryLayout::SHELL_KEY) {
            return Ok(false);
        }
        let Some(shell) = key.open_subkey(&name)? else {
            continue;
        };
        let only_open = shell
            .subkey_names()?
            .iter()
            .all(|verb| verb.eq_ignore_ascii_case(RegistryLayout::OPEN_VERB));
        if !only_open {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_description(value: &str) -> bool {
    value.trim_start().starts_with(RegistryLayout::DESCRIPTION_PREFIX)
}

fn not_registered(scheme: &str, handler_name: &str) -> SchemeError {
    SchemeError::NotRegistered {
        scheme: scheme.to_string(),
        handler: handler_name.to_string(),
    }
}

fn read_error(scope: RegistrationScope) -> impl Fn(StoreError) -> SchemeError {
    move |e| SchemeError::from_store(e, scope, StoreAction::Read)
}

fn write_error(scope: RegistrationScope) -> impl Fn(StoreError) -> SchemeError {
    move |e| SchemeError::from_store(e, scope, StoreAction::Write)
}
