//! Registration scope and its mapping to a root location in the store.
//!
//! A registration lives either under the per-user classes subtree or under the
//! machine-wide one. Raw scope values coming from outside the type system
//! (legacy byte codes, command-line text) go through the fallible conversions
//! here and fail with [`SchemeError::InvalidConfiguration`] instead of being
//! silently defaulted.

use crate::config::RegistryLayout;
use crate::error::{Result, SchemeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a scheme registration is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationScope {
    /// Visible to the current user only.
    CurrentUser,
    /// Visible to every user of the machine.
    Machine,
}

impl RegistrationScope {
    /// Legacy byte code for [`RegistrationScope::CurrentUser`].
    pub const CURRENT_USER_CODE: u8 = 0x20;
    /// Legacy byte code for [`RegistrationScope::Machine`].
    pub const MACHINE_CODE: u8 = 0x40;

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationScope::CurrentUser => "current_user",
            RegistrationScope::Machine => "machine",
        }
    }

    /// Byte code used by the legacy COM enumeration.
    pub fn code(&self) -> u8 {
        match self {
            RegistrationScope::CurrentUser => Self::CURRENT_USER_CODE,
            RegistrationScope::Machine => Self::MACHINE_CODE,
        }
    }

    /// Human-readable location, used in permission error messages.
    pub fn description(&self) -> &'static str {
        match self {
            RegistrationScope::CurrentUser => "current user",
            RegistrationScope::Machine => "the local machine",
        }
    }

    /// Resolve this scope to its root location.
    pub fn root(&self) -> RootLocation {
        resolve(*self)
    }
}

impl fmt::Display for RegistrationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for RegistrationScope {
    type Error = SchemeError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            Self::CURRENT_USER_CODE => Ok(RegistrationScope::CurrentUser),
            Self::MACHINE_CODE => Ok(RegistrationScope::Machine),
            other => Err(SchemeError::InvalidConfiguration {
                message: format!("Invalid registration scope code: {:#04x}", other),
            }),
        }
    }
}

impl FromStr for RegistrationScope {
    type Err = SchemeError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "user" | "current_user" | "currentuser" | "oncurrentuser" => {
                Ok(RegistrationScope::CurrentUser)
            }
            "machine" | "local_machine" | "localmachine" | "onmachine" => {
                Ok(RegistrationScope::Machine)
            }
            _ => Err(SchemeError::InvalidConfiguration {
                message: format!("Invalid registration scope: '{}'", s),
            }),
        }
    }
}

/// Top-level root of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hive {
    CurrentUser,
    LocalMachine,
}

impl Hive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hive::CurrentUser => "HKEY_CURRENT_USER",
            Hive::LocalMachine => "HKEY_LOCAL_MACHINE",
        }
    }
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hive plus the classes subtree path inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootLocation {
    pub hive: Hive,
    pub classes_path: &'static str,
}

impl RootLocation {
    /// Path of a handler key relative to the hive.
    pub fn handler_path(&self, handler_name: &str) -> String {
        format!(
            "{}{}{}",
            self.classes_path,
            RegistryLayout::SEPARATOR,
            handler_name
        )
    }
}

impl fmt::Display for RootLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.hive,
            RegistryLayout::SEPARATOR,
            self.classes_path
        )
    }
}

/// Map a scope to the root location its registrations live under.
pub fn resolve(scope: RegistrationScope) -> RootLocation {
    match scope {
        RegistrationScope::CurrentUser => RootLocation {
            hive: Hive::CurrentUser,
            classes_path: RegistryLayout::CLASSES_PATH,
        },
        RegistrationScope::Machine => RootLocation {
            hive: Hive::LocalMachine,
            classes_path: RegistryLayout::CLASSES_PATH,
        },
    }
}

/// Resolve a legacy byte code straight to a root location.
pub fn resolve_code(code: u8) -> Result<RootLocation> {
    RegistrationScope::try_from(code).map(resolve)
}
