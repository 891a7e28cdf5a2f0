//! Platform-specific store paths.
//!
//! Both hive files can be moved with an environment variable
//! ([`StoreConfig::USER_STORE_ENV`], [`StoreConfig::MACHINE_STORE_ENV`]);
//! otherwise they live in the locations below.

use crate::config::StoreConfig;
use crate::error::{Result, SchemeError};
use std::ffi::OsString;
use std::path::PathBuf;

/// Get the urischeme per-user configuration directory.
///
/// # Platform Behavior
/// - **Linux**: `~/.config/urischeme` (XDG_CONFIG_HOME)
/// - **Windows**: `%APPDATA%\urischeme`
/// - **macOS**: `~/Library/Application Support/urischeme`
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| SchemeError::InvalidConfiguration {
        message: "Could not determine platform config directory".to_string(),
    })?;
    Ok(config_dir.join(StoreConfig::APP_CONFIG_DIR_NAME))
}

/// Directory holding the machine-wide hive file.
///
/// # Platform Behavior
/// - **Linux/macOS**: `/etc/urischeme`
/// - **Windows**: `%ProgramData%\urischeme`
pub fn machine_dir() -> Result<PathBuf> {
    #[cfg(unix)]
    {
        Ok(PathBuf::from(StoreConfig::MACHINE_STORE_DIR))
    }

    #[cfg(windows)]
    {
        let program_data =
            std::env::var_os("ProgramData").ok_or_else(|| SchemeError::InvalidConfiguration {
                message: "Could not determine the ProgramData directory".to_string(),
            })?;
        Ok(PathBuf::from(program_data).join(StoreConfig::APP_CONFIG_DIR_NAME))
    }

    #[cfg(not(any(unix, windows)))]
    {
        Err(SchemeError::InvalidConfiguration {
            message: "Unsupported platform for the machine store".to_string(),
        })
    }
}

/// Path of the per-user hive file.
///
/// Returns `$URISCHEME_USER_STORE` if set, else `{config_dir}/user-classes.json`.
pub fn user_store_path() -> Result<PathBuf> {
    match override_path(std::env::var_os(StoreConfig::USER_STORE_ENV)) {
        Some(path) => Ok(path),
        None => Ok(config_dir()?.join(StoreConfig::USER_STORE_FILENAME)),
    }
}

/// Path of the machine-wide hive file.
///
/// Returns `$URISCHEME_MACHINE_STORE` if set, else `{machine_dir}/machine-classes.json`.
pub fn machine_store_path() -> Result<PathBuf> {
    match override_path(std::env::var_os(StoreConfig::MACHINE_STORE_ENV)) {
        Some(path) => Ok(path),
        None => Ok(machine_dir()?.join(StoreConfig::MACHINE_STORE_FILENAME)),
    }
}

fn override_path(value: Option<OsString>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}
