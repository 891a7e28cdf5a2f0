//! Native Windows registry store.
//!
//! Thin wrapper over the Win32 registry API. Every key handle is closed when
//! its [`WindowsKey`] is dropped.
#![allow(unsafe_code)]

use super::{RegistryKey, RegistryStore, StoreError, StoreResult};
use crate::scope::Hive;
use std::ptr;
use tracing::debug;
use windows_sys::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_BUSY, ERROR_FILE_NOT_FOUND, ERROR_KEY_DELETED,
    ERROR_LOCK_VIOLATION, ERROR_MORE_DATA, ERROR_NO_MORE_ITEMS, ERROR_PATH_NOT_FOUND,
    ERROR_SHARING_VIOLATION, ERROR_SUCCESS, WIN32_ERROR,
};
use windows_sys::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegDeleteTreeW, RegEnumKeyExW, RegOpenKeyExW,
    RegQueryValueExW, RegSetValueExW, HKEY, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ,
    KEY_WRITE, REG_EXPAND_SZ, REG_OPTION_NON_VOLATILE, REG_SAM_FLAGS, REG_SZ, REG_VALUE_TYPE,
};

/// Longest key name the registry allows, plus the terminator.
const MAX_KEY_NAME: usize = 256;

/// Store backed by the Windows registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsRegistry;

impl WindowsRegistry {
    pub fn new() -> Self {
        Self
    }
}

fn root_handle(hive: Hive) -> HKEY {
    match hive {
        Hive::CurrentUser => HKEY_CURRENT_USER,
        Hive::LocalMachine => HKEY_LOCAL_MACHINE,
    }
}

fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

fn map_status(status: WIN32_ERROR, operation: &str, hive: Hive, path: &str) -> StoreError {
    match status {
        ERROR_ACCESS_DENIED => StoreError::PermissionDenied {
            hive,
            path: path.to_string(),
        },
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND => StoreError::KeyNotFound {
            path: path.to_string(),
        },
        ERROR_KEY_DELETED => StoreError::KeyDeleted {
            path: path.to_string(),
        },
        ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION | ERROR_BUSY => StoreError::InUse {
            path: path.to_string(),
        },
        code => StoreError::Os {
            operation: operation.to_string(),
            code,
        },
    }
}

fn open_raw(
    parent: HKEY,
    hive: Hive,
    path: &str,
    access: REG_SAM_FLAGS,
) -> StoreResult<Option<HKEY>> {
    let name = wide(path);
    let mut handle: HKEY = ptr::null_mut();
    // SAFETY: `name` is NUL-terminated and outlives the call; `handle` is a
    // valid out pointer.
    let status = unsafe { RegOpenKeyExW(parent, name.as_ptr(), 0, access, &mut handle) };
    match status {
        ERROR_SUCCESS => Ok(Some(handle)),
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND => Ok(None),
        other => Err(map_status(other, "RegOpenKeyExW", hive, path)),
    }
}

fn create_raw(parent: HKEY, hive: Hive, path: &str) -> StoreResult<HKEY> {
    let name = wide(path);
    let mut handle: HKEY = ptr::null_mut();
    // SAFETY: `name` is NUL-terminated and outlives the call; class, security
    // attributes and disposition are optional and passed as null.
    let status = unsafe {
        RegCreateKeyExW(
            parent,
            name.as_ptr(),
            0,
            ptr::null(),
            REG_OPTION_NON_VOLATILE,
            KEY_READ | KEY_WRITE,
            ptr::null(),
            &mut handle,
            ptr::null_mut(),
        )
    };
    if status != ERROR_SUCCESS {
        return Err(map_status(status, "RegCreateKeyExW", hive, path));
    }
    Ok(handle)
}

impl RegistryStore for WindowsRegistry {
    type Key = WindowsKey;

    fn open_key(&self, hive: Hive, path: &str) -> StoreResult<Option<WindowsKey>> {
        Ok(open_raw(root_handle(hive), hive, path, KEY_READ)?
            .map(|handle| WindowsKey::new(handle, hive, path.to_string())))
    }

    fn create_key(&self, hive: Hive, path: &str) -> StoreResult<WindowsKey> {
        let handle = create_raw(root_handle(hive), hive, path)?;
        debug!("Created or opened {}\\{}", hive, path);
        Ok(WindowsKey::new(handle, hive, path.to_string()))
    }

    fn delete_tree(&self, hive: Hive, path: &str) -> StoreResult<()> {
        let name = wide(path);
        // SAFETY: `name` is NUL-terminated and outlives the call.
        let status = unsafe { RegDeleteTreeW(root_handle(hive), name.as_ptr()) };
        if status != ERROR_SUCCESS {
            return Err(map_status(status, "RegDeleteTreeW", hive, path));
        }
        debug!("Deleted {}\\{}", hive, path);
        Ok(())
    }
}

/// Open registry key handle.
#[derive(Debug)]
pub struct WindowsKey {
    handle: HKEY,
    hive: Hive,
    path: String,
}

impl WindowsKey {
    fn new(handle: HKEY, hive: Hive, path: String) -> Self {
        Self { handle, hive, path }
    }

    fn child_path(&self, path: &str) -> String {
        format!("{}\\{}", self.path, path)
    }
}

impl Drop for WindowsKey {
    fn drop(&mut self) {
        // SAFETY: `handle` was returned by RegOpenKeyExW/RegCreateKeyExW and is
        // closed exactly once.
        unsafe {
            RegCloseKey(self.handle);
        }
    }
}

impl RegistryKey for WindowsKey {
    fn get_value(&self, name: &str) -> StoreResult<Option<String>> {
        let value_name = wide(name);
        let mut value_type: REG_VALUE_TYPE = 0;
        let mut size: u32 = 0;

        // SAFETY: a null data pointer asks only for the type and size.
        let status = unsafe {
            RegQueryValueExW(
                self.handle,
                value_name.as_ptr(),
                ptr::null(),
                &mut value_type,
                ptr::null_mut(),
                &mut size,
            )
        };
        match status {
            ERROR_SUCCESS => {}
            ERROR_FILE_NOT_FOUND => return Ok(None),
            other => return Err(map_status(other, "RegQueryValueExW", self.hive, &self.path)),
        }
        if value_type != REG_SZ && value_type != REG_EXPAND_SZ {
            return Ok(None);
        }

        let mut buffer: Vec<u16> = vec![0; (size as usize).div_ceil(2) + 1];
        let mut size_bytes = (buffer.len() * 2) as u32;
        // SAFETY: `buffer` holds `size_bytes` writable bytes.
        let status = unsafe {
            RegQueryValueExW(
                self.handle,
                value_name.as_ptr(),
                ptr::null(),
                &mut value_type,
                buffer.as_mut_ptr().cast::<u8>(),
                &mut size_bytes,
            )
        };
        match status {
            ERROR_SUCCESS => {}
            ERROR_FILE_NOT_FOUND => return Ok(None),
            ERROR_MORE_DATA => {
                return Err(StoreError::InUse {
                    path: self.path.clone(),
                })
            }
            other => return Err(map_status(other, "RegQueryValueExW", self.hive, &self.path)),
        }

        let len = (size_bytes as usize / 2).min(buffer.len());
        let text = &buffer[..len];
        let end = text.iter().position(|&c| c == 0).unwrap_or(text.len());
        Ok(Some(String::from_utf16_lossy(&text[..end])))
    }

    fn set_value(&self, name: &str, value: &str) -> StoreResult<()> {
        let value_name = wide(name);
        let data = wide(value);
        // SAFETY: `data` is a NUL-terminated UTF-16 buffer of the given byte length.
        let status = unsafe {
            RegSetValueExW(
                self.handle,
                value_name.as_ptr(),
                0,
                REG_SZ,
                data.as_ptr().cast::<u8>(),
                (data.len() * 2) as u32,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(map_status(status, "RegSetValueExW", self.hive, &self.path));
        }
        debug!("Set {}\\{} [{}]", self.hive, self.path, name);
        Ok(())
    }

    fn create_subkey(&self, path: &str) -> StoreResult<Self> {
        let handle = create_raw(self.handle, self.hive, path)?;
        Ok(WindowsKey::new(handle, self.hive, self.child_path(path)))
    }

    fn open_subkey(&self, path: &str) -> StoreResult<Option<Self>> {
        let full_path = self.child_path(path);
        Ok(open_raw(self.handle, self.hive, path, KEY_READ)?
            .map(|handle| WindowsKey::new(handle, self.hive, full_path)))
    }

    fn subkey_names(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        let mut index = 0u32;
        loop {
            let mut buffer = [0u16; MAX_KEY_NAME];
            let mut len = MAX_KEY_NAME as u32;
            // SAFETY: `buffer` holds `len` UTF-16 units; optional outputs are null.
            let status = unsafe {
                RegEnumKeyExW(
                    self.handle,
                    index,
                    buffer.as_mut_ptr(),
                    &mut len,
                    ptr::null(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                )
            };
            match status {
                ERROR_SUCCESS => {
                    names.push(String::from_utf16_lossy(&buffer[..len as usize]));
                    index += 1;
                }
                ERROR_NO_MORE_ITEMS => return Ok(names),
                other => return Err(map_status(other, "RegEnumKeyExW", self.hive, &self.path)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_ROOT: &str = "Software\\Classes\\urischeme-store-test";

    #[test]
    fn test_round_trip_under_current_user() {
        let store = WindowsRegistry::new();
        let _ = store.delete_tree(Hive::CurrentUser, TEST_ROOT);

        {
            let key = store.create_key(Hive::CurrentUser, TEST_ROOT).unwrap();
            key.set_value("", "URL:test Protocol").unwrap();
            key.create_subkey("shell\\open\\command").unwrap();
            assert_eq!(
                key.get_value("").unwrap().as_deref(),
                Some("URL:test Protocol")
            );
            assert_eq!(key.get_value("missing").unwrap(), None);
            assert_eq!(key.subkey_names().unwrap(), vec!["shell"]);
        }

        store.delete_tree(Hive::CurrentUser, TEST_ROOT).unwrap();
        assert!(store.open_key(Hive::CurrentUser, TEST_ROOT).unwrap().is_none());
    }
}
