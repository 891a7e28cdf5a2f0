//! Scheme registration record.

use crate::config::RegistryLayout;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Icon shown for links of the scheme: a file plus a resource index inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconRef {
    pub file: PathBuf,
    pub index: i32,
}

impl IconRef {
    pub fn new(file: impl Into<PathBuf>, index: i32) -> Self {
        Self {
            file: file.into(),
            index,
        }
    }

    /// Value stored under `DefaultIcon`: `"<file>,<index>"`.
    pub fn to_registry_value(&self) -> String {
        format!("{},{}", self.file.display(), self.index)
    }

    /// Parse a `DefaultIcon` value.
    ///
    /// The index is taken from the text after the last comma; a value without
    /// a numeric index is treated as a bare file with index 0.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        match value.rsplit_once(',') {
            Some((file, index)) => match index.trim().parse::<i32>() {
                Ok(index) if !file.is_empty() => Some(Self::new(file, index)),
                Ok(_) => None,
                Err(_) => Some(Self::new(value, 0)),
            },
            None => Some(Self::new(value, 0)),
        }
    }
}

impl fmt::Display for IconRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_registry_value())
    }
}

/// How the command line passed to the handler is built.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArgumentSpec {
    /// Bare executable path.
    #[default]
    None,
    /// `n` quoted positional placeholders: `"%1" "%2" … "%n"`.
    PositionalCount(u32),
    /// Literal argument text appended after a single space.
    Literal(String),
}

impl ArgumentSpec {
    /// Text appended to the executable path in the command value.
    pub fn command_suffix(&self) -> String {
        match self {
            ArgumentSpec::None => String::new(),
            ArgumentSpec::PositionalCount(count) => (1..=*count)
                .map(|i| format!(" \"%{}\"", i))
                .collect(),
            ArgumentSpec::Literal(text) => format!(" {}", text),
        }
    }
}

/// Everything that describes one scheme registration.
///
/// Plain owned value: built by the caller or read back from the store,
/// passed to the engine and dropped afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeRecord {
    /// Scheme token without separators, e.g. `"myapp"`.
    pub scheme: String,
    /// Handler executable; must exist when registering.
    pub executable_path: PathBuf,
    /// Port of the networked-scheme variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub arguments: ArgumentSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<IconRef>,
}

impl SchemeRecord {
    /// Create a record builder.
    pub fn builder(scheme: impl Into<String>, executable_path: impl Into<PathBuf>) -> SchemeRecordBuilder {
        SchemeRecordBuilder::new(scheme, executable_path)
    }

    /// Command value stored under `shell\open\command`.
    pub fn command_line(&self) -> String {
        format!(
            "{}{}",
            self.executable_path.display(),
            self.arguments.command_suffix()
        )
    }

    /// Default value of the handler key: `"URL:<scheme> Protocol"`.
    pub fn description(&self) -> String {
        describe_scheme(&self.scheme)
    }

    pub fn executable_path(&self) -> &Path {
        &self.executable_path
    }
}

/// Default value of a handler key for `scheme`.
pub fn describe_scheme(scheme: &str) -> String {
    format!(
        "{}{} {}",
        RegistryLayout::DESCRIPTION_PREFIX,
        scheme,
        RegistryLayout::DESCRIPTION_SUFFIX
    )
}

/// Recover the scheme token from a handler key's default value.
pub fn scheme_from_description(description: &str) -> String {
    let text = description.trim();
    let text = text
        .strip_prefix(RegistryLayout::DESCRIPTION_PREFIX)
        .unwrap_or(text);
    let text = text
        .strip_suffix(RegistryLayout::DESCRIPTION_SUFFIX)
        .unwrap_or(text);
    text.trim().to_string()
}

/// Builder for scheme records.
pub struct SchemeRecordBuilder {
    record: SchemeRecord,
}

impl SchemeRecordBuilder {
    pub fn new(scheme: impl Into<String>, executable_path: impl Into<PathBuf>) -> Self {
        Self {
            record: SchemeRecord {
                scheme: scheme.into(),
                executable_path: executable_path.into(),
                port: None,
                arguments: ArgumentSpec::None,
                icon: None,
            },
        }
    }

    /// Set the port (networked-scheme variant).
    pub fn port(mut self, port: u16) -> Self {
        self.record.port = Some(port);
        self
    }

    pub fn arguments(mut self, arguments: ArgumentSpec) -> Self {
        self.record.arguments = arguments;
        self
    }

    /// Pass `count` positional placeholders to the handler.
    pub fn positional_arguments(self, count: u32) -> Self {
        self.arguments(ArgumentSpec::PositionalCount(count))
    }

    /// Pass literal argument text to the handler.
    pub fn literal_arguments(self, text: impl Into<String>) -> Self {
        self.arguments(ArgumentSpec::Literal(text.into()))
    }

    pub fn icon(mut self, file: impl Into<PathBuf>, index: i32) -> Self {
        self.record.icon = Some(IconRef::new(file, index));
        self
    }

    pub fn build(self) -> SchemeRecord {
        self.record
    }
}

/// Fields to change on an existing registration.
///
/// Unset fields keep the value read back from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemeUpdate {
    executable_path: Option<PathBuf>,
    port: Option<u16>,
    arguments: Option<ArgumentSpec>,
    icon: Option<Option<IconRef>>,
}

impl SchemeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn arguments(mut self, arguments: ArgumentSpec) -> Self {
        self.arguments = Some(arguments);
        self
    }

    pub fn icon(mut self, icon: IconRef) -> Self {
        self.icon = Some(Some(icon));
        self
    }

    /// Drop the icon of the existing registration.
    pub fn clear_icon(mut self) -> Self {
        self.icon = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the supplied fields over `base`.
    pub fn merge_into(self, mut base: SchemeRecord) -> SchemeRecord {
        if let Some(path) = self.executable_path {
            base.executable_path = path;
        }
        if let Some(port) = self.port {
            base.port = Some(port);
        }
        if let Some(arguments) = self.arguments {
            base.arguments = arguments;
        }
        if let Some(icon) = self.icon {
            base.icon = icon;
        }
        base
    }
}
