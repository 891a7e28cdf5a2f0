//! Centralized configuration for scheme registration.
//!
//! Registry layout names, built-in scheme lists and store file locations.

/// Names that make up the persisted key layout of a registration.
///
/// ```text
/// <classes>\<handlerName>
///   (default)      = "URL:<scheme> Protocol"
///   "URL Protocol" = ""
///   DefaultIcon\(default)        = "<iconFile>,<iconIndex>"
///   shell\open\command\(default) = "<executablePath><args>"
/// ```
pub struct RegistryLayout;

impl RegistryLayout {
    pub const SEPARATOR: char = '\\';
    pub const CLASSES_PATH: &'static str = "Software\\Classes";
    /// Name of the unnamed value of a key.
    pub const DEFAULT_VALUE: &'static str = "";
    pub const URL_PROTOCOL_VALUE: &'static str = "URL Protocol";
    pub const DEFAULT_ICON_KEY: &'static str = "DefaultIcon";
    pub const SHELL_KEY: &'static str = "shell";
    pub const OPEN_VERB: &'static str = "open";
    pub const COMMAND_KEY: &'static str = "shell\\open\\command";
    pub const DESCRIPTION_PREFIX: &'static str = "URL:";
    pub const DESCRIPTION_SUFFIX: &'static str = "Protocol";
}

/// Scheme text handling.
pub struct SchemeConfig;

impl SchemeConfig {
    /// Characters that end the scheme token in protocol text.
    pub const SCHEME_TERMINATORS: &'static [char] = &[':', '/'];

    /// Schemes the URI subsystem recognizes without any registration.
    pub const BUILTIN_SCHEMES: &'static [&'static str] = &[
        "http", "https", "ws", "wss", "ftp", "file", "gopher", "mailto", "news", "nntp", "telnet",
        "ldap", "net.tcp", "net.pipe", "uuid",
    ];
}

/// File-backed store settings.
pub struct StoreConfig;

impl StoreConfig {
    pub const APP_CONFIG_DIR_NAME: &'static str = "urischeme";
    pub const USER_STORE_FILENAME: &'static str = "user-classes.json";
    pub const MACHINE_STORE_FILENAME: &'static str = "machine-classes.json";
    #[cfg(unix)]
    pub const MACHINE_STORE_DIR: &'static str = "/etc/urischeme";
    pub const LOCK_SUFFIX: &'static str = "lock";
    pub const FORMAT_VERSION: u32 = 1;
    pub const USER_STORE_ENV: &'static str = "URISCHEME_USER_STORE";
    pub const MACHINE_STORE_ENV: &'static str = "URISCHEME_MACHINE_STORE";
}
