//! urischeme - install-time helper for custom URI scheme handlers.
//!
//! Wraps the `urischeme` library for setup scripts: each subcommand performs
//! one registration operation and prints a single JSON object on stdout.
//! Logs go to stderr.

mod output;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, Level};
use tracing_subscriber::FmtSubscriber;
use urischeme::{
    parse_uris, platform, scheme, ArgumentSpec, FileStore, IconRef, RegistrationScope,
    RegistryStore, SchemeManager, SchemeRecord, SchemeUpdate,
};

#[derive(Parser, Debug)]
#[command(name = "urischeme")]
#[command(about = "Register custom URI scheme handlers")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Per-user hive file (file-backed store)
    #[arg(long, global = true)]
    user_store: Option<PathBuf>,

    /// Machine-wide hive file (file-backed store)
    #[arg(long, global = true)]
    machine_store: Option<PathBuf>,

    /// Log failures and report success instead of failing
    #[arg(long, global = true)]
    swallow_errors: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a scheme handler
    Register {
        /// Scheme, with or without "://"
        protocol: String,

        /// Handler executable
        #[arg(long)]
        exe: PathBuf,

        /// Handler name (defaults to the scheme)
        #[arg(long)]
        name: Option<String>,

        /// Port of the networked variant
        #[arg(long)]
        port: Option<u16>,

        #[command(flatten)]
        arguments: ArgumentOpts,

        #[command(flatten)]
        icon: IconOpts,

        /// "user" or "machine"
        #[arg(long, default_value = "user")]
        scope: String,
    },

    /// Change an existing registration
    Update {
        protocol: String,

        /// Handler name (defaults to the scheme)
        #[arg(long)]
        name: Option<String>,

        /// New handler executable
        #[arg(long)]
        exe: Option<PathBuf>,

        #[command(flatten)]
        arguments: ArgumentOpts,

        #[command(flatten)]
        icon: IconOpts,

        /// Remove the icon
        #[arg(long, conflicts_with = "icon")]
        clear_icon: bool,

        #[arg(long, default_value = "user")]
        scope: String,
    },

    /// Remove a registration
    Unregister {
        protocol: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value = "user")]
        scope: String,
    },

    /// Check whether a registration exists
    Exists {
        protocol: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value = "user")]
        scope: String,
    },

    /// Print a stored registration
    Show {
        /// Handler name
        name: String,

        #[arg(long, default_value = "user")]
        scope: String,
    },

    /// Extract URIs from arguments, e.g. the ones a handler was launched with
    Parse {
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,

        /// Also build a candidate record handled by this executable
        #[arg(long)]
        exe: Option<PathBuf>,
    },
}

#[derive(ClapArgs, Debug)]
struct ArgumentOpts {
    /// Pass N quoted placeholders ("%1" .. "%N") to the handler
    #[arg(long, value_name = "N", conflicts_with = "literal")]
    positional: Option<u32>,

    /// Pass this literal argument text to the handler
    #[arg(long, value_name = "TEXT", allow_hyphen_values = true)]
    literal: Option<String>,
}

impl ArgumentOpts {
    fn to_spec(&self) -> Option<ArgumentSpec> {
        match (self.positional, &self.literal) {
            (Some(count), _) => Some(ArgumentSpec::PositionalCount(count)),
            (None, Some(text)) => Some(ArgumentSpec::Literal(text.clone())),
            (None, None) => None,
        }
    }
}

#[derive(ClapArgs, Debug)]
struct IconOpts {
    /// Icon file
    #[arg(long)]
    icon: Option<PathBuf>,

    /// Resource index inside the icon file
    #[arg(long, default_value_t = 0)]
    icon_index: i32,
}

impl IconOpts {
    fn to_icon(&self) -> Option<IconRef> {
        self.icon
            .as_ref()
            .map(|file| IconRef::new(file, self.icon_index))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match dispatch(&args) {
        Ok(data) => {
            println!("{}", output::success(data));
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{:#}", err);
            let (response, code) = output::failure(&err);
            println!("{}", response);
            ExitCode::from(code)
        }
    }
}

fn dispatch(args: &Args) -> Result<Value> {
    if let Command::Parse { args: uris, exe } = &args.command {
        return parse_command(uris, exe.as_ref());
    }

    #[cfg(windows)]
    {
        if args.user_store.is_none() && args.machine_store.is_none() {
            debug!("Using the native registry");
            return run(urischeme::WindowsRegistry::new(), args);
        }
    }

    let store = open_file_store(args)?;
    debug!(
        "Using file store at {} and {}",
        store.hive_path(urischeme::Hive::CurrentUser).display(),
        store.hive_path(urischeme::Hive::LocalMachine).display()
    );
    run(store, args)
}

fn open_file_store(args: &Args) -> Result<FileStore> {
    let user = match &args.user_store {
        Some(path) => path.clone(),
        None => platform::user_store_path().context("Failed to resolve the user store path")?,
    };
    let machine = match &args.machine_store {
        Some(path) => path.clone(),
        None => platform::machine_store_path()
            .context("Failed to resolve the machine store path")?,
    };
    Ok(FileStore::open(user, machine))
}

fn run<S: RegistryStore>(store: S, args: &Args) -> Result<Value> {
    let manager = SchemeManager::builder(store)
        .throw_errors(!args.swallow_errors)
        .build();

    match &args.command {
        Command::Register {
            protocol,
            exe,
            name,
            port,
            arguments,
            icon,
            scope,
        } => {
            let scope: RegistrationScope = scope.parse()?;
            let arguments = arguments.to_spec().unwrap_or_default();
            let handler = handler_name(protocol, name.as_deref());
            match port {
                Some(port) => manager.register_with_port(
                    protocol,
                    exe,
                    *port,
                    &handler,
                    arguments,
                    icon.to_icon(),
                    scope,
                )?,
                None => {
                    let record = SchemeRecord {
                        scheme: protocol.clone(),
                        executable_path: exe.clone(),
                        port: None,
                        arguments,
                        icon: icon.to_icon(),
                    };
                    manager.register_record(&handler, &record, scope)?
                }
            }
            Ok(json!({ "handler": handler, "scope": scope }))
        }

        Command::Update {
            protocol,
            name,
            exe,
            arguments,
            icon,
            clear_icon,
            scope,
        } => {
            let scope: RegistrationScope = scope.parse()?;
            let handler = handler_name(protocol, name.as_deref());
            let mut changes = SchemeUpdate::new();
            if let Some(exe) = exe {
                changes = changes.executable_path(exe);
            }
            if let Some(arguments) = arguments.to_spec() {
                changes = changes.arguments(arguments);
            }
            if let Some(icon) = icon.to_icon() {
                changes = changes.icon(icon);
            }
            if *clear_icon {
                changes = changes.clear_icon();
            }
            if changes.is_empty() {
                anyhow::bail!(
                    "Nothing to update: pass --exe, --positional, --literal, --icon or --clear-icon"
                );
            }
            manager.apply_update(protocol, &handler, changes, scope)?;
            Ok(json!({ "handler": handler, "scope": scope }))
        }

        Command::Unregister {
            protocol,
            name,
            scope,
        } => {
            let scope: RegistrationScope = scope.parse()?;
            let handler = handler_name(protocol, name.as_deref());
            manager.unregister(protocol, &handler, scope)?;
            Ok(json!({ "handler": handler, "scope": scope }))
        }

        Command::Exists {
            protocol,
            name,
            scope,
        } => {
            let scope: RegistrationScope = scope.parse()?;
            let handler = handler_name(protocol, name.as_deref());
            let exists = manager.exists(protocol, &handler, scope)?;
            Ok(json!({ "handler": handler, "scope": scope, "exists": exists }))
        }

        Command::Show { name, scope } => {
            let scope: RegistrationScope = scope.parse()?;
            let record = manager.read_back(name, scope)?;
            Ok(json!({ "handler": name, "scope": scope, "record": record }))
        }

        Command::Parse { args: uris, exe } => parse_command(uris, exe.as_ref()),
    }
}

fn handler_name(protocol: &str, name: Option<&str>) -> String {
    name.map(str::to_string)
        .unwrap_or_else(|| scheme::normalize(protocol).to_string())
}

fn parse_command(uris: &[String], exe: Option<&PathBuf>) -> Result<Value> {
    let parsed = parse_uris(uris);
    let records: Option<Vec<SchemeRecord>> = exe.map(|exe| {
        parsed
            .iter()
            .cloned()
            .map(|uri| uri.into_record(exe))
            .collect()
    });
    Ok(json!({ "uris": parsed, "records": records }))
}
