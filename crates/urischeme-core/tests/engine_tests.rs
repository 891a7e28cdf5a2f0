//! Integration tests for the registration engine and the manager facade.
//!
//! Every test runs against the in-memory store with executable and icon
//! fixtures created in a temp directory.

use std::path::PathBuf;
use tempfile::TempDir;
use urischeme::store::KeyNode;
use urischeme::{
    ArgumentSpec, FileStore, Hive, IconRef, KnownSchemes, MemoryStore, RegistrationEngine,
    RegistrationScope, RegistryKey, RegistryStore, SchemeError, SchemeManager, SchemeRecord,
    SchemeUpdate,
};

const USER: RegistrationScope = RegistrationScope::CurrentUser;
const MACHINE: RegistrationScope = RegistrationScope::Machine;

/// Temp directory holding a fake executable and icon.
struct Fixture {
    dir: TempDir,
    exe: PathBuf,
    icon: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let exe = dir.path().join("demo");
        let icon = dir.path().join("demo.ico");
        std::fs::write(&exe, b"#!/bin/sh\n").unwrap();
        std::fs::write(&icon, b"").unwrap();
        Self { dir, exe, icon }
    }

    fn file(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"").unwrap();
        path
    }
}

fn engine() -> RegistrationEngine<MemoryStore> {
    RegistrationEngine::new(MemoryStore::new())
}

fn handler_node(
    engine: &RegistrationEngine<MemoryStore>,
    hive: Hive,
    name: &str,
) -> Option<KeyNode> {
    engine
        .store()
        .snapshot()
        .hive(hive)
        .descend(&["Software", "Classes", name])
        .cloned()
}

fn command_value(engine: &RegistrationEngine<MemoryStore>, name: &str) -> Option<String> {
    handler_node(engine, Hive::CurrentUser, name)?
        .descend(&["shell", "open", "command"])?
        .value("")
        .map(str::to_string)
}

#[test]
fn test_register_then_exists() {
    let fx = Fixture::new();
    let engine = engine();
    let record = SchemeRecord::builder("demo", &fx.exe).build();

    engine.register("demo", &record, USER).unwrap();

    assert!(engine.exists("demo", "demo", USER).unwrap());
    assert!(engine.exists("demo://", "demo", USER).unwrap());
    assert!(!engine.exists("demo", "demo", MACHINE).unwrap());
    assert!(!engine.exists("other", "demo", USER).unwrap());
    assert_eq!(engine.store().open_handles(), 0);
}

#[test]
fn test_demo_command_values() {
    let fx = Fixture::new();
    let engine = engine();

    let plain = SchemeRecord::builder("demo", &fx.exe).build();
    engine.register("demo", &plain, USER).unwrap();
    assert_eq!(command_value(&engine, "demo"), Some(fx.exe.display().to_string()));
    assert_eq!(
        handler_node(&engine, Hive::CurrentUser, "demo")
            .unwrap()
            .value("")
            .map(str::to_string),
        Some("URL:demo Protocol".to_string())
    );

    let with_args = SchemeRecord::builder("demo2", &fx.exe)
        .positional_arguments(2)
        .build();
    engine.register("demo2", &with_args, USER).unwrap();
    assert_eq!(
        command_value(&engine, "demo2"),
        Some(format!("{} \"%1\" \"%2\"", fx.exe.display()))
    );
}

#[test]
fn test_icon_value_layout() {
    let fx = Fixture::new();
    let engine = engine();
    let record = SchemeRecord::builder("demo", &fx.exe)
        .icon(&fx.icon, 2)
        .literal_arguments("--open")
        .build();

    engine.register("demo", &record, USER).unwrap();

    let node = handler_node(&engine, Hive::CurrentUser, "demo").unwrap();
    assert_eq!(
        node.descend(&["DefaultIcon"]).unwrap().value(""),
        Some(format!("{},2", fx.icon.display()).as_str())
    );
    assert_eq!(node.value("URL Protocol"), Some(""));
    assert_eq!(
        command_value(&engine, "demo"),
        Some(format!("{} --open", fx.exe.display()))
    );
}

#[test]
fn test_separator_forms_store_identical_scheme() {
    let fx = Fixture::new();
    let with_separator = engine();
    let bare = engine();

    with_separator
        .register("test", &SchemeRecord::builder("test://", &fx.exe).build(), USER)
        .unwrap();
    bare.register("test", &SchemeRecord::builder("test", &fx.exe).build(), USER)
        .unwrap();

    assert_eq!(with_separator.store().snapshot(), bare.store().snapshot());
    assert_eq!(
        handler_node(&bare, Hive::CurrentUser, "test")
            .unwrap()
            .value("")
            .map(str::to_string),
        Some("URL:test Protocol".to_string())
    );
}

#[test]
fn test_duplicate_handler_name_leaves_store_unchanged() {
    let fx = Fixture::new();
    let engine = engine();
    engine
        .register("demo", &SchemeRecord::builder("demo", &fx.exe).build(), USER)
        .unwrap();
    let before = engine.store().snapshot();
    let writes = engine.store().write_count();

    let other = fx.file("other");
    let err = engine
        .register("demo", &SchemeRecord::builder("demo", &other).build(), USER)
        .unwrap_err();

    assert!(matches!(err, SchemeError::AlreadyRegistered { .. }));
    assert_eq!(engine.store().snapshot(), before);
    assert_eq!(engine.store().write_count(), writes);
    assert_eq!(engine.store().open_handles(), 0);
}

#[test]
fn test_second_handler_for_same_scheme_is_rejected() {
    let fx = Fixture::new();
    let engine = engine();
    engine
        .register("FirstApp", &SchemeRecord::builder("demo", &fx.exe).build(), USER)
        .unwrap();

    let err = engine
        .register("SecondApp", &SchemeRecord::builder("demo", &fx.exe).build(), USER)
        .unwrap_err();
    assert!(matches!(err, SchemeError::AlreadyRegistered { .. }));

    // The other scope is independent
    engine
        .register("SecondApp", &SchemeRecord::builder("demo", &fx.exe).build(), MACHINE)
        .unwrap();
}

#[test]
fn test_known_schemes_cannot_be_registered() {
    let fx = Fixture::new();
    let engine = engine();
    let err = engine
        .register("web", &SchemeRecord::builder("https", &fx.exe).build(), USER)
        .unwrap_err();
    assert!(matches!(err, SchemeError::AlreadyRegistered { ref scheme, .. } if scheme == "https"));

    let custom = RegistrationEngine::with_known_schemes(
        MemoryStore::new(),
        KnownSchemes::empty().with("demo"),
    );
    assert!(custom.exists("demo", "anything", USER).unwrap());
    custom
        .register("web", &SchemeRecord::builder("https", &fx.exe).build(), USER)
        .unwrap();
}

#[test]
fn test_missing_executable_writes_nothing() {
    let fx = Fixture::new();
    let engine = engine();
    let missing = fx.dir.path().join("missing");

    let err = engine
        .register("demo", &SchemeRecord::builder("demo", &missing).build(), USER)
        .unwrap_err();

    assert!(matches!(err, SchemeError::NotFound(ref path) if *path == missing));
    assert_eq!(engine.store().write_count(), 0);
    assert!(engine.store().snapshot().current_user.is_empty());
}

#[test]
fn test_missing_icon_writes_nothing() {
    let fx = Fixture::new();
    let engine = engine();
    let record = SchemeRecord::builder("demo", &fx.exe)
        .icon(fx.dir.path().join("missing.ico"), 0)
        .build();

    let err = engine.register("demo", &record, USER).unwrap_err();
    assert!(matches!(err, SchemeError::NotFound(_)));
    assert_eq!(engine.store().write_count(), 0);
}

#[test]
fn test_validation_order_and_kinds() {
    let fx = Fixture::new();
    let engine = engine();

    // Executable is checked before everything else
    let err = engine
        .register("", &SchemeRecord::builder("", fx.dir.path().join("nope")).build(), USER)
        .unwrap_err();
    assert!(matches!(err, SchemeError::NotFound(_)));

    let err = engine
        .register("", &SchemeRecord::builder("demo", &fx.exe).build(), USER)
        .unwrap_err();
    assert!(matches!(err, SchemeError::InvalidArgument { .. }));

    let err = engine
        .register("demo", &SchemeRecord::builder("", &fx.exe).build(), USER)
        .unwrap_err();
    assert!(matches!(err, SchemeError::InvalidArgument { .. }));

    let err = engine
        .register("demo", &SchemeRecord::builder("my app", &fx.exe).build(), USER)
        .unwrap_err();
    assert!(matches!(err, SchemeError::MalformedScheme { .. }));

    let err = engine
        .register(
            "demo",
            &SchemeRecord::builder("demo", &fx.exe).literal_arguments("  ").build(),
            USER,
        )
        .unwrap_err();
    assert!(matches!(err, SchemeError::InvalidArgument { .. }));
    assert_eq!(engine.store().write_count(), 0);
}

#[test]
fn test_unregister_never_registered() {
    let engine = engine();
    let err = engine.unregister("demo", "demo", USER).unwrap_err();
    assert!(matches!(
        err,
        SchemeError::NotRegistered { ref scheme, ref handler } if scheme == "demo" && handler == "demo"
    ));
}

#[test]
fn test_register_unregister_exists() {
    let fx = Fixture::new();
    let engine = engine();
    engine
        .register("demo", &SchemeRecord::builder("demo", &fx.exe).build(), MACHINE)
        .unwrap();

    engine.unregister("demo://", "demo", MACHINE).unwrap();

    assert!(!engine.exists("demo", "demo", MACHINE).unwrap());
    assert!(handler_node(&engine, Hive::LocalMachine, "demo").is_none());
    assert!(matches!(
        engine.unregister("demo", "demo", MACHINE),
        Err(SchemeError::NotRegistered { .. })
    ));
}

#[test]
fn test_path_only_update_preserves_icon_and_arguments() {
    let fx = Fixture::new();
    let engine = engine();
    let record = SchemeRecord::builder("demo", &fx.exe)
        .positional_arguments(1)
        .icon(&fx.icon, 4)
        .build();
    engine.register("DemoApp", &record, USER).unwrap();

    let new_exe = fx.file("demo-v2");
    engine
        .update(
            "demo",
            "DemoApp",
            SchemeUpdate::new().executable_path(&new_exe),
            USER,
        )
        .unwrap();

    let back = engine.read_back("DemoApp", USER).unwrap().unwrap();
    assert_eq!(back.executable_path, new_exe);
    assert_eq!(back.arguments, ArgumentSpec::PositionalCount(1));
    assert_eq!(back.icon, Some(IconRef::new(&fx.icon, 4)));
    assert_eq!(back.scheme, "demo");
}

#[test]
fn test_update_can_clear_icon() {
    let fx = Fixture::new();
    let engine = engine();
    let record = SchemeRecord::builder("demo", &fx.exe).icon(&fx.icon, 0).build();
    engine.register("demo", &record, USER).unwrap();

    engine
        .update("demo", "demo", SchemeUpdate::new().clear_icon(), USER)
        .unwrap();

    let back = engine.read_back("demo", USER).unwrap().unwrap();
    assert_eq!(back.icon, None);
    assert!(handler_node(&engine, Hive::CurrentUser, "demo")
        .unwrap()
        .child("DefaultIcon")
        .is_none());
}

#[test]
fn test_update_of_missing_registration() {
    let fx = Fixture::new();
    let engine = engine();
    let err = engine
        .update("demo", "demo", SchemeUpdate::new().executable_path(&fx.exe), USER)
        .unwrap_err();
    assert!(matches!(err, SchemeError::NotRegistered { .. }));
}

#[test]
fn test_invalid_update_fails_before_mutation() {
    let fx = Fixture::new();
    let engine = engine();
    engine
        .register("demo", &SchemeRecord::builder("demo", &fx.exe).build(), USER)
        .unwrap();
    let before = engine.store().snapshot();

    let err = engine
        .update(
            "demo",
            "demo",
            SchemeUpdate::new().executable_path(fx.dir.path().join("gone")),
            USER,
        )
        .unwrap_err();

    assert!(matches!(err, SchemeError::NotFound(_)));
    assert_eq!(engine.store().snapshot(), before);
    assert!(engine.exists("demo", "demo", USER).unwrap());
}

#[test]
fn test_update_without_command_is_inconsistent() {
    let fx = Fixture::new();
    let engine = engine();
    engine
        .register("demo", &SchemeRecord::builder("demo", &fx.exe).build(), USER)
        .unwrap();
    engine
        .store()
        .delete_tree(Hive::CurrentUser, "Software\\Classes\\demo\\shell")
        .unwrap();

    let err = engine
        .update("demo", "demo", SchemeUpdate::new().executable_path(&fx.exe), USER)
        .unwrap_err();
    assert!(matches!(err, SchemeError::InternalInconsistency { .. }));
}

#[test]
fn test_permission_errors_are_scope_specific() {
    let fx = Fixture::new();
    let engine = engine();
    engine.store().deny_writes(Hive::LocalMachine);

    let err = engine
        .register("demo", &SchemeRecord::builder("demo", &fx.exe).build(), MACHINE)
        .unwrap_err();
    assert!(matches!(err, SchemeError::PermissionDenied { scope: MACHINE, .. }));
    assert_eq!(
        err.to_string(),
        "Failed to write registry values on the local machine, check your permissions"
    );

    engine.store().deny_access(Hive::CurrentUser);
    let err = engine.exists("demo", "demo", USER).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to read registry values on current user, check your permissions"
    );
    assert_eq!(engine.store().open_handles(), 0);
}

#[test]
fn test_busy_store_reports_concurrent_access() {
    let fx = Fixture::new();
    let engine = engine();
    engine.store().set_busy(true);

    let err = engine
        .register("demo", &SchemeRecord::builder("demo", &fx.exe).build(), USER)
        .unwrap_err();
    assert!(matches!(err, SchemeError::ConcurrentAccess { .. }));
    assert!(err.is_retryable());
}

#[test]
fn test_partial_write_is_not_rolled_back_and_is_reclaimed() {
    let fx = Fixture::new();
    let engine = engine();
    engine.store().fail_writes_after(3);

    let err = engine
        .register("demo", &SchemeRecord::builder("demo", &fx.exe).build(), USER)
        .unwrap_err();
    assert!(matches!(err, SchemeError::StoreFailure { .. }));
    assert!(handler_node(&engine, Hive::CurrentUser, "demo").is_some());
    assert!(!engine.exists("demo", "demo", USER).unwrap());
    assert!(engine.read_back("demo", USER).unwrap().is_none());
    assert_eq!(engine.store().open_handles(), 0);

    engine.store().clear_faults();
    engine
        .register("demo", &SchemeRecord::builder("demo", &fx.exe).build(), USER)
        .unwrap();
    assert!(engine.exists("demo", "demo", USER).unwrap());
}

#[test]
fn test_existing_class_key_keeps_its_contents() {
    let fx = Fixture::new();
    let engine = engine();
    {
        let store = engine.store();
        let key = store
            .create_key(Hive::CurrentUser, "Software\\Classes\\MyProgId")
            .unwrap();
        key.set_value("", "My Document Type").unwrap();
        key.create_subkey("shell\\edit\\command")
            .unwrap()
            .set_value("", "/bin/editor \"%1\"")
            .unwrap();
        key.create_subkey("CLSID")
            .unwrap()
            .set_value("", "{00000000-0000-0000-0000-000000000001}")
            .unwrap();
    }

    let record = SchemeRecord::builder("myprog", &fx.exe).build();
    engine.register("MyProgId", &record, USER).unwrap();

    let node = handler_node(&engine, Hive::CurrentUser, "MyProgId").unwrap();
    assert_eq!(node.value(""), Some("URL:myprog Protocol"));
    assert_eq!(node.value("URL Protocol"), Some(""));
    assert_eq!(
        node.descend(&["shell", "edit", "command"])
            .and_then(|n| n.value("")),
        Some("/bin/editor \"%1\"")
    );
    assert!(node.child("CLSID").is_some());
    assert_eq!(
        command_value(&engine, "MyProgId"),
        Some(fx.exe.display().to_string())
    );
    assert!(engine.exists("myprog", "MyProgId", USER).unwrap());
    assert_eq!(engine.store().open_handles(), 0);
}

#[test]
fn test_interrupted_registration_is_replaced() {
    let fx = Fixture::new();
    let engine = engine();
    let with_icon = SchemeRecord::builder("demo", &fx.exe)
        .icon(&fx.icon, 1)
        .build();

    // key, command key, command, icon key, icon, URL Protocol
    engine.store().fail_writes_after(6);
    assert!(engine.register("demo", &with_icon, USER).is_err());
    let node = handler_node(&engine, Hive::CurrentUser, "demo").unwrap();
    assert_eq!(node.value("URL Protocol"), Some(""));
    assert_eq!(node.value(""), None);

    engine.store().clear_faults();
    let without_icon = SchemeRecord::builder("demo", &fx.exe).build();
    engine.register("demo", &without_icon, USER).unwrap();

    let node = handler_node(&engine, Hive::CurrentUser, "demo").unwrap();
    assert!(node.child("DefaultIcon").is_none());
    assert_eq!(
        engine.read_back("demo", USER).unwrap(),
        Some(without_icon)
    );
}

#[test]
fn test_unreadable_sibling_does_not_block_registration() {
    let fx = Fixture::new();
    let engine = engine();
    engine
        .store()
        .create_key(Hive::LocalMachine, "Software\\Classes\\Locked")
        .unwrap()
        .set_value("", "URL:locked Protocol")
        .unwrap();
    engine
        .store()
        .deny_key(Hive::LocalMachine, "Software\\Classes\\Locked");

    let record = SchemeRecord::builder("demo", &fx.exe).build();
    engine.register("demo", &record, MACHINE).unwrap();
    assert!(engine.exists("demo", "demo", MACHINE).unwrap());
    assert_eq!(engine.store().open_handles(), 0);

    engine.store().deny_access(Hive::LocalMachine);
    let err = engine
        .register("other", &SchemeRecord::builder("other", &fx.exe).build(), MACHINE)
        .unwrap_err();
    assert!(matches!(err, SchemeError::PermissionDenied { .. }));
}

#[test]
fn test_scope_codes() {
    assert_eq!(RegistrationScope::try_from(0x20).unwrap(), USER);
    assert_eq!(RegistrationScope::try_from(0x40).unwrap(), MACHINE);
    assert!(matches!(
        RegistrationScope::try_from(0x01),
        Err(SchemeError::InvalidConfiguration { .. })
    ));
    assert!(matches!(
        "everyone".parse::<RegistrationScope>(),
        Err(SchemeError::InvalidConfiguration { .. })
    ));
}

#[test]
fn test_manager_swallow_mode() {
    let fx = Fixture::new();
    let manager = SchemeManager::builder(MemoryStore::new())
        .throw_errors(false)
        .build();

    manager
        .register("demo", fx.dir.path().join("missing"), USER, ArgumentSpec::None, None)
        .unwrap();
    assert!(!manager.exists("demo", "demo", USER).unwrap());
    manager.unregister("demo", "demo", USER).unwrap();
    manager
        .update("demo", &fx.exe, "demo", None, None, USER)
        .unwrap();
    assert!(manager.read_back("demo", USER).unwrap().is_none());
    assert_eq!(manager.engine().store().write_count(), 0);
}

#[test]
fn test_manager_port_variant() {
    let fx = Fixture::new();
    let manager = SchemeManager::new(MemoryStore::new());

    manager
        .register_with_port(
            "demo",
            &fx.exe,
            8080,
            "DemoNet",
            ArgumentSpec::PositionalCount(1),
            Some(IconRef::new(&fx.icon, 0)),
            USER,
        )
        .unwrap();
    assert!(manager.exists("demo", "DemoNet", USER).unwrap());

    let back = manager.read_back("DemoNet", USER).unwrap().unwrap();
    assert_eq!(back.port, None);
    assert_eq!(back.arguments, ArgumentSpec::PositionalCount(1));

    let new_exe = fx.file("demo-net-v2");
    manager
        .update("demo", &new_exe, "DemoNet", None, None, USER)
        .unwrap();
    let back = manager.read_back("DemoNet", USER).unwrap().unwrap();
    assert_eq!(back.executable_path, new_exe);
    assert_eq!(back.icon, Some(IconRef::new(&fx.icon, 0)));
}

#[test]
fn test_file_store_registration_persists() {
    let fx = Fixture::new();
    let store_dir = TempDir::new().unwrap();
    let record = SchemeRecord::builder("demo", &fx.exe)
        .literal_arguments("--url %1")
        .build();

    RegistrationEngine::new(FileStore::in_dir(store_dir.path()))
        .register("demo", &record, USER)
        .unwrap();

    let reopened = RegistrationEngine::new(FileStore::in_dir(store_dir.path()));
    assert!(reopened.exists("demo", "demo", USER).unwrap());
    assert_eq!(reopened.read_back("demo", USER).unwrap(), Some(record));

    reopened.unregister("demo", "demo", USER).unwrap();
    assert!(!RegistrationEngine::new(FileStore::in_dir(store_dir.path()))
        .exists("demo", "demo", USER)
        .unwrap());
}
