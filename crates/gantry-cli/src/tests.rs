use std::fs;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use gantry_core::{Channel, LauncherLayout, ManifestFile, TitleCatalog, UpdateManifest};
use gantry_store::PropertyStore;
use gantry_updater::{
    sha256_hex, CancelToken, DirTransport, FileUpdater, NullListener, UpdateOutcome, UpdateScope,
};

use crate::commands::{CommandRegistry, LaunchContext};
use crate::flows::{run_update_pass_with, Cli};

fn test_root(tag: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    path.push(format!(
        "gantry-cli-tests-{tag}-{}-{}",
        std::process::id(),
        nanos
    ));
    path
}

fn publish_file(
    remote: &Path,
    channel: Channel,
    scope: &UpdateScope,
    rel: &str,
    contents: &[u8],
) -> ManifestFile {
    let path = remote
        .join(channel.as_str())
        .join(scope.dir_name())
        .join("files")
        .join(rel);
    fs::create_dir_all(path.parent().expect("file path must have a parent"))
        .expect("must create remote dirs");
    fs::write(&path, contents).expect("must write remote file");

    ManifestFile {
        path: rel.to_string(),
        size: contents.len() as u64,
        sha256: sha256_hex(contents),
    }
}

fn publish_manifest(remote: &Path, channel: Channel, scope: &UpdateScope, files: Vec<ManifestFile>) {
    let manifest = UpdateManifest {
        version: gantry_core::MANIFEST_SCHEMA_VERSION,
        min_launcher: None,
        files,
    };
    let dir = remote.join(channel.as_str()).join(scope.dir_name());
    fs::create_dir_all(&dir).expect("must create scope dir");
    fs::write(
        dir.join("manifest.toml"),
        manifest.to_toml_string().expect("manifest must serialize"),
    )
    .expect("must write manifest");
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn registry_rejects_unknown_commands() {
    let root = test_root("registry-unknown");
    let layout = LauncherLayout::new(root.clone());
    layout.ensure_base_dirs().expect("must create dirs");

    let store = PropertyStore::open(&layout);
    let catalog = TitleCatalog::builtin().expect("builtin catalog");
    let transport = DirTransport::new(root.join("remote"));
    let listener = NullListener;
    let updater = FileUpdater::new(&transport, &listener);
    let cancel = CancelToken::new();

    let registry = CommandRegistry::builtin();
    let mut context = LaunchContext {
        layout: &layout,
        store: &store,
        catalog: &catalog,
        channel: Channel::Main,
        updater: &updater,
        cancel: &cancel,
        pending_relaunch: None,
        cancelled: false,
    };

    let err = registry
        .dispatch(&mut context, "self-destruct", "")
        .expect_err("unknown command must fail");
    assert!(err.to_string().contains("unknown command"));
    assert_eq!(
        registry.command_names(),
        vec!["get-property", "launch", "set-property", "switch-channel"]
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn set_property_handler_writes_through_the_store() {
    let root = test_root("set-property");
    let layout = LauncherLayout::new(root.clone());
    layout.ensure_base_dirs().expect("must create dirs");

    let store = PropertyStore::open(&layout);
    let catalog = TitleCatalog::builtin().expect("builtin catalog");
    let transport = DirTransport::new(root.join("remote"));
    let listener = NullListener;
    let updater = FileUpdater::new(&transport, &listener);
    let cancel = CancelToken::new();

    let registry = CommandRegistry::builtin();
    let mut context = LaunchContext {
        layout: &layout,
        store: &store,
        catalog: &catalog,
        channel: Channel::Main,
        updater: &updater,
        cancel: &cancel,
        pending_relaunch: None,
        cancelled: false,
    };

    registry
        .dispatch(
            &mut context,
            "set-property",
            "harrier-install=/games/harrier",
        )
        .expect("set-property must succeed");
    assert_eq!(
        store.load("harrier-install").as_deref(),
        Some("/games/harrier")
    );

    let err = registry
        .dispatch(&mut context, "set-property", "no-equals-sign")
        .expect_err("malformed argument must fail");
    assert!(err.to_string().contains("usage: set-property"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn launch_handler_validates_title_variant_and_install_path() {
    let root = test_root("launch-validate");
    let layout = LauncherLayout::new(root.clone());
    layout.ensure_base_dirs().expect("must create dirs");

    let store = PropertyStore::open(&layout);
    let catalog = TitleCatalog::builtin().expect("builtin catalog");
    let transport = DirTransport::new(root.join("remote"));
    let listener = NullListener;
    let updater = FileUpdater::new(&transport, &listener);
    let cancel = CancelToken::new();

    let registry = CommandRegistry::builtin();
    let mut context = LaunchContext {
        layout: &layout,
        store: &store,
        catalog: &catalog,
        channel: Channel::Main,
        updater: &updater,
        cancel: &cancel,
        pending_relaunch: None,
        cancelled: false,
    };

    let err = registry
        .dispatch(&mut context, "launch", "nonexistent singleplayer")
        .expect_err("unknown title must fail");
    assert!(err.to_string().contains("unknown title"));

    let err = registry
        .dispatch(&mut context, "launch", "harrier zombies")
        .expect_err("unknown variant must fail");
    assert!(err.to_string().contains("unknown variant"));

    let err = registry
        .dispatch(&mut context, "launch", "kestrel campaign")
        .expect_err("missing install path must fail");
    assert!(err.to_string().contains("no installation path stored"));

    let err = registry
        .dispatch(&mut context, "launch", "harrier")
        .expect_err("missing variant argument must fail");
    assert!(err.to_string().contains("usage: launch"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn switch_channel_handler_schedules_a_relaunch() {
    let root = test_root("switch-channel");
    let layout = LauncherLayout::new(root.clone());
    layout.ensure_base_dirs().expect("must create dirs");

    let store = PropertyStore::open(&layout);
    let catalog = TitleCatalog::builtin().expect("builtin catalog");
    let transport = DirTransport::new(root.join("remote"));
    let listener = NullListener;
    let updater = FileUpdater::new(&transport, &listener);
    let cancel = CancelToken::new();

    let registry = CommandRegistry::builtin();
    let mut context = LaunchContext {
        layout: &layout,
        store: &store,
        catalog: &catalog,
        channel: Channel::Main,
        updater: &updater,
        cancel: &cancel,
        pending_relaunch: None,
        cancelled: false,
    };

    registry
        .dispatch(&mut context, "switch-channel", "develop")
        .expect("switch must succeed");
    assert_eq!(context.pending_relaunch, Some(Channel::Develop));

    let err = registry
        .dispatch(&mut context, "switch-channel", "nightly")
        .expect_err("invalid channel must fail");
    assert!(err.to_string().contains("invalid channel"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn update_pass_syncs_launcher_tree_and_configured_runtimes_only() {
    let root = test_root("update-pass");
    let layout = LauncherLayout::new(root.join("layout"));
    layout.ensure_base_dirs().expect("must create dirs");
    let remote = root.join("remote");

    let launcher_scope = UpdateScope::Launcher;
    let launcher_file = publish_file(
        &remote,
        Channel::Main,
        &launcher_scope,
        "assets/shell.html",
        b"<shell/>",
    );
    publish_manifest(&remote, Channel::Main, &launcher_scope, vec![launcher_file]);

    let runtime_scope = UpdateScope::Component("harrier-client".to_string());
    let runtime_file = publish_file(
        &remote,
        Channel::Main,
        &runtime_scope,
        "client.bin",
        b"client",
    );
    publish_manifest(&remote, Channel::Main, &runtime_scope, vec![runtime_file]);

    let store = PropertyStore::open(&layout);
    let catalog = TitleCatalog::builtin().expect("builtin catalog");
    let transport = DirTransport::new(&remote);

    // No install path stored: only the launcher tree syncs.
    let outcome = run_update_pass_with(
        &transport,
        &layout,
        &store,
        &catalog,
        Channel::Main,
        &NullListener,
        &CancelToken::new(),
        None,
    )
    .expect("pass must succeed");
    match outcome {
        UpdateOutcome::Completed(stats) => assert_eq!(stats.downloaded, 1),
        UpdateOutcome::Cancelled => panic!("pass must not be cancelled"),
    }
    assert!(layout
        .component_dir("launcher")
        .join("assets/shell.html")
        .exists());
    assert!(!layout
        .component_dir("harrier-client")
        .join("client.bin")
        .exists());

    // With the title installed, its runtime syncs too.
    store
        .store("harrier-install", "/games/harrier")
        .expect("must store install path");
    let outcome = run_update_pass_with(
        &transport,
        &layout,
        &store,
        &catalog,
        Channel::Main,
        &NullListener,
        &CancelToken::new(),
        None,
    )
    .expect("pass must succeed");
    match outcome {
        UpdateOutcome::Completed(stats) => assert_eq!(stats.downloaded, 1),
        UpdateOutcome::Cancelled => panic!("pass must not be cancelled"),
    }
    assert!(layout
        .component_dir("harrier-client")
        .join("client.bin")
        .exists());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn update_pass_component_filter_skips_the_launcher_tree() {
    let root = test_root("component-filter");
    let layout = LauncherLayout::new(root.join("layout"));
    layout.ensure_base_dirs().expect("must create dirs");
    let remote = root.join("remote");

    let runtime_scope = UpdateScope::Component("harrier-client".to_string());
    let runtime_file = publish_file(
        &remote,
        Channel::Main,
        &runtime_scope,
        "client.bin",
        b"client",
    );
    publish_manifest(&remote, Channel::Main, &runtime_scope, vec![runtime_file]);

    let store = PropertyStore::open(&layout);
    store
        .store("harrier-install", "/games/harrier")
        .expect("must store install path");
    let catalog = TitleCatalog::builtin().expect("builtin catalog");
    let transport = DirTransport::new(&remote);

    // No launcher manifest was published; the filter keeps the pass from
    // ever asking for it.
    let outcome = run_update_pass_with(
        &transport,
        &layout,
        &store,
        &catalog,
        Channel::Main,
        &NullListener,
        &CancelToken::new(),
        Some("harrier-client"),
    )
    .expect("filtered pass must succeed");
    match outcome {
        UpdateOutcome::Completed(stats) => assert_eq!(stats.downloaded, 1),
        UpdateOutcome::Cancelled => panic!("pass must not be cancelled"),
    }

    let _ = fs::remove_dir_all(&root);
}
