use super::*;

#[test]
fn parse_manifest() {
    let content = r#"
version = 1
min_launcher = ">=0.4"

[[files]]
path = "launcher/gantry.bin"
size = 1024
sha256 = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"

[[files]]
path = "launcher/assets/index.html"
size = 64
sha256 = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
"#;

    let parsed = UpdateManifest::from_toml_str(content).expect("manifest should parse");
    assert_eq!(parsed.version, MANIFEST_SCHEMA_VERSION);
    assert!(parsed.min_launcher.is_some());
    assert_eq!(parsed.files.len(), 2);
    assert_eq!(parsed.files[0].path, "launcher/gantry.bin");
    assert_eq!(parsed.files[0].size, 1024);
}

#[test]
fn parse_manifest_rejects_unknown_schema_version() {
    let content = r#"
version = 9

[[files]]
path = "a"
size = 1
sha256 = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
"#;
    let err = UpdateManifest::from_toml_str(content).expect_err("must reject schema version");
    assert!(err.to_string().contains("unsupported manifest schema version"));
}

#[test]
fn parse_manifest_rejects_escaping_paths() {
    for bad in ["../evil", "/etc/passwd", ""] {
        let content = format!(
            "version = 1\n\n[[files]]\npath = \"{bad}\"\nsize = 1\nsha256 = \"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855\"\n"
        );
        assert!(
            UpdateManifest::from_toml_str(&content).is_err(),
            "path '{bad}' should be rejected"
        );
    }
}

#[test]
fn parse_manifest_rejects_duplicate_paths() {
    let content = r#"
version = 1

[[files]]
path = "same"
size = 1
sha256 = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"

[[files]]
path = "same"
size = 2
sha256 = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
"#;
    let err = UpdateManifest::from_toml_str(content).expect_err("must reject duplicates");
    assert!(err.to_string().contains("duplicate manifest entry"));
}

#[test]
fn parse_manifest_rejects_malformed_fingerprint() {
    let content = r#"
version = 1

[[files]]
path = "a"
size = 1
sha256 = "ABC123"
"#;
    let err = UpdateManifest::from_toml_str(content).expect_err("must reject fingerprint");
    assert!(err.to_string().contains("invalid fingerprint"));
}

#[test]
fn channel_resolution_prefers_override_flags() {
    let none = ChannelOverride::default();
    assert_eq!(Channel::resolve(None, none), Channel::Main);
    assert_eq!(Channel::resolve(Some("develop"), none), Channel::Develop);
    assert_eq!(
        Channel::resolve(Some("develop"), ChannelOverride::from_flags(true, false)),
        Channel::Main
    );
    assert_eq!(
        Channel::resolve(None, ChannelOverride::from_flags(false, true)),
        Channel::Develop
    );
    // A relaunched instance can end up with both flags; develop wins.
    assert_eq!(
        Channel::resolve(None, ChannelOverride::from_flags(true, true)),
        Channel::Develop
    );
}

#[test]
fn channel_round_trips_through_parse() {
    for channel in [Channel::Main, Channel::Develop] {
        assert_eq!(
            Channel::parse(channel.as_str()).expect("must parse"),
            channel
        );
    }
    assert!(Channel::parse("nightly").is_err());
}

#[test]
fn layout_paths_share_one_root() {
    let layout = LauncherLayout::new("/tmp/gantry-root");
    assert_eq!(
        layout.properties_file(),
        layout.user_dir().join("properties.json")
    );
    assert_eq!(layout.run_dir(), layout.root().join("run"));
    assert_eq!(
        layout.component_dir("harrier-client"),
        layout.data_dir().join("harrier-client")
    );
}

#[test]
fn builtin_catalog_parses_and_maps_variants() {
    let catalog = TitleCatalog::builtin().expect("builtin catalog must parse");
    let harrier = catalog.find("harrier").expect("harrier must exist");
    assert_eq!(harrier.install_key(), "harrier-install");
    assert_eq!(harrier.env_var(), "GANTRY_HARRIER_INSTALL");
    assert_eq!(harrier.variant_argument("multiplayer"), Some("-multiplayer"));
    assert_eq!(harrier.variant_argument("zombies"), None);
    assert_eq!(harrier.runtime.as_deref(), Some("harrier-client"));

    let kestrel = catalog.find("kestrel").expect("kestrel must exist");
    assert!(kestrel.runtime.is_none());
}

#[test]
fn catalog_rejects_duplicate_title_ids() {
    let content = r#"
[[titles]]
id = "twin"
name = "Twin"
executable = "twin"

[[titles]]
id = "twin"
name = "Twin Again"
executable = "twin2"
"#;
    let err = TitleCatalog::from_toml_str(content).expect_err("must reject duplicate id");
    assert!(err.to_string().contains("duplicate title id"));
}
