//! `.statelit.toml` loading, discovery and its effect on discovery and edits.

use std::fs;

use tempfile::TempDir;

use statelit::config::{discover_config, ConfigError, CONFIG_FILE_NAME};
use statelit::{apply_text_edits, discover_and_load_config, parse_file, parse_source, Dialect, LensConfig, MachineEdit};

use crate::common::{fixture, load};

#[test]
fn test_discovery_walks_up_to_repo_root() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir(root.join(".git")).unwrap();
    fs::write(root.join(CONFIG_FILE_NAME), "[style]\nquote = \"double\"\n").unwrap();
    let nested = root.join("src").join("machines");
    fs::create_dir_all(&nested).unwrap();

    assert_eq!(discover_config(&nested), Some(root.join(CONFIG_FILE_NAME)));

    let (config, path) = discover_and_load_config(&nested).unwrap().unwrap();
    assert_eq!(path, root.join(CONFIG_FILE_NAME));
    assert_eq!(config.style.quote, statelit::config::QuotePreference::Double);
}

#[test]
fn test_discovery_stops_at_git_boundary() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();
    let repo = dir.path().join("repo");
    fs::create_dir_all(repo.join(".git")).unwrap();

    assert_eq!(discover_config(&repo), None);
    assert!(discover_and_load_config(&repo).unwrap().is_none());
}

#[test]
fn test_invalid_files_are_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);

    fs::write(&path, "[discovery]\nfactories = []\n").unwrap();
    assert!(matches!(LensConfig::load(&path), Err(ConfigError::NoFactories)));

    fs::write(&path, "[style]\ncolour = \"red\"\n").unwrap();
    assert!(matches!(LensConfig::load(&path), Err(ConfigError::Parse(_))));

    fs::write(&path, "[style]\nindent = 0\n").unwrap();
    assert!(matches!(LensConfig::load(&path), Err(ConfigError::InvalidIndent(0))));

    let missing = dir.path().join("nope.toml");
    assert!(matches!(LensConfig::load(&missing), Err(ConfigError::Io(..))));
}

#[test]
fn test_custom_factories_drive_discovery() {
    let src = "const m = defineFlow({ states: { a: {} } });\nconst n = createMachine({});";
    let config = LensConfig::parse("[discovery]\nfactories = [\"defineFlow\"]\n").unwrap();
    let file = parse_source(src, Dialect::TypeScript, &config).unwrap();
    assert_eq!(file.machines.len(), 1);
    assert_eq!(file.machines[0].callee, "defineFlow");

    let default = parse_file(&fixture("fetch.ts"), &config).unwrap();
    assert!(default.machines.is_empty());
}

#[test]
fn test_style_overrides_shape_new_text() {
    let file = load("fetch.ts");
    let config = LensConfig::parse("[style]\nquote = \"double\"\n").unwrap();
    let edits = file
        .edit(
            0,
            &[MachineEdit::SetInitialState {
                path: vec![],
                initial: Some("failure".into()),
            }],
            &config,
        )
        .unwrap();
    let out = apply_text_edits(&file.text, &edits).unwrap();
    assert!(out.contains("initial: \"failure\","), "{out}");
    // Untouched literals keep their quotes.
    assert!(out.contains("id: 'fetch',"), "{out}");
}
