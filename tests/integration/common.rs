//! Fixture helpers shared by the integration modules.

use std::path::PathBuf;

use statelit::{parse_file, LensConfig, SourceFile, StatePath};

/// Get the path to a machine fixture.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("machines")
        .join(name)
}

pub fn load(name: &str) -> SourceFile {
    parse_file(&fixture(name), &LensConfig::default()).expect("fixture should parse")
}

pub fn path(keys: &[&str]) -> StatePath {
    keys.iter().map(|k| k.to_string()).collect()
}
