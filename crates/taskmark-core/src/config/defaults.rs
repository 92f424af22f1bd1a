//! Default configuration values

/// Default manifest file name (YAML)
pub const DEFAULT_MANIFEST_YAML: &str = "taskmark.yaml";

/// Default manifest file name (TOML)
pub const DEFAULT_MANIFEST_TOML: &str = "taskmark.toml";

/// Alternative manifest file name
pub const ALT_MANIFEST_FILE: &str = ".taskmark.yaml";

/// Default fingerprint state file name
pub const DEFAULT_STATE_FILE: &str = ".taskmark_state.json";

/// Default grace window between interrupt and kill
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 10;

/// Get list of manifest file names to search for
pub fn manifest_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_MANIFEST_YAML,
        "taskmark.yml",
        DEFAULT_MANIFEST_TOML,
        ALT_MANIFEST_FILE,
    ]
}

/// Starter manifest written by `taskmark --init`
pub const DEFAULT_MANIFEST_TEMPLATE: &str = r#"# Taskmark task manifest
title: Example project

env:
  RUST_BACKTRACE: "1"

tasks:
  fmt:
    title: Check formatting
    scripts:
      - lang: sh
        run: cargo fmt --check

  build:
    title: Build
    depends: [fmt]
    require:
      - exists: [Cargo.toml]
    skip:
      - unchanged:
          - paths: ["src/**/*.rs", "Cargo.toml"]
    scripts:
      - lang: sh
        run: cargo build
"#;
