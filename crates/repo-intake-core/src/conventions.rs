//! Filename and directory conventions shared by scoring and chunking.
//!
//! All name checks are case-insensitive and operate on repository-relative
//! paths with `/` separators.

use globset::GlobSet;
use std::sync::OnceLock;

use crate::language::{detect_language, is_source_language};
use crate::rules::{build_globset, GENERATED_GLOBS, TEST_GLOBS};

const MANIFEST_NAMES: &[&str] = &[
    "package.json",
    "cargo.toml",
    "go.mod",
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "requirements.txt",
    "pipfile",
    "gemfile",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "composer.json",
    "mix.exs",
    "deno.json",
];

const DOC_PREFIXES: &[&str] = &["readme", "license", "licence", "copying"];

const ENTRY_STEMS: &[&str] = &["index", "main", "app", "server"];

const CONFIG_NAMES: &[&str] = &[
    "dockerfile",
    "makefile",
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
    ".babelrc",
    ".editorconfig",
    ".env.example",
    ".gitignore",
    ".npmrc",
    ".nvmrc",
    "procfile",
    "rust-toolchain.toml",
    "rustfmt.toml",
    "clippy.toml",
    "tox.ini",
    "pytest.ini",
    ".flake8",
];

const CONFIG_PREFIXES: &[&str] = &[
    "tsconfig",
    "jsconfig",
    ".eslintrc",
    ".prettierrc",
    ".stylelintrc",
    "babel.config",
    "webpack.",
    "rollup.config",
    "vite.config",
    "vitest.config",
    "jest.config",
    "next.config",
    "nuxt.config",
    "svelte.config",
    "tailwind.config",
    "postcss.config",
    "eslint.config",
    "prettier.config",
    "turbo.json",
    "nx.json",
    "vercel.json",
    "netlify.toml",
];

const SOURCE_DIRS: &[&str] = &[
    "src",
    "lib",
    "app",
    "pkg",
    "cmd",
    "internal",
    "core",
    "components",
    "server",
    "api",
];

/// Filename stems that conventionally hold core logic.
pub const CONVENTIONAL_STEMS: &[&str] = &[
    "model",
    "service",
    "router",
    "controller",
    "handler",
    "api",
    "route",
    "schema",
    "store",
    "util",
    "hook",
    "component",
];

fn lower_name(path: &str) -> String {
    path.rsplit('/')
        .next()
        .unwrap_or(path)
        .to_ascii_lowercase()
}

fn stem_of(name: &str) -> &str {
    match name.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// README, LICENSE and package manifests.
pub fn is_priority_file(path: &str) -> bool {
    let name = lower_name(path);
    is_manifest(&name) || DOC_PREFIXES.iter().any(|p| name.starts_with(p))
}

fn is_manifest(lower_name: &str) -> bool {
    MANIFEST_NAMES.contains(&lower_name)
}

/// `index.*`, `main.*`, `app.*`, `server.*` source files and `lib.rs`.
pub fn is_entry_point(path: &str) -> bool {
    let name = lower_name(path);
    if name == "lib.rs" {
        return true;
    }
    let stem = stem_of(&name);
    ENTRY_STEMS.contains(&stem) && name.contains('.') && is_source_language(detect_language(path))
}

/// Build, lint, format and tooling configuration files.
pub fn is_config_file(path: &str) -> bool {
    let name = lower_name(path);
    if CONFIG_NAMES.contains(&name.as_str()) {
        return true;
    }
    if CONFIG_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return true;
    }
    let lower_path = path.to_ascii_lowercase();
    if lower_path.starts_with(".github/workflows/") {
        return true;
    }
    // Root-level TOML/YAML/INI files are almost always tool configuration.
    !path.contains('/')
        && [".toml", ".yml", ".yaml", ".ini", ".cfg"]
            .iter()
            .any(|ext| name.ends_with(ext))
}

/// Files whose value is holistic: manifests and tool configuration.
/// These always receive a whole-file `config` chunk.
pub fn is_config_designated(path: &str) -> bool {
    is_manifest(&lower_name(path)) || is_config_file(path)
}

/// Whether any directory segment is a conventional source root.
pub fn in_source_dir(path: &str) -> bool {
    let mut segments: Vec<&str> = path.split('/').collect();
    segments.pop();
    segments
        .iter()
        .any(|s| SOURCE_DIRS.contains(&s.to_ascii_lowercase().as_str()))
}

/// Whether the filename stem contains a conventional core-logic word.
pub fn has_conventional_name(path: &str) -> bool {
    let name = lower_name(path);
    let stem = stem_of(&name);
    CONVENTIONAL_STEMS.iter().any(|c| stem.contains(c))
}

fn test_globs() -> &'static GlobSet {
    static SET: OnceLock<GlobSet> = OnceLock::new();
    SET.get_or_init(|| build_globset(TEST_GLOBS).unwrap_or_else(|_| GlobSet::empty()))
}

fn generated_globs() -> &'static GlobSet {
    static SET: OnceLock<GlobSet> = OnceLock::new();
    SET.get_or_init(|| build_globset(GENERATED_GLOBS).unwrap_or_else(|_| GlobSet::empty()))
}

pub fn is_test_path(path: &str) -> bool {
    test_globs().is_match(path)
}

pub fn is_generated_path(path: &str) -> bool {
    generated_globs().is_match(path)
}
