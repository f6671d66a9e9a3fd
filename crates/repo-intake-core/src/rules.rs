//! Glob-based path rules for listing filters and scoring signals.
//!
//! [`PathRules`] combines three layers, evaluated in order:
//!
//! 1. the built-in ignore set ([`DEFAULT_IGNORE_GLOBS`]: build output,
//!    vendored dependencies, lockfiles, binaries, minified bundles);
//! 2. user exclude globs: any match rejects the path;
//! 3. user include globs: when non-empty, a path must match at least one.
//!
//! Excludes always take precedence over includes.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Paths never worth analyzing.
pub const DEFAULT_IGNORE_GLOBS: &[&str] = &[
    "**/.git/**",
    "**/node_modules/**",
    "**/bower_components/**",
    "**/vendor/**",
    "**/dist/**",
    "**/build/**",
    "**/out/**",
    "**/target/**",
    "**/.next/**",
    "**/.nuxt/**",
    "**/coverage/**",
    "**/__pycache__/**",
    "**/.venv/**",
    "**/venv/**",
    "**/.idea/**",
    "**/.vscode/**",
    "**/*.lock",
    "**/package-lock.json",
    "**/pnpm-lock.yaml",
    "**/go.sum",
    "**/*.min.js",
    "**/*.min.css",
    "**/*.map",
    "**/*.{png,jpg,jpeg,gif,ico,svg,webp,bmp}",
    "**/*.{woff,woff2,ttf,eot,otf}",
    "**/*.{pdf,zip,gz,tgz,tar,rar,7z}",
    "**/*.{exe,dll,so,dylib,bin,o,a,jar,class,pyc,wasm}",
    "**/*.{mp3,mp4,wav,ogg,mov,avi}",
    "**/.DS_Store",
];

/// Path patterns of test code (penalized, not excluded).
pub const TEST_GLOBS: &[&str] = &[
    "**/*.test.*",
    "**/*.spec.*",
    "**/__tests__/**",
    "**/__mocks__/**",
    "**/test/**",
    "**/tests/**",
    "**/spec/**",
    "**/*_test.go",
    "**/*_test.py",
    "**/test_*.py",
    "**/*Test.java",
];

/// Path patterns of generated, minified or bundled output (penalized).
pub const GENERATED_GLOBS: &[&str] = &[
    "**/*.min.*",
    "**/*.bundle.*",
    "**/*-bundle.*",
    "**/*.generated.*",
    "**/generated/**",
    "**/*.pb.go",
    "**/*_pb2.py",
    "**/*.d.ts",
    "**/*.snap",
];

/// Compile a list of glob patterns into a [`GlobSet`].
pub fn build_globset<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

/// Ordered include/exclude rules over repository-relative paths.
#[derive(Debug, Clone)]
pub struct PathRules {
    ignore: GlobSet,
    exclude: GlobSet,
    include: Option<GlobSet>,
}

impl PathRules {
    /// Build rules from user include/exclude globs on top of the default ignore set.
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self> {
        let include = if include.is_empty() {
            None
        } else {
            Some(build_globset(include)?)
        };
        Ok(Self {
            ignore: build_globset(DEFAULT_IGNORE_GLOBS)?,
            exclude: build_globset(exclude)?,
            include,
        })
    }

    /// Rules with only the default ignore set.
    pub fn defaults() -> Self {
        // The built-in patterns are constant and known to compile.
        Self::new::<&str>(&[], &[]).unwrap_or_else(|_| Self {
            ignore: GlobSet::empty(),
            exclude: GlobSet::empty(),
            include: None,
        })
    }

    /// Whether a path falls under the built-in ignore set.
    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignore.is_match(path)
    }

    /// Whether a file path passes all three layers.
    pub fn allows_file(&self, path: &str) -> bool {
        if self.ignore.is_match(path) || self.exclude.is_match(path) {
            return false;
        }
        match &self.include {
            Some(include) => include.is_match(path),
            None => true,
        }
    }

    /// Whether a directory should appear in the listing.
    ///
    /// Directory globs such as `**/dist/**` only match paths below the
    /// directory, so the check probes a child path.
    pub fn allows_dir(&self, path: &str) -> bool {
        let probe = format!("{}/_", path);
        !(self.ignore.is_match(&probe) || self.exclude.is_match(&probe))
    }
}

impl Default for PathRules {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ignores() {
        let rules = PathRules::defaults();
        assert!(!rules.allows_file("dist/bundle.min.js"));
        assert!(!rules.allows_file("node_modules/react/index.js"));
        assert!(!rules.allows_file("web/package-lock.json"));
        assert!(!rules.allows_file("Cargo.lock"));
        assert!(!rules.allows_file("assets/logo.png"));
        assert!(rules.allows_file("src/index.ts"));
        assert!(rules.allows_file("README.md"));
    }

    #[test]
    fn test_ignored_directories() {
        let rules = PathRules::defaults();
        assert!(!rules.allows_dir("dist"));
        assert!(!rules.allows_dir("packages/web/node_modules"));
        assert!(rules.allows_dir("src"));
    }

    #[test]
    fn test_exclude_takes_precedence_over_include() {
        let rules = PathRules::new(&["src/**"], &["src/legacy/**"]).unwrap();
        assert!(rules.allows_file("src/app.ts"));
        assert!(!rules.allows_file("src/legacy/old.ts"));
        assert!(!rules.allows_file("docs/guide.md"));
    }

    #[test]
    fn test_invalid_glob_is_an_error() {
        assert!(PathRules::new(&["src/["], &[] as &[&str]).is_err());
    }
}
