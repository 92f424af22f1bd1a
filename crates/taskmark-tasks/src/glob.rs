//! Resolution of glob patterns against a document root
//!
//! Patterns are relative to the root and use `/` as separator. `*` and `?`
//! never cross a separator, `**` matches any number of directories and
//! `{a,b}` alternation is supported. Matches are regular files only and are
//! reported as sorted, root-relative, `/`-separated paths.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::trace;
use walkdir::WalkDir;

const META_CHARS: &[char] = &['*', '?', '[', '{', '\\'];

/// Errors while resolving file globs
#[derive(Debug, thiserror::Error)]
pub enum GlobError {
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// The literal directory prefix of the pattern does not exist, so no
    /// path can ever match it.
    #[error("No path can match pattern '{0}'")]
    PatternNotExist(String),

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl GlobError {
    /// Whether this error means the pattern cannot match anything
    pub fn is_pattern_not_exist(&self) -> bool {
        matches!(self, Self::PatternNotExist(_))
    }
}

/// A set of include patterns with optional ignore patterns
#[derive(Debug, Clone)]
pub struct FileGlob<'a> {
    root: &'a Path,
    patterns: Vec<String>,
    ignores: Vec<String>,
    allow_missing: bool,
}

impl<'a> FileGlob<'a> {
    /// Create a glob rooted at `root`
    pub fn new<I, S>(root: &'a Path, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            root,
            patterns: patterns.into_iter().map(|p| p.as_ref().to_string()).collect(),
            ignores: Vec::new(),
            allow_missing: false,
        }
    }

    /// Exclude paths matching any of these patterns
    pub fn with_ignores<I, S>(mut self, ignores: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignores = ignores.into_iter().map(|p| p.as_ref().to_string()).collect();
        self
    }

    /// Treat a pattern whose literal prefix is missing as matching nothing
    pub fn allow_missing(mut self, allow: bool) -> Self {
        self.allow_missing = allow;
        self
    }

    /// Resolve all patterns into a sorted, de-duplicated list of files
    pub fn resolve(&self) -> Result<Vec<String>, GlobError> {
        let ignores = build_set(&self.ignores)?;
        let mut files = BTreeSet::new();

        for pattern in &self.patterns {
            match self.resolve_pattern(pattern, &ignores, &mut files) {
                Err(GlobError::PatternNotExist(p)) if self.allow_missing => {
                    trace!(pattern = %p, "pattern base missing, matching nothing");
                }
                other => other?,
            }
        }

        Ok(files.into_iter().collect())
    }

    fn resolve_pattern(
        &self,
        pattern: &str,
        ignores: &GlobSet,
        files: &mut BTreeSet<String>,
    ) -> Result<(), GlobError> {
        if pattern.is_empty() || Path::new(pattern).is_absolute() {
            return Err(GlobError::InvalidPattern {
                pattern: pattern.to_string(),
                message: "pattern must be relative to the document root".to_string(),
            });
        }

        let matcher = compile(pattern)?.compile_matcher();
        let base = literal_base(pattern);
        let base_path = self.root.join(&base);

        if !has_meta(pattern) {
            if !base_path.exists() {
                return Err(GlobError::PatternNotExist(pattern.to_string()));
            }
            let relative = to_slash(&base);
            if base_path.is_file() && !ignores.is_match(&relative) {
                files.insert(relative);
            }
            return Ok(());
        }

        if !base_path.is_dir() {
            return Err(GlobError::PatternNotExist(pattern.to_string()));
        }

        let mut walker = WalkDir::new(&base_path).follow_links(false);
        if let Some(depth) = walk_depth(pattern, &base) {
            walker = walker.max_depth(depth);
        }
        for entry in walker {
            let entry = entry.map_err(|source| GlobError::Walk {
                path: base_path.clone(),
                source,
            })?;
            if !entry.path().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(self.root) else {
                continue;
            };
            let relative = to_slash(relative);
            if matcher.is_match(&relative) && !ignores.is_match(&relative) {
                files.insert(relative);
            }
        }

        Ok(())
    }
}

fn compile(pattern: &str) -> Result<Glob, GlobError> {
    GlobBuilder::new(pattern.trim_start_matches("./"))
        .literal_separator(true)
        .build()
        .map_err(|e| GlobError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.kind().to_string(),
        })
}

fn build_set(patterns: &[String]) -> Result<GlobSet, GlobError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(compile(pattern)?);
    }
    builder.build().map_err(|e| GlobError::InvalidPattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

fn has_meta(pattern: &str) -> bool {
    pattern.contains(META_CHARS)
}

/// Leading path components that contain no glob syntax
fn literal_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    let components: Vec<&str> = pattern.split('/').collect();
    let literal = if has_meta(pattern) {
        components.len().saturating_sub(1)
    } else {
        components.len()
    };
    for component in components.into_iter().take(literal) {
        if has_meta(component) {
            break;
        }
        if !component.is_empty() && component != "." {
            base.push(component);
        }
    }
    base
}

/// How deep below the literal base a pattern can match, unbounded with `**`
fn walk_depth(pattern: &str, base: &Path) -> Option<usize> {
    let components: Vec<&str> = pattern
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    if components.iter().any(|c| c.contains("**")) {
        return None;
    }
    Some(components.len().saturating_sub(base.components().count()))
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
