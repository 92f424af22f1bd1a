//! Content fingerprints over sets of files

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::glob::{FileGlob, GlobError};

/// Errors while computing a fingerprint
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Compute the SHA-256 digest of every file matched by `paths` minus
/// `ignores`, relative to `root`.
///
/// Files are hashed in sorted path order so the result does not depend on
/// pattern order or directory traversal order. A pattern whose directory
/// does not exist contributes no files.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn compute_fingerprint<P, I, S, T>(
    root: &Path,
    paths: P,
    ignores: I,
) -> Result<String, FingerprintError>
where
    P: IntoIterator<Item = S>,
    I: IntoIterator<Item = T>,
    S: AsRef<str>,
    T: AsRef<str>,
{
    let files = FileGlob::new(root, paths)
        .with_ignores(ignores)
        .allow_missing(true)
        .resolve()?;

    let mut hasher = Sha256::new();
    for file in &files {
        let path = root.join(file);
        let mut reader = File::open(&path).map_err(|source| FingerprintError::Io {
            path: path.clone(),
            source,
        })?;
        io::copy(&mut reader, &mut hasher)
            .map_err(|source| FingerprintError::Io { path, source })?;
    }

    let digest = format!("{:x}", hasher.finalize());
    debug!(files = files.len(), digest = %digest, "computed fingerprint");
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const NONE: [&str; 0] = [];

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.go"), "package a").unwrap();
        fs::write(dir.path().join("b.go"), "package b").unwrap();
        fs::write(dir.path().join("b_test.go"), "package b_test").unwrap();
        dir
    }

    #[test]
    fn test_deterministic() {
        let dir = fixture();
        let first = compute_fingerprint(dir.path(), ["*.go"], NONE).unwrap();
        let second = compute_fingerprint(dir.path(), ["*.go"], NONE).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_pattern_order_irrelevant() {
        let dir = fixture();
        let forward = compute_fingerprint(dir.path(), ["a.go", "b.go"], NONE).unwrap();
        let reverse = compute_fingerprint(dir.path(), ["b.go", "a.go"], NONE).unwrap();
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_single_byte_change() {
        let dir = fixture();
        let before = compute_fingerprint(dir.path(), ["*.go"], NONE).unwrap();
        fs::write(dir.path().join("a.go"), "package A").unwrap();
        let after = compute_fingerprint(dir.path(), ["*.go"], NONE).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_ignored_files_do_not_contribute() {
        let dir = fixture();
        let before = compute_fingerprint(dir.path(), ["*.go"], ["*_test.go"]).unwrap();
        fs::write(dir.path().join("b_test.go"), "changed").unwrap();
        let after = compute_fingerprint(dir.path(), ["*.go"], ["*_test.go"]).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_empty_match_is_hash_of_nothing() {
        let dir = fixture();
        let digest = compute_fingerprint(dir.path(), ["missing/**/*.rs"], NONE).unwrap();
        assert_eq!(digest, format!("{:x}", Sha256::new().finalize()));
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let dir = fixture();
        let result = compute_fingerprint(dir.path(), ["[.go"], NONE);
        assert!(matches!(result, Err(FingerprintError::Glob(_))));
    }
}
