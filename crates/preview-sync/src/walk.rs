//! Build-tree enumeration.
//!
//! Every regular file under the root becomes one [`LocalAsset`] whose remote
//! key is the deployment prefix followed by the file's root-relative path,
//! `/`-separated regardless of platform. Directories, symlinks and other
//! non-regular entries are skipped.

use std::path::{Component, Path, PathBuf};

use preview_core::{ContentTypes, DeploymentPrefix};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{AssetError, SyncError};

/// A local file scheduled for synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAsset {
    pub path: PathBuf,
    pub relative_path: String,
    pub key: String,
    pub content_type: String,
}

/// Files found plus entries that could not be read during the walk.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub assets: Vec<LocalAsset>,
    pub errors: Vec<AssetError>,
}

/// Enumerate `root` and map each regular file under `prefix`.
///
/// Assets are returned sorted by relative path.
pub fn collect_assets(
    root: &Path,
    prefix: &DeploymentPrefix,
    content_types: &ContentTypes,
) -> Result<WalkOutcome, SyncError> {
    let meta = std::fs::metadata(root).map_err(|_| SyncError::RootNotFound(root.to_path_buf()))?;
    if !meta.is_dir() {
        return Err(SyncError::RootNotDirectory(root.to_path_buf()));
    }

    let mut outcome = WalkOutcome::default();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                let message = err.to_string();
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other(message));
                outcome.errors.push(AssetError::Read { path, source });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let relative_path = match relative_key_path(root, entry.path()) {
            Ok(Some(relative_path)) => relative_path,
            Ok(None) => continue,
            Err(err) => {
                outcome.errors.push(err);
                continue;
            }
        };

        let content_type = content_types.for_path(entry.path()).to_string();
        let key = prefix.key_for(&relative_path);
        debug!(key = %key, content_type = %content_type, "found asset");

        outcome.assets.push(LocalAsset {
            path: entry.into_path(),
            relative_path,
            key,
            content_type,
        });
    }

    outcome
        .assets
        .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(outcome)
}

/// `path` relative to `root`, joined with `/`.
///
/// Names that are not valid UTF-8 are an error rather than a lossy key, so
/// two distinct files can never share an object.
fn relative_key_path(root: &Path, path: &Path) -> Result<Option<String>, AssetError> {
    let Ok(relative) = path.strip_prefix(root) else {
        return Ok(None);
    };
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            let part = part.to_str().ok_or_else(|| AssetError::InvalidName {
                path: path.to_path_buf(),
            })?;
            parts.push(part);
        }
    }
    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parts.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use preview_core::PrefixPolicy;
    use std::fs;

    fn prefix(p: &str) -> DeploymentPrefix {
        DeploymentPrefix::parse(p, PrefixPolicy::DnsLabel).unwrap()
    }

    fn build_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        fs::create_dir_all(dir.path().join("static/css")).unwrap();
        fs::write(dir.path().join("static/app.js"), "1").unwrap();
        fs::write(dir.path().join("static/css/site.css"), "body{}").unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        dir
    }

    #[test]
    fn maps_files_to_prefixed_keys() {
        let dir = build_tree();
        let outcome = collect_assets(dir.path(), &prefix("abc123"), &ContentTypes::default()).unwrap();

        let keys: Vec<&str> = outcome.assets.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "abc123/index.html",
                "abc123/static/app.js",
                "abc123/static/css/site.css"
            ]
        );
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.assets[0].content_type, "text/html");
        assert_eq!(outcome.assets[1].content_type, "application/javascript");
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_assets(&dir.path().join("nope"), &prefix("x"), &ContentTypes::default())
            .unwrap_err();
        assert!(matches!(err, SyncError::RootNotFound(_)));
    }

    #[test]
    fn file_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("index.html");
        fs::write(&file, "x").unwrap();
        let err = collect_assets(&file, &prefix("x"), &ContentTypes::default()).unwrap_err();
        assert!(matches!(err, SyncError::RootNotDirectory(_)));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_regular_files() {
        let dir = build_tree();
        std::os::unix::fs::symlink(dir.path().join("index.html"), dir.path().join("link.html"))
            .unwrap();
        let outcome = collect_assets(dir.path(), &prefix("x"), &ContentTypes::default()).unwrap();
        assert!(outcome.assets.iter().all(|a| a.relative_path != "link.html"));
    }

    #[test]
    fn relative_key_path_uses_forward_slashes() {
        let root = Path::new("/build");
        assert_eq!(
            relative_key_path(root, &root.join("a").join("b.txt"))
                .unwrap()
                .as_deref(),
            Some("a/b.txt")
        );
        assert_eq!(relative_key_path(root, root).unwrap(), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_reported_not_merged() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ok.txt"), "ok").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"bad\xff.txt")), "1").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"bad\xfe.txt")), "2").unwrap();

        let outcome = collect_assets(dir.path(), &prefix("x"), &ContentTypes::default()).unwrap();

        let keys: Vec<&str> = outcome.assets.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["x/ok.txt"]);
        assert_eq!(outcome.errors.len(), 2);
        assert!(
            outcome
                .errors
                .iter()
                .all(|e| matches!(e, AssetError::InvalidName { .. }))
        );
    }
}
