//! Corpus discovery and loading.

use crate::diagnostics::Diagnostic;
use crate::model::SourceDocument;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Find every source file under `root` with one of `extensions`.
/// Sorted and deduplicated for deterministic output.
pub fn discover(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        anyhow::bail!("source root is not a directory: {}", root.display());
    }

    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let mut files = Vec::new();
    for ext in extensions {
        let pattern = format!("{}/**/*.{}", escaped, ext.trim_start_matches('.'));
        let matches = glob::glob(&pattern)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?;
        for entry in matches {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => tracing::warn!("skipping unreadable path {}: {}", e.path().display(), e),
            }
        }
    }

    files.sort();
    files.dedup();
    tracing::debug!(count = files.len(), root = %root.display(), "discovered source files");
    Ok(files)
}

/// `/`-separated path of `path` relative to `root`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read one file. Unreadable or non-UTF-8 files become a `FatalLoad` diagnostic.
pub fn load(root: &Path, path: &Path) -> Result<SourceDocument, Diagnostic> {
    let relative = relative_path(root, path);
    match fs::read_to_string(path) {
        Ok(text) => Ok(SourceDocument {
            path: relative,
            text,
        }),
        Err(e) => Err(Diagnostic::FatalLoad {
            path: relative,
            error: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn discovers_nested_files_sorted() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Type/Str.rakudoc", "");
        touch(dir.path(), "Language/traps.rakudoc", "");
        touch(dir.path(), "Type/Int.pod6", "");
        touch(dir.path(), "README.md", "");

        let files = discover(dir.path(), &["rakudoc".to_string(), "pod6".to_string()]).unwrap();
        let rel: Vec<String> = files.iter().map(|p| relative_path(dir.path(), p)).collect();
        assert_eq!(rel, vec!["Language/traps.rakudoc", "Type/Int.pod6", "Type/Str.rakudoc"]);
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(discover(&dir.path().join("nope"), &["rakudoc".to_string()]).is_err());
    }

    #[test]
    fn invalid_utf8_is_excluded_with_diagnostic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.rakudoc");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        match load(dir.path(), &path) {
            Err(Diagnostic::FatalLoad { path, .. }) => assert_eq!(path, "bad.rakudoc"),
            other => panic!("expected FatalLoad, got {:?}", other),
        }
    }
}
