//! Reads style text from sources and joins it into one document.
//!
//! Directory sources contribute their matching files first, then their
//! matching subdirectories, both in file-name order. Empty pieces are skipped so a
//! missing or empty file never leaves a blank line in the document.

use std::path::Path;

use walkdir::WalkDir;

use super::source::{Source, SourceKind};
use crate::watcher::{FileFilter, WatchError};

/// Build the aggregate document for `sources`, in order.
pub(crate) fn load_document(sources: &[Source], filter: &FileFilter) -> String {
    join_non_empty(sources.iter().map(|source| load_source(source, filter)))
}

pub(crate) fn load_source(source: &Source, filter: &FileFilter) -> String {
    match source.kind {
        SourceKind::File => load_file(&source.path),
        SourceKind::Directory => load_directory(&source.path, filter),
    }
}

/// Raw file contents, or an empty string if the file cannot be read.
pub(crate) fn load_file(path: &Path) -> String {
    match read_text(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("[registry] {e}");
            String::new()
        }
    }
}

fn read_text(path: &Path) -> Result<String, WatchError> {
    let bytes = std::fs::read(path).map_err(|e| WatchError::ReadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn load_directory(path: &Path, filter: &FileFilter) -> String {
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    let walker = WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("[registry] cannot list {}: {e}", path.display());
                continue;
            }
        };

        let entry_path = entry.path().to_path_buf();
        if !filter.matches(&entry_path) {
            continue;
        }

        if entry.file_type().is_dir() {
            dirs.push(entry_path);
        } else if entry_path.is_file() {
            files.push(entry_path);
        }
    }

    let file_texts = files.iter().map(|file| load_file(file));
    let dir_texts = dirs.iter().map(|dir| load_directory(dir, filter));
    join_non_empty(file_texts.chain(dir_texts))
}

fn join_non_empty(pieces: impl Iterator<Item = String>) -> String {
    pieces
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_directory_files_before_subdirectories() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("a_nested")).unwrap();
        fs::write(root.join("a_nested/inner.txt"), "inner").unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("c.txt"), "c").unwrap();
        fs::write(root.join("empty.txt"), "").unwrap();

        let text = load_source(&Source::directory(root), &FileFilter::any());
        assert_eq!(text, "b\nc\ninner");
    }

    #[test]
    fn test_filter_applies_to_subdirectory_names() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("themes")).unwrap();
        fs::write(root.join("themes/inner.qss"), "inner").unwrap();
        fs::create_dir(root.join("extra.qss")).unwrap();
        fs::write(root.join("extra.qss/deep.qss"), "deep").unwrap();
        fs::write(root.join("top.qss"), "top").unwrap();
        fs::write(root.join("notes.txt"), "ignored").unwrap();

        let filter = FileFilter::new(["*.qss"]).unwrap();
        let text = load_source(&Source::directory(root), &filter);
        assert_eq!(text, "top\ndeep");
    }

    #[test]
    fn test_missing_file_contributes_nothing() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("present.qss");
        fs::write(&present, "QWidget { color: red; }").unwrap();

        let sources = vec![
            Source::file(temp.path().join("missing.qss")),
            Source::file(&present),
        ];
        let document = load_document(&sources, &FileFilter::any());
        assert_eq!(document, "QWidget { color: red; }");
    }

    #[test]
    fn test_no_sources_is_empty_document() {
        assert_eq!(load_document(&[], &FileFilter::any()), "");
    }
}
