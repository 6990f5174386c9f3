//! File name filter shared by every directory watch.
//!
//! Accepts glob patterns (`*.qss`, `theme-?.css`) and bare extensions
//! (`qss`, `.qss`). An empty filter matches every file.

use std::path::Path;

use glob::{MatchOptions, Pattern};

use super::WatchError;

/// Compiled set of file name patterns.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    /// Patterns as given by the caller, kept for round-tripping.
    raw: Vec<String>,
    compiled: Vec<Pattern>,
}

impl FileFilter {
    /// Compile a filter from glob or extension patterns.
    pub fn new<I, S>(patterns: I) -> Result<Self, WatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut raw = Vec::new();
        let mut compiled = Vec::new();

        for pattern in patterns {
            let pattern = pattern.into();
            let trimmed = pattern.trim();
            if trimmed.is_empty() {
                continue;
            }

            let glob = Self::normalize(trimmed);
            let compiled_pattern =
                Pattern::new(&glob).map_err(|e| WatchError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;

            compiled.push(compiled_pattern);
            raw.push(pattern);
        }

        Ok(Self { raw, compiled })
    }

    /// A filter that accepts every file.
    pub fn any() -> Self {
        Self::default()
    }

    /// Patterns this filter was built from.
    pub fn patterns(&self) -> &[String] {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Check whether a file path matches by its file name.
    pub fn matches(&self, path: &Path) -> bool {
        if self.compiled.is_empty() {
            return true;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        let options = MatchOptions {
            case_sensitive: !cfg!(windows),
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        self.compiled
            .iter()
            .any(|pattern| pattern.matches_with(name, options))
    }

    /// Turn a bare extension into a glob; leave real globs untouched.
    fn normalize(pattern: &str) -> String {
        let has_meta = pattern.contains(['*', '?', '[']);
        if has_meta {
            return pattern.to_string();
        }

        match pattern.strip_prefix('.') {
            Some(ext) if !ext.contains('.') => format!("*.{ext}"),
            None if !pattern.contains('.') => format!("*.{pattern}"),
            _ => pattern.to_string(),
        }
    }
}

impl PartialEq for FileFilter {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
