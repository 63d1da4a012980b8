// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git-style ignore pattern matching on absolute paths.
//!
//! Grounded in the `ignore` crate's `gitignore` module, which implements
//! the same git-wildmatch semantics that `shuymn-git-autosnap` reaches for
//! via `ignore-files`/`watchexec-filterer-ignore` for the analogous
//! "don't snapshot this path" problem.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// A compiled set of git-wildmatch ignore patterns, cached per watcher.
#[derive(Clone)]
pub struct PathMatcher {
    inner: Gitignore,
}

impl PathMatcher {
    /// Compiles `patterns` against `root` (patterns without a leading `/`
    /// match at any depth under `root`, as with a real `.gitignore`).
    pub fn new(root: &Path, patterns: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in patterns {
            // A malformed pattern is logged by the caller via the Err
            // return; we keep building so one bad line doesn't disable
            // every other pattern.
            let _ = builder.add_line(None, pattern);
        }
        let inner = builder.build().unwrap_or_else(|_| Gitignore::empty());
        Self { inner }
    }

    /// Whether `path` is excluded by this matcher's patterns.
    ///
    /// Relative paths are matched as-is; absolute paths are matched
    /// relative to the root passed to `new`.
    pub fn matches(&self, path: &Path) -> bool {
        self.inner.matched(path, path.is_dir()).is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_simple_glob() {
        let root = tempfile::tempdir().unwrap();
        let matcher = PathMatcher::new(root.path(), &["*.tmp".to_string()]);
        assert!(matcher.matches(&root.path().join("scratch.tmp")));
        assert!(!matcher.matches(&root.path().join("keep.txt")));
    }

    #[test]
    fn matches_nested_directory_pattern() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join(".git")).unwrap();
        let matcher = PathMatcher::new(root.path(), &[".git/".to_string()]);
        assert!(matcher.matches(&root.path().join(".git")));
        assert!(!matcher.matches(&root.path().join("src")));
    }

    #[test]
    fn empty_pattern_list_matches_nothing() {
        let root = tempfile::tempdir().unwrap();
        let matcher = PathMatcher::new(root.path(), &[]);
        assert!(!matcher.matches(&root.path().join("anything")));
    }

    #[test]
    fn negated_pattern_unignores() {
        let root = tempfile::tempdir().unwrap();
        let matcher = PathMatcher::new(
            root.path(),
            &["*.log".to_string(), "!important.log".to_string()],
        );
        assert!(matcher.matches(&root.path().join("debug.log")));
        assert!(!matcher.matches(&root.path().join("important.log")));
    }
}
