// src/watch/patterns.rs

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::WatchSection;

/// Compiled include/exclude globs, evaluated against paths relative to the
/// watch root (e.g. `"src/main.rs"`).
#[derive(Clone)]
pub struct WatchFilter {
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchFilter")
            .field("watch", &self.watch_set.len())
            .field("exclude", &self.exclude_set.as_ref().map(GlobSet::len))
            .finish()
    }
}

impl WatchFilter {
    pub fn new(patterns: &[String], exclude: &[String]) -> Result<Self> {
        let watch_set = build_globset(patterns).context("building watch globset")?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };
        Ok(Self {
            watch_set,
            exclude_set,
        })
    }

    pub fn from_section(section: &WatchSection) -> Result<Self> {
        Self::new(&section.patterns, &section.exclude)
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Falls back to comparing canonicalized paths, which matters on platforms
/// that report events under a different absolute prefix (macOS
/// `/private/var/...`). Returns `None` for paths outside `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exclude_wins_over_watch() {
        let filter = WatchFilter::new(&strings(&["src/**"]), &strings(&["**/*.tmp"])).unwrap();
        assert!(filter.matches("src/main.rs"));
        assert!(!filter.matches("src/scratch.tmp"));
        assert!(!filter.matches("docs/readme.md"));
    }

    #[test]
    fn invalid_glob_is_an_error() {
        assert!(WatchFilter::new(&strings(&["src/[x"]), &[]).is_err());
    }

    #[test]
    fn relative_str_strips_root() {
        let root = PathBuf::from("/project");
        assert_eq!(
            relative_str(&root, Path::new("/project/src/lib.rs")).as_deref(),
            Some("src/lib.rs")
        );
        assert_eq!(relative_str(&root, Path::new("/elsewhere/x")), None);
    }
}
