//! Content stores holding widget markup.
//!
//! The registry reads every declared widget exactly once at startup. A
//! store reports `Ok(None)` for content it does not have; the registry turns
//! that into a [`StartupError::MissingContent`] naming the capability.

use crate::error::StartupError;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Source of widget markup keyed by component name.
pub trait ContentStore {
    /// Where content is expected to live, for error messages.
    fn location(&self) -> String;

    /// Load the markup for `component`.
    fn load(&self, component: &str) -> Result<Option<String>, StartupError>;
}

/// Widget markup built into a directory of `<component>.html` files.
#[derive(Debug, Clone)]
pub struct AssetDir {
    dir: PathBuf,
}

impl AssetDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Pick the newest hashed build output `<component>-<hash>.html`.
    ///
    /// Hash segments never contain `-`, so `pizzaz-carousel-1a2b.html` is not
    /// a candidate for `pizzaz`.
    fn hashed_candidate(&self, component: &str) -> Result<Option<PathBuf>, StartupError> {
        let prefix = format!("{}-", component);
        let entries = std::fs::read_dir(&self.dir).map_err(|source| StartupError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut candidates: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| {
                name.strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_suffix(".html"))
                    .is_some_and(|hash| !hash.is_empty() && !hash.contains('-'))
            })
            .collect();
        candidates.sort();

        Ok(candidates.pop().map(|name| self.dir.join(name)))
    }
}

impl ContentStore for AssetDir {
    fn location(&self) -> String {
        self.dir.display().to_string()
    }

    fn load(&self, component: &str) -> Result<Option<String>, StartupError> {
        if !self.dir.is_dir() {
            return Err(StartupError::AssetsDirMissing {
                dir: self.dir.clone(),
            });
        }

        let direct = self.dir.join(format!("{}.html", component));
        let path = if direct.is_file() {
            direct
        } else {
            match self.hashed_candidate(component)? {
                Some(path) => {
                    warn!(
                        "Using hashed widget build {} for component {}",
                        path.display(),
                        component
                    );
                    path
                }
                None => return Ok(None),
            }
        };

        debug!("Loading widget markup from {}", path.display());
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| StartupError::Io { path, source })
    }
}

/// In-memory store, used for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, component: impl Into<String>, markup: impl Into<String>) -> Self {
        self.insert(component, markup);
        self
    }

    pub fn insert(&mut self, component: impl Into<String>, markup: impl Into<String>) {
        self.entries.insert(component.into(), markup.into());
    }
}

impl ContentStore for MemoryStore {
    fn location(&self) -> String {
        "in-memory content store".to_string()
    }

    fn load(&self, component: &str) -> Result<Option<String>, StartupError> {
        Ok(self.entries.get(component).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_direct_file_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pizzaz.html"), "<div>direct</div>").unwrap();
        fs::write(dir.path().join("pizzaz-zzzz.html"), "<div>hashed</div>").unwrap();

        let store = AssetDir::new(dir.path());
        assert_eq!(
            store.load("pizzaz").unwrap().as_deref(),
            Some("<div>direct</div>")
        );
    }

    #[test]
    fn test_hashed_fallback_picks_last() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pizzaz-list-0001.html"), "old").unwrap();
        fs::write(dir.path().join("pizzaz-list-0002.html"), "new").unwrap();

        let store = AssetDir::new(dir.path());
        assert_eq!(store.load("pizzaz-list").unwrap().as_deref(), Some("new"));
        // Different component sharing a prefix is not picked up.
        assert_eq!(store.load("pizzaz").unwrap(), None);
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = AssetDir::new(dir.path().join("does-not-exist"));
        let err = store.load("pizzaz").unwrap_err();
        assert!(matches!(err, StartupError::AssetsDirMissing { .. }));
        assert!(err.to_string().contains("does-not-exist"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new().with("pizzaz", "<p/>");
        assert_eq!(store.load("pizzaz").unwrap().as_deref(), Some("<p/>"));
        assert_eq!(store.load("other").unwrap(), None);
    }
}
