//! Document loading capability
//!
//! The resolver and assembler never touch storage directly; they go through
//! a `DocumentLoader` injected by the caller, so both are testable with
//! in-memory fixtures.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Capability to load repo-relative documents
///
/// `load` distinguishes "absent" (`Ok(None)`) from "present but unreadable"
/// (`Err`); callers decide which of the two is an error in their context.
pub trait DocumentLoader: Send + Sync {
    /// Load the document at a repo-relative path
    fn load(&self, location: &str) -> Result<Option<String>>;
}

/// Filesystem-backed loader rooted at the repository directory
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    /// Create a loader rooted at the given repository directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The repository root this loader reads from
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentLoader for FsLoader {
    fn load(&self, location: &str) -> Result<Option<String>> {
        let path = self.root.join(location);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(Error::Io)?;
        Ok(Some(contents))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;

    use super::*;

    /// In-memory loader for tests
    #[derive(Debug, Default)]
    pub struct MapLoader {
        docs: HashMap<String, String>,
    }

    impl MapLoader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_doc(mut self, location: impl Into<String>, body: impl Into<String>) -> Self {
            self.docs.insert(location.into(), body.into());
            self
        }
    }

    impl DocumentLoader for MapLoader {
        fn load(&self, location: &str) -> Result<Option<String>> {
            Ok(self.docs.get(location).cloned())
        }
    }
}
