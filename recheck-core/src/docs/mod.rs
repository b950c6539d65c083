//! Document loading and cross-reference resolution
//!
//! Authoritative documents (PRD, Epic, Issue) live outside the engine and
//! cross-reference each other with line markers like `- PRD: docs/prd.md`.
//! This module isolates all knowledge of that convention: the loader
//! abstracts where documents come from, and the resolver turns marker lines
//! into loaded document content.

mod loader;
mod refs;

#[cfg(test)]
pub(crate) use loader::test_support;

pub use loader::{DocumentLoader, FsLoader};
pub use refs::{
    find_reference, normalize_reference, resolve, resolve_in_root, DocKind, ResolvedDoc,
    ResolvedRefs,
};
