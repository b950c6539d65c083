//! Cross-reference resolution
//!
//! Recognizes line-oriented markers of the form:
//!
//! ```text
//! - PRD: docs/prd.md
//! * Epic: [Epic 3](https://github.com/owner/repo/blob/main/docs/epic-3.md)
//! ```
//!
//! Labels are matched case-insensitively at line start, after optional
//! whitespace and an optional list bullet. A label appearing more than once
//! is ambiguous and rejected; an absent label is simply missing.

use std::path::Path;

use url::Url;

use super::DocumentLoader;
use crate::{Error, Result};

/// The kinds of document a reference marker can point to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    /// Product Requirements Document
    Prd,
    /// Epic document
    Epic,
}

impl DocKind {
    /// The marker label for this kind
    pub fn label(&self) -> &'static str {
        match self {
            DocKind::Prd => "PRD",
            DocKind::Epic => "Epic",
        }
    }

    /// All recognized kinds, in resolution order
    pub fn all() -> [DocKind; 2] {
        [DocKind::Prd, DocKind::Epic]
    }
}

impl std::fmt::Display for DocKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A referenced document that resolved and loaded successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDoc {
    /// Repo-relative path the reference resolved to
    pub path: String,
    /// Loaded document content
    pub content: String,
}

/// Result of resolving every recognized label against a document body
///
/// A `None` entry means the label was absent, which is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRefs {
    /// Resolved PRD, if the body referenced one
    pub prd: Option<ResolvedDoc>,
    /// Resolved Epic, if the body referenced one
    pub epic: Option<ResolvedDoc>,
}

impl ResolvedRefs {
    /// Look up a resolved document by kind
    pub fn get(&self, kind: DocKind) -> Option<&ResolvedDoc> {
        match kind {
            DocKind::Prd => self.prd.as_ref(),
            DocKind::Epic => self.epic.as_ref(),
        }
    }
}

/// Resolve every recognized reference label in a document body
///
/// Pure function of the body plus the injected loader. Fails with
/// `AmbiguousReference` when a label appears more than once and with
/// `UnresolvableReference` when a present reference cannot be loaded.
pub fn resolve(body: &str, loader: &dyn DocumentLoader) -> Result<ResolvedRefs> {
    resolve_in_root(body, loader, None)
}

/// Resolve references with a known repository root
///
/// Absolute reference paths falling under `repo_root` are mapped onto their
/// repo-relative equivalent; without a root every absolute path is rejected.
pub fn resolve_in_root(
    body: &str,
    loader: &dyn DocumentLoader,
    repo_root: Option<&Path>,
) -> Result<ResolvedRefs> {
    let mut refs = ResolvedRefs::default();

    for kind in DocKind::all() {
        let Some(raw) = find_reference(body, kind.label())? else {
            continue;
        };

        let doc = load_reference(kind, &raw, loader, repo_root)?;
        match kind {
            DocKind::Prd => refs.prd = Some(doc),
            DocKind::Epic => refs.epic = Some(doc),
        }
    }

    Ok(refs)
}

/// Find the single marker line for a label
///
/// Returns the raw reference text after the colon, or `None` when the label
/// is absent. Two or more marker lines for the same label are ambiguous.
pub fn find_reference(body: &str, label: &str) -> Result<Option<String>> {
    let mut found: Option<String> = None;

    for line in body.lines() {
        let Some(value) = match_marker_line(line, label) else {
            continue;
        };

        if found.is_some() {
            return Err(Error::AmbiguousReference {
                label: label.to_string(),
            });
        }
        found = Some(value.to_string());
    }

    Ok(found)
}

/// Match one line against `[bullet] <label>: <value>`
fn match_marker_line<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let mut rest = line.trim_start();

    // Optional list bullet
    if let Some(stripped) = rest.strip_prefix('-').or_else(|| rest.strip_prefix('*')) {
        rest = stripped.trim_start();
    }

    let head = rest.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    rest = rest[label.len()..].trim_start();

    let value = rest.strip_prefix(':')?.trim();
    if value.is_empty() {
        // Keep the empty marker visible; the caller rejects it as a
        // placeholder rather than treating the label as absent.
        return Some("");
    }
    Some(value)
}

fn load_reference(
    kind: DocKind,
    raw: &str,
    loader: &dyn DocumentLoader,
    repo_root: Option<&Path>,
) -> Result<ResolvedDoc> {
    let unresolvable = |reason: String| Error::UnresolvableReference {
        label: kind.label().to_string(),
        reason,
    };

    if raw.is_empty() || raw.contains("<!--") {
        return Err(unresolvable(format!(
            "reference present but empty/placeholder: '{}'",
            raw
        )));
    }

    let normalized = normalize_reference(raw);
    if normalized.is_empty() {
        return Err(unresolvable(format!("empty reference: '{}'", raw)));
    }

    let path = reference_to_repo_path(&normalized, repo_root).map_err(&unresolvable)?;

    match loader.load(&path)? {
        Some(content) => Ok(ResolvedDoc { path, content }),
        None => Err(unresolvable(format!(
            "document not found: {} (from: {})",
            path, raw
        ))),
    }
}

/// Strip markdown decoration from a reference target
///
/// Handles `[text](target)` links, `<angle>` autolinks, backticks, and
/// `#fragment` tails.
pub fn normalize_reference(reference: &str) -> String {
    let mut out = reference.trim().to_string();

    // Markdown link: [text](target)
    if let Some(open) = out.find("](") {
        if let Some(close) = out[open + 2..].find(')') {
            out = out[open + 2..open + 2 + close].trim().to_string();
        }
    }

    // Angle brackets (common in markdown autolinks)
    if out.starts_with('<') && out.ends_with('>') && out.len() >= 2 {
        out = out[1..out.len() - 1].trim().to_string();
    }

    // Backticks
    if out.starts_with('`') && out.ends_with('`') && out.len() >= 2 {
        out = out[1..out.len() - 1].trim().to_string();
    }

    // Strip fragment/query-ish tails
    match out.split_once('#') {
        Some((head, _)) => head.trim().to_string(),
        None => out,
    }
}

/// Turn a normalized reference into a safe repo-relative path
///
/// Absolute paths resolve only when they fall under a known `repo_root`.
fn reference_to_repo_path(
    reference: &str,
    repo_root: Option<&Path>,
) -> std::result::Result<String, String> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return url_to_repo_path(reference);
    }

    if reference.starts_with('/') {
        let inside = repo_root.and_then(|root| Path::new(reference).strip_prefix(root).ok());
        return match inside.and_then(Path::to_str) {
            Some(relative) => reference_to_repo_path(relative, None),
            None => Err(format!(
                "absolute path is outside the repository: {}",
                reference
            )),
        };
    }

    let cleaned = reference
        .strip_prefix("./")
        .unwrap_or(reference)
        .trim()
        .replace('\\', "/");

    let mut parts: Vec<&str> = Vec::new();
    for part in cleaned.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(format!("unsafe repo-relative path: {}", reference));
        }
        parts.push(part);
    }

    if parts.is_empty() {
        return Err(format!("unsafe repo-relative path: {}", reference));
    }

    Ok(parts.join("/"))
}

/// Map a GitHub blob/tree or raw URL onto the repo-relative path it names
fn url_to_repo_path(reference: &str) -> std::result::Result<String, String> {
    let parsed = Url::parse(reference).map_err(|e| format!("invalid URL {}: {}", reference, e))?;

    let host = parsed.host_str().unwrap_or("").to_ascii_lowercase();
    let parts: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    // GitHub blob/tree URLs: /OWNER/REPO/blob/<ref>/path...
    for marker in ["blob", "tree"] {
        if let Some(i) = parts.iter().position(|p| *p == marker) {
            if parts.len() <= i + 2 {
                return Err(format!("invalid GitHub {} URL: {}", marker, reference));
            }
            return reference_to_repo_path(&parts[i + 2..].join("/"), None)
                .map_err(|_| format!("unsafe repo-relative path from URL: {}", reference));
        }
    }

    // raw.githubusercontent.com/OWNER/REPO/<ref>/path...
    if host == "raw.githubusercontent.com" {
        if parts.len() < 4 {
            return Err(format!("invalid raw GitHub URL: {}", reference));
        }
        return reference_to_repo_path(&parts[3..].join("/"), None)
            .map_err(|_| format!("unsafe repo-relative path from URL: {}", reference));
    }

    Err(format!("unsupported URL reference: {}", reference))
}
