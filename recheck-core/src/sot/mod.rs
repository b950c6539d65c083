//! Source-of-Truth bundle assembly
//!
//! One `SotBundle` is the authoritative context for a single review round:
//! the primary document (typically an issue body) plus whatever PRD/Epic it
//! references. Bundles are values; they are rebuilt fresh every round from
//! the current on-disk documents so edits between rounds are always picked
//! up, and never mutated in place.

mod excerpt;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::docs::{resolve_in_root, DocumentLoader, ResolvedDoc};
use crate::{Error, Result};

pub use excerpt::extract_wide_markdown;

/// Marker appended when a rendered bundle is cut at the size cap
pub const TRUNCATION_MARKER: &str = "[TRUNCATED]";

/// The primary document under review, typically an issue-tracker item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDoc {
    /// Issue number, when the document came from a tracker export
    pub number: Option<u64>,
    /// Issue title
    #[serde(default)]
    pub title: String,
    /// Issue URL
    #[serde(default)]
    pub url: String,
    /// Issue body; scanned for PRD/Epic reference markers
    #[serde(default)]
    pub body: String,
}

impl IssueDoc {
    /// Build an issue document from a raw body with no tracker metadata
    pub fn from_body(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Parse an issue-tracker JSON export (`{number, title, url, body}`)
    pub fn from_json_export(raw: &str) -> Result<Self> {
        let doc: IssueDoc = serde_json::from_str(raw).map_err(Error::Json)?;
        Ok(doc)
    }
}

/// An excerpted supporting document included in a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocSection {
    /// Repo-relative path the document was loaded from
    pub path: String,
    /// Excerpted document content
    pub content: String,
}

/// The assembled, read-only context for one review round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SotBundle {
    /// The scope this bundle was assembled for
    pub scope_id: String,
    /// Primary document, absent for purely local scopes
    pub issue: Option<IssueDoc>,
    /// Referenced or locally discovered PRD
    pub prd: Option<DocSection>,
    /// Referenced or locally discovered Epic
    pub epic: Option<DocSection>,
    /// When the bundle was assembled
    pub assembled_at: DateTime<Utc>,
}

impl SotBundle {
    /// Check structural equality ignoring the assembly timestamp
    pub fn content_eq(&self, other: &SotBundle) -> bool {
        self.scope_id == other.scope_id
            && self.issue == other.issue
            && self.prd == other.prd
            && self.epic == other.epic
    }

    /// Render the bundle as the text handed to the reviewer
    ///
    /// `max_chars` of zero means no cap; otherwise the output is cut and
    /// marked truncated.
    pub fn render(&self, max_chars: usize) -> String {
        let mut blocks: Vec<String> = Vec::new();

        if let Some(ref issue) = self.issue {
            let mut block = String::from("== Issue ==\n");
            if let Some(number) = issue.number {
                block.push_str(&format!("Number: {}\n", number));
            }
            if !issue.url.is_empty() {
                block.push_str(&format!("URL: {}\n", issue.url));
            }
            if !issue.title.is_empty() {
                block.push_str(&format!("Title: {}\n", issue.title));
            }
            block.push('\n');
            block.push_str(issue.body.trim_end());
            block.push('\n');
            blocks.push(block);
        }

        if let Some(ref prd) = self.prd {
            blocks.push(format!(
                "== PRD (wide excerpt) ==\nPath: {}\n\n{}\n",
                prd.path,
                prd.content.trim_end()
            ));
        }

        if let Some(ref epic) = self.epic {
            blocks.push(format!(
                "== Epic (wide excerpt) ==\nPath: {}\n\n{}\n",
                epic.path,
                epic.content.trim_end()
            ));
        }

        let mut out = blocks.join("\n");
        if !out.ends_with('\n') {
            out.push('\n');
        }

        if max_chars > 0 && out.len() > max_chars {
            let mut cut = max_chars;
            while !out.is_char_boundary(cut) {
                cut -= 1;
            }
            out.truncate(cut);
            out = format!("{}\n\n{}\n", out.trim_end(), TRUNCATION_MARKER);
        }

        out
    }
}

/// Builds `SotBundle` values from the current document state
#[derive(Clone)]
pub struct Assembler {
    loader: Arc<dyn DocumentLoader>,
    /// Conventional directory scanned for local PRD/Epic documents
    docs_dir: String,
    /// Repository root for mapping absolute reference paths, when known
    repo_root: Option<PathBuf>,
}

impl Assembler {
    /// Conventional local PRD file name
    pub const LOCAL_PRD: &'static str = "PRD.md";
    /// Conventional local Epic file name
    pub const LOCAL_EPIC: &'static str = "EPIC.md";

    /// Create an assembler over the given loader
    pub fn new(loader: Arc<dyn DocumentLoader>, docs_dir: impl Into<String>) -> Self {
        Self {
            loader,
            docs_dir: docs_dir.into(),
            repo_root: None,
        }
    }

    /// Set the repository root so absolute reference paths inside it resolve
    pub fn with_repo_root(mut self, repo_root: impl Into<PathBuf>) -> Self {
        self.repo_root = Some(repo_root.into());
        self
    }

    /// Assemble the SoT bundle for a scope
    ///
    /// With a primary document, its body is scanned for PRD/Epic references
    /// and each resolved document is loaded and excerpted. Without one, the
    /// conventional local documents are picked up instead. Assembly is
    /// all-or-nothing: any resolution failure aborts the round before the
    /// reviewer is ever invoked.
    pub fn assemble(&self, scope_id: &str, primary: Option<IssueDoc>) -> Result<SotBundle> {
        let wrap = |source: Error| Error::Assembly {
            scope: scope_id.to_string(),
            source: Box::new(source),
        };

        let (prd, epic) = match primary {
            Some(ref issue) => {
                let refs = resolve_in_root(
                    &issue.body,
                    self.loader.as_ref(),
                    self.repo_root.as_deref(),
                )
                .map_err(wrap)?;
                (
                    refs.prd.map(excerpt_doc),
                    refs.epic.map(excerpt_doc),
                )
            }
            None => (
                self.load_local(Self::LOCAL_PRD).map_err(wrap)?,
                self.load_local(Self::LOCAL_EPIC).map_err(wrap)?,
            ),
        };

        tracing::debug!(
            scope_id = %scope_id,
            has_issue = primary.is_some(),
            has_prd = prd.is_some(),
            has_epic = epic.is_some(),
            "Assembled SoT bundle"
        );

        Ok(SotBundle {
            scope_id: scope_id.to_string(),
            issue: primary,
            prd,
            epic,
            assembled_at: Utc::now(),
        })
    }

    /// Load a conventional local document; absence is not an error
    fn load_local(&self, name: &str) -> Result<Option<DocSection>> {
        let path = if self.docs_dir.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.docs_dir.trim_end_matches('/'), name)
        };

        Ok(self.loader.load(&path)?.map(|content| DocSection {
            content: extract_wide_markdown(&content),
            path,
        }))
    }
}

fn excerpt_doc(doc: ResolvedDoc) -> DocSection {
    DocSection {
        content: extract_wide_markdown(&doc.content),
        path: doc.path,
    }
}
