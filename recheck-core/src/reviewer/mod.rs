//! External reviewer capability
//!
//! The engine never reviews anything itself. Reviewing is an opaque
//! capability with a narrow contract: it receives the SoT bundle and the
//! diff under review, and produces raw report JSON targeting the published
//! schema. Modeling it as an injected trait keeps the controller testable
//! with a scripted fake.

mod command;

use async_trait::async_trait;

use crate::sot::SotBundle;
use crate::Result;

pub use command::CommandReviewer;

/// The external reviewer contract
///
/// The returned value is untrusted until it passes schema validation.
#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Review a diff against the assembled SoT bundle
    async fn review(&self, bundle: &SotBundle, diff: &str) -> Result<serde_json::Value>;
}
