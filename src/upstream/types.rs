//! Resource identity and page types for upstream retrieval.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, FetchResult};

/// A single upstream record, passed through field for field.
pub type Record = serde_json::Value;

/// An ordered collection of records shared between the cache and responses.
pub type Records = Arc<Vec<Record>>;

const MAX_NAME_LEN: usize = 100;

/// The kind of collection fetched for a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Issues,
    Pulls,
}

impl ResourceKind {
    /// Path segment used by the upstream API.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Issues => "issues",
            ResourceKind::Pulls => "pulls",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issues" => Ok(ResourceKind::Issues),
            "pulls" => Ok(ResourceKind::Pulls),
            other => Err(FetchError::BadRequest(format!(
                "unsupported resource kind '{}'",
                other
            ))),
        }
    }
}

/// Identifies one logical collection: owner, repository and kind.
///
/// Keys are validated on construction and immutable afterwards, so any
/// `ResourceKey` in the cache or dedup map is safe to put in an upstream URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    owner: String,
    repo: String,
    kind: ResourceKind,
}

impl ResourceKey {
    /// Build a key, rejecting empty or malformed owner/repository names.
    pub fn new(owner: &str, repo: &str, kind: ResourceKind) -> FetchResult<Self> {
        validate_name("owner", owner)?;
        validate_name("repository", repo)?;
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            kind,
        })
    }

    /// Shorthand for the open issues of a repository.
    pub fn issues(owner: &str, repo: &str) -> FetchResult<Self> {
        Self::new(owner, repo, ResourceKind::Issues)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.repo, self.kind)
    }
}

fn validate_name(field: &str, value: &str) -> FetchResult<()> {
    if value.is_empty() {
        return Err(FetchError::BadRequest(format!("missing {} name", field)));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(FetchError::BadRequest(format!(
            "{} name exceeds {} characters",
            field, MAX_NAME_LEN
        )));
    }
    if value == "." || value == ".." {
        return Err(FetchError::BadRequest(format!("invalid {} name '{}'", field, value)));
    }
    let valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(FetchError::BadRequest(format!("invalid {} name '{}'", field, value)));
    }
    Ok(())
}

/// Opaque continuation token for the next page (the upstream's next URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(pub String);

/// Rate-limit budget reported by upstream alongside a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub reset_at: Option<SystemTime>,
}

/// One page of a paginated collection.
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<Record>,
    pub next: Option<PageCursor>,
    pub rate_limit: Option<RateLimitInfo>,
}
