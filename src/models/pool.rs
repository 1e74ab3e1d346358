//! Pool-related data models.
//!
//! This module defines the identity and lifecycle state of a pool, plus the
//! serializable status reported by the health endpoint.

use serde::Serialize;
use url::Url;

/// Position of a pool within the published pool set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolRole {
    Primary,
    /// Index into the configured secondary URL list.
    Secondary(usize),
}

impl std::fmt::Display for PoolRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary(i) => write!(f, "secondary[{}]", i),
        }
    }
}

/// Lifecycle of a single pool.
///
/// ```text
/// Unopened -> Opening -> Ready -> Closing -> Closed
///    |           \-> Failed
///    \-> Closed (discarded before opening)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    Unopened,
    Opening,
    Ready,
    Closing,
    Closed,
    /// The open-time probe failed. Terminal.
    Failed,
}

impl PoolState {
    /// Check whether `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: PoolState) -> bool {
        matches!(
            (self, next),
            (Self::Unopened, Self::Opening)
                | (Self::Unopened, Self::Closed)
                | (Self::Opening, Self::Ready)
                | (Self::Opening, Self::Failed)
                | (Self::Ready, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }

    /// Check if the pool can lend connections.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Check if no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unopened => "unopened",
            Self::Opening => "opening",
            Self::Ready => "ready",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Health of one pool as reported to operators.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub role: PoolRole,
    /// Credentials masked
    pub url: String,
    pub state: PoolState,
    pub size: u32,
    pub idle: usize,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Display-safe version of a connection URL (password masked).
pub fn mask_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                // Only fails for cannot-be-a-base URLs, which have no password
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}
