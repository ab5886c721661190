//! Remote collaborators of the gather core.
//!
//! Identity is owned by the user service and group leadership by the group
//! service. The core only sees the two capability traits below; the HTTP
//! implementations live in [`http`].

use gather_storage::{GroupId, User};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod http;

pub use http::{HttpAuthenticator, HttpLeadershipOracle};
pub use reqwest::Url;

/// An authenticated caller: the resolved user plus the bearer token it
/// presented, which is forwarded on leadership checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("rejected by remote: {0}")]
    Rejected(String),
    #[error("cancelled")]
    Cancelled,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    /// True for a 4xx reply: the remote understood the request and refused it.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RemoteError::Status { status, .. } if (400..500).contains(status))
    }
}

/// Resolves a bearer token into the calling user.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        cancel: &CancellationToken,
        token: &str,
    ) -> Result<Caller, RemoteError>;
}

/// Answers "does this caller lead this group right now".
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait LeadershipOracle: Send + Sync {
    async fn is_leader(
        &self,
        cancel: &CancellationToken,
        caller: &Caller,
        group_id: &GroupId,
    ) -> Result<bool, RemoteError>;
}
