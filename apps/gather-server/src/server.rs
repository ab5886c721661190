use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use gather_remote::{Authenticator, Caller, LeadershipOracle, RemoteError};
use gather_storage::{EncounterStore, GroupId, ProposalStore};
use gather_store_sqlite::SqliteStore;
use tokio_util::sync::CancellationToken;

use crate::authz::is_authorized_over_any_group;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::reply::ApiError;

#[derive(Clone)]
pub struct GatherServer {
    pub encounters: Arc<dyn EncounterStore>,
    pub proposals: Arc<dyn ProposalStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub leadership: Arc<dyn LeadershipOracle>,
    pub page_size: u32,
    /// Parent of every per-request token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

impl GatherServer {
    pub fn new(
        encounters: Arc<dyn EncounterStore>,
        proposals: Arc<dyn ProposalStore>,
        authenticator: Arc<dyn Authenticator>,
        leadership: Arc<dyn LeadershipOracle>,
    ) -> Self {
        Self {
            encounters,
            proposals,
            authenticator,
            leadership,
            page_size: DEFAULT_PAGE_SIZE,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn new_sqlite(
        store: Arc<SqliteStore>,
        authenticator: Arc<dyn Authenticator>,
        leadership: Arc<dyn LeadershipOracle>,
    ) -> Self {
        Self::new(store.clone(), store, authenticator, leadership)
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Resolve the bearer token in `headers` into a caller.
    ///
    /// A missing or non-bearer header never reaches the user service.
    pub async fn authenticate(
        &self,
        cancel: &CancellationToken,
        headers: &HeaderMap,
    ) -> Result<Caller, ApiError> {
        let token = extract_bearer(headers).ok_or(ApiError::Unauthorized)?;
        self.authenticator
            .authenticate(cancel, token)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "authentication failed");
                ApiError::from_authentication(e)
            })
    }

    /// Require `caller` to lead at least one of `group_ids`.
    ///
    /// Both a plain "no" and an inconclusive check deny; only cancellation is
    /// reported as something other than `Unauthorized`.
    pub async fn require_leader_of_any(
        &self,
        cancel: &CancellationToken,
        caller: &Caller,
        group_ids: &[GroupId],
    ) -> Result<(), ApiError> {
        match is_authorized_over_any_group(self.leadership.as_ref(), cancel, caller, group_ids)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::debug!(user_id = %caller.user.id, "not a leader of any group");
                Err(ApiError::Unauthorized)
            }
            Err(RemoteError::Cancelled) => Err(ApiError::Aborted),
            Err(e) => {
                tracing::warn!(
                    user_id = %caller.user.id,
                    error = %e,
                    "leadership could not be established, denying"
                );
                Err(ApiError::Unauthorized)
            }
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
