//! JSON-over-HTTP clients for the user and group services.

use std::time::Duration;

use gather_storage::{GroupId, User};
use reqwest::{Client, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tokio_util::sync::CancellationToken;

use crate::{Authenticator, Caller, LeadershipOracle, RemoteError};

#[derive(Deserialize)]
struct UserReply {
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaderReply {
    #[serde(default)]
    is_leader: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: String,
}

fn build_client(timeout: Duration) -> Result<Client, RemoteError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RemoteError::Transport(e.to_string()))
}

/// Append path segments to a base URL, percent-encoding each one.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, RemoteError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RemoteError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Send `request` and decode a 2xx JSON body, giving up as soon as `cancel`
/// fires.
async fn fetch<T: DeserializeOwned>(
    cancel: &CancellationToken,
    request: RequestBuilder,
) -> Result<T, RemoteError> {
    let exchange = async {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = match serde_json::from_slice::<ErrorReply>(&body) {
                Ok(reply) => reply.error,
                Err(_) => String::from_utf8_lossy(&body).chars().take(200).collect(),
            };
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice::<T>(&body).map_err(|e| RemoteError::Malformed(e.to_string()))
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RemoteError::Cancelled),
        result = exchange => result,
    }
}

fn rejected(error: Option<String>) -> Option<RemoteError> {
    error
        .filter(|e| !e.is_empty())
        .map(RemoteError::Rejected)
}

/// Authenticator backed by `GET {base}/users/me`.
#[derive(Clone)]
pub struct HttpAuthenticator {
    client: Client,
    me_url: Url,
}

impl HttpAuthenticator {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            client: build_client(timeout)?,
            me_url: endpoint(&base, &["users", "me"])?,
        })
    }
}

#[async_trait::async_trait]
impl Authenticator for HttpAuthenticator {
    async fn authenticate(
        &self,
        cancel: &CancellationToken,
        token: &str,
    ) -> Result<Caller, RemoteError> {
        let request = self.client.get(self.me_url.clone()).bearer_auth(token);
        let reply: UserReply = fetch(cancel, request).await?;

        if let Some(err) = rejected(reply.error) {
            tracing::warn!(error = %err, "user service rejected token");
            return Err(err);
        }
        let user = reply
            .user
            .ok_or_else(|| RemoteError::Malformed("missing user".to_string()))?;
        if user.id.as_str().is_empty() {
            return Err(RemoteError::Malformed("user without id".to_string()));
        }

        tracing::debug!(user_id = %user.id, "authenticated");
        Ok(Caller {
            user,
            token: token.to_string(),
        })
    }
}

/// Leadership oracle backed by `GET {base}/groups/{group}/leaders/{user}`.
#[derive(Clone)]
pub struct HttpLeadershipOracle {
    client: Client,
    base: Url,
}

impl HttpLeadershipOracle {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, RemoteError> {
        // Fail at construction, not on the first check.
        endpoint(&base, &[])?;
        Ok(Self {
            client: build_client(timeout)?,
            base,
        })
    }
}

#[async_trait::async_trait]
impl LeadershipOracle for HttpLeadershipOracle {
    async fn is_leader(
        &self,
        cancel: &CancellationToken,
        caller: &Caller,
        group_id: &GroupId,
    ) -> Result<bool, RemoteError> {
        let url = endpoint(
            &self.base,
            &[
                "groups",
                group_id.as_str(),
                "leaders",
                caller.user.id.as_str(),
            ],
        )?;
        let request = self.client.get(url).bearer_auth(&caller.token);
        let reply: LeaderReply = fetch(cancel, request).await?;

        if let Some(err) = rejected(reply.error) {
            return Err(err);
        }
        reply
            .is_leader
            .ok_or_else(|| RemoteError::Malformed("missing isLeader".to_string()))
    }
}
