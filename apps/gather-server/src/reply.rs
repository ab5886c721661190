//! Typed outcomes and the wire text that goes with them.
//!
//! Every response body is either `{<key>: value}` or `{"error": message}`;
//! the keys and messages come from the closed sets below so all handlers
//! speak the same vocabulary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gather_remote::RemoteError;
use gather_storage::StoreError;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Caller-visible error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorMessage {
    Unauthorized,
    NotFound,
    Conflict,
    AlreadyConfirmed,
    NotConfirmed,
    IdMismatch,
    DuplicateInvitation,
    NoGroups,
    BadRequest,
    Internal,
    Aborted,
}

impl ErrorMessage {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorMessage::Unauthorized => "unauthorized",
            ErrorMessage::NotFound => "not found",
            ErrorMessage::Conflict => "conflict",
            ErrorMessage::AlreadyConfirmed => "user is already confirmed",
            ErrorMessage::NotConfirmed => "user is not confirmed",
            ErrorMessage::IdMismatch => "id mismatch",
            ErrorMessage::DuplicateInvitation => "user is invited more than once",
            ErrorMessage::NoGroups => "encounter has no groups",
            ErrorMessage::BadRequest => "bad request",
            ErrorMessage::Internal => "internal server error",
            ErrorMessage::Aborted => "request aborted",
        }
    }
}

impl std::fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Success payload keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKey {
    Encounter,
    Encounters,
    EncounterId,
    Proposal,
    Proposals,
    ProposalId,
}

impl ResponseKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            ResponseKey::Encounter => "encounter",
            ResponseKey::Encounters => "encounters",
            ResponseKey::EncounterId => "encounterID",
            ResponseKey::Proposal => "proposal",
            ResponseKey::Proposals => "proposals",
            ResponseKey::ProposalId => "proposalID",
        }
    }
}

/// Outcome of a failed operation.
///
/// Detail strings on `BadRequest` and `Internal` are for logs; the wire only
/// ever carries the catalog message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", ErrorMessage::Unauthorized)]
    Unauthorized,
    #[error("{}", ErrorMessage::NotFound)]
    NotFound,
    #[error("{}", ErrorMessage::Conflict)]
    Conflict,
    #[error("{0}")]
    UnprocessableEntity(ErrorMessage),
    #[error("{}", ErrorMessage::BadRequest)]
    BadRequest(String),
    #[error("{}", ErrorMessage::Internal)]
    Internal(String),
    #[error("{}", ErrorMessage::Aborted)]
    Aborted,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Aborted => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::NotFound => "not_found",
            ApiError::Conflict => "conflict",
            ApiError::UnprocessableEntity(_) => "unprocessable_entity",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
            ApiError::Aborted => "aborted",
        }
    }

    /// Map a failed authentication. The user service refusing the token is a
    /// 401; the user service misbehaving is ours to report.
    pub fn from_authentication(err: RemoteError) -> Self {
        match err {
            RemoteError::Cancelled => ApiError::Aborted,
            RemoteError::Rejected(_) => ApiError::Unauthorized,
            ref e if e.is_client_error() => ApiError::Unauthorized,
            e => ApiError::Internal(format!("authentication: {e}")),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            // A malformed id can never name a document.
            StoreError::NotFound | StoreError::InvalidId(_) => ApiError::NotFound,
            StoreError::AlreadyExists | StoreError::Conflict => ApiError::Conflict,
            StoreError::Backend(detail) => ApiError::Internal(format!("store: {detail}")),
        }
    }
}

/// A status code plus JSON body, independent of any particular handler.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn new<T: Serialize>(status: StatusCode, key: ResponseKey, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => {
                let mut body = Map::new();
                body.insert(key.as_str().to_string(), value);
                Reply {
                    status,
                    body: Value::Object(body),
                }
            }
            Err(e) => ApiError::Internal(format!("serialize {}: {e}", key.as_str())).into(),
        }
    }

    pub fn ok<T: Serialize>(key: ResponseKey, value: &T) -> Self {
        Self::new(StatusCode::OK, key, value)
    }

    pub fn created<T: Serialize>(key: ResponseKey, value: &T) -> Self {
        Self::new(StatusCode::CREATED, key, value)
    }
}

impl From<ApiError> for Reply {
    fn from(err: ApiError) -> Self {
        let mut body = Map::new();
        body.insert("error".to_string(), Value::String(err.to_string()));
        Reply {
            status: err.status(),
            body: Value::Object(body),
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
