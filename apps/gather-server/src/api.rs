//! HTTP surface.
//!
//! Each route authenticates, decodes its input, calls one lifecycle handler
//! and turns the outcome into a [`Reply`]. Every request runs under a child of
//! the server's shutdown token.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use gather_storage::{Application, Encounter, EncounterId, Proposal, ProposalId, UserId};
use serde::Deserialize;

use crate::handlers::{encounters, proposals};
use crate::metrics::RequestTimer;
use crate::reply::{ApiError, Reply, ResponseKey};
use crate::server::GatherServer;

pub fn router(server: GatherServer) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/encounters", post(create_encounter).get(list_encounters))
        .route(
            "/encounters/{id}",
            get(get_encounter)
                .put(update_encounter)
                .delete(delete_encounter),
        )
        .route("/encounters/{id}/confirm", post(confirm_encounter))
        .route("/encounters/{id}/decline", post(decline_encounter))
        .route("/proposals", post(create_proposal).get(list_proposals))
        .route(
            "/proposals/{id}",
            get(get_proposal)
                .put(update_proposal)
                .delete(delete_proposal),
        )
        .route("/proposals/{id}/applications", post(append_application))
        .route("/users/{user_id}/proposals", get(list_user_proposals))
        .with_state(server)
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Record the outcome and render it.
fn finish<T>(
    timer: RequestTimer,
    result: Result<T, ApiError>,
    ok: impl FnOnce(T) -> Reply,
) -> Reply {
    match result {
        Ok(value) => {
            timer.success();
            ok(value)
        }
        Err(err) => {
            match &err {
                ApiError::Internal(detail) => {
                    tracing::error!(operation = timer.operation(), error = %detail, "internal error");
                }
                ApiError::BadRequest(detail) => {
                    tracing::debug!(operation = timer.operation(), error = %detail, "bad request");
                }
                _ => {}
            }
            timer.error(err.code());
            err.into()
        }
    }
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

// ───────────────────────────── Encounters ─────────────────────────────

async fn create_encounter(
    State(server): State<GatherServer>,
    headers: HeaderMap,
    body: Result<Json<Encounter>, JsonRejection>,
) -> Reply {
    let timer = RequestTimer::new("encounters.create");
    let cancel = server.shutdown.child_token();
    let result = async {
        let caller = server.authenticate(&cancel, &headers).await?;
        let Json(encounter) = body.map_err(bad_json)?;
        encounters::create_encounter(&server, &cancel, &caller, encounter).await
    }
    .await;
    finish(timer, result, |e| Reply::created(ResponseKey::Encounter, &e))
}

async fn list_encounters(State(server): State<GatherServer>, headers: HeaderMap) -> Reply {
    let timer = RequestTimer::new("encounters.list");
    let cancel = server.shutdown.child_token();
    let result = async {
        let caller = server.authenticate(&cancel, &headers).await?;
        encounters::list_encounters(&server, &caller).await
    }
    .await;
    finish(timer, result, |list| {
        Reply::ok(ResponseKey::Encounters, &list)
    })
}

async fn get_encounter(
    State(server): State<GatherServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    let timer = RequestTimer::new("encounters.get");
    let cancel = server.shutdown.child_token();
    let result = async {
        let caller = server.authenticate(&cancel, &headers).await?;
        encounters::get_encounter(&server, &caller, &EncounterId(id)).await
    }
    .await;
    finish(timer, result, |e| Reply::ok(ResponseKey::Encounter, &e))
}

async fn update_encounter(
    State(server): State<GatherServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<Encounter>, JsonRejection>,
) -> Reply {
    let timer = RequestTimer::new("encounters.update");
    let cancel = server.shutdown.child_token();
    let result = async {
        let caller = server.authenticate(&cancel, &headers).await?;
        let Json(encounter) = body.map_err(bad_json)?;
        encounters::update_encounter(&server, &cancel, &caller, &EncounterId(id), encounter).await
    }
    .await;
    finish(timer, result, |e| Reply::ok(ResponseKey::Encounter, &e))
}

async fn delete_encounter(
    State(server): State<GatherServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    let timer = RequestTimer::new("encounters.delete");
    let cancel = server.shutdown.child_token();
    let id = EncounterId(id);
    let result = async {
        let caller = server.authenticate(&cancel, &headers).await?;
        encounters::delete_encounter(&server, &cancel, &caller, &id).await
    }
    .await;
    finish(timer, result, |()| Reply::ok(ResponseKey::EncounterId, &id))
}

async fn confirm_encounter(
    State(server): State<GatherServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    let timer = RequestTimer::new("encounters.confirm");
    let cancel = server.shutdown.child_token();
    let result = async {
        let caller = server.authenticate(&cancel, &headers).await?;
        encounters::confirm_encounter(&server, &caller, &EncounterId(id)).await
    }
    .await;
    finish(timer, result, |e| Reply::ok(ResponseKey::Encounter, &e))
}

async fn decline_encounter(
    State(server): State<GatherServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    let timer = RequestTimer::new("encounters.decline");
    let cancel = server.shutdown.child_token();
    let result = async {
        let caller = server.authenticate(&cancel, &headers).await?;
        encounters::decline_encounter(&server, &caller, &EncounterId(id)).await
    }
    .await;
    finish(timer, result, |e| Reply::ok(ResponseKey::Encounter, &e))
}

// ───────────────────────────── Proposals ─────────────────────────────

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: u32,
}

async fn create_proposal(
    State(server): State<GatherServer>,
    headers: HeaderMap,
    body: Result<Json<Proposal>, JsonRejection>,
) -> Reply {
    let timer = RequestTimer::new("proposals.create");
    let cancel = server.shutdown.child_token();
    let result = async {
        let caller = server.authenticate(&cancel, &headers).await?;
        let Json(proposal) = body.map_err(bad_json)?;
        proposals::create_proposal(&server, &cancel, &caller, proposal).await
    }
    .await;
    finish(timer, result, |p| Reply::created(ResponseKey::Proposal, &p))
}

async fn list_proposals(
    State(server): State<GatherServer>,
    headers: HeaderMap,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Reply {
    let timer = RequestTimer::new("proposals.list");
    let cancel = server.shutdown.child_token();
    let result = async {
        server.authenticate(&cancel, &headers).await?;
        let Query(PageQuery { page }) =
            query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        proposals::list_proposals(&server, page).await
    }
    .await;
    finish(timer, result, |list| Reply::ok(ResponseKey::Proposals, &list))
}

async fn list_user_proposals(
    State(server): State<GatherServer>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Reply {
    let timer = RequestTimer::new("proposals.list_by_user");
    let cancel = server.shutdown.child_token();
    let result = async {
        server.authenticate(&cancel, &headers).await?;
        proposals::list_user_proposals(&server, &UserId(user_id)).await
    }
    .await;
    finish(timer, result, |list| Reply::ok(ResponseKey::Proposals, &list))
}

async fn get_proposal(
    State(server): State<GatherServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    let timer = RequestTimer::new("proposals.get");
    let cancel = server.shutdown.child_token();
    let result = async {
        server.authenticate(&cancel, &headers).await?;
        proposals::get_proposal(&server, &ProposalId(id)).await
    }
    .await;
    finish(timer, result, |p| Reply::ok(ResponseKey::Proposal, &p))
}

async fn update_proposal(
    State(server): State<GatherServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<Proposal>, JsonRejection>,
) -> Reply {
    let timer = RequestTimer::new("proposals.update");
    let cancel = server.shutdown.child_token();
    let result = async {
        let caller = server.authenticate(&cancel, &headers).await?;
        let Json(proposal) = body.map_err(bad_json)?;
        proposals::update_proposal(&server, &cancel, &caller, &ProposalId(id), proposal).await
    }
    .await;
    finish(timer, result, |p| Reply::ok(ResponseKey::Proposal, &p))
}

async fn delete_proposal(
    State(server): State<GatherServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    let timer = RequestTimer::new("proposals.delete");
    let cancel = server.shutdown.child_token();
    let id = ProposalId(id);
    let result = async {
        let caller = server.authenticate(&cancel, &headers).await?;
        proposals::delete_proposal(&server, &cancel, &caller, &id).await
    }
    .await;
    finish(timer, result, |()| Reply::ok(ResponseKey::ProposalId, &id))
}

async fn append_application(
    State(server): State<GatherServer>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<Application>, JsonRejection>,
) -> Reply {
    let timer = RequestTimer::new("proposals.append_application");
    let cancel = server.shutdown.child_token();
    let result = async {
        let caller = server.authenticate(&cancel, &headers).await?;
        let Json(application) = body.map_err(bad_json)?;
        proposals::append_application(&server, &cancel, &caller, &ProposalId(id), application)
            .await
    }
    .await;
    finish(timer, result, |p| Reply::created(ResponseKey::Proposal, &p))
}
