//! Encounter handler tests.

use std::sync::Arc;

use gather_storage::{EncounterId, MockEncounterStore, StoreError, UserId};
use gather_store_sqlite::SqliteStore;
use mockall::Sequence;
use tokio_util::sync::CancellationToken;

use super::super::common::*;
use crate::handlers::encounters::*;
use crate::reply::{ApiError, ErrorMessage};
use crate::server::GatherServer;

fn confirmed_ids(e: &gather_storage::Encounter) -> Vec<&str> {
    e.confirmed_users.iter().map(|u| u.id.as_str()).collect()
}

#[tokio::test]
async fn handler_encounter_create_by_leader_of_any_group() {
    let server = create_test_server(Directory::new().leading("alice", "g2")).await;
    let cancel = CancellationToken::new();

    let created = create_encounter(
        &server,
        &cancel,
        &caller("alice"),
        encounter(&["g1", "g2"], &["u1", "u2"]),
    )
    .await
    .unwrap();

    assert!(created.id.is_some());
    assert_eq!(created.groups.len(), 2);
    assert_eq!(created.invited_users.len(), 2);
    assert!(created.confirmed_users.is_empty());
}

#[tokio::test]
async fn handler_encounter_create_denied_for_non_leader() {
    let server = create_test_server(Directory::new().leading("alice", "g1")).await;

    let err = create_encounter(
        &server,
        &CancellationToken::new(),
        &caller("bob"),
        encounter(&["g1"], &["u1"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert!(server
        .encounters
        .list_user_encounters(&UserId::from("u1"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn handler_encounter_create_assigns_id_and_empty_confirmations() {
    let server = create_test_server(Directory::new().leading("alice", "g1")).await;

    let supplied = EncounterId::from("0123456789abcdef01234567");
    let mut body = encounter(&["g1"], &["u1", "u2"]);
    body.id = Some(supplied.clone());
    body.confirmed_users = vec![user("u1")];

    let created = create_encounter(&server, &CancellationToken::new(), &caller("alice"), body)
        .await
        .unwrap();

    let id = created.id.clone().unwrap();
    assert_ne!(id, supplied);
    assert!(created.confirmed_users.is_empty());

    let stored = server.encounters.get_encounter(&id).await.unwrap();
    assert!(stored.confirmed_users.is_empty());
    let json = serde_json::to_value(&stored).unwrap();
    assert_eq!(json["confirmedUsers"], serde_json::json!([]));
}

#[tokio::test]
async fn handler_encounter_read_requires_invitation() {
    let server = create_test_server(Directory::new().leading("leader", "g1")).await;
    let id = seed_encounter(&server, &["g1"], &["u1"]).await;

    let read = get_encounter(&server, &caller("u1"), &id).await.unwrap();
    assert_eq!(read.id, Some(id.clone()));

    // Leading a group of the encounter is not an invitation.
    let err = get_encounter(&server, &caller("leader"), &id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[tokio::test]
async fn handler_encounter_missing_and_malformed_ids_are_not_found() {
    let server = create_test_server(Directory::new()).await;

    let missing = EncounterId::from("0123456789abcdef01234567");
    assert!(matches!(
        get_encounter(&server, &caller("u1"), &missing).await,
        Err(ApiError::NotFound)
    ));

    let malformed = EncounterId::from("not-an-object-id");
    assert!(matches!(
        get_encounter(&server, &caller("u1"), &malformed).await,
        Err(ApiError::NotFound)
    ));
    assert!(matches!(
        confirm_encounter(&server, &caller("u1"), &malformed).await,
        Err(ApiError::NotFound)
    ));
}

#[tokio::test]
async fn handler_encounter_list_for_invited_user() {
    let server = create_test_server(Directory::new()).await;
    let first = seed_encounter(&server, &["g1"], &["u1", "u2"]).await;
    let second = seed_encounter(&server, &["g1"], &["u2"]).await;

    let u1 = list_encounters(&server, &caller("u1")).await.unwrap();
    assert_eq!(u1.len(), 1);
    assert_eq!(u1[0].id, Some(first.clone()));

    let u2 = list_encounters(&server, &caller("u2")).await.unwrap();
    let ids: Vec<_> = u2.into_iter().filter_map(|e| e.id).collect();
    assert_eq!(ids, vec![first, second]);

    assert!(list_encounters(&server, &caller("nobody"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn handler_encounter_confirm_and_decline_scenario() {
    let server = create_test_server(Directory::new()).await;
    let id = seed_encounter(&server, &["g1", "g2"], &["u1", "u2"]).await;

    let after = confirm_encounter(&server, &caller("u1"), &id).await.unwrap();
    assert_eq!(confirmed_ids(&after), ["u1"]);

    let err = confirm_encounter(&server, &caller("u1"), &id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::UnprocessableEntity(ErrorMessage::AlreadyConfirmed)
    ));
    assert_eq!(err.to_string(), "user is already confirmed");

    let err = decline_encounter(&server, &caller("u2"), &id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::UnprocessableEntity(ErrorMessage::NotConfirmed)
    ));
    assert_eq!(err.to_string(), "user is not confirmed");

    let after = decline_encounter(&server, &caller("u1"), &id).await.unwrap();
    assert!(after.confirmed_users.is_empty());
}

#[tokio::test]
async fn handler_encounter_confirm_and_decline_require_invitation() {
    let server = create_test_server(Directory::new()).await;
    let id = seed_encounter(&server, &["g1"], &["u1"]).await;

    assert!(matches!(
        confirm_encounter(&server, &caller("mallory"), &id).await,
        Err(ApiError::Unauthorized)
    ));
    assert!(matches!(
        decline_encounter(&server, &caller("mallory"), &id).await,
        Err(ApiError::Unauthorized)
    ));
}

#[tokio::test]
async fn handler_encounter_confirm_uses_the_invitation_snapshot() {
    let server = create_test_server(Directory::new()).await;
    let id = seed_encounter(&server, &["g1"], &["u1"]).await;

    // The caller's profile changed since the invitation was made.
    let mut renamed = caller("u1");
    renamed.user.name = "Someone Else".to_string();

    let after = confirm_encounter(&server, &renamed, &id).await.unwrap();
    assert_eq!(after.confirmed_users, vec![user("u1")]);
}

#[tokio::test]
async fn handler_encounter_update_by_leader() {
    let server = create_test_server(Directory::new().leading("alice", "g1")).await;
    let id = seed_encounter(&server, &["g1"], &["u1", "u2"]).await;
    confirm_encounter(&server, &caller("u1"), &id).await.unwrap();
    confirm_encounter(&server, &caller("u2"), &id).await.unwrap();

    let mut body = encounter(&["g1"], &["u2", "u3"]);
    body.id = Some(id.clone());
    body.specification.name = "barbecue".to_string();

    let updated = update_encounter(
        &server,
        &CancellationToken::new(),
        &caller("alice"),
        &id,
        body,
    )
    .await
    .unwrap();

    assert_eq!(updated.specification.name, "barbecue");
    assert_eq!(updated.invited_users, vec![user("u2"), user("u3")]);
    // u1 is no longer invited, so their confirmation goes too.
    assert_eq!(confirmed_ids(&updated), ["u2"]);
}

#[tokio::test]
async fn handler_encounter_update_authorizes_against_stored_groups() {
    let server = create_test_server(
        Directory::new()
            .leading("alice", "g1")
            .leading("mallory", "g9"),
    )
    .await;
    let id = seed_encounter(&server, &["g1"], &["u1"]).await;

    // Mallory leads g9 and tries to swap it in.
    let mut body = encounter(&["g9"], &["mallory"]);
    body.id = Some(id.clone());

    let err = update_encounter(
        &server,
        &CancellationToken::new(),
        &caller("mallory"),
        &id,
        body,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));

    let stored = server.encounters.get_encounter(&id).await.unwrap();
    assert_eq!(stored.group_ids(), vec![gather_storage::GroupId::from("g1")]);
    assert!(stored.is_invited(&UserId::from("u1")));
}

#[tokio::test]
async fn handler_encounter_update_id_mismatch() {
    let server = create_test_server(Directory::new().leading("alice", "g1")).await;
    let id = seed_encounter(&server, &["g1"], &["u1"]).await;
    let other = seed_encounter(&server, &["g1"], &["u1"]).await;

    let mut body = encounter(&["g1"], &["u1"]);
    body.id = Some(other);
    let err = update_encounter(
        &server,
        &CancellationToken::new(),
        &caller("alice"),
        &id,
        body,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ApiError::UnprocessableEntity(ErrorMessage::IdMismatch)
    ));

    // A body without an id does not match either.
    let err = update_encounter(
        &server,
        &CancellationToken::new(),
        &caller("alice"),
        &id,
        encounter(&["g1"], &["u1"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ApiError::UnprocessableEntity(ErrorMessage::IdMismatch)
    ));
}

#[tokio::test]
async fn handler_encounter_duplicate_invitations_are_unprocessable() {
    let server = create_test_server(Directory::new().leading("alice", "g1")).await;
    let cancel = CancellationToken::new();

    let err = create_encounter(
        &server,
        &cancel,
        &caller("alice"),
        encounter(&["g1"], &["u1", "u2", "u1"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ApiError::UnprocessableEntity(ErrorMessage::DuplicateInvitation)
    ));
    assert!(list_encounters(&server, &caller("u2")).await.unwrap().is_empty());

    let id = seed_encounter(&server, &["g1"], &["u1", "u2"]).await;
    let mut body = encounter(&["g1"], &["u2", "u1", "u2"]);
    body.id = Some(id.clone());
    let err = update_encounter(&server, &cancel, &caller("alice"), &id, body)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::UnprocessableEntity(ErrorMessage::DuplicateInvitation)
    ));

    let stored = server.encounters.get_encounter(&id).await.unwrap();
    assert_eq!(stored.invited_users, vec![user("u1"), user("u2")]);
}

#[tokio::test]
async fn handler_encounter_update_cannot_remove_every_group() {
    let server = create_test_server(Directory::new().leading("alice", "g1")).await;
    let cancel = CancellationToken::new();
    let id = seed_encounter(&server, &["g1"], &["u1"]).await;

    let mut body = encounter(&[], &["u1"]);
    body.id = Some(id.clone());
    let err = update_encounter(&server, &cancel, &caller("alice"), &id, body)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::UnprocessableEntity(ErrorMessage::NoGroups)
    ));

    // The leader still governs the encounter.
    delete_encounter(&server, &cancel, &caller("alice"), &id)
        .await
        .unwrap();
}

#[tokio::test]
async fn handler_encounter_delete() {
    let server = create_test_server(Directory::new().leading("alice", "g1")).await;
    let id = seed_encounter(&server, &["g1"], &["u1"]).await;
    let cancel = CancellationToken::new();

    let err = delete_encounter(&server, &cancel, &caller("u1"), &id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));

    delete_encounter(&server, &cancel, &caller("alice"), &id)
        .await
        .unwrap();
    assert!(matches!(
        delete_encounter(&server, &cancel, &caller("alice"), &id).await,
        Err(ApiError::NotFound)
    ));
}

#[tokio::test]
async fn handler_encounter_cancelled_request_is_aborted() {
    let server = create_test_server(Directory::new().leading("alice", "g1")).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = create_encounter(&server, &cancel, &caller("alice"), encounter(&["g1"], &["u1"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Aborted));
}

async fn server_with_encounter_store(store: MockEncounterStore) -> GatherServer {
    let sqlite = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let directory = Arc::new(Directory::new().leading("alice", "g1"));
    GatherServer::new(Arc::new(store), sqlite, directory.clone(), directory)
}

fn stored(id: &EncounterId) -> gather_storage::Encounter {
    let mut e = encounter(&["g1"], &["u1"]);
    e.id = Some(id.clone());
    e
}

#[tokio::test]
async fn handler_encounter_store_failure_is_internal() {
    let mut store = MockEncounterStore::new();
    store
        .expect_get_encounter()
        .returning(|_| Err(StoreError::Backend("disk I/O error".into())));
    store.expect_delete_encounter().never();
    let server = server_with_encounter_store(store).await;
    let id = EncounterId::from("0123456789abcdef01234567");

    assert!(matches!(
        get_encounter(&server, &caller("u1"), &id).await,
        Err(ApiError::Internal(_))
    ));
    assert!(matches!(
        delete_encounter(&server, &CancellationToken::new(), &caller("alice"), &id).await,
        Err(ApiError::Internal(_))
    ));
}

#[tokio::test]
async fn handler_encounter_create_rejected_by_store_is_conflict() {
    let mut store = MockEncounterStore::new();
    store
        .expect_create_encounter()
        .times(1)
        .returning(|_| Err(StoreError::AlreadyExists));
    let server = server_with_encounter_store(store).await;

    let err = create_encounter(
        &server,
        &CancellationToken::new(),
        &caller("alice"),
        encounter(&["g1"], &["u1"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Conflict));
}

#[tokio::test]
async fn handler_encounter_lost_confirm_race_is_already_confirmed() {
    // Both reads see "not confirmed"; the store's conditional push says the
    // other request got there first.
    let id = EncounterId::from("0123456789abcdef01234567");
    let mut store = MockEncounterStore::new();
    let snapshot = stored(&id);
    store
        .expect_get_encounter()
        .times(1)
        .returning(move |_| Ok(snapshot.clone()));
    store
        .expect_push_confirmed_user()
        .times(1)
        .returning(|_, _| Ok(false));
    let server = server_with_encounter_store(store).await;

    let err = confirm_encounter(&server, &caller("u1"), &id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::UnprocessableEntity(ErrorMessage::AlreadyConfirmed)
    ));
}

#[tokio::test]
async fn handler_encounter_lost_decline_race_is_not_confirmed() {
    let id = EncounterId::from("0123456789abcdef01234567");
    let mut store = MockEncounterStore::new();
    let mut snapshot = stored(&id);
    snapshot.confirmed_users = vec![user("u1")];
    store
        .expect_get_encounter()
        .times(1)
        .returning(move |_| Ok(snapshot.clone()));
    store
        .expect_pull_confirmed_user()
        .times(1)
        .returning(|_, _| Ok(false));
    let server = server_with_encounter_store(store).await;

    let err = decline_encounter(&server, &caller("u1"), &id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::UnprocessableEntity(ErrorMessage::NotConfirmed)
    ));
}

#[tokio::test]
async fn handler_encounter_confirm_after_invitation_withdrawn_is_unauthorized() {
    // The invitation disappears between the read and the push.
    let id = EncounterId::from("0123456789abcdef01234567");
    let mut store = MockEncounterStore::new();
    let mut seq = Sequence::new();
    let before = stored(&id);
    let mut after = stored(&id);
    after.invited_users.clear();
    store
        .expect_get_encounter()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| Ok(before.clone()));
    store
        .expect_push_confirmed_user()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(StoreError::NotFound));
    store
        .expect_get_encounter()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| Ok(after.clone()));
    let server = server_with_encounter_store(store).await;

    let err = confirm_encounter(&server, &caller("u1"), &id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[tokio::test]
async fn handler_encounter_confirm_on_deleted_encounter_is_not_found() {
    let id = EncounterId::from("0123456789abcdef01234567");
    let mut store = MockEncounterStore::new();
    let mut seq = Sequence::new();
    let before = stored(&id);
    store
        .expect_get_encounter()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| Ok(before.clone()));
    store
        .expect_push_confirmed_user()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(StoreError::NotFound));
    store
        .expect_get_encounter()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(StoreError::NotFound));
    let server = server_with_encounter_store(store).await;

    let err = confirm_encounter(&server, &caller("u1"), &id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound));
}
