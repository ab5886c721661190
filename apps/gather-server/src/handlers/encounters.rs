//! Encounter lifecycle: create, read, list, update, delete, confirm, decline.
//!
//! Creation, update and deletion belong to leaders of the encounter's groups;
//! confirm and decline belong to the invited users themselves.

use gather_remote::Caller;
use gather_storage::{Encounter, EncounterId, StoreError};
use tokio_util::sync::CancellationToken;

use crate::reply::{ApiError, ErrorMessage};
use crate::server::GatherServer;

pub async fn create_encounter(
    server: &GatherServer,
    cancel: &CancellationToken,
    caller: &Caller,
    encounter: Encounter,
) -> Result<Encounter, ApiError> {
    server
        .require_leader_of_any(cancel, caller, &encounter.group_ids())
        .await?;
    check_invitations(&encounter)?;

    // Any id or confirmations in the body are dropped here: the store assigns
    // the id and every encounter starts with nobody confirmed.
    let created = server
        .encounters
        .create_encounter(&encounter.into_params())
        .await?;

    if let Some(id) = &created.id {
        tracing::info!(encounter_id = %id, user_id = %caller.user.id, "encounter created");
    }
    Ok(created)
}

pub async fn get_encounter(
    server: &GatherServer,
    caller: &Caller,
    encounter_id: &EncounterId,
) -> Result<Encounter, ApiError> {
    let encounter = server.encounters.get_encounter(encounter_id).await?;
    if !encounter.is_invited(&caller.user.id) {
        return Err(ApiError::Unauthorized);
    }
    Ok(encounter)
}

pub async fn list_encounters(
    server: &GatherServer,
    caller: &Caller,
) -> Result<Vec<Encounter>, ApiError> {
    Ok(server
        .encounters
        .list_user_encounters(&caller.user.id)
        .await?)
}

pub async fn update_encounter(
    server: &GatherServer,
    cancel: &CancellationToken,
    caller: &Caller,
    encounter_id: &EncounterId,
    encounter: Encounter,
) -> Result<Encounter, ApiError> {
    // Authorize against the stored groups, never the ones in the body.
    let current = server.encounters.get_encounter(encounter_id).await?;
    server
        .require_leader_of_any(cancel, caller, &current.group_ids())
        .await?;

    if encounter.id.as_ref() != Some(encounter_id) {
        return Err(ApiError::UnprocessableEntity(ErrorMessage::IdMismatch));
    }
    // Without groups nobody could ever be authorized over it again.
    if encounter.groups.is_empty() {
        return Err(ApiError::UnprocessableEntity(ErrorMessage::NoGroups));
    }
    check_invitations(&encounter)?;

    let updated = server
        .encounters
        .update_encounter(encounter_id, &encounter.into_params())
        .await?;

    tracing::info!(encounter_id = %encounter_id, user_id = %caller.user.id, "encounter updated");
    Ok(updated)
}

pub async fn delete_encounter(
    server: &GatherServer,
    cancel: &CancellationToken,
    caller: &Caller,
    encounter_id: &EncounterId,
) -> Result<(), ApiError> {
    let current = server.encounters.get_encounter(encounter_id).await?;
    server
        .require_leader_of_any(cancel, caller, &current.group_ids())
        .await?;

    server.encounters.delete_encounter(encounter_id).await?;

    tracing::info!(encounter_id = %encounter_id, user_id = %caller.user.id, "encounter deleted");
    Ok(())
}

pub async fn confirm_encounter(
    server: &GatherServer,
    caller: &Caller,
    encounter_id: &EncounterId,
) -> Result<Encounter, ApiError> {
    let encounter = server.encounters.get_encounter(encounter_id).await?;
    let invited = encounter
        .invited_user(&caller.user.id)
        .ok_or(ApiError::Unauthorized)?;

    if encounter.is_confirmed(&caller.user.id) {
        return Err(ApiError::UnprocessableEntity(
            ErrorMessage::AlreadyConfirmed,
        ));
    }

    // The read above can race another confirmation or an update that drops
    // the invitation; the conditional push decides.
    match server
        .encounters
        .push_confirmed_user(encounter_id, invited)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            return Err(ApiError::UnprocessableEntity(
                ErrorMessage::AlreadyConfirmed,
            ))
        }
        Err(StoreError::NotFound) => {
            let current = server.encounters.get_encounter(encounter_id).await?;
            if !current.is_invited(&caller.user.id) {
                return Err(ApiError::Unauthorized);
            }
            return Err(ApiError::NotFound);
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(encounter_id = %encounter_id, user_id = %caller.user.id, "encounter confirmed");
    Ok(server.encounters.get_encounter(encounter_id).await?)
}

pub async fn decline_encounter(
    server: &GatherServer,
    caller: &Caller,
    encounter_id: &EncounterId,
) -> Result<Encounter, ApiError> {
    let encounter = server.encounters.get_encounter(encounter_id).await?;
    if !encounter.is_invited(&caller.user.id) {
        return Err(ApiError::Unauthorized);
    }

    if !encounter.is_confirmed(&caller.user.id) {
        return Err(ApiError::UnprocessableEntity(ErrorMessage::NotConfirmed));
    }

    if !server
        .encounters
        .pull_confirmed_user(encounter_id, &caller.user.id)
        .await?
    {
        return Err(ApiError::UnprocessableEntity(ErrorMessage::NotConfirmed));
    }

    tracing::info!(encounter_id = %encounter_id, user_id = %caller.user.id, "encounter declined");
    Ok(server.encounters.get_encounter(encounter_id).await?)
}

fn check_invitations(encounter: &Encounter) -> Result<(), ApiError> {
    match encounter.duplicate_invitation() {
        Some(user_id) => {
            tracing::debug!(user_id = %user_id, "duplicate invitation in request");
            Err(ApiError::UnprocessableEntity(
                ErrorMessage::DuplicateInvitation,
            ))
        }
        None => Ok(()),
    }
}
