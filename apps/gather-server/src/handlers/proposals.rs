//! Proposal lifecycle. Reads are open to any authenticated caller; writes
//! belong to leaders of the creator group, applications to leaders of the
//! applicant group.

use gather_remote::Caller;
use gather_storage::{Application, Proposal, ProposalId, UserId};
use tokio_util::sync::CancellationToken;

use crate::reply::{ApiError, ErrorMessage};
use crate::server::GatherServer;

pub async fn create_proposal(
    server: &GatherServer,
    cancel: &CancellationToken,
    caller: &Caller,
    proposal: Proposal,
) -> Result<Proposal, ApiError> {
    server
        .require_leader_of_any(cancel, caller, &[proposal.creator.id.clone()])
        .await?;

    let created = server
        .proposals
        .create_proposal(&proposal.into_params())
        .await?;

    if let Some(id) = &created.id {
        tracing::info!(proposal_id = %id, user_id = %caller.user.id, "proposal created");
    }
    Ok(created)
}

pub async fn list_proposals(server: &GatherServer, page: u32) -> Result<Vec<Proposal>, ApiError> {
    Ok(server
        .proposals
        .list_proposals(page, server.page_size)
        .await?)
}

pub async fn list_user_proposals(
    server: &GatherServer,
    user_id: &UserId,
) -> Result<Vec<Proposal>, ApiError> {
    Ok(server.proposals.list_user_proposals(user_id).await?)
}

pub async fn get_proposal(
    server: &GatherServer,
    proposal_id: &ProposalId,
) -> Result<Proposal, ApiError> {
    Ok(server.proposals.get_proposal(proposal_id).await?)
}

pub async fn update_proposal(
    server: &GatherServer,
    cancel: &CancellationToken,
    caller: &Caller,
    proposal_id: &ProposalId,
    proposal: Proposal,
) -> Result<Proposal, ApiError> {
    let current = server.proposals.get_proposal(proposal_id).await?;
    server
        .require_leader_of_any(cancel, caller, &[current.creator.id])
        .await?;

    if proposal.id.as_ref() != Some(proposal_id) {
        return Err(ApiError::UnprocessableEntity(ErrorMessage::IdMismatch));
    }

    let updated = server
        .proposals
        .update_proposal(proposal_id, &proposal.into_params())
        .await?;

    tracing::info!(proposal_id = %proposal_id, user_id = %caller.user.id, "proposal updated");
    Ok(updated)
}

pub async fn delete_proposal(
    server: &GatherServer,
    cancel: &CancellationToken,
    caller: &Caller,
    proposal_id: &ProposalId,
) -> Result<(), ApiError> {
    let current = server.proposals.get_proposal(proposal_id).await?;
    server
        .require_leader_of_any(cancel, caller, &[current.creator.id])
        .await?;

    server.proposals.delete_proposal(proposal_id).await?;

    tracing::info!(proposal_id = %proposal_id, user_id = %caller.user.id, "proposal deleted");
    Ok(())
}

/// Append an application on behalf of the applicant group.
///
/// Only leadership of `application.creator` counts; leading the proposal's
/// own creator group grants nothing here.
pub async fn append_application(
    server: &GatherServer,
    cancel: &CancellationToken,
    caller: &Caller,
    proposal_id: &ProposalId,
    application: Application,
) -> Result<Proposal, ApiError> {
    server
        .require_leader_of_any(cancel, caller, &[application.creator.id.clone()])
        .await?;

    let proposal = server
        .proposals
        .append_application(proposal_id, &application)
        .await?;

    tracing::info!(
        proposal_id = %proposal_id,
        group_id = %application.creator.id,
        user_id = %caller.user.id,
        "application appended"
    );
    Ok(proposal)
}
