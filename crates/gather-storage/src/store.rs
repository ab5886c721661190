//! The store traits that backends implement.

use crate::types::*;
use crate::StoreError;

/// Encounter persistence.
///
/// Backends must make `push_confirmed_user` and `pull_confirmed_user` single
/// conditional writes: two concurrent confirmations of the same user may both
/// pass a read-side check, so only the write may decide who wins.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait EncounterStore: Send + Sync {
    /// Create an encounter. The backend assigns the id; confirmations start empty.
    /// A user invited twice is a `Conflict`.
    async fn create_encounter(&self, params: &EncounterParams) -> Result<Encounter, StoreError>;

    /// Get an encounter by id.
    async fn get_encounter(&self, encounter_id: &EncounterId) -> Result<Encounter, StoreError>;

    /// List the encounters a user is invited to.
    async fn list_user_encounters(&self, user_id: &UserId) -> Result<Vec<Encounter>, StoreError>;

    /// Replace specification, groups and invitations.
    /// Confirmations of users that are no longer invited are dropped; those
    /// of users still invited take the new snapshot. A user invited twice is
    /// a `Conflict`.
    async fn update_encounter(
        &self,
        encounter_id: &EncounterId,
        params: &EncounterParams,
    ) -> Result<Encounter, StoreError>;

    /// Delete an encounter together with its invitations and confirmations.
    async fn delete_encounter(&self, encounter_id: &EncounterId) -> Result<(), StoreError>;

    /// Add `user` to the confirmed users unless already present.
    /// Returns `false` when the user was already confirmed, and `NotFound`
    /// when the user is not (or no longer) invited.
    async fn push_confirmed_user(
        &self,
        encounter_id: &EncounterId,
        user: &User,
    ) -> Result<bool, StoreError>;

    /// Remove `user_id` from the confirmed users.
    /// Returns `false` when the user was not confirmed.
    async fn pull_confirmed_user(
        &self,
        encounter_id: &EncounterId,
        user_id: &UserId,
    ) -> Result<bool, StoreError>;
}

/// Encounter proposal persistence.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait ProposalStore: Send + Sync {
    /// Create a proposal. The backend assigns the id; applications start empty.
    async fn create_proposal(&self, params: &ProposalParams) -> Result<Proposal, StoreError>;

    /// List proposals in creation order, `page_size` per page, pages counted from 0.
    async fn list_proposals(&self, page: u32, page_size: u32)
        -> Result<Vec<Proposal>, StoreError>;

    /// List proposals whose creator group lists `user_id` among its leaders.
    async fn list_user_proposals(&self, user_id: &UserId) -> Result<Vec<Proposal>, StoreError>;

    /// Get a proposal by id.
    async fn get_proposal(&self, proposal_id: &ProposalId) -> Result<Proposal, StoreError>;

    /// Replace specification and creator. Applications are left untouched.
    async fn update_proposal(
        &self,
        proposal_id: &ProposalId,
        params: &ProposalParams,
    ) -> Result<Proposal, StoreError>;

    /// Delete a proposal together with its applications.
    async fn delete_proposal(&self, proposal_id: &ProposalId) -> Result<(), StoreError>;

    /// Append an application and return the updated proposal.
    async fn append_application(
        &self,
        proposal_id: &ProposalId,
        application: &Application,
    ) -> Result<Proposal, StoreError>;
}
