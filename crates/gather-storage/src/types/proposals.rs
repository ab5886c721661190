//! Encounter proposal types.

use serde::{Deserialize, Serialize};

use super::{null_as_empty, Group, ProposalId, Specification};

/// An open call for groups to meet, created on behalf of the `creator` group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProposalId>,
    pub specification: Specification,
    pub creator: Group,
    /// Append-only, in submission order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub applications: Vec<Application>,
}

impl Proposal {
    /// Strip the store-owned fields (id, applications) off a request body.
    pub fn into_params(self) -> ProposalParams {
        ProposalParams {
            specification: self.specification,
            creator: self.creator,
        }
    }
}

/// A group's application to a proposal. `creator` is the applicant group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    #[serde(default)]
    pub description: String,
    pub creator: Group,
}

/// The caller-writable part of a proposal, used for create and update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposalParams {
    pub specification: Specification,
    pub creator: Group,
}
