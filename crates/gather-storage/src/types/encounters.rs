//! Encounter types.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{null_as_empty, EncounterId, Group, GroupId, User, UserId};

/// What, where and when. Shared by encounters and proposals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub time: DateTime<Utc>,
}

/// Encounter document.
///
/// `confirmed_users` is always a subset (by id) of `invited_users`; the store
/// only changes it through the conditional push/pull operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EncounterId>,
    pub specification: Specification,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub groups: Vec<Group>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub invited_users: Vec<User>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub confirmed_users: Vec<User>,
}

impl Encounter {
    /// Ids of the referenced groups, in the order they were listed.
    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.iter().map(|g| g.id.clone()).collect()
    }

    /// The invitation snapshot for `user_id`, if the user is invited.
    pub fn invited_user(&self, user_id: &UserId) -> Option<&User> {
        self.invited_users.iter().find(|u| &u.id == user_id)
    }

    pub fn is_invited(&self, user_id: &UserId) -> bool {
        self.invited_user(user_id).is_some()
    }

    pub fn is_confirmed(&self, user_id: &UserId) -> bool {
        self.confirmed_users.iter().any(|u| &u.id == user_id)
    }

    /// First user id listed more than once in `invited_users`.
    pub fn duplicate_invitation(&self) -> Option<&UserId> {
        first_duplicate(&self.invited_users)
    }

    /// Strip the store-owned fields (id, confirmations) off a request body.
    pub fn into_params(self) -> EncounterParams {
        EncounterParams {
            specification: self.specification,
            groups: self.groups,
            invited_users: self.invited_users,
        }
    }
}

/// The caller-writable part of an encounter, used for create and full update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncounterParams {
    pub specification: Specification,
    pub groups: Vec<Group>,
    pub invited_users: Vec<User>,
}

impl EncounterParams {
    /// First user id listed more than once in `invited_users`.
    pub fn duplicate_invitation(&self) -> Option<&UserId> {
        first_duplicate(&self.invited_users)
    }
}

fn first_duplicate(users: &[User]) -> Option<&UserId> {
    let mut seen = HashSet::new();
    users.iter().map(|u| &u.id).find(|id| !seen.insert(*id))
}
