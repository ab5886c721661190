//! Group snapshot types.

use serde::{Deserialize, Serialize};

use super::{null_as_empty, GroupId, User};

/// Group snapshot as embedded in encounters and proposals.
///
/// The `leaders` list is a copy taken when the snapshot was made. Authorization
/// never trusts it: leadership is always re-checked against the group service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub members: Vec<User>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub leaders: Vec<User>,
}
