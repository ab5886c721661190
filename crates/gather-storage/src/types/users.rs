//! User types.

use serde::{Deserialize, Serialize};

use super::UserId;

/// User identity snapshot. Owned by the user service; never mutated here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "pictureURL")]
    pub picture_url: String,
}
