//! Type definitions for gather storage.

mod encounters;
mod groups;
mod ids;
mod proposals;
mod users;

pub use encounters::*;
pub use groups::*;
pub use ids::*;
pub use proposals::*;
pub use users::*;

use serde::{Deserialize, Deserializer};

/// Accept `null` wherever a list is expected and treat it as empty.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
