//! Leadership aggregation over a list of groups.

use gather_remote::{Caller, LeadershipOracle, RemoteError};
use gather_storage::GroupId;
use tokio_util::sync::CancellationToken;

/// Whether `caller` leads at least one of `group_ids`.
///
/// Groups are probed one at a time in list order and the first `true` ends
/// the search. A failed probe does not stop the search; if no probe says
/// `true`, the last error observed is returned so callers can tell "not a
/// leader anywhere" (`Ok(false)`) from "could not find out" (`Err`).
/// Cancellation is the exception: it ends the search immediately, since every
/// later probe would fail the same way.
pub async fn is_authorized_over_any_group(
    oracle: &dyn LeadershipOracle,
    cancel: &CancellationToken,
    caller: &Caller,
    group_ids: &[GroupId],
) -> Result<bool, RemoteError> {
    let mut last_error = None;

    for group_id in group_ids {
        match oracle.is_leader(cancel, caller, group_id).await {
            Ok(true) => {
                tracing::debug!(user_id = %caller.user.id, group_id = %group_id, "leader");
                return Ok(true);
            }
            Ok(false) => {
                tracing::debug!(user_id = %caller.user.id, group_id = %group_id, "not a leader");
            }
            Err(RemoteError::Cancelled) => return Err(RemoteError::Cancelled),
            Err(err) => {
                tracing::debug!(
                    user_id = %caller.user.id,
                    group_id = %group_id,
                    error = %err,
                    "leadership check failed"
                );
                last_error = Some(err);
            }
        }
    }

    match last_error {
        None => Ok(false),
        Some(err) => Err(err),
    }
}
