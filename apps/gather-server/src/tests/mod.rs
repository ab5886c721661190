//! Server unit and integration tests.
//!
//! Tests are organized into modules by feature area:
//! - `common` - Shared test helpers and a fake user/group directory
//! - `authz` - Leadership aggregation over group lists
//! - `handlers` - Encounter and proposal lifecycle tests against in-memory SQLite
//! - `api` - The HTTP surface, exercised over a real listener


mod handlers;
