//! Lifecycle handler tests.
//!
//! These call the handler functions directly with an authenticated caller,
//! against in-memory SQLite and the fake `Directory`.

mod encounters;
