//! Lifecycle handlers, organized by resource:
//! - encounters: create, get, list, update, delete, confirm, decline
//! - proposals: create, list (paged and by user), get, update, delete, applications
//!
//! Handlers take an authenticated [`gather_remote::Caller`] and typed input
//! and return a typed outcome; HTTP concerns live in `api`.

pub mod encounters;
pub mod proposals;
