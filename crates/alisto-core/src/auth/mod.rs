//! Session management.
//!
//! `Session` keeps the JWT, refresh token and signed-in user returned by
//! `login`, persisted in the key-value store under the `session` key.

pub mod session;

pub use session::{Session, SessionData, SESSION_KEY};
