//! REST client for the Alisto city-services backend.
//!
//! Every endpoint answers with the same JSON envelope
//! (`{ success, data, message, errors }`); `ApiClient` unwraps it and turns
//! `success: false` and non-2xx statuses into `ApiError`s.
//!
//! Authenticated endpoints take a JWT bearer token obtained from `login`.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
