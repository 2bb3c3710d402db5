//! Client library for the mutual-selection portal API.
//!
//! Three identity classes (admin, student, teacher) share one credential
//! store. [`ApiClient`] attaches the active identity's bearer token to every
//! request, renews expired tokens through a single-flight
//! [`RefreshCoordinator`](auth::RefreshCoordinator) and replays the failed
//! requests, and tears the session down when renewal is impossible.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod net;
pub mod util;

pub use client::{ApiClient, ApiClientBuilder};
pub use error::ClientError;
