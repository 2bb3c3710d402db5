//! Shared networking infrastructure.

pub mod client;
pub mod request;

pub use client::{HttpClient, HttpClientBuilder};
pub use request::{ApiRequest, Body, StatusClass};
