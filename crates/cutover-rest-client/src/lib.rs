//! Typed async client for the cutover REST service.
//!
//! Shares every wire type with the service through
//! `cutover-rest-api-contract`, so tooling and integration tests talk
//! to the API without hand-rolled JSON.

pub mod client;
pub mod error;

pub use client::RestClient;
pub use error::{RestClientError, RestClientResult};
