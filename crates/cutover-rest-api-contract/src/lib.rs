//! cutover REST API contract types and validation
//!
//! This crate defines the schema types and validation rules for the
//! migration-assurance REST API. The types are shared between the
//! service, the REST client, and the pipeline crates so that persisted
//! entities and wire bodies never drift apart.

pub mod error;
pub mod types;
pub mod validation;

pub use error::*;
pub use types::*;
pub use validation::*;
