//! DHIS2 registry client adapter.
//!
//! The registry is consumed strictly as an authenticated HTTP endpoint
//! accepting structured payloads keyed by organisation unit, data element,
//! and tracked-entity-type identifiers configured out-of-band. This crate
//! is the single point of network failure: it classifies errors as
//! transient (retried with backoff) or fatal (failing the job with the
//! remote message captured verbatim).

pub mod client;
pub mod config;
pub mod error;
pub mod payload;

pub use client::{ImportSummary, RegistryClient};
pub use config::{DataElementMap, RegistryConfig};
pub use error::RegistryError;
pub use payload::DataValue;
