//! Core types and service wiring for the sopkoll waste schedule viewer.

/// Domain models and identifiers shared by all providers.
pub mod model;
/// Registry and helpers for plugging municipality-specific providers into the service.
pub mod plugin;
/// Traits describing the gateway and provider interfaces.
pub mod ports;
/// High-level service facade used by clients.
pub mod service;
/// Local key/value persistence used for the last address and the schedule cache.
pub mod store;
/// Pure transformation pipeline from raw pickup records to the grouped view.
pub mod transform;

pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
pub use store::*;
pub use transform::*;
