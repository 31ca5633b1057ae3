//! Dependency injection
//!
//! Service container wiring settings, the ledger store, and services.

pub mod service_container;

pub use service_container::ServiceContainer;
