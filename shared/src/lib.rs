//! Shared types and models for the furniture order engine
//!
//! This crate contains types shared between the backend, the frontend (via
//! WASM), and other components of the system.

pub mod ledger;
pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
