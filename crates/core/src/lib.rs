//! Shared identifiers, value model, and error taxonomy for the RepCRec simulator.
//!
//! This crate has no behavior of its own — it defines the vocabulary that the
//! `repcrec-concurrency` (lock manager) and `repcrec-engine` (data manager,
//! coordinator, deadlock detector) crates build on:
//! - [`SiteId`] / [`VariableId`] / [`TransactionId`]: identifiers.
//! - [`Value`]: the integer value stored in a variable.
//! - [`CommittedVersion`]: one entry in a variable's version chain.
//! - [`error::RepcrecError`] / [`error::RepcrecResult`]: the typed error surface.
//! - [`config::SimulatorConfig`]: site/variable counts, defaulting to the fixed
//!   10 sites / 20 variables layout.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod ids;
pub mod value;

pub use config::SimulatorConfig;
pub use error::{RepcrecError, RepcrecResult};
pub use ids::{SiteId, TransactionId, VariableId};
pub use value::{CommittedVersion, Value};
