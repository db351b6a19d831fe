//! The simulation engine: per-site storage, transaction bookkeeping, the
//! coordinator that drives a script's commands, and deadlock detection.
//!
//! [`coordinator::TransactionCoordinator`] is the crate's single entry
//! point — a driver (the `repcrec` CLI, or a test) builds one from a
//! [`repcrec_core::SimulatorConfig`] and calls
//! [`coordinator::TransactionCoordinator::step`] once per script command.

#![warn(missing_docs)]

pub mod command;
pub mod coordinator;
pub mod data_manager;
pub mod deadlock;
pub mod event;
pub mod transaction;
pub mod variable;

pub use command::Command;
pub use coordinator::TransactionCoordinator;
pub use data_manager::{DataManager, ReadOutcome, RwReadOutcome, SiteReport};
pub use deadlock::DeadlockDetector;
pub use event::{AbortReason, Event};
pub use transaction::{Transaction, TransactionKind, TransactionStatus};
pub use variable::Variable;
