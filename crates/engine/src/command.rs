//! The operation vocabulary a script (or any other driver) issues to a
//! [`crate::coordinator::TransactionCoordinator`].

use repcrec_core::{SiteId, TransactionId, Value, VariableId};

/// One instruction from a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `begin(Tn)` — start a read-write transaction.
    Begin(TransactionId),
    /// `beginRO(Tn)` — start a read-only transaction.
    BeginReadOnly(TransactionId),
    /// `R(Tn,xi)` — read a variable.
    Read {
        /// The reading transaction.
        tid: TransactionId,
        /// The variable to read.
        vid: VariableId,
    },
    /// `W(Tn,xi,v)` — write a variable.
    Write {
        /// The writing transaction.
        tid: TransactionId,
        /// The variable to write.
        vid: VariableId,
        /// The value to write.
        value: Value,
    },
    /// `end(Tn)` — end a transaction, committing unless it is doomed.
    End(TransactionId),
    /// `fail(s)` — take a site down.
    Fail(SiteId),
    /// `recover(s)` — bring a site back up.
    Recover(SiteId),
    /// `dump()` — report every site's committed state.
    Dump,
}
