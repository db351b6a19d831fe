//! Observable outcomes of a tick, for a reporter to render and for tests to
//! assert against.

use repcrec_core::{RepcrecError, SiteId, TransactionId, Value, VariableId};

use crate::data_manager::SiteReport;
use crate::transaction::TransactionKind;

/// Why a transaction aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The deadlock detector chose this transaction as the youngest victim
    /// in a wait-for cycle.
    Deadlock,
    /// A site this transaction had read from or written to failed before it
    /// could end.
    SiteFailure,
}

/// One thing that happened during a tick.
#[derive(Debug, Clone)]
pub enum Event {
    /// A transaction began.
    Began {
        /// Its id.
        tid: TransactionId,
        /// Read-write or read-only.
        kind: TransactionKind,
    },
    /// A read completed.
    Read {
        /// The reading transaction.
        tid: TransactionId,
        /// The variable read.
        vid: VariableId,
        /// The value returned.
        value: Value,
    },
    /// A write completed (was recorded as a temp write at every site in its
    /// write set).
    Wrote {
        /// The writing transaction.
        tid: TransactionId,
        /// The variable written.
        vid: VariableId,
        /// The value written.
        value: Value,
    },
    /// A transaction committed.
    Committed {
        /// Its id.
        tid: TransactionId,
    },
    /// A transaction aborted.
    Aborted {
        /// Its id.
        tid: TransactionId,
        /// Why.
        reason: AbortReason,
    },
    /// A site went down.
    SiteFailed {
        /// The site.
        site: SiteId,
    },
    /// A site came back up.
    SiteRecovered {
        /// The site.
        site: SiteId,
    },
    /// A `dump()` command's report of every site's committed state.
    Dumped(Vec<SiteReport>),
    /// A command referred to something that doesn't exist (unknown
    /// transaction, site, or a duplicate `begin`). The command is dropped.
    Rejected(RepcrecError),
}
