//! In-memory transaction bookkeeping: kind, status, and which sites it has
//! touched (for deciding whether a site failure dooms it).

use std::collections::BTreeSet;

use repcrec_core::{SiteId, TransactionId};

/// Whether a transaction may write, or is read-only and served from a
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// A read-write transaction: locks, temp writes, two-phase commit.
    ReadWrite,
    /// A read-only transaction: every read is a snapshot as of `start_ts`.
    ReadOnly,
}

/// Whether a transaction is still running, or already doomed to abort at
/// its next `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Running normally.
    Active,
    /// A site it touched has failed; it must abort when it ends.
    WillAbort,
}

/// A live transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: TransactionId,
    start_ts: u64,
    kind: TransactionKind,
    status: TransactionStatus,
    visited_sites: BTreeSet<SiteId>,
}

impl Transaction {
    /// Start a new transaction at `start_ts`.
    pub fn new(id: TransactionId, start_ts: u64, kind: TransactionKind) -> Self {
        Self {
            id,
            start_ts,
            kind,
            status: TransactionStatus::Active,
            visited_sites: BTreeSet::new(),
        }
    }

    /// This transaction's id.
    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    /// The tick at which this transaction began; read-only transactions use
    /// it as their snapshot timestamp.
    pub fn start_ts(&self) -> u64 {
        self.start_ts
    }

    /// Whether this is a read-only transaction.
    pub fn is_read_only(&self) -> bool {
        matches!(self.kind, TransactionKind::ReadOnly)
    }

    /// This transaction's kind.
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// Whether this transaction is doomed to abort at its next `end`.
    pub fn will_abort(&self) -> bool {
        matches!(self.status, TransactionStatus::WillAbort)
    }

    /// Doom this transaction: its next `end` aborts rather than commits.
    pub fn mark_will_abort(&mut self) {
        self.status = TransactionStatus::WillAbort;
    }

    /// Record that this transaction successfully read from `site`. Writes
    /// don't call this — only a read dooms the transaction if `site` fails.
    pub fn visit(&mut self, site: SiteId) {
        self.visited_sites.insert(site);
    }

    /// Whether this transaction has successfully read from `site`.
    pub fn has_visited(&self, site: SiteId) -> bool {
        self.visited_sites.contains(&site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_transaction_is_active() {
        let txn = Transaction::new(TransactionId::new("T1"), 1, TransactionKind::ReadWrite);
        assert!(!txn.will_abort());
        assert!(!txn.is_read_only());
    }

    #[test]
    fn marking_will_abort_is_sticky() {
        let mut txn = Transaction::new(TransactionId::new("T1"), 1, TransactionKind::ReadWrite);
        txn.mark_will_abort();
        assert!(txn.will_abort());
    }

    #[test]
    fn reading_a_site_is_remembered() {
        let mut txn = Transaction::new(TransactionId::new("T1"), 1, TransactionKind::ReadWrite);
        txn.visit(SiteId::new(2));
        assert!(txn.has_visited(SiteId::new(2)));
        assert!(!txn.has_visited(SiteId::new(3)));
    }
}
