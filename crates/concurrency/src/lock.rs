//! A single variable's lock: current holder(s), a FIFO wait queue, and the
//! compatibility/promotion/dequeue rules strict two-phase locking needs.

use std::collections::BTreeSet;

use repcrec_core::TransactionId;

/// The two lock modes a transaction can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared (read) lock.
    Read,
    /// Exclusive (write) lock.
    Write,
}

/// The lock currently held on a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lock {
    /// Held by one or more readers.
    Shared(BTreeSet<TransactionId>),
    /// Held by a single writer.
    Exclusive(TransactionId),
}

/// An entry in a lock's FIFO wait queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waiter {
    /// The blocked transaction.
    pub tid: TransactionId,
    /// The mode it is waiting to acquire.
    pub mode: LockMode,
}

/// The outcome of a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The lock was acquired (possibly re-entrantly, possibly by promotion).
    Grant,
    /// The request was enqueued; the caller must retry later.
    Block,
}

/// Per-variable lock state: the current holder(s) and a strict-FIFO queue of
/// blocked requests.
///
/// A `LockManager` never looks at *which* variable it guards — the owning
/// [`repcrec_engine::data_manager::DataManager`] keys a map of these by
/// variable id and is the only thing that mutates this state.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LockManager {
    current: Option<Lock>,
    queue: Vec<Waiter>,
}

impl LockManager {
    /// A lock manager with no current holder and an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock currently held, if any.
    pub fn current(&self) -> Option<&Lock> {
        self.current.as_ref()
    }

    /// The FIFO wait queue, in request order.
    pub fn queue(&self) -> &[Waiter] {
        &self.queue
    }

    /// Whether `tid` holds the current lock exclusively.
    pub fn is_exclusive_holder(&self, tid: &TransactionId) -> bool {
        matches!(&self.current, Some(Lock::Exclusive(holder)) if holder == tid)
    }

    /// Attempt to acquire a shared (read) lock for `tid`.
    pub fn try_read(&mut self, tid: &TransactionId) -> Decision {
        let decision = match &mut self.current {
            None => {
                self.current = Some(Lock::Shared(BTreeSet::from([tid.clone()])));
                Decision::Grant
            }
            Some(Lock::Shared(holders)) => {
                if holders.contains(tid) {
                    Decision::Grant
                } else if !self.queue.iter().any(|w| w.mode == LockMode::Write) {
                    holders.insert(tid.clone());
                    Decision::Grant
                } else {
                    self.enqueue(tid.clone(), LockMode::Read);
                    Decision::Block
                }
            }
            Some(Lock::Exclusive(holder)) => {
                if holder == tid {
                    Decision::Grant
                } else {
                    self.enqueue(tid.clone(), LockMode::Read);
                    Decision::Block
                }
            }
        };
        tracing::debug!(target: "repcrec::lock", %tid, ?decision, "try_read");
        decision
    }

    /// Attempt to acquire an exclusive (write) lock for `tid`, promoting an
    /// existing sole shared hold in place when possible.
    pub fn try_write(&mut self, tid: &TransactionId) -> Decision {
        let decision = match &self.current {
            None => {
                self.current = Some(Lock::Exclusive(tid.clone()));
                Decision::Grant
            }
            Some(Lock::Shared(holders)) => {
                let sole_holder = holders.len() == 1 && holders.contains(tid);
                let other_queued_write = self
                    .queue
                    .iter()
                    .any(|w| w.mode == LockMode::Write && &w.tid != tid);
                if sole_holder && !other_queued_write {
                    self.current = Some(Lock::Exclusive(tid.clone()));
                    Decision::Grant
                } else {
                    self.enqueue(tid.clone(), LockMode::Write);
                    Decision::Block
                }
            }
            Some(Lock::Exclusive(holder)) => {
                if holder == tid {
                    Decision::Grant
                } else {
                    self.enqueue(tid.clone(), LockMode::Write);
                    Decision::Block
                }
            }
        };
        tracing::debug!(target: "repcrec::lock", %tid, ?decision, "try_write");
        decision
    }

    /// Release any hold or queued request belonging to `tid`.
    ///
    /// Does not advance the queue — callers run [`LockManager::dequeue_next`]
    /// afterwards so that a batch of releases (e.g. at commit, across every
    /// variable a transaction touched) can be settled in one pass.
    pub fn release_by(&mut self, tid: &TransactionId) {
        match &mut self.current {
            Some(Lock::Shared(holders)) => {
                holders.remove(tid);
                if holders.is_empty() {
                    self.current = None;
                }
            }
            Some(Lock::Exclusive(holder)) if holder == tid => {
                self.current = None;
            }
            _ => {}
        }
        self.queue.retain(|w| &w.tid != tid);
    }

    /// Drop the current lock and wait queue entirely.
    ///
    /// Used on site failure: a failed site's lock table is cleared, not
    /// released holder-by-holder, since the transactions that held those
    /// locks may themselves still be active elsewhere.
    pub fn clear(&mut self) {
        self.current = None;
        self.queue.clear();
    }

    /// If no lock is currently held, install the next queued request(s).
    ///
    /// A leading run of `Read` waiters is merged into a single `Shared` hold;
    /// if a `Write` waiter immediately follows and it is the sole current
    /// holder, it is promoted in place. Everything else is left queued.
    pub fn dequeue_next(&mut self) {
        if self.current.is_some() || self.queue.is_empty() {
            return;
        }
        let first = self.queue.remove(0);
        tracing::debug!(target: "repcrec::lock", tid = %first.tid, mode = ?first.mode, "dequeue_next");
        match first.mode {
            LockMode::Write => {
                self.current = Some(Lock::Exclusive(first.tid));
            }
            LockMode::Read => {
                self.current = Some(Lock::Shared(BTreeSet::from([first.tid])));
                self.coalesce_leading_reads();
            }
        }
    }

    fn coalesce_leading_reads(&mut self) {
        loop {
            match self.queue.first() {
                Some(w) if w.mode == LockMode::Read => {
                    let w = self.queue.remove(0);
                    if let Some(Lock::Shared(holders)) = &mut self.current {
                        holders.insert(w.tid);
                    }
                }
                Some(w) if w.mode == LockMode::Write => {
                    let promotes = matches!(
                        &self.current,
                        Some(Lock::Shared(holders))
                            if holders.len() == 1 && holders.contains(&w.tid)
                    );
                    if promotes {
                        let w = self.queue.remove(0);
                        self.current = Some(Lock::Exclusive(w.tid));
                    }
                    break;
                }
                _ => break,
            }
        }
    }

    /// Enqueue `(tid, mode)` unless an equivalent or stronger request from
    /// `tid` is already queued.
    ///
    /// A queued `Write` already covers a later `Read` request from the same
    /// transaction, and a duplicate request of the same mode is redundant —
    /// both would otherwise inflate the queue and let a transaction block on
    /// itself.
    fn enqueue(&mut self, tid: TransactionId, mode: LockMode) {
        let already_covered = self
            .queue
            .iter()
            .any(|w| w.tid == tid && (w.mode == mode || w.mode == LockMode::Write));
        if !already_covered {
            self.queue.push(Waiter { tid, mode });
        }
    }
}


#[cfg(test)]
mod exclusion_property {
    use super::*;
    use super::tests::tid;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Read(u8),
        Write(u8),
        Release(u8),
        Dequeue,
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0u8..4).prop_map(Step::Read),
            (0u8..4).prop_map(Step::Write),
            (0u8..4).prop_map(Step::Release),
            Just(Step::Dequeue),
        ]
    }

    fn holds_exclusion(lm: &LockManager) -> bool {
        match lm.current() {
            None => true,
            Some(Lock::Shared(holders)) => !holders.is_empty(),
            Some(Lock::Exclusive(_)) => true,
        }
    }

    proptest! {
        // At most one exclusive holder, and no shared holder ever coexists
        // with an exclusive holder, through any interleaving of requests
        // and releases.
        #[test]
        fn exclusion_holds_after_every_step(steps in prop::collection::vec(step_strategy(), 0..64)) {
            let mut lm = LockManager::new();
            for step in steps {
                match step {
                    Step::Read(t) => { lm.try_read(&tid(&format!("T{t}"))); }
                    Step::Write(t) => { lm.try_write(&tid(&format!("T{t}"))); }
                    Step::Release(t) => { lm.release_by(&tid(&format!("T{t}"))); }
                    Step::Dequeue => lm.dequeue_next(),
                }
                prop_assert!(holds_exclusion(&lm));
            }
        }
    }
}
