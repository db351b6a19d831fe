//! Ties sites, transactions, and the deadlock detector together into the
//! per-tick algorithm: detect and abort a deadlock victim, execute the
//! tick's command, then drain whatever operations that unblocks.

use std::collections::{BTreeMap, VecDeque};

use repcrec_concurrency::Decision;
use repcrec_core::{RepcrecError, SimulatorConfig, SiteId, TransactionId, VariableId};

use crate::command::Command;
use crate::data_manager::{DataManager, ReadOutcome, RwReadOutcome, SiteReport};
use crate::deadlock::DeadlockDetector;
use crate::event::{AbortReason, Event};
use crate::transaction::{Transaction, TransactionKind};

/// A read or write that couldn't be completed yet because its write/read
/// set wasn't fully available.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operation {
    Read {
        tid: TransactionId,
        vid: VariableId,
    },
    Write {
        tid: TransactionId,
        vid: VariableId,
        value: repcrec_core::Value,
    },
}

/// Drives the whole simulation: every site, every live transaction, the
/// queue of not-yet-satisfiable reads and writes, and the logical clock.
pub struct TransactionCoordinator {
    clock: u64,
    transactions: BTreeMap<TransactionId, Transaction>,
    pending: VecDeque<Operation>,
    sites: Vec<DataManager>,
    events: Vec<Event>,
}

impl TransactionCoordinator {
    /// Build a coordinator with `config.site_count` sites, each populated
    /// per `config`.
    pub fn new(config: SimulatorConfig) -> Self {
        let sites = (1..=config.site_count)
            .map(|id| DataManager::new(SiteId::new(id), config))
            .collect();
        Self {
            clock: 0,
            transactions: BTreeMap::new(),
            pending: VecDeque::new(),
            sites,
            events: Vec::new(),
        }
    }

    /// The current logical clock value.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// A `dump`-style snapshot of every site, without going through the
    /// event log.
    pub fn site_reports(&self) -> Vec<SiteReport> {
        self.sites.iter().map(DataManager::report).collect()
    }

    /// Run one full tick: a deadlock pass, the command itself, then drain
    /// pending operations until no more progress is made. Returns every
    /// event produced, in order.
    pub fn step(&mut self, command: Command) -> Vec<Event> {
        self.run_deadlock_pass();
        self.dispatch(command);
        self.drain_until_stable();
        self.run_deadlock_pass();
        std::mem::take(&mut self.events)
    }

    fn dispatch(&mut self, command: Command) {
        match command {
            Command::Begin(tid) => self.begin(tid, TransactionKind::ReadWrite),
            Command::BeginReadOnly(tid) => self.begin(tid, TransactionKind::ReadOnly),
            Command::Read { tid, vid } => self.submit_read(tid, vid),
            Command::Write { tid, vid, value } => self.submit_write(tid, vid, value),
            Command::End(tid) => self.end(tid),
            Command::Fail(site) => self.fail(site),
            Command::Recover(site) => self.recover(site),
            Command::Dump => {
                let reports = self.site_reports();
                self.events.push(Event::Dumped(reports));
            }
        }
    }

    fn begin(&mut self, tid: TransactionId, kind: TransactionKind) {
        self.clock += 1;
        if self.transactions.contains_key(&tid) {
            self.reject(RepcrecError::DuplicateTransaction(tid.to_string()));
            return;
        }
        tracing::info!(target: "repcrec::txn", tid = %tid, start_ts = self.clock, ?kind, "transaction began");
        self.events.push(Event::Began {
            tid: tid.clone(),
            kind,
        });
        self.transactions
            .insert(tid.clone(), Transaction::new(tid, self.clock, kind));
    }

    fn submit_read(&mut self, tid: TransactionId, vid: VariableId) {
        self.clock += 1;
        if !self.transactions.contains_key(&tid) {
            self.reject(RepcrecError::UnknownTransaction(tid.to_string()));
            return;
        }
        if self.sites_hosting(vid).next().is_none() {
            self.reject(RepcrecError::UnknownVariable(vid.to_string()));
            return;
        }
        self.pending.push_back(Operation::Read { tid, vid });
    }

    fn submit_write(&mut self, tid: TransactionId, vid: VariableId, value: repcrec_core::Value) {
        self.clock += 1;
        if !self.transactions.contains_key(&tid) {
            self.reject(RepcrecError::UnknownTransaction(tid.to_string()));
            return;
        }
        if self.sites_hosting(vid).next().is_none() {
            self.reject(RepcrecError::UnknownVariable(vid.to_string()));
            return;
        }
        self.pending.push_back(Operation::Write { tid, vid, value });
    }

    fn end(&mut self, tid: TransactionId) {
        self.clock += 1;
        let Some(txn) = self.transactions.get(&tid) else {
            self.reject(RepcrecError::UnknownTransaction(tid.to_string()));
            return;
        };
        if txn.will_abort() {
            self.do_abort(tid, AbortReason::SiteFailure);
        } else {
            let commit_ts = self.clock;
            self.do_commit(tid, commit_ts);
        }
    }

    fn fail(&mut self, site: SiteId) {
        self.clock += 1;
        let Some(idx) = self.site_index(site) else {
            self.reject(RepcrecError::UnknownSite(site.get()));
            return;
        };
        self.sites[idx].fail(self.clock);
        for txn in self.transactions.values_mut() {
            if !txn.is_read_only() && txn.has_visited(site) {
                txn.mark_will_abort();
                tracing::warn!(target: "repcrec::txn", tid = %txn.id(), site = %site, "transaction doomed by site failure");
            }
        }
        tracing::info!(target: "repcrec::site", site = %site, "site failed");
        self.events.push(Event::SiteFailed { site });
    }

    fn recover(&mut self, site: SiteId) {
        self.clock += 1;
        let Some(idx) = self.site_index(site) else {
            self.reject(RepcrecError::UnknownSite(site.get()));
            return;
        };
        self.sites[idx].recover(self.clock);
        tracing::info!(target: "repcrec::site", site = %site, "site recovered");
        self.events.push(Event::SiteRecovered { site });
    }

    fn site_index(&self, site: SiteId) -> Option<usize> {
        self.sites.iter().position(|s| s.site_id() == site)
    }

    fn sites_hosting(&self, vid: VariableId) -> impl Iterator<Item = usize> + '_ {
        self.sites
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.hosts(vid))
            .map(|(i, _)| i)
    }

    fn reject(&mut self, err: RepcrecError) {
        tracing::warn!(target: "repcrec::txn", error = %err, "command rejected");
        self.events.push(Event::Rejected(err));
    }

    fn do_commit(&mut self, tid: TransactionId, commit_ts: u64) {
        for site in &mut self.sites {
            site.commit(&tid, commit_ts);
        }
        self.transactions.remove(&tid);
        tracing::info!(target: "repcrec::txn", tid = %tid, commit_ts, "transaction committed");
        self.events.push(Event::Committed { tid });
    }

    fn do_abort(&mut self, tid: TransactionId, reason: AbortReason) {
        for site in &mut self.sites {
            site.abort(&tid);
        }
        self.transactions.remove(&tid);
        tracing::info!(target: "repcrec::txn", tid = %tid, ?reason, "transaction aborted");
        self.events.push(Event::Aborted { tid, reason });
    }

    /// Repeatedly detect and abort a deadlock victim until the merged
    /// wait-for graph has no cycle left.
    fn run_deadlock_pass(&mut self) {
        loop {
            let edges = self.build_wait_for_graph();
            match DeadlockDetector::find_victim(&edges, &self.transactions) {
                Some(victim) => {
                    tracing::warn!(target: "repcrec::txn", tid = %victim, "deadlock victim chosen");
                    self.do_abort(victim, AbortReason::Deadlock);
                    self.drain_until_stable();
                }
                None => break,
            }
        }
    }

    fn build_wait_for_graph(&self) -> Vec<(TransactionId, TransactionId)> {
        self.sites
            .iter()
            .filter(|s| s.is_up())
            .flat_map(DataManager::local_wait_graph)
            .collect()
    }

    fn drain_until_stable(&mut self) {
        while self.drain_pending_once() {}
    }

    fn drain_pending_once(&mut self) -> bool {
        let ops: Vec<Operation> = self.pending.drain(..).collect();
        let mut progressed = false;
        for op in ops {
            match op {
                Operation::Read { tid, vid } => {
                    if self.try_read(&tid, vid) {
                        progressed = true;
                    } else {
                        self.pending.push_back(Operation::Read { tid, vid });
                    }
                }
                Operation::Write { tid, vid, value } => {
                    if self.try_write(&tid, vid, value) {
                        progressed = true;
                    } else {
                        self.pending.push_back(Operation::Write { tid, vid, value });
                    }
                }
            }
        }
        progressed
    }

    /// Attempt one read. Returns whether it completed (successfully, or was
    /// silently dropped because its transaction already aborted).
    fn try_read(&mut self, tid: &TransactionId, vid: VariableId) -> bool {
        let Some(txn) = self.transactions.get(tid) else {
            return true;
        };
        if txn.is_read_only() {
            let start_ts = txn.start_ts();
            let up_hosts: Vec<usize> = self
                .sites_hosting(vid)
                .filter(|&i| self.sites[i].is_up())
                .collect();
            if up_hosts.is_empty() {
                return false;
            }
            for i in up_hosts {
                if let ReadOutcome::Hit(value) = self.sites[i].snapshot_read(vid, start_ts) {
                    tracing::debug!(target: "repcrec::txn", tid = %tid, vid = %vid, value, "snapshot read");
                    self.events.push(Event::Read {
                        tid: tid.clone(),
                        vid,
                        value,
                    });
                    return true;
                }
            }
            false
        } else {
            let up_hosts: Vec<usize> = self
                .sites_hosting(vid)
                .filter(|&i| self.sites[i].is_up())
                .collect();
            for i in up_hosts {
                let site_id = self.sites[i].site_id();
                if let RwReadOutcome::Value(value) = self.sites[i].rw_read(tid, vid) {
                    if let Some(txn) = self.transactions.get_mut(tid) {
                        txn.visit(site_id);
                    }
                    tracing::debug!(target: "repcrec::txn", tid = %tid, vid = %vid, value, "read-write read");
                    self.events.push(Event::Read {
                        tid: tid.clone(),
                        vid,
                        value,
                    });
                    return true;
                }
            }
            false
        }
    }

    /// Attempt one write. Returns whether it completed (successfully, or
    /// was silently dropped because its transaction already aborted).
    fn try_write(&mut self, tid: &TransactionId, vid: VariableId, value: repcrec_core::Value) -> bool {
        if !self.transactions.contains_key(tid) {
            return true;
        }
        let up_hosts: Vec<usize> = self
            .sites_hosting(vid)
            .filter(|&i| self.sites[i].is_up())
            .collect();
        if up_hosts.is_empty() {
            return false;
        }
        let all_granted = up_hosts
            .iter()
            .all(|&i| self.sites[i].rw_write_probe(tid, vid) == Decision::Grant);
        if !all_granted {
            return false;
        }
        for &i in &up_hosts {
            self.sites[i].rw_write_apply(tid, vid, value);
        }
        // Writes don't mark a site visited — only reads do. `fail()`'s
        // will-abort scan checks visited sites only.
        tracing::debug!(target: "repcrec::txn", tid = %tid, vid = %vid, value, "write applied");
        self.events.push(Event::Wrote {
            tid: tid.clone(),
            vid,
            value,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn tid(s: &str) -> TransactionId {
        TransactionId::new(s)
    }

    pub(crate) fn vid(i: u32) -> VariableId {
        VariableId::new(i)
    }

    #[test]
    fn basic_write_then_commit_is_readable() {
        let mut co = TransactionCoordinator::new(SimulatorConfig::default());
        co.step(Command::Begin(tid("T1")));
        co.step(Command::Write {
            tid: tid("T1"),
            vid: vid(4),
            value: 44,
        });
        co.step(Command::End(tid("T1")));

        co.step(Command::BeginReadOnly(tid("T2")));
        let events = co.step(Command::Read {
            tid: tid("T2"),
            vid: vid(4),
        });
        assert!(matches!(events.as_slice(), [Event::Read { value: 44, .. }]));
    }

    #[test]
    fn available_copies_serves_a_replicated_write_after_one_site_fails() {
        let mut co = TransactionCoordinator::new(SimulatorConfig::default());
        co.step(Command::Fail(SiteId::new(1)));
        co.step(Command::Begin(tid("T1")));
        let events = co.step(Command::Write {
            tid: tid("T1"),
            vid: vid(2),
            value: 22,
        });
        assert!(matches!(events.as_slice(), [Event::Wrote { .. }]));
        co.step(Command::End(tid("T1")));

        co.step(Command::BeginReadOnly(tid("T2")));
        let events = co.step(Command::Read {
            tid: tid("T2"),
            vid: vid(2),
        });
        assert!(matches!(events.as_slice(), [Event::Read { value: 22, .. }]));
    }

    #[test]
    fn read_write_transaction_aborts_when_its_only_touched_site_fails() {
        let mut co = TransactionCoordinator::new(SimulatorConfig::default());
        co.step(Command::Begin(tid("T1")));
        // x1's home site under the default layout is site 2.
        co.step(Command::Read {
            tid: tid("T1"),
            vid: vid(1),
        });
        co.step(Command::Fail(SiteId::new(2)));
        let events = co.step(Command::End(tid("T1")));
        assert!(matches!(
            events.as_slice(),
            [Event::Aborted {
                reason: AbortReason::SiteFailure,
                ..
            }]
        ));
    }

    #[test]
    fn deadlock_between_two_writers_aborts_the_younger() {
        let mut co = TransactionCoordinator::new(SimulatorConfig::default());
        co.step(Command::Begin(tid("T1")));
        co.step(Command::Begin(tid("T2")));
        co.step(Command::Write {
            tid: tid("T1"),
            vid: vid(2),
            value: 1,
        });
        co.step(Command::Write {
            tid: tid("T2"),
            vid: vid(4),
            value: 2,
        });
        co.step(Command::Write {
            tid: tid("T1"),
            vid: vid(4),
            value: 3,
        });
        // T2 now waits on T1 for x4; T1 waiting on T2 for x2 closes the cycle.
        let events = co.step(Command::Write {
            tid: tid("T2"),
            vid: vid(2),
            value: 4,
        });
        assert!(events.iter().any(
            |e| matches!(e, Event::Aborted { tid, reason: AbortReason::Deadlock } if tid == &self::tid("T2"))
        ));
    }
}
