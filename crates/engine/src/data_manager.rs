//! Per-site storage: variable version chains plus one lock manager per
//! hosted variable.

use std::collections::BTreeMap;

use repcrec_concurrency::{Decision, Lock, LockManager};
use repcrec_core::{SimulatorConfig, SiteId, TransactionId, Value, VariableId};

use crate::variable::Variable;

/// Outcome of a read-only snapshot read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The site holds a usable snapshot value.
    Hit(Value),
    /// The site has nothing usable for this timestamp (unreadable variable
    /// or every version falls across a failure interval).
    Miss,
}

/// Outcome of a read-write read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RwReadOutcome {
    /// The read lock was acquired (or already held); here is the value.
    Value(Value),
    /// The read lock is queued behind an incompatible holder.
    Blocked,
    /// This site doesn't currently serve this variable (down, or it isn't
    /// readable post-recovery).
    NotPresent,
}

/// A snapshot of one site's state, for the `dump` command.
#[derive(Debug, Clone)]
pub struct SiteReport {
    /// The site this report describes.
    pub site: SiteId,
    /// Whether the site is currently up.
    pub up: bool,
    /// `(variable, latest committed value)` pairs, in variable order.
    pub variables: Vec<(VariableId, Value)>,
}

/// One site: the variables it hosts and their lock managers.
///
/// A non-replicated variable is hosted at exactly one site (its home site);
/// a replicated (even-indexed) variable is hosted at every site.
#[derive(Debug, Clone)]
pub struct DataManager {
    site_id: SiteId,
    up: bool,
    variables: BTreeMap<VariableId, Variable>,
    locks: BTreeMap<VariableId, LockManager>,
    fail_history: Vec<u64>,
}

impl DataManager {
    /// Build a site, populating it with every variable `config` says it
    /// hosts.
    pub fn new(site_id: SiteId, config: SimulatorConfig) -> Self {
        let mut variables = BTreeMap::new();
        let mut locks = BTreeMap::new();
        for i in 1..=config.variable_count {
            let vid = VariableId::new(i);
            let hosted = vid.is_replicated()
                || vid.home_site_for(config.site_count) == Some(site_id);
            if hosted {
                variables.insert(vid, Variable::new(vid));
                locks.insert(vid, LockManager::new());
            }
        }
        Self {
            site_id,
            up: true,
            variables,
            locks,
            fail_history: Vec::new(),
        }
    }

    /// This site's id.
    pub fn site_id(&self) -> SiteId {
        self.site_id
    }

    /// Whether this site is currently up.
    pub fn is_up(&self) -> bool {
        self.up
    }

    /// Whether this site hosts `vid` (up or down).
    pub fn hosts(&self, vid: VariableId) -> bool {
        self.variables.contains_key(&vid)
    }

    /// Attempt a read-only snapshot read at timestamp `ts`.
    pub fn snapshot_read(&self, vid: VariableId, ts: u64) -> ReadOutcome {
        match self.variables.get(&vid) {
            Some(var) => match var.snapshot_at(ts, &self.fail_history) {
                Some(value) => ReadOutcome::Hit(value),
                None => ReadOutcome::Miss,
            },
            None => ReadOutcome::Miss,
        }
    }

    /// Attempt a read-write read: acquire (or reuse) a shared lock, then
    /// answer with `tid`'s own uncommitted write if it holds one, otherwise
    /// the latest committed value.
    pub fn rw_read(&mut self, tid: &TransactionId, vid: VariableId) -> RwReadOutcome {
        let Some(var) = self.variables.get(&vid) else {
            return RwReadOutcome::NotPresent;
        };
        if !var.readable() {
            return RwReadOutcome::NotPresent;
        }
        let lock = self
            .locks
            .get_mut(&vid)
            .expect("lock table tracks every hosted variable");
        match lock.try_read(tid) {
            Decision::Block => RwReadOutcome::Blocked,
            Decision::Grant => {
                let var = &self.variables[&vid];
                let value = if lock.is_exclusive_holder(tid) {
                    var.temp_write()
                        .map(|(v, _)| v)
                        .unwrap_or_else(|| var.latest_committed())
                } else {
                    var.latest_committed()
                };
                RwReadOutcome::Value(value)
            }
        }
    }

    /// Probe for a write lock on `vid` without applying the write.
    ///
    /// Precondition: this site hosts `vid` (the coordinator only probes
    /// sites it has already confirmed host the variable).
    pub fn rw_write_probe(&mut self, tid: &TransactionId, vid: VariableId) -> Decision {
        self.locks
            .get_mut(&vid)
            .expect("write probe guarantees variable is hosted here")
            .try_write(tid)
    }

    /// Record `tid`'s write as a temp write, once every site in the write
    /// set has granted the lock.
    pub fn rw_write_apply(&mut self, tid: &TransactionId, vid: VariableId, value: Value) {
        self.variables
            .get_mut(&vid)
            .expect("write probe guarantees variable is hosted here")
            .set_temp_write(value, tid.clone());
    }

    /// Commit `tid`: promote its temp writes to committed versions, release
    /// every lock it holds or has queued, then settle the freed queues.
    pub fn commit(&mut self, tid: &TransactionId, commit_ts: u64) {
        for var in self.variables.values_mut() {
            var.commit_temp_write(tid, commit_ts);
        }
        self.release_and_settle(tid);
    }

    /// Abort `tid`: discard its temp writes, release every lock it holds or
    /// has queued, then settle the freed queues.
    pub fn abort(&mut self, tid: &TransactionId) {
        for var in self.variables.values_mut() {
            var.discard_temp_write_of(tid);
        }
        self.release_and_settle(tid);
    }

    fn release_and_settle(&mut self, tid: &TransactionId) {
        for lock in self.locks.values_mut() {
            lock.release_by(tid);
        }
        for lock in self.locks.values_mut() {
            lock.dequeue_next();
        }
    }

    /// Mark the site down at `ts`: clear every lock table and discard every
    /// in-flight temp write. Committed versions survive untouched.
    pub fn fail(&mut self, ts: u64) {
        self.fail_history.push(ts);
        self.up = false;
        for lock in self.locks.values_mut() {
            lock.clear();
        }
        for var in self.variables.values_mut() {
            var.discard_temp_write();
        }
    }

    /// Bring the site back up at `ts`. Replicated variables become
    /// unreadable until their next committed write; non-replicated
    /// variables are readable immediately.
    pub fn recover(&mut self, _ts: u64) {
        self.up = true;
        for var in self.variables.values_mut() {
            if var.is_replicated() {
                var.mark_unreadable();
            }
        }
    }

    /// This site's contribution to the global wait-for graph: edges
    /// `(waiter, holder)` for every queued request blocked on a current
    /// holder, plus edges between queued requests that block each other in
    /// FIFO order.
    pub fn local_wait_graph(&self) -> Vec<(TransactionId, TransactionId)> {
        let mut edges = Vec::new();
        for lock in self.locks.values() {
            let queue = lock.queue();
            if queue.is_empty() {
                continue;
            }
            if let Some(current) = lock.current() {
                for waiter in queue {
                    match current {
                        Lock::Shared(holders) => {
                            let compatible = waiter.mode == repcrec_concurrency::LockMode::Read
                                || (holders.len() == 1 && holders.contains(&waiter.tid));
                            if !compatible {
                                for holder in holders {
                                    if holder != &waiter.tid {
                                        edges.push((waiter.tid.clone(), holder.clone()));
                                    }
                                }
                            }
                        }
                        Lock::Exclusive(holder) => {
                            if holder != &waiter.tid {
                                edges.push((waiter.tid.clone(), holder.clone()));
                            }
                        }
                    }
                }
            }
            for i in 0..queue.len() {
                for j in 0..i {
                    let (earlier, later) = (&queue[j], &queue[i]);
                    let both_reads = earlier.mode == repcrec_concurrency::LockMode::Read
                        && later.mode == repcrec_concurrency::LockMode::Read;
                    if !both_reads && earlier.tid != later.tid {
                        edges.push((later.tid.clone(), earlier.tid.clone()));
                    }
                }
            }
        }
        edges.retain(|(a, b)| a != b);
        edges
    }

    /// This site's `dump` report: every hosted variable's latest committed
    /// value.
    pub fn report(&self) -> SiteReport {
        SiteReport {
            site: self.site_id,
            up: self.up,
            variables: self
                .variables
                .values()
                .map(|v| (v.id(), v.latest_committed()))
                .collect(),
        }
    }
}
