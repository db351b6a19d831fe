//! A single variable's committed version chain and in-flight temp write.

use repcrec_core::{CommittedVersion, TransactionId, Value, VariableId};

/// One variable as stored at one site.
///
/// The version chain is kept newest-first (index 0 is the most recently
/// committed version); the oldest entry is always the variable's initial
/// value at tick 0.
#[derive(Debug, Clone)]
pub struct Variable {
    id: VariableId,
    replicated: bool,
    readable: bool,
    versions: Vec<CommittedVersion>,
    temp_write: Option<(Value, TransactionId)>,
}

impl Variable {
    /// A freshly initialized variable: one committed version (`10 * i` at
    /// tick 0), readable, no in-flight write.
    pub fn new(id: VariableId) -> Self {
        Self {
            id,
            replicated: id.is_replicated(),
            readable: true,
            versions: vec![CommittedVersion::initial(id.index())],
            temp_write: None,
        }
    }

    /// This variable's id.
    pub fn id(&self) -> VariableId {
        self.id
    }

    /// Whether this variable is replicated across every site.
    pub fn is_replicated(&self) -> bool {
        self.replicated
    }

    /// Whether this variable currently answers read-write reads and
    /// snapshot reads.
    pub fn readable(&self) -> bool {
        self.readable
    }

    /// The most recently committed value.
    pub fn latest_committed(&self) -> Value {
        self.versions[0].value
    }

    /// The transaction's own uncommitted write, if one is pending here.
    pub fn temp_write(&self) -> Option<(Value, &TransactionId)> {
        self.temp_write.as_ref().map(|(v, t)| (*v, t))
    }

    /// Record `tid`'s uncommitted write. Overwrites any prior temp write
    /// (a transaction that writes the same variable twice just updates it).
    pub fn set_temp_write(&mut self, value: Value, tid: TransactionId) {
        self.temp_write = Some((value, tid));
    }

    /// Drop `tid`'s temp write, if it owns one, without touching the
    /// version chain. Used on abort.
    pub fn discard_temp_write_of(&mut self, tid: &TransactionId) {
        if matches!(&self.temp_write, Some((_, owner)) if owner == tid) {
            self.temp_write = None;
        }
    }

    /// Unconditionally drop any temp write. Used on site failure, where the
    /// owning transaction's fate is decided elsewhere.
    pub fn discard_temp_write(&mut self) {
        self.temp_write = None;
    }

    /// If `tid` owns the temp write, promote it to a new committed version
    /// at `commit_ts` and mark the variable readable again.
    ///
    /// Returns whether a version was committed.
    pub fn commit_temp_write(&mut self, tid: &TransactionId, commit_ts: u64) -> bool {
        if matches!(&self.temp_write, Some((_, owner)) if owner == tid) {
            let (value, _) = self.temp_write.take().unwrap();
            self.versions.insert(0, CommittedVersion::new(value, commit_ts));
            self.readable = true;
            true
        } else {
            false
        }
    }

    /// Mark this variable unreadable until its next committed write.
    /// Used on recovery, for replicated variables only.
    pub fn mark_unreadable(&mut self) {
        self.readable = false;
    }

    /// Scan the version chain for a snapshot read at `ts`, subject to the
    /// replica-failure interval rule: a replicated variable's version is
    /// unusable if the site failed at any point in `(version.commit_ts, ts]`.
    pub fn snapshot_at(&self, ts: u64, fail_history: &[u64]) -> Option<Value> {
        if !self.readable {
            return None;
        }
        for version in &self.versions {
            if version.commit_ts > ts {
                continue;
            }
            if self.replicated
                && fail_history
                    .iter()
                    .any(|&f| version.commit_ts < f && f <= ts)
            {
                return None;
            }
            return Some(version.value);
        }
        None
    }
}
