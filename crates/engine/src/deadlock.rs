//! Distributed deadlock detection: merge every up site's local wait-for
//! edges into one graph, find a cycle, and pick the youngest transaction in
//! it as the victim.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use repcrec_core::TransactionId;

use crate::transaction::Transaction;

/// Finds cycles in a wait-for graph and selects the youngest transaction in
/// any cycle found as the victim to abort.
///
/// Stateless: the graph is rebuilt fresh from every site's lock tables on
/// each call, since locks change on every commit, abort, and lock grant.
pub struct DeadlockDetector;

impl DeadlockDetector {
    /// Given `edges` (each `(waiter, holder)` meaning waiter waits for
    /// holder) and the live transaction table, return the victim to abort,
    /// if any cycle exists.
    ///
    /// Ties (multiple transactions in a cycle with the same `start_ts`,
    /// which cannot happen under the clock used by
    /// [`crate::coordinator::TransactionCoordinator`] but is handled for
    /// robustness) are broken by transaction id, descending.
    pub fn find_victim(
        edges: &[(TransactionId, TransactionId)],
        transactions: &BTreeMap<TransactionId, Transaction>,
    ) -> Option<TransactionId> {
        let mut adjacency: BTreeMap<&TransactionId, BTreeSet<&TransactionId>> = BTreeMap::new();
        for (from, to) in edges {
            adjacency.entry(from).or_default().insert(to);
            adjacency.entry(to).or_default();
        }

        let mut in_cycle: Vec<&TransactionId> = Vec::new();
        for start in adjacency.keys() {
            let mut visited = BTreeSet::new();
            if Self::reaches(start, start, &adjacency, &mut visited) {
                in_cycle.push(start);
            }
        }

        in_cycle
            .into_iter()
            .filter_map(|tid| transactions.get(tid).map(|txn| (txn.start_ts(), tid)))
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)))
            .map(|(_, tid)| tid.clone())
    }

    fn reaches<'a>(
        current: &'a TransactionId,
        target: &'a TransactionId,
        adjacency: &BTreeMap<&'a TransactionId, BTreeSet<&'a TransactionId>>,
        visited: &mut BTreeSet<&'a TransactionId>,
    ) -> bool {
        if !visited.insert(current) {
            return false;
        }
        let Some(neighbors) = adjacency.get(current) else {
            return false;
        };
        for &next in neighbors {
            if next == target {
                return true;
            }
            if Self::reaches(next, target, adjacency, visited) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionKind;

    fn tid(s: &str) -> TransactionId {
        TransactionId::new(s)
    }

    fn txns(entries: &[(&str, u64)]) -> BTreeMap<TransactionId, Transaction> {
        entries
            .iter()
            .map(|(name, ts)| {
                (
                    tid(name),
                    Transaction::new(tid(name), *ts, TransactionKind::ReadWrite),
                )
            })
            .collect()
    }

    #[test]
    fn no_cycle_no_victim() {
        let edges = vec![(tid("T1"), tid("T2"))];
        let transactions = txns(&[("T1", 1), ("T2", 2)]);
        assert_eq!(DeadlockDetector::find_victim(&edges, &transactions), None);
    }

    #[test]
    fn two_cycle_picks_the_younger_transaction() {
        let edges = vec![(tid("T1"), tid("T2")), (tid("T2"), tid("T1"))];
        let transactions = txns(&[("T1", 1), ("T2", 5)]);
        assert_eq!(
            DeadlockDetector::find_victim(&edges, &transactions),
            Some(tid("T2"))
        );
    }

    #[test]
    fn three_cycle_picks_the_youngest() {
        let edges = vec![
            (tid("T1"), tid("T2")),
            (tid("T2"), tid("T3")),
            (tid("T3"), tid("T1")),
        ];
        let transactions = txns(&[("T1", 1), ("T2", 2), ("T3", 9)]);
        assert_eq!(
            DeadlockDetector::find_victim(&edges, &transactions),
            Some(tid("T3"))
        );
    }
}
