// 7.2: pending liquidation jobs. one active job per account.
// jobs live in a map keyed by account; `pending` is the unordered working set,
// removal is swap-and-truncate so order there means nothing.

use crate::types::{AccountId, Quote, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationJob {
    pub account: AccountId,
    /// Higher = more urgent
    pub priority: u64,
    /// Resource-weight hint for batch sizing
    pub estimated_cost: u64,
    /// Reward estimate at queue time. Execution recomputes.
    pub max_reward: Quote,
    pub deadline: Timestamp,
    pub is_active: bool,
    pub created_at: Timestamp,
}

impl LiquidationJob {
    pub fn is_due(&self, now: Timestamp) -> bool {
        now >= self.deadline
    }
}

#[derive(Debug, Clone, Default)]
pub struct LiquidationQueue {
    jobs: HashMap<AccountId, LiquidationJob>,
    pending: Vec<AccountId>,
    // account -> slot in `pending`
    slots: HashMap<AccountId, usize>,
}

impl LiquidationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, job: LiquidationJob) -> Result<(), QueueError> {
        if self.is_queued(job.account) {
            return Err(QueueError::AlreadyQueued(job.account));
        }
        self.slots.insert(job.account, self.pending.len());
        self.pending.push(job.account);
        self.jobs.insert(job.account, job);
        Ok(())
    }

    pub fn is_queued(&self, account: AccountId) -> bool {
        self.jobs.get(&account).is_some_and(|job| job.is_active)
    }

    pub fn get(&self, account: AccountId) -> Option<&LiquidationJob> {
        self.jobs.get(&account)
    }

    pub fn get_mut(&mut self, account: AccountId) -> Option<&mut LiquidationJob> {
        self.jobs.get_mut(&account)
    }

    /// Deactivates the job and drops it from the pending set in O(1).
    pub fn remove(&mut self, account: AccountId) -> Option<LiquidationJob> {
        let mut job = self.jobs.remove(&account)?;
        job.is_active = false;
        if let Some(idx) = self.slots.remove(&account) {
            self.pending.swap_remove(idx);
            if let Some(moved) = self.pending.get(idx) {
                self.slots.insert(*moved, idx);
            }
        }
        Some(job)
    }

    /// Drops every job. Returns how many were active.
    pub fn clear(&mut self) -> usize {
        let cleared = self.jobs.values().filter(|j| j.is_active).count();
        self.jobs.clear();
        self.pending.clear();
        self.slots.clear();
        cleared
    }

    /// Active jobs, most urgent first. Ties go to the earlier deadline, then
    /// the lower account id, so the order is deterministic.
    pub fn pending(&self) -> Vec<&LiquidationJob> {
        let mut jobs = self.pending_in_queue_order();
        jobs.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.deadline.cmp(&b.deadline))
                .then(a.account.cmp(&b.account))
        });
        jobs
    }

    /// Active jobs in the working-set order (insertion order disturbed by removals).
    pub fn pending_in_queue_order(&self) -> Vec<&LiquidationJob> {
        self.pending
            .iter()
            .filter_map(|account| self.jobs.get(account))
            .filter(|job| job.is_active)
            .collect()
    }

    pub fn accounts(&self) -> Vec<AccountId> {
        self.pending.clone()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Account {0} already has an active liquidation job")]
    AlreadyQueued(AccountId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn job(account: u64, priority: u64, deadline: i64) -> LiquidationJob {
        LiquidationJob {
            account: AccountId(account),
            priority,
            estimated_cost: 200_000,
            max_reward: Quote::new(dec!(10)),
            deadline: Timestamp::from_millis(deadline),
            is_active: true,
            created_at: Timestamp::from_millis(0),
        }
    }

    #[test]
    fn one_active_job_per_account() {
        let mut queue = LiquidationQueue::new();
        queue.push(job(1, 100, 10)).unwrap();
        assert_eq!(
            queue.push(job(1, 500, 10)),
            Err(QueueError::AlreadyQueued(AccountId(1)))
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(AccountId(1)).unwrap().priority, 100);
    }

    #[test]
    fn requeue_after_remove() {
        let mut queue = LiquidationQueue::new();
        queue.push(job(1, 100, 10)).unwrap();
        let removed = queue.remove(AccountId(1)).unwrap();
        assert!(!removed.is_active);
        assert!(queue.is_empty());
        assert!(queue.push(job(1, 100, 10)).is_ok());
    }

    #[test]
    fn swap_remove_keeps_others() {
        let mut queue = LiquidationQueue::new();
        for id in 1..=4 {
            queue.push(job(id, id * 10, 10)).unwrap();
        }
        queue.remove(AccountId(1));
        // last element moved into the hole
        assert_eq!(
            queue.accounts(),
            vec![AccountId(4), AccountId(2), AccountId(3)]
        );
        assert!(queue.remove(AccountId(9)).is_none());

        // slot of the moved account was updated
        queue.remove(AccountId(4));
        assert_eq!(queue.accounts(), vec![AccountId(3), AccountId(2)]);
    }

    #[test]
    fn pending_sorted_by_priority_then_deadline() {
        let mut queue = LiquidationQueue::new();
        queue.push(job(1, 100, 50)).unwrap();
        queue.push(job(2, 900, 50)).unwrap();
        queue.push(job(3, 100, 20)).unwrap();

        let order: Vec<AccountId> = queue.pending().iter().map(|j| j.account).collect();
        assert_eq!(order, vec![AccountId(2), AccountId(3), AccountId(1)]);
    }

    #[test]
    fn clear_reports_active_count() {
        let mut queue = LiquidationQueue::new();
        queue.push(job(1, 1, 1)).unwrap();
        queue.push(job(2, 1, 1)).unwrap();
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert!(!queue.is_queued(AccountId(1)));
    }

    #[test]
    fn due_at_deadline() {
        let j = job(1, 1, 100);
        assert!(!j.is_due(Timestamp::from_millis(99)));
        assert!(j.is_due(Timestamp::from_millis(100)));
    }
}
