//! Deferred state transitions.
//!
//! Transient states (attack, hurt, absorb) and timed respawns are resolved
//! later by the driver, never by sleeping inside a handler. Each entry carries
//! the entity epoch it was scheduled against; by the time it fires the entity
//! may have moved on, in which case the entry is a no-op.

use std::{cmp::Ordering, collections::BinaryHeap, time::Duration};

use arena_shared::entity::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Return a transient state to idle.
    Revert { epoch: u64 },
    /// Bring a dead entity back.
    Respawn { epoch: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    /// Simulation time at which the entry fires.
    pub due: Duration,
    pub entity: EntityId,
    pub action: Deferred,
}

#[derive(Debug, PartialEq, Eq)]
struct Entry {
    seq: u64,
    item: Scheduled,
}

// Min-heap on (due, seq): earliest first, ties in scheduling order.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.item.due, other.seq).cmp(&(self.item.due, self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct DeferredTransitions {
    queue: BinaryHeap<Entry>,
    next_seq: u64,
}

impl DeferredTransitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, entity: EntityId, action: Deferred, due: Duration) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Entry {
            seq,
            item: Scheduled {
                due,
                entity,
                action,
            },
        });
    }

    /// Time of the earliest pending entry.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.peek().map(|e| e.item.due)
    }

    /// Removes and returns every entry due at or before `now`, earliest first.
    pub fn take_due(&mut self, now: Duration) -> Vec<Scheduled> {
        let mut due = Vec::new();
        while self.queue.peek().is_some_and(|e| e.item.due <= now) {
            if let Some(entry) = self.queue.pop() {
                due.push(entry.item);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn fires_in_due_order() {
        let mut q = DeferredTransitions::new();
        q.schedule(EntityId(1), Deferred::Revert { epoch: 1 }, ms(300));
        q.schedule(EntityId(2), Deferred::Revert { epoch: 1 }, ms(100));
        q.schedule(EntityId(3), Deferred::Respawn { epoch: 4 }, ms(200));
        assert_eq!(q.next_deadline(), Some(ms(100)));

        let fired: Vec<u32> = q.take_due(ms(250)).iter().map(|s| s.entity.0).collect();
        assert_eq!(fired, vec![2, 3]);
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_deadline(), Some(ms(300)));
    }

    #[test]
    fn ties_keep_scheduling_order() {
        let mut q = DeferredTransitions::new();
        q.schedule(EntityId(1), Deferred::Revert { epoch: 1 }, ms(100));
        q.schedule(EntityId(1), Deferred::Revert { epoch: 2 }, ms(100));
        let fired = q.take_due(ms(100));
        assert_eq!(fired[0].action, Deferred::Revert { epoch: 1 });
        assert_eq!(fired[1].action, Deferred::Revert { epoch: 2 });
        assert!(q.is_empty());
    }

    #[test]
    fn nothing_due_yet() {
        let mut q = DeferredTransitions::new();
        q.schedule(EntityId(1), Deferred::Revert { epoch: 1 }, ms(100));
        assert!(q.take_due(ms(99)).is_empty());
        assert_eq!(q.len(), 1);
    }
}
