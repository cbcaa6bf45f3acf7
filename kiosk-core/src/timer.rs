//! Delayed tasks for the single-threaded event loop.
//!
//! Nothing recurs implicitly: each periodic activity holds its own
//! [`TimerHandle`] and re-arms itself when it finishes.

use std::collections::{BTreeMap, HashMap};

use tokio::time::{Duration, Instant};

/// The periodic activities sharing the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    Refresh,
    TickerTick,
    IdleTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    queue: BTreeMap<(Instant, u64), T>,
    deadlines: HashMap<u64, Instant>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Run `task` once, `delay` from now.
    pub fn schedule_after(&mut self, delay: Duration, task: T) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;

        let deadline = Instant::now() + delay;
        self.queue.insert((deadline, id), task);
        self.deadlines.insert(id, deadline);
        TimerHandle(id)
    }

    /// Drop a pending task. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle.0) {
            Some(deadline) => self.queue.remove(&(deadline, handle.0)).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle.0)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every task due at `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<(TimerHandle, T)> {
        let mut due = Vec::new();

        while let Some(entry) = self.queue.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, id), task) = entry.remove_entry();
            self.deadlines.remove(&id);
            due.push((TimerHandle(id), task));
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
