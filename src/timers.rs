//! Pending timer set
//!
//! Every interaction instance owns exactly one `TimerSet`. Time is expressed as
//! a `Duration` measured from the instance's mount, so the same code runs under
//! a virtual clock (tests, CLI simulation) and under the tokio driver.

use std::time::Duration;

/// Smallest period a repeating timer may use. A zero period would re-fire
/// forever inside a single tick.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Cancellation handle returned for every scheduled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct Pending<E> {
    handle: TimerHandle,
    due: Duration,
    period: Option<Duration>,
    event: E,
}

/// Ordered collection of cancelable delayed events, sorted by due time and then
/// by registration order.
#[derive(Debug)]
pub struct TimerSet<E> {
    next_handle: u64,
    pending: Vec<Pending<E>>,
}

impl<E> Default for TimerSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TimerSet<E> {
    pub fn new() -> Self {
        Self {
            next_handle: 0,
            pending: Vec::new(),
        }
    }

    /// Schedule `event` to fire once, `delay` after `now`. Due times saturate
    /// at `Duration::MAX`, which never comes due in practice.
    pub fn schedule(&mut self, now: Duration, delay: Duration, event: E) -> TimerHandle {
        self.insert(now.saturating_add(delay), None, event)
    }

    /// Schedule `event` to fire every `period`, first at `now + period`.
    pub fn schedule_repeating(&mut self, now: Duration, period: Duration, event: E) -> TimerHandle {
        let period = period.max(MIN_PERIOD);
        self.insert(now.saturating_add(period), Some(period), event)
    }

    fn insert(&mut self, due: Duration, period: Option<Duration>, event: E) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        let entry = Pending {
            handle,
            due,
            period,
            event,
        };
        // Equal due times keep registration order: handles grow monotonically.
        let position = self
            .pending
            .partition_point(|p| (p.due, p.handle) <= (entry.due, entry.handle));
        self.pending.insert(position, entry);
        handle
    }

    /// Cancel one entry. Returns false when it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.pending.iter().position(|p| p.handle == handle) {
            Some(index) => {
                self.pending.remove(index);
                true
            }
            None => false,
        }
    }

    /// Cancel every entry whose event matches `stale`. Returns how many went.
    pub fn cancel_where(&mut self, mut stale: impl FnMut(&E) -> bool) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| !stale(&p.event));
        before - self.pending.len()
    }

    /// Drop every pending entry, returning how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        cancelled
    }

    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|p| p.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Due time of the earliest pending entry.
    pub fn next_due(&self) -> Option<Duration> {
        self.pending.first().map(|p| p.due)
    }
}

impl<E: Clone> TimerSet<E> {
    /// Remove and return the earliest entry due at or before `now`, together
    /// with the time it was due. Repeating entries are re-armed one period
    /// after their previous due time.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerHandle, Duration, E)> {
        match self.pending.first() {
            Some(first) if first.due <= now => {}
            _ => return None,
        }
        let entry = self.pending.remove(0);
        let fired = (entry.handle, entry.due, entry.event.clone());
        if let Some(period) = entry.period {
            let due = entry.due.saturating_add(period);
            if due == entry.due {
                // Saturated: re-arming would fire again within the same tick.
                return Some(fired);
            }
            let rearmed = Pending { due, ..entry };
            let position = self
                .pending
                .partition_point(|p| (p.due, p.handle) <= (rearmed.due, rearmed.handle));
            self.pending.insert(position, rearmed);
        }
        Some(fired)
    }
}
