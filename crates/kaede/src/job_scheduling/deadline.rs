//! Deadline multiplexer
//!
//! Waits on any number of absolute wall-clock deadlines plus counting
//! signals and reports one ready token per [`DeadlineMux::wait`] call.

use chrono::{DateTime, Utc};
use futures::future::select_all;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

/// Upper bound on a single sleep, so wall-clock adjustments are picked up.
pub const DEFAULT_MAX_SLEEP: Duration = Duration::from_secs(30);

/// Edge-triggered counting signal.
///
/// Every [`raise`](Signal::raise) is reported by exactly one `wait()` of the
/// multiplexer it is registered with. Safe to raise from any thread or task.
#[derive(Debug, Default)]
pub struct Signal {
    pending: AtomicU64,
    notify: Notify,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Raised but not yet observed.
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }

    fn try_take(&self) -> bool {
        self.pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeadlineHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalHandle(usize);

pub struct DeadlineMux<T> {
    next_handle: u64,
    // Entries whose handle is no longer in `tokens` were removed and are skipped
    deadlines: BinaryHeap<Reverse<(DateTime<Utc>, DeadlineHandle)>>,
    tokens: HashMap<DeadlineHandle, T>,
    signals: Vec<(Arc<Signal>, T)>,
    max_sleep: Duration,
}

impl<T: Clone> Default for DeadlineMux<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> DeadlineMux<T> {
    pub fn new() -> Self {
        Self::with_max_sleep(DEFAULT_MAX_SLEEP)
    }

    pub fn with_max_sleep(max_sleep: Duration) -> Self {
        Self {
            next_handle: 0,
            deadlines: BinaryHeap::new(),
            tokens: HashMap::new(),
            signals: Vec::new(),
            max_sleep,
        }
    }

    /// Arm a one-shot deadline. A deadline already in the past fires on the next `wait()`.
    pub fn register(&mut self, deadline: DateTime<Utc>, token: T) -> DeadlineHandle {
        let handle = DeadlineHandle(self.next_handle);
        self.next_handle += 1;
        self.deadlines.push(Reverse((deadline, handle)));
        self.tokens.insert(handle, token);
        handle
    }

    /// Disarm a deadline, returning its token if it had not fired yet.
    pub fn remove(&mut self, handle: DeadlineHandle) -> Option<T> {
        self.tokens.remove(&handle)
    }

    pub fn register_signal(&mut self, signal: Arc<Signal>, token: T) -> SignalHandle {
        self.signals.push((signal, token));
        SignalHandle(self.signals.len() - 1)
    }

    /// Number of armed deadlines.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, handle: DeadlineHandle) -> bool {
        self.tokens.contains_key(&handle)
    }

    /// Disarm every deadline. Signals stay registered.
    pub fn clear(&mut self) {
        self.deadlines.clear();
        self.tokens.clear();
    }

    /// Block until a deadline passes or a signal is raised.
    ///
    /// Due deadlines are reported before signals, and a reported deadline is
    /// removed from the live set.
    pub async fn wait(&mut self) -> T {
        loop {
            if let Some(token) = self.pop_due(Utc::now()) {
                return token;
            }
            for (signal, token) in &self.signals {
                if signal.try_take() {
                    return token.clone();
                }
            }

            let sleep_for = self.next_sleep(Utc::now());
            if self.signals.is_empty() {
                sleep(sleep_for).await;
                continue;
            }

            let notified = self
                .signals
                .iter()
                .map(|(signal, _)| Box::pin(signal.notify.notified()))
                .collect::<Vec<_>>();
            tokio::select! {
                _ = sleep(sleep_for) => {}
                _ = select_all(notified) => {}
            }
        }
    }

    fn pop_due(&mut self, now: DateTime<Utc>) -> Option<T> {
        while let Some(Reverse((deadline, handle))) = self.deadlines.peek().copied() {
            if !self.tokens.contains_key(&handle) {
                self.deadlines.pop();
                continue;
            }
            if deadline > now {
                return None;
            }
            self.deadlines.pop();
            return self.tokens.remove(&handle);
        }
        None
    }

    /// Only valid right after `pop_due`, which leaves a live handle on top.
    fn next_sleep(&self, now: DateTime<Utc>) -> Duration {
        self.deadlines
            .peek()
            .map(|Reverse((deadline, _))| (*deadline - now).to_std().unwrap_or(Duration::ZERO))
            .map_or(self.max_sleep, |until| until.min(self.max_sleep))
    }
}
