use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Opaque identity of one scheduled timer. Tokens are never reused, so a
/// firing that arrives after cancellation can be recognized and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// Keyed one-shot timers that report back through a channel instead of
/// running callbacks. Every pending timer is owned here so the owner can
/// cancel all of them at once.
pub struct TimerSet<K> {
    tx: mpsc::UnboundedSender<TimerToken>,
    rx: mpsc::UnboundedReceiver<TimerToken>,
    pending: HashMap<TimerToken, (K, JoinHandle<()>)>,
    next: u64,
}

impl<K> Default for TimerSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TimerSet<K> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            pending: HashMap::new(),
            next: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn schedule(&mut self, key: K, after: Duration) -> TimerToken {
        let token = TimerToken(self.next);
        self.next += 1;
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(token);
        });
        self.pending.insert(token, (key, handle));
        token
    }

    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let doomed: Vec<TimerToken> = self
            .pending
            .iter()
            .filter(|(_, (key, _))| predicate(key))
            .map(|(token, _)| *token)
            .collect();
        for token in &doomed {
            if let Some((_, handle)) = self.pending.remove(token) {
                handle.abort();
            }
        }
        doomed.len()
    }

    pub fn cancel_all(&mut self) {
        for (_, (_, handle)) in self.pending.drain() {
            handle.abort();
        }
    }

    /// Claims a fired token. Returns `None` for tokens that were cancelled
    /// after their sleep already completed.
    pub fn take(&mut self, token: TimerToken) -> Option<K> {
        self.pending.remove(&token).map(|(key, _)| key)
    }

    /// Waits for the next firing. Never resolves to `None` while `self` is
    /// alive because the set holds its own sender.
    async fn fired(&mut self) -> Option<TimerToken> {
        self.rx.recv().await
    }

    /// Waits for the next live (not cancelled) timer and returns its key.
    pub async fn next_due(&mut self) -> Option<K> {
        loop {
            let token = self.fired().await?;
            if let Some(key) = self.take(token) {
                return Some(key);
            }
        }
    }
}

impl<K> Drop for TimerSet<K> {
    fn drop(&mut self) {
        for (_, (_, handle)) in self.pending.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timers_fire_in_deadline_order() {
        let mut timers = TimerSet::new();
        timers.schedule("slow", Duration::from_millis(300));
        timers.schedule("fast", Duration::from_millis(100));
        assert_eq!(timers.next_due().await, Some("fast"));
        assert_eq!(timers.next_due().await, Some("slow"));
        assert!(timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timers_never_surface() {
        let mut timers = TimerSet::new();
        timers.schedule(1, Duration::from_millis(100));
        timers.schedule(2, Duration::from_millis(200));
        timers.schedule(3, Duration::from_millis(300));
        assert_eq!(timers.cancel_where(|key| *key % 2 == 1), 2);
        assert_eq!(timers.next_due().await, Some(2));
        assert!(timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_token_is_discarded_after_cancel() {
        let mut timers = TimerSet::new();
        timers.schedule("retry", Duration::from_millis(50));
        let token = timers.fired().await.expect("fired");
        timers.cancel_all();
        assert_eq!(timers.take(token), None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_pending_sleeps() {
        let mut timers = TimerSet::new();
        timers.schedule("a", Duration::from_millis(10));
        timers.schedule("b", Duration::from_millis(20));
        timers.cancel_all();
        let waited = tokio::time::timeout(Duration::from_secs(1), timers.next_due()).await;
        assert!(waited.is_err());
    }
}
