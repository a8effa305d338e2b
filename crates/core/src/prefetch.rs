//! Idle resource prefetcher: warms resources at low priority once the host is idle,
//! or after a fixed delay when the host cannot report idle time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineCfg;
use crate::environment::reader::{IdleHost, IdleRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefetchState {
    Pending,
    Prefetched,
}

/// How a batch was scheduled; cancellation follows the same path.
#[derive(Debug)]
enum Scheduled {
    Idle(IdleRequest),
    Timer(JoinHandle<()>),
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// State shared with scheduled callbacks.
struct Shared {
    host: Arc<dyn IdleHost>,
    entries: Mutex<HashMap<String, PrefetchState>>,
    /// `None` while a batch is being scheduled.
    scheduled: Mutex<HashMap<u64, Option<Scheduled>>>,
    token: CancellationToken,
}

impl Shared {
    fn run_batch(&self, batch_id: u64, batch: &[String]) {
        lock(&self.scheduled).remove(&batch_id);
        if self.token.is_cancelled() {
            return;
        }
        for address in batch {
            self.host.prefetch(address);
            lock(&self.entries).insert(address.clone(), PrefetchState::Prefetched);
        }
        tracing::debug!(batch = batch_id, count = batch.len(), "prefetch batch issued");
    }
}

pub struct IdlePrefetcher {
    shared: Arc<Shared>,
    fallback: Duration,
    next_batch: u64,
}

impl IdlePrefetcher {
    pub fn new(host: Arc<dyn IdleHost>, cfg: &EngineCfg) -> Self {
        Self::with_fallback(host, cfg.idle_fallback())
    }

    pub fn with_fallback(host: Arc<dyn IdleHost>, fallback: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                host,
                entries: Mutex::new(HashMap::new()),
                scheduled: Mutex::new(HashMap::new()),
                token: CancellationToken::new(),
            }),
            fallback,
            next_batch: 0,
        }
    }

    /// Register addresses for prefetch. Addresses already registered are ignored.
    /// Returns how many were newly registered. The timer fallback needs a tokio runtime.
    pub fn prefetch<I, S>(&mut self, addresses: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.shared.token.is_cancelled() {
            tracing::debug!("prefetcher torn down, request ignored");
            return 0;
        }

        let batch: Vec<String> = {
            let mut entries = lock(&self.shared.entries);
            addresses
                .into_iter()
                .map(Into::into)
                .filter(|address: &String| {
                    if entries.contains_key(address) {
                        return false;
                    }
                    entries.insert(address.clone(), PrefetchState::Pending);
                    true
                })
                .collect()
        };
        if batch.is_empty() {
            return 0;
        }

        self.next_batch += 1;
        let batch_id = self.next_batch;
        let count = batch.len();

        // Reserve the slot first: a host may run the idle callback synchronously,
        // in which case the batch removes its own slot before we fill it.
        lock(&self.shared.scheduled).insert(batch_id, None);

        let shared = Arc::clone(&self.shared);
        let idle_batch = batch.clone();
        let request = self.shared.host.request_idle(Box::new(move || {
            shared.run_batch(batch_id, &idle_batch);
        }));

        let scheduled = match request {
            Some(request) => {
                tracing::debug!(batch = batch_id, count, "prefetch deferred to idle time");
                Scheduled::Idle(request)
            }
            None => {
                tracing::debug!(
                    batch = batch_id,
                    count,
                    delay_ms = self.fallback.as_millis() as u64,
                    "idle scheduling unavailable, using timer"
                );
                let shared = Arc::clone(&self.shared);
                let fallback = self.fallback;
                Scheduled::Timer(tokio::spawn(async move {
                    tokio::time::sleep(fallback).await;
                    shared.run_batch(batch_id, &batch);
                }))
            }
        };

        if let Some(slot) = lock(&self.shared.scheduled).get_mut(&batch_id) {
            *slot = Some(scheduled);
        }
        count
    }

    pub fn state_of(&self, address: &str) -> Option<PrefetchState> {
        lock(&self.shared.entries).get(address).copied()
    }

    /// Number of registered addresses, pending or prefetched.
    pub fn registered(&self) -> usize {
        lock(&self.shared.entries).len()
    }

    /// Scheduled batches that have not fired yet.
    pub fn pending_batches(&self) -> usize {
        lock(&self.shared.scheduled).len()
    }

    /// Cancel every scheduled batch. Nothing is requested from the host afterwards.
    pub fn teardown(&mut self) {
        if self.shared.token.is_cancelled() {
            return;
        }
        self.shared.token.cancel();
        let scheduled: Vec<Scheduled> = lock(&self.shared.scheduled)
            .drain()
            .filter_map(|(_, s)| s)
            .collect();
        let cancelled = scheduled.len();
        for s in scheduled {
            match s {
                Scheduled::Idle(request) => self.shared.host.cancel_idle(request),
                Scheduled::Timer(handle) => handle.abort(),
            }
        }
        tracing::debug!(cancelled, "prefetcher torn down");
    }
}

impl Drop for IdlePrefetcher {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::simulated::SimulatedIdleHost;

    fn prefetcher(host: &SimulatedIdleHost) -> IdlePrefetcher {
        IdlePrefetcher::new(Arc::new(host.clone()), &EngineCfg::default())
    }

    #[test]
    fn same_address_registers_once() {
        let host = SimulatedIdleHost::new(true);
        let mut p = prefetcher(&host);
        assert_eq!(p.prefetch(["/img/hero.webp"]), 1);
        assert_eq!(p.prefetch(["/img/hero.webp"]), 0);
        assert_eq!(p.prefetch(["/img/hero.webp", "/img/hero.webp"]), 0);
        assert_eq!(p.registered(), 1);
        assert_eq!(p.pending_batches(), 1);
        assert_eq!(host.pending_idle(), 1);
    }

    #[test]
    fn duplicates_within_one_call_collapse() {
        let host = SimulatedIdleHost::new(true);
        let mut p = prefetcher(&host);
        assert_eq!(p.prefetch(vec!["/a.js".to_string(), "/a.js".to_string(), "/b.js".to_string()]), 2);
        host.run_idle();
        assert_eq!(host.prefetched(), vec!["/a.js", "/b.js"]);
    }

    #[test]
    fn idle_path_fires_on_idle() {
        let host = SimulatedIdleHost::new(true);
        let mut p = prefetcher(&host);
        p.prefetch(["/a.css", "/b.css"]);
        assert_eq!(p.state_of("/a.css"), Some(PrefetchState::Pending));
        assert!(host.prefetched().is_empty());

        host.run_idle();
        assert_eq!(host.prefetched(), vec!["/a.css", "/b.css"]);
        assert_eq!(p.state_of("/b.css"), Some(PrefetchState::Prefetched));
        assert_eq!(p.pending_batches(), 0);
    }

    #[test]
    fn teardown_cancels_idle_request() {
        let host = SimulatedIdleHost::new(true);
        let mut p = prefetcher(&host);
        p.prefetch(["/late.png"]);
        p.teardown();
        assert_eq!(host.pending_idle(), 0);
        host.run_idle();
        assert!(host.prefetched().is_empty());
        assert_eq!(p.prefetch(["/after.png"]), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fallback_fires_after_delay() {
        let host = SimulatedIdleHost::new(false);
        let mut p = prefetcher(&host);
        p.prefetch(["/font.woff2"]);

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert!(host.prefetched().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(host.prefetched(), vec!["/font.woff2"]);
        assert_eq!(p.state_of("/font.woff2"), Some(PrefetchState::Prefetched));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_timer() {
        let host = SimulatedIdleHost::new(false);
        let mut p = prefetcher(&host);
        p.prefetch(["/font.woff2"]);
        drop(p);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(host.prefetched().is_empty());
    }
}
