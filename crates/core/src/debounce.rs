use std::time::Duration;
use tokio::time::Instant;

/// Debounce phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending { deadline: Instant },
    Fired,
}

/// Quiescence-window debouncer: a burst of pushes yields one value, the last one,
/// once no push has arrived for `window`.
///
/// `Idle → Pending(deadline) → Fired → Idle`; `cancel` returns to `Idle` from any state.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    state: DebounceState,
    latest: Option<T>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
            latest: None,
        }
    }

    /// Record a value and restart the window.
    pub fn push(&mut self, value: T, now: Instant) {
        self.latest = Some(value);
        self.state = DebounceState::Pending {
            deadline: now + self.window,
        };
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// If the window has elapsed, move to `Fired` and hand out the last value.
    pub fn fire(&mut self, now: Instant) -> Option<T> {
        match self.state {
            DebounceState::Pending { deadline } if now >= deadline => {
                self.state = DebounceState::Fired;
                self.latest.take()
            }
            _ => None,
        }
    }

    /// Downstream has applied the fired value.
    pub fn complete(&mut self) {
        if self.state == DebounceState::Fired {
            self.state = DebounceState::Idle;
        }
    }

    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
        self.latest = None;
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DebounceState::Pending { .. })
    }
}

/// Sleep until `deadline`, or forever when there is none. For use in `select!`.
pub async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}
