//! Expiration policy and the background sweep timer.

use std::collections::HashSet;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::dbi::DbiRef;
use crate::error::Result;

use super::DbiPool;

/// Default sweep interval and expiration age: 30 minutes.
pub const DEFAULT_EXPIRATION_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Controls how long suspended handles survive.
///
/// # Examples
///
/// ```
/// use dbireg::ExpirationPolicy;
/// use std::time::Duration;
///
/// let policy = ExpirationPolicy::default()
///     .with_interval(Duration::from_secs(60))
///     .with_max_idle_retention(Duration::from_secs(3600));
/// assert_eq!(policy.interval, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirationPolicy {
    /// Sweep period, and the age after which a surplus suspended handle is
    /// destroyed.
    pub interval: Duration,
    /// Upper bound on how long the last suspended handle of an unused
    /// database is kept. `None` keeps it indefinitely.
    pub max_idle_retention: Option<Duration>,
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_EXPIRATION_INTERVAL,
            max_idle_retention: None,
        }
    }
}

impl ExpirationPolicy {
    /// Sets the sweep interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Bounds how long the last suspended handle of an unused database lives.
    #[must_use]
    pub fn with_max_idle_retention(mut self, bound: Duration) -> Self {
        self.max_idle_retention = Some(bound);
        self
    }
}

/// Reports which databases live documents currently reference.
pub trait ActiveRefSource: Send + Sync {
    /// Refs referenced by open documents.
    fn active_refs(&self) -> HashSet<DbiRef>;
}

impl<F> ActiveRefSource for F
where
    F: Fn() -> HashSet<DbiRef> + Send + Sync,
{
    fn active_refs(&self) -> HashSet<DbiRef> {
        self()
    }
}

/// Handle to the background sweep thread. Dropping it stops the thread and
/// waits for it to exit.
#[derive(Debug)]
pub struct ExpirationTimer {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ExpirationTimer {
    pub(super) fn spawn(
        pool: Weak<DbiPool>,
        source: Option<Arc<dyn ActiveRefSource>>,
        interval: Duration,
    ) -> Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = std::thread::Builder::new()
            .name("dbireg-expiration".into())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                // Gathered before the pool lock is taken.
                let in_use = source
                    .as_ref()
                    .map(|s| s.active_refs())
                    .unwrap_or_default();

                let Some(pool) = pool.upgrade() else { break };
                let destroyed = pool.check_expiration(&in_use);
                if destroyed > 0 {
                    log::debug!("expiration sweep destroyed {destroyed} suspended handle(s)");
                }
            })?;

        Ok(Self {
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    /// Stops the sweep thread and waits for it.
    pub fn stop(&mut self) {
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("expiration sweep thread panicked");
            }
        }
    }
}

impl Drop for ExpirationTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
