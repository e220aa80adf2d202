//! Batch persister building blocks
//!
//! - [`DebounceTimer`]: a cancellable one-shot timer on the tokio runtime
//! - [`persist_all`]: one transport call per pending section, in parallel
//! - [`FlushReport`]: per-section outcome of one flush

use crate::error::{SessionError, TransportError};
use crate::store::PendingSave;
use crate::transport::SectionTransport;
use crate::types::{DocumentId, Section};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Cancellable debounce timer
///
/// Arming replaces any pending timer. The callback is spawned as its own task
/// once the delay elapses, so cancelling never interrupts a flush that has
/// already started.
#[derive(Debug)]
pub struct DebounceTimer {
    delay: Duration,
    handle: Option<JoinHandle<()>>,
}

impl DebounceTimer {
    /// Create a disarmed timer
    #[inline]
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            handle: None,
        }
    }

    /// Configured delay
    #[inline]
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)start the timer
    ///
    /// Returns `false` when no tokio runtime is available; nothing is
    /// scheduled in that case.
    pub fn arm<F>(&mut self, on_fire: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime; autosave timer not armed");
            return false;
        };
        let delay = self.delay;
        self.handle = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(on_fire);
        }));
        true
    }

    /// Stop a pending timer
    ///
    /// Returns `true` if a timer was pending.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Check if a timer is pending
    #[inline]
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Issue one persistence call per pending section, concurrently
///
/// Results come back paired with the capture they belong to, in input order.
pub async fn persist_all(
    transport: &dyn SectionTransport,
    document: &DocumentId,
    pending: Vec<PendingSave>,
) -> Vec<(PendingSave, Result<(), TransportError>)> {
    let calls = pending.into_iter().map(|save| async move {
        let result = transport.persist(document, save.section, &save.payload).await;
        (save, result)
    });
    futures::future::join_all(calls).await
}

/// Per-section outcome of one flush
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    /// Sections the server accepted
    pub saved: Vec<Section>,
    /// Accepted sections that were edited again while in flight
    pub still_dirty: Vec<Section>,
    /// Sections whose response arrived after a reset and was dropped
    pub discarded: Vec<Section>,
    /// Sections that stayed dirty, with the reason
    pub failed: Vec<(Section, TransportError)>,
}

impl FlushReport {
    /// Check if the flush had nothing to send
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.discarded.is_empty() && self.failed.is_empty()
    }

    /// Check if every call succeeded
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turn partial failure into an error
    ///
    /// # Errors
    /// `SessionError::SaveFailed` when any section failed.
    pub fn into_result(self) -> Result<Self, SessionError> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(SessionError::SaveFailed {
                saved: self.saved,
                failed: self.failed,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn timer_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new(Duration::from_millis(100));

        let counter = Arc::clone(&fired);
        assert!(timer.arm(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_restarts_the_window() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new(Duration::from_millis(100));

        for _ in 0..3 {
            let counter = Arc::clone(&fired);
            timer.arm(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(60)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_fire() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new(Duration::from_millis(100));

        let counter = Arc::clone(&fired);
        timer.arm(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.cancel());
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn arm_without_runtime_is_a_no_op() {
        let mut timer = DebounceTimer::new(Duration::from_millis(1));
        assert!(!timer.arm(async {}));
        assert!(!timer.is_armed());
    }

    #[test]
    fn report_into_result() {
        let ok = FlushReport {
            saved: vec![Section::Design],
            ..FlushReport::default()
        };
        assert!(ok.clone().into_result().is_ok());

        let failed = FlushReport {
            failed: vec![(Section::Settings, TransportError::Network("down".into()))],
            ..ok
        };
        let err = failed.into_result().unwrap_err();
        assert_eq!(err.failed_sections(), vec![Section::Settings]);
    }
}
