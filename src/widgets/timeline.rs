//! Process-wide animation clock.
//!
//! All animated components share one [`SharedTimeLine`]. It exists only while
//! someone holds it: [`SharedTimeLine::instance`] hands out the live instance
//! or creates a new one, and the clock stops when the last `Arc` is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Default frame publication interval.
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 20;

static INSTANCE: Mutex<Weak<SharedTimeLine>> = Mutex::new(Weak::new());

/// A free-running clock publishing frame numbers.
///
/// A frame is the number of milliseconds since the clock started. Frames are
/// published every update interval to all subscribers.
#[derive(Debug)]
pub struct SharedTimeLine {
    start: Instant,
    update_interval_ms: AtomicU64,
    frames: watch::Sender<u64>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl SharedTimeLine {
    /// Get the live clock, starting one if there is none.
    ///
    /// Must be called from within a tokio runtime.
    pub fn instance() -> Arc<SharedTimeLine> {
        let mut slot = INSTANCE.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(timeline) = slot.upgrade() {
            return timeline;
        }

        let timeline = Self::start();
        *slot = Arc::downgrade(&timeline);
        timeline
    }

    /// Start a private clock, not shared through [`instance`](Self::instance).
    ///
    /// Must be called from within a tokio runtime.
    pub fn start() -> Arc<SharedTimeLine> {
        let (frames, _) = watch::channel(0);
        let timeline = Arc::new(SharedTimeLine {
            start: Instant::now(),
            update_interval_ms: AtomicU64::new(DEFAULT_UPDATE_INTERVAL_MS),
            frames,
            ticker: Mutex::new(None),
        });

        let ticker = tokio::spawn(tick(Arc::downgrade(&timeline)));
        *timeline
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(ticker);

        debug!("Shared timeline started");
        timeline
    }

    /// Frame number right now.
    pub fn current_frame(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Set how often frames are published. Zero is treated as one millisecond.
    pub fn set_update_interval(&self, interval_ms: u64) {
        self.update_interval_ms
            .store(interval_ms.max(1), Ordering::Relaxed);
    }

    /// Get the publication interval in milliseconds.
    pub fn update_interval_ms(&self) -> u64 {
        self.update_interval_ms.load(Ordering::Relaxed)
    }

    /// Receive published frames.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.frames.subscribe()
    }
}

impl Drop for SharedTimeLine {
    fn drop(&mut self) {
        if let Some(ticker) = self
            .ticker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            ticker.abort();
        }
        debug!("Shared timeline stopped");
    }
}

/// Serializes tests that go through the process-wide instance.
#[cfg(test)]
pub(crate) fn lock_shared_instance() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn tick(timeline: Weak<SharedTimeLine>) {
    loop {
        let interval = match timeline.upgrade() {
            Some(t) => t.update_interval_ms(),
            None => break,
        };
        tokio::time::sleep(Duration::from_millis(interval)).await;

        let Some(timeline) = timeline.upgrade() else {
            break;
        };
        let frame = timeline.current_frame();
        timeline.frames.send_replace(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_frames_are_milliseconds() {
        let timeline = SharedTimeLine::start();
        assert_eq!(timeline.current_frame(), 0);

        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(timeline.current_frame(), 250);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_published_frames() {
        let timeline = SharedTimeLine::start();
        let mut frames = timeline.subscribe();

        frames.changed().await.unwrap();
        let first = *frames.borrow_and_update();
        assert!(first >= DEFAULT_UPDATE_INTERVAL_MS);

        frames.changed().await.unwrap();
        assert!(*frames.borrow() >= first + DEFAULT_UPDATE_INTERVAL_MS);
    }

    #[tokio::test]
    async fn test_instance_is_shared_while_alive() {
        let _guard = lock_shared_instance();
        let a = SharedTimeLine::instance();
        let b = SharedTimeLine::instance();
        assert!(Arc::ptr_eq(&a, &b));

        let weak = Arc::downgrade(&a);
        drop(a);
        drop(b);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        tokio_test::block_on(async {
            let timeline = SharedTimeLine::start();
            timeline.set_update_interval(0);
            assert_eq!(timeline.update_interval_ms(), 1);
        });
    }
}
