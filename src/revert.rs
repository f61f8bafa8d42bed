//! Delayed revert to idle
//!
//! Transient announcements (a satellite connecting) light the ring briefly and
//! then fall back to off. [`DelayedRevert`] owns the LED sink so that every
//! LED write and the revert check happen under one lock. Each write bumps a
//! generation counter; a timer only turns the ring off if the generation it
//! was scheduled under is still current. A superseded timer can therefore
//! never clobber a newer action, even if it wakes up concurrently.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::action::LedAction;
use crate::led::LedSink;

/// Default delay before a transient action reverts to off
pub const DEFAULT_REVERT_DELAY: Duration = Duration::from_secs(2);

#[derive(Default)]
struct Slot {
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl Slot {
    /// Invalidate whatever revert is pending
    fn supersede(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// LED sink guard with a single cancelable revert slot
pub struct DelayedRevert {
    led: Arc<dyn LedSink>,
    slot: Arc<Mutex<Slot>>,
    delay: Duration,
}

impl DelayedRevert {
    /// Wrap an LED sink
    #[must_use]
    pub fn new(led: Arc<dyn LedSink>, delay: Duration) -> Self {
        Self {
            led,
            slot: Arc::new(Mutex::new(Slot::default())),
            delay,
        }
    }

    /// Run `action`, replacing any pending revert
    ///
    /// With `revert` set, a new revert to off is scheduled after the
    /// configured delay.
    ///
    /// # Panics
    ///
    /// Panics if `revert` is set outside a Tokio runtime
    pub fn apply(&self, action: LedAction, revert: bool) {
        let mut slot = lock(&self.slot);
        slot.supersede();
        action.apply(self.led.as_ref());

        if revert {
            let generation = slot.generation;
            slot.timer = Some(self.spawn_timer(generation));
            tracing::debug!(delay = ?self.delay, "revert to idle scheduled");
        }
    }

    fn spawn_timer(&self, generation: u64) -> JoinHandle<()> {
        let led = Arc::clone(&self.led);
        let slot = Arc::clone(&self.slot);
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut slot = lock(&slot);
            if slot.generation != generation {
                return;
            }
            slot.timer = None;
            tracing::debug!("reverting LEDs to idle");
            led.off();
        })
    }

    /// Drop the pending revert, if any, without touching the LEDs
    pub fn cancel(&self) {
        lock(&self.slot).supersede();
    }

    /// Whether a revert is scheduled
    #[must_use]
    pub fn is_pending(&self) -> bool {
        lock(&self.slot).timer.is_some()
    }

    /// Configured revert delay
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancel any pending revert and turn the LEDs off
    pub fn finish(&self) {
        let mut slot = lock(&self.slot);
        slot.supersede();
        self.led.off();
    }
}

impl Drop for DelayedRevert {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter(Mutex<Vec<LedAction>>);

    impl Counter {
        fn offs(&self) -> usize {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|a| **a == LedAction::Off)
                .count()
        }
    }

    impl LedSink for Counter {
        fn off(&self) {
            self.0.lock().unwrap().push(LedAction::Off);
        }
        fn think(&self) {
            self.0.lock().unwrap().push(LedAction::Think);
        }
        fn speak(&self) {
            self.0.lock().unwrap().push(LedAction::Speak);
        }
        fn spin(&self) {
            self.0.lock().unwrap().push(LedAction::Spin);
        }
        fn wakeup(&self) {
            self.0.lock().unwrap().push(LedAction::Wakeup);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let led = Arc::new(Counter::default());
        let revert = DelayedRevert::new(led.clone(), DEFAULT_REVERT_DELAY);

        revert.apply(LedAction::Think, true);
        assert!(revert.is_pending());

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(led.offs(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(led.offs(), 1);
        assert!(!revert.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_supersedes_previous() {
        let led = Arc::new(Counter::default());
        let revert = DelayedRevert::new(led.clone(), DEFAULT_REVERT_DELAY);

        revert.apply(LedAction::Think, true);
        tokio::time::sleep(Duration::from_secs(1)).await;
        revert.apply(LedAction::Think, true);

        // First timer would have fired at 2s
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(led.offs(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(led.offs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_leaves_leds_alone() {
        let led = Arc::new(Counter::default());
        let revert = DelayedRevert::new(led.clone(), DEFAULT_REVERT_DELAY);

        revert.apply(LedAction::Think, true);
        revert.cancel();
        assert!(!revert.is_pending());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*led.0.lock().unwrap(), vec![LedAction::Think]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_is_ignored() {
        let led = Arc::new(Counter::default());
        let revert = DelayedRevert::new(led.clone(), Duration::from_millis(10));

        revert.apply(LedAction::Think, true);
        // Simulate a timer that already woke up but lost the race for the lock
        let stale = revert.spawn_timer(lock(&revert.slot).generation);
        revert.apply(LedAction::Speak, false);

        stale.await.unwrap();
        assert_eq!(
            *led.0.lock().unwrap(),
            vec![LedAction::Think, LedAction::Speak]
        );
    }
}
