//! Debounced "user is composing" signal.
//!
//! Each composer instance owns its own timer; two feeds typing at once
//! never share one. A keystroke flips the signal true immediately and
//! re-arms the window, aborting the previous timer (last-keystroke-wins),
//! so the signal cannot flip false while keystrokes keep arriving faster
//! than the window.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default quiet window after the last keystroke.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

pub struct TypingSignal {
    composing: Arc<watch::Sender<bool>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    window: Duration,
}

impl Default for TypingSignal {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl TypingSignal {
    pub fn new(window: Duration) -> Self {
        let (composing, _) = watch::channel(false);
        Self {
            composing: Arc::new(composing),
            timer: Mutex::new(None),
            window,
        }
    }

    /// Record a keystroke: composing becomes true now, and flips back to
    /// false only after a full quiet window with no further keystrokes.
    pub fn keystroke(&self) {
        self.composing.send_replace(true);

        let mut slot = self.timer.lock().expect("typing timer lock poisoned");
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let composing = Arc::clone(&self.composing);
        // Anchor the window to the keystroke itself; a lazy sleep would
        // start counting only when the spawned task is first polled.
        let deadline = tokio::time::Instant::now() + self.window;
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            composing.send_replace(false);
        }));
    }

    /// Current state, without subscribing.
    pub fn is_composing(&self) -> bool {
        *self.composing.borrow()
    }

    /// Observe state changes (collaborators showing a typing indicator).
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.composing.subscribe()
    }

    /// Cancel any pending flip-to-false and reset the signal. Called on
    /// feed teardown.
    pub fn clear(&self) {
        let mut slot = self.timer.lock().expect("typing timer lock poisoned");
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        self.composing.send_replace(false);
    }
}

impl Drop for TypingSignal {
    fn drop(&mut self) {
        // Best-effort: never panic out of Drop, even with a poisoned lock.
        if let Ok(slot) = self.timer.get_mut() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{self, Duration};

    async fn advance(ms: u64) {
        time::advance(Duration::from_millis(ms)).await;
        // Let the timer task observe the new clock.
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_keystroke_flips_false_after_window() {
        let signal = TypingSignal::default();

        signal.keystroke();
        assert!(signal.is_composing());

        advance(999).await;
        assert!(signal.is_composing());

        advance(1).await;
        assert!(!signal.is_composing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_keystroke_extends_window() {
        let signal = TypingSignal::default();

        // Keystrokes at t=0 and t=500: composing holds at t=1200 and
        // releases only at t=1500.
        signal.keystroke();
        advance(500).await;
        signal.keystroke();

        advance(700).await; // t = 1200
        assert!(signal.is_composing());

        advance(300).await; // t = 1500
        assert!(!signal.is_composing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_keystrokes_never_release() {
        let signal = TypingSignal::default();

        for _ in 0..10 {
            signal.keystroke();
            advance(400).await;
            assert!(signal.is_composing());
        }

        advance(1000).await;
        assert!(!signal.is_composing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signals_are_per_instance() {
        let a = TypingSignal::default();
        let b = TypingSignal::default();

        a.keystroke();
        advance(600).await;
        b.keystroke();

        advance(400).await; // a's window elapses, b's does not
        assert!(!a.is_composing());
        assert!(b.is_composing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_pending_timer() {
        let signal = TypingSignal::default();
        signal.keystroke();
        signal.clear();
        assert!(!signal.is_composing());

        // No stray flip later
        advance(2000).await;
        assert!(!signal.is_composing());
    }

    #[test]
    fn test_drop_survives_poisoned_timer_lock() {
        let signal = TypingSignal::default();

        // Poison the timer lock by panicking while holding it.
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = signal.timer.lock().unwrap();
            panic!("poison the lock");
        }));

        // Dropping must not panic again.
        drop(signal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_transitions() {
        let signal = TypingSignal::default();
        let mut rx = signal.subscribe();

        signal.keystroke();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());

        advance(1000).await;
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
    }
}
