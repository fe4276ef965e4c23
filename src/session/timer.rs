use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::SessionEvent;

/// The one countdown task a session may have running.
#[derive(Default)]
pub struct TimerSlot {
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    /// Replace any running countdown with a new one that posts
    /// `TimerFired { generation }` into the session's own queue.
    pub fn arm(
        &mut self,
        generation: u64,
        after: Duration,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(SessionEvent::TimerFired { generation });
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimerSlot::default();
        slot.arm(7, Duration::from_secs(3), tx);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
        tokio::time::sleep(Duration::from_secs(2)).await;
        match rx.try_recv() {
            Ok(SessionEvent::TimerFired { generation }) => assert_eq!(generation, 7),
            _ => panic!("expected a timer firing"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_cancels_previous_countdown() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimerSlot::default();
        slot.arm(1, Duration::from_secs(1), tx.clone());
        slot.arm(2, Duration::from_secs(5), tx);

        tokio::time::sleep(Duration::from_secs(6)).await;
        match rx.try_recv() {
            Ok(SessionEvent::TimerFired { generation }) => assert_eq!(generation, 2),
            _ => panic!("expected the second timer"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_countdown_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimerSlot::default();
        slot.arm(1, Duration::from_secs(1), tx);
        slot.cancel();
        slot.cancel();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
        assert!(!slot.is_running());
    }
}
