//! Periodic TX notifications
//!
//! The notifier waits on a [`TickSource`], then offers the current letter to
//! a [`NotifySink`]. The letter only advances when the sink accepted it, so a
//! refused send (not subscribed, link not secure yet) is retried with the
//! same letter on the next tick. Dropping the future or ending the tick
//! source cancels it.

use core::future::Future;

use crate::config::notify::{ALPHABET_LEN, FIRST_CHAR};

/// Rotating `'A'..'Z'` payload
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NotificationTicker {
    index: usize,
}

impl NotificationTicker {
    pub const fn new() -> Self {
        Self { index: 0 }
    }

    /// Letter to send on the next tick
    pub fn current(&self) -> u8 {
        // index % ALPHABET_LEN < 26, always fits
        FIRST_CHAR + (self.index % ALPHABET_LEN) as u8
    }

    /// Number of letters sent so far
    pub fn sent(&self) -> usize {
        self.index
    }

    pub fn advance(&mut self) {
        self.index = self.index.wrapping_add(1);
    }
}

/// Timer driving the notifier
pub trait TickSource {
    /// Wait for the next tick; `false` once the source has ended
    fn next(&mut self) -> impl Future<Output = bool>;
}

/// Destination for notification bytes
pub trait NotifySink {
    /// Try to send one byte; `true` when it went out
    fn send(&mut self, byte: u8) -> impl Future<Output = bool>;
}

/// Run the notifier until `ticks` ends
pub async fn run_notifier<T: TickSource, S: NotifySink>(
    ticks: &mut T,
    ticker: &mut NotificationTicker,
    sink: &mut S,
) {
    while ticks.next().await {
        let byte = ticker.current();
        if sink.send(byte).await {
            log::info!("[notify] NUS sent {}", byte as char);
            ticker.advance();
        }
    }
    log::debug!("[notify] stopped after {} notifications", ticker.sent());
}


#[cfg(test)]
mod tests {
    use super::mock::CountedTicks;
    use super::*;
    use futures::executor::block_on;
    use heapless::Vec;

    /// Accepts bytes according to a script, recording what went out
    struct ScriptedSink {
        accept: Vec<bool, 64>,
        sent: Vec<u8, 64>,
        attempts: usize,
    }

    impl ScriptedSink {
        fn new(accept: &[bool]) -> Self {
            Self {
                accept: Vec::from_slice(accept).unwrap(),
                sent: Vec::new(),
                attempts: 0,
            }
        }
    }

    impl NotifySink for ScriptedSink {
        async fn send(&mut self, byte: u8) -> bool {
            let ok = self.accept.get(self.attempts).copied().unwrap_or(true);
            self.attempts += 1;
            if ok {
                self.sent.push(byte).unwrap();
            }
            ok
        }
    }

    #[test]
    fn test_sends_rotating_letters() {
        let mut ticks = CountedTicks::new(3);
        let mut ticker = NotificationTicker::new();
        let mut sink = ScriptedSink::new(&[]);

        block_on(run_notifier(&mut ticks, &mut ticker, &mut sink));

        assert_eq!(sink.sent.as_slice(), b"ABC");
        assert_eq!(ticker.sent(), 3);
    }

    #[test]
    fn test_refused_send_does_not_advance() {
        let mut ticks = CountedTicks::new(5);
        let mut ticker = NotificationTicker::new();
        let mut sink = ScriptedSink::new(&[false, false, true, false, true]);

        block_on(run_notifier(&mut ticks, &mut ticker, &mut sink));

        assert_eq!(sink.attempts, 5);
        assert_eq!(sink.sent.as_slice(), b"AB");
    }

    #[test]
    fn test_wraps_after_z() {
        let mut ticks = CountedTicks::new(28);
        let mut ticker = NotificationTicker::new();
        let mut sink = ScriptedSink::new(&[]);

        block_on(run_notifier(&mut ticks, &mut ticker, &mut sink));

        assert_eq!(sink.sent[25], b'Z');
        assert_eq!(&sink.sent[26..], b"AB");
    }

    #[test]
    fn test_ended_source_sends_nothing() {
        let mut ticks = CountedTicks::new(0);
        let mut ticker = NotificationTicker::new();
        let mut sink = ScriptedSink::new(&[]);

        block_on(run_notifier(&mut ticks, &mut ticker, &mut sink));

        assert_eq!(sink.attempts, 0);
        assert_eq!(ticker.current(), b'A');
    }
}
