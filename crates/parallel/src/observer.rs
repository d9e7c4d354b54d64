//! Per-window progress events

use crossbeam_channel::{Receiver, Sender};
use terrargb_core::Window;

/// Receives one event per window written to the sink.
///
/// Called synchronously from the writing thread, in write order, so the
/// pipeline waits for every call. Implementations must not fail and must
/// return immediately; a consumer that may be slow should sit behind a
/// [`ChannelObserver`].
pub trait WindowObserver {
    fn window_processed(&self, window: &Window, done: usize, total: usize);
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl WindowObserver for NoopObserver {
    fn window_processed(&self, _window: &Window, _done: usize, _total: usize) {}
}

impl<F> WindowObserver for F
where
    F: Fn(&Window, usize, usize),
{
    fn window_processed(&self, window: &Window, done: usize, total: usize) {
        self(window, done, total)
    }
}

/// One "window processed" event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEvent {
    pub window: Window,
    pub done: usize,
    pub total: usize,
}

/// Forwards events to another thread without ever blocking the writer.
///
/// Events are dropped while the channel is full or after the receiver is
/// gone; `done` in a later event still reports the true count.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<WindowEvent>,
}

impl ChannelObserver {
    /// Observer plus the receiving end, holding at most `capacity` events
    pub fn bounded(capacity: usize) -> (Self, Receiver<WindowEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl WindowObserver for ChannelObserver {
    fn window_processed(&self, window: &Window, done: usize, total: usize) {
        let event = WindowEvent {
            window: *window,
            done,
            total,
        };
        // Full or disconnected: drop the event
        let _ = self.tx.try_send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_never_blocks() {
        let (observer, rx) = ChannelObserver::bounded(2);
        for i in 0..5 {
            observer.window_processed(&Window::new(i, 0, 1, 1), i + 1, 5);
        }

        // Only the first two fit; the rest were dropped
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].done, 2);

        drop(rx);
        observer.window_processed(&Window::new(0, 0, 1, 1), 6, 6);
    }
}
