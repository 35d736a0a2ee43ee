//! Session events.
//!
//! ## Learning: Observer Pattern in Rust
//!
//! Front-ends do not hold references into the session. They subscribe to
//! a `tokio::sync::broadcast` channel and receive cloned event values.

use tokio::sync::broadcast;

/// Events emitted by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A level was (re)loaded
    LevelLoaded { index: usize, id: String },
    /// The content, objects or view state changed
    Changed,
    /// A user-facing error message
    UserError(String),
    /// The level's goal was met
    Succeeded { index: usize },
    /// Seconds left before advancing
    CountdownTick(u8),
    /// Moved on to another level
    Advanced { index: usize },
    /// The last level was solved
    Completed { score: u32 },
    /// The player left
    Exited,
}

/// Event bus for broadcasting session events.
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Helper for receiving events asynchronously.
pub struct EventHandler {
    receiver: broadcast::Receiver<SessionEvent>,
}

impl EventHandler {
    pub fn new(receiver: broadcast::Receiver<SessionEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns every event already queued without waiting.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                }
                Err(_) => return events,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(SessionEvent::Changed);

        let event = rx.recv().await.unwrap();
        assert_eq!(event, SessionEvent::Changed);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut first = EventHandler::new(bus.subscribe());
        let mut second = EventHandler::new(bus.subscribe());

        bus.emit(SessionEvent::Exited);

        assert_eq!(first.next().await, Some(SessionEvent::Exited));
        assert_eq!(second.next().await, Some(SessionEvent::Exited));
    }

    #[test]
    fn test_drain() {
        let bus = EventBus::new();
        let mut handler = EventHandler::new(bus.subscribe());
        bus.emit(SessionEvent::CountdownTick(2));
        bus.emit(SessionEvent::CountdownTick(1));
        assert_eq!(
            handler.drain(),
            vec![SessionEvent::CountdownTick(2), SessionEvent::CountdownTick(1)]
        );
        assert!(handler.drain().is_empty());
    }
}
