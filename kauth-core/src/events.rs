use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{audit::LogEntry, auth::AuthMethod, ban::Ban, error::EventError, principal::Principal};

/// Changes to ledger state, emitted after they have been applied.
///
/// Handlers are read-only observers (views); the ledger never waits on them to
/// decide anything, and a failing handler does not undo the change.
#[derive(Debug, Clone)]
pub enum Event {
    /// An entry was prepended to the audit log.
    LogAppended(LogEntry),
    /// The audit log was emptied.
    LogCleared,
    BanIssued(Ban),
    /// `unban` removed `count` bans for `address`.
    BansLifted {
        address: String,
        count: usize,
    },
    /// A principal became authenticated by login or by restoring an artifact.
    Authenticated(Principal),
    LoggedOut,
    AuthMethodChanged(AuthMethod),
}

#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Fans events out to registered handlers in registration order.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers, stopping at the first error.
    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ErroringHandler;

    #[async_trait]
    impl EventHandler for ErroringHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            Err(EventError::HandlerError("view unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_event_bus_empty() {
        EventBus::default()
            .emit(&Event::LogCleared)
            .await
            .expect("Failed to emit event");
    }

    #[tokio::test]
    async fn test_event_bus_multiple_handlers() {
        let bus = EventBus::default();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        bus.register(Arc::new(CountingHandler {
            count: first.clone(),
        }))
        .await;
        bus.register(Arc::new(CountingHandler {
            count: second.clone(),
        }))
        .await;

        bus.emit(&Event::LoggedOut).await.unwrap();
        bus.emit(&Event::BansLifted {
            address: "192.168.1.100".to_string(),
            count: 2,
        })
        .await
        .unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_event_bus_error_propagation() {
        let bus = EventBus::default();
        let count = Arc::new(AtomicUsize::new(0));
        bus.register(Arc::new(ErroringHandler)).await;
        bus.register(Arc::new(CountingHandler {
            count: count.clone(),
        }))
        .await;

        let result = bus.emit(&Event::LogCleared).await;
        assert!(matches!(result, Err(EventError::HandlerError(_))));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
