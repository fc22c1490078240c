use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{AccountId, error::EventError};

/// Represents events that can be emitted by the event bus
///
/// Security-relevant state changes and anomalies of the account lifecycle are
/// published here so that monitoring can alert on them without scraping logs.
#[derive(Debug, Clone)]
pub enum Event {
    /// A login succeeded and the account's bookkeeping was updated.
    LoginSucceeded {
        account_id: AccountId,
        username: String,
        timestamp: DateTime<Utc>,
    },

    /// A login failed for a known account.
    LoginFailed {
        account_id: AccountId,
        username: String,
        /// Consecutive failures including this one
        failed_attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// An account was deactivated because it reached the failed attempt limit.
    ///
    /// This is a security-critical event that should trigger alerts.
    AccountLocked {
        account_id: AccountId,
        username: String,
        failed_attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// The inactivity sweep deactivated an account.
    AccountDeactivated {
        account_id: AccountId,
        username: String,
        last_login_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// The authentication pipeline reported a success for a username the store
    /// does not know. Signals pipeline/store desynchronization.
    UnknownAccountOnSuccess {
        username: String,
        timestamp: DateTime<Utc>,
    },

    /// A username lookup matched more than one account.
    ///
    /// The lookup is treated as "not found"; the duplicate is a data-integrity
    /// fault that needs an operator.
    DuplicateUsername {
        username: String,
        matches: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A trait for handling events emitted by the event bus
///
/// ```rust,ignore
/// struct AlertHandler;
///
/// #[async_trait]
/// impl EventHandler for AlertHandler {
///     async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
///         if let Event::AccountLocked { username, .. } = event {
///             page_operator(username).await;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Event bus that can emit events and register event handlers
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

    /// Register an event handler with the event bus
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to every registered handler
    ///
    /// A failing handler does not keep the event from the handlers after it.
    /// Each failure is logged; the first one is returned.
    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        let mut first_error: Option<EventError> = None;

        for handler in self.handlers.read().await.iter() {
            if let Err(e) = handler.handle_event(event).await {
                tracing::warn!(error = %e, event = ?event, "Event handler failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

/// Emit on an optional bus. Handler failures are never propagated: login
/// bookkeeping has already been committed when events go out.
pub(crate) async fn publish(bus: Option<&EventBus>, event: Event) {
    let Some(bus) = bus else {
        return;
    };
    if bus.emit(&event).await.is_err() {
        tracing::debug!("Event delivered with handler failures");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        call_count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ErroringEventHandler;

    #[async_trait]
    impl EventHandler for ErroringEventHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            Err(EventError::BusError("Test error".into()))
        }
    }

    fn locked_event() -> Event {
        Event::AccountLocked {
            account_id: AccountId::new("acct_test"),
            username: "bob".to_string(),
            failed_attempts: 3,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_empty() {
        let event_bus = EventBus::default();
        event_bus
            .emit(&locked_event())
            .await
            .expect("Failed to emit event");
    }

    #[tokio::test]
    async fn test_event_bus_multiple_handlers() {
        let event_bus = EventBus::default();
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));

        event_bus
            .register(Arc::new(CountingHandler {
                call_count: count1.clone(),
            }))
            .await;
        event_bus
            .register(Arc::new(CountingHandler {
                call_count: count2.clone(),
            }))
            .await;

        event_bus.emit(&locked_event()).await.unwrap();

        assert_eq!(count1.load(Ordering::SeqCst), 1);
        assert_eq!(count2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_event_bus_error_propagation() {
        let event_bus = EventBus::default();
        event_bus.register(Arc::new(ErroringEventHandler)).await;

        let result = event_bus.emit(&locked_event()).await;
        assert!(matches!(result, Err(EventError::BusError(_))));
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_later_handlers() {
        let event_bus = EventBus::default();
        let count = Arc::new(AtomicUsize::new(0));
        event_bus.register(Arc::new(ErroringEventHandler)).await;
        event_bus
            .register(Arc::new(CountingHandler {
                call_count: count.clone(),
            }))
            .await;

        let result = event_bus.emit(&locked_event()).await;

        assert!(matches!(result, Err(EventError::BusError(_))));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_publish_swallows_handler_errors() {
        let event_bus = EventBus::default();
        event_bus.register(Arc::new(ErroringEventHandler)).await;

        publish(Some(&event_bus), locked_event()).await;
        publish(None, locked_event()).await;
    }
}
