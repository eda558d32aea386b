//!
//! # Store events
//!
//! Stores never call the notification layer directly. They emit domain
//! events on an `EventBus`; subscribers (the toast router, an embedder's
//! navigation hook) decide what to do with them. This keeps the stores free
//! of UI concerns while preserving single-source-of-truth state.

use std::sync::{Arc, Mutex};

use crate::client::notify::ToastKind;

/// Domain events emitted by the stores and the API client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A user-facing notification; routed to the toast queue by default.
    Notification {
        kind: ToastKind,
        title: String,
        message: Option<String>,
    },
    /// The session could not be refreshed; auth artifacts were cleared and
    /// the embedder should navigate to its login entry point.
    SessionExpired,
}

type Subscriber = Box<dyn Fn(&StoreEvent) + Send + Sync>;

/// Synchronous fan-out channel between stores and their consumers.
///
/// Subscribers run inline on `emit`, in subscription order, so a store
/// action observes its own notifications as soon as it returns.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.subscribers.lock().unwrap().push(Box::new(subscriber));
    }

    pub fn emit(&self, event: StoreEvent) {
        for subscriber in self.subscribers.lock().unwrap().iter() {
            subscriber(&event);
        }
    }

    /// Shorthand used by every store action that ends in a toast.
    pub fn notify(&self, kind: ToastKind, title: impl Into<String>, message: Option<String>) {
        self.emit(StoreEvent::Notification {
            kind,
            title: title.into(),
            message,
        });
    }
}
