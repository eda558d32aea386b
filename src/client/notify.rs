//!
//! # Toast queue
//!
//! The notification sink: an ordered list of transient toasts. The queue
//! only holds data and exposes removal; auto-expiry after `duration_ms` is a
//! timing concern owned by whatever renders the toasts.

use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::client::events::{EventBus, StoreEvent};

/// Default time a toast stays visible.
pub const DEFAULT_TOAST_MS: u64 = 5000;
/// Errors stay on screen longer.
pub const ERROR_TOAST_MS: u64 = 7000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

impl ToastKind {
    fn default_duration_ms(self) -> u64 {
        match self {
            ToastKind::Error => ERROR_TOAST_MS,
            _ => DEFAULT_TOAST_MS,
        }
    }
}

/// A transient user notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: Uuid,
    pub kind: ToastKind,
    pub title: String,
    pub message: Option<String>,
    pub duration_ms: u64,
}

/// Ordered queue of pending toasts.
#[derive(Default)]
pub struct ToastQueue {
    toasts: Mutex<Vec<Toast>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a toast with a fresh id and returns the id.
    /// `duration_ms` defaults by kind when not given.
    pub fn push(
        &self,
        kind: ToastKind,
        title: impl Into<String>,
        message: Option<String>,
        duration_ms: Option<u64>,
    ) -> Uuid {
        let toast = Toast {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            message,
            duration_ms: duration_ms.unwrap_or_else(|| kind.default_duration_ms()),
        };
        let id = toast.id;
        self.toasts.lock().unwrap().push(toast);
        id
    }

    pub fn success(&self, title: impl Into<String>, message: Option<String>) -> Uuid {
        self.push(ToastKind::Success, title, message, None)
    }

    pub fn error(&self, title: impl Into<String>, message: Option<String>) -> Uuid {
        self.push(ToastKind::Error, title, message, None)
    }

    pub fn warning(&self, title: impl Into<String>, message: Option<String>) -> Uuid {
        self.push(ToastKind::Warning, title, message, None)
    }

    pub fn info(&self, title: impl Into<String>, message: Option<String>) -> Uuid {
        self.push(ToastKind::Info, title, message, None)
    }

    /// Removes a toast by id. Removing an absent id is a no-op.
    pub fn remove(&self, id: Uuid) {
        self.toasts.lock().unwrap().retain(|toast| toast.id != id);
    }

    pub fn clear(&self) {
        self.toasts.lock().unwrap().clear();
    }

    /// Snapshot of the pending toasts, in insertion order.
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().unwrap().clone()
    }
}

/// Standard wiring: route store notification events into a toast queue.
/// `SessionExpired` is not handled here; navigation is the embedder's
/// concern.
pub fn route_notifications(bus: &EventBus, queue: Arc<ToastQueue>) {
    bus.subscribe(move |event| {
        if let StoreEvent::Notification {
            kind,
            title,
            message,
        } = event
        {
            queue.push(*kind, title.clone(), message.clone(), None);
        }
    });
}
