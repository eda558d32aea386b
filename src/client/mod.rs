//!
//! # Client slice
//!
//! The browser-client half of the system, as a typed library: an HTTP
//! adapter with session handling, state stores for auth and tasks, and an
//! event-driven notification sink. An application root owns one of each and
//! passes them by reference to whatever renders them; there are no global
//! singletons.

pub mod api;
pub mod auth_store;
pub mod events;
pub mod notify;
pub mod storage;
pub mod task_store;

pub use api::{ApiClient, ApiError, ApiErrorKind};
pub use auth_store::{AuthState, AuthStore, Credentials, Registration};
pub use events::{EventBus, StoreEvent};
pub use notify::{route_notifications, Toast, ToastKind, ToastQueue};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use task_store::{display_order, TaskCounts, TaskFilter, TaskState, TaskStore};
