//! Ephemeral toast notifications.
//!
//! Notifications appear for a limited time to report the outcome of an action
//! (login succeeded, connection failed, ...) without blocking interaction.
//!
//! # Components
//!
//! - [`notification`] - the immutable `Notification` entry and its `Kind`
//! - [`queue`] - `NotificationQueue`, which owns the ordered set of active
//!   entries and their expiry timers
//!
//! # Usage
//!
//! ```ignore
//! let queue = NotificationQueue::new();
//! queue.error("Connection failed");
//!
//! // Renderers re-read the list whenever the revision changes
//! let mut changes = queue.subscribe();
//! changes.changed().await?;
//! for entry in queue.list() { /* draw */ }
//! ```

pub mod notification;
pub mod queue;

pub use notification::{Kind, Notification, NotificationId};
pub use queue::{NotificationQueue, DEFAULT_TTL};
