//! Core notification data structures.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Unique identifier for a notification, never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NotificationId(u64);

impl NotificationId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Notification category; drives the icon and color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Success,
    Error,
    Info,
    Warning,
}

impl Kind {
    pub fn icon(self) -> &'static str {
        match self {
            Kind::Success => "✓",
            Kind::Error => "✕",
            Kind::Warning => "⚠",
            Kind::Info => "ℹ",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Kind::Success => "success",
            Kind::Error => "error",
            Kind::Info => "info",
            Kind::Warning => "warning",
        }
    }
}

/// A single toast. Immutable once created.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Notification {
    id: NotificationId,
    kind: Kind,
    message: String,
    #[serde(skip)]
    #[cfg_attr(feature = "ts", ts(skip))]
    ttl: Duration,
    #[serde(skip)]
    #[cfg_attr(feature = "ts", ts(skip))]
    created_at: Instant,
}

impl Notification {
    pub(crate) fn new(kind: Kind, message: String, ttl: Duration) -> Self {
        Self {
            id: NotificationId::next(),
            kind,
            message,
            ttl,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> NotificationId {
        self.id
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// How long the entry stays visible without a manual dismissal.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Time left before expiry, for countdown indicators. Reads the Tokio
    /// clock, the same one the expiry timer sleeps on.
    pub fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.created_at.elapsed())
    }
}
