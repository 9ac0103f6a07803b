//! Request tokens.

use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identifier for one in-flight exchange on the transport side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestToken {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw token value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Hands out tokens that are never reused for the lifetime of the source.
///
/// Relaxed ordering is enough; only uniqueness matters.
#[derive(Debug)]
pub struct TokenSource {
    next: AtomicU64,
}

impl TokenSource {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_token(&self) -> RequestToken {
        RequestToken(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TokenSource {
    fn default() -> Self {
        Self::new()
    }
}
