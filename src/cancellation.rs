use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

/// Correlates one expensive request (e.g. a TDS query) with a cooperative
/// abort signal. Owned by the caller, observed by the handling component,
/// scoped to a single request. Clones share the same flag.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    request_id: String,
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mints a token with a generated request id.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Signals the in-flight request to abort. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_visible_to_clones() {
        let token = CancellationToken::new("req-1");
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
        assert_eq!(observer.request_id(), "req-1");
    }

    #[test]
    fn test_generated_tokens_are_distinct() {
        let a = CancellationToken::generate();
        let b = CancellationToken::generate();
        assert_ne!(a.request_id(), b.request_id());
    }
}
