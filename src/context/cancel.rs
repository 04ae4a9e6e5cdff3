use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag
///
/// A child token reports cancelled when it or any ancestor was cancelled.
/// The dispatcher hands each request a child of the server-wide token, so
/// stopping the server is observed by every in-flight chain.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancellationToken>>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn child_token(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_cancels_child_not_the_reverse() {
        let root = CancellationToken::new();
        let child = root.child_token();
        let grandchild = child.child_token();

        grandchild.cancel();
        assert!(!child.is_cancelled());

        root.cancel();
        assert!(child.is_cancelled());
        assert!(child.clone().is_cancelled());
    }
}
