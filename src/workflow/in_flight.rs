//! Per-document in-flight registry. One workflow run per document at a time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Shared set of document keys with a run in progress.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `None` if another run already holds it.
    pub fn try_acquire(&self, key: &str) -> Option<InFlightGuard> {
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        if !keys.insert(key.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            keys: self.keys.clone(),
            key: key.to_string(),
        })
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

/// Releases its key on drop, whatever the run's outcome.
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let registry = InFlight::new();
        let guard = registry.try_acquire("doc").unwrap();
        assert!(registry.is_in_flight("doc"));
        assert!(registry.try_acquire("doc").is_none());
        assert!(registry.try_acquire("other").is_some());

        drop(guard);
        assert!(!registry.is_in_flight("doc"));
        assert!(registry.try_acquire("doc").is_some());
    }
}
