use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::transport::Method;

/// Tracks outstanding requests per (method, endpoint) so duplicate commands
/// can be suppressed while one is in flight. One guard belongs to one store.
#[derive(Debug, Default)]
pub struct RequestGuard {
    outstanding: Mutex<BTreeMap<Method, BTreeMap<String, usize>>>,
}

impl RequestGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_start(&self, method: Method, endpoint: &str) {
        let mut outstanding = self.outstanding.lock();
        *outstanding
            .entry(method)
            .or_default()
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
    }

    /// Register a start unless a matching request is outstanding. `force`
    /// registers regardless. Returns whether the request may proceed.
    pub fn try_start(&self, method: Method, endpoint: &str, force: bool) -> bool {
        let mut outstanding = self.outstanding.lock();
        let count = outstanding
            .entry(method)
            .or_default()
            .entry(endpoint.to_string())
            .or_insert(0);

        if *count > 0 && !force {
            tracing::debug!("Suppressing duplicate {} {}", method, endpoint);
            return false;
        }

        *count += 1;
        true
    }

    pub fn register_end(&self, method: Method, endpoint: &str) {
        let mut outstanding = self.outstanding.lock();

        let Some(endpoints) = outstanding.get_mut(&method) else {
            tracing::debug!("No outstanding {} requests to end for {}", method, endpoint);
            return;
        };

        if let Some(count) = endpoints.get_mut(endpoint) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                endpoints.remove(endpoint);
            }
        }

        if endpoints.is_empty() {
            outstanding.remove(&method);
        }
    }

    pub fn is_in_progress(&self, method: Method, endpoint: &str) -> bool {
        self.outstanding
            .lock()
            .get(&method)
            .and_then(|endpoints| endpoints.get(endpoint))
            .is_some_and(|count| *count > 0)
    }

    /// Number of outstanding requests across every endpoint
    pub fn outstanding(&self) -> usize {
        self.outstanding
            .lock()
            .values()
            .flat_map(|endpoints| endpoints.values())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_and_end() {
        let guard = RequestGuard::new();
        assert!(!guard.is_in_progress(Method::Get, "/users"));

        guard.register_start(Method::Get, "/users");
        assert!(guard.is_in_progress(Method::Get, "/users"));
        assert!(!guard.is_in_progress(Method::Post, "/users"));
        assert!(!guard.is_in_progress(Method::Get, "/users/1"));

        guard.register_end(Method::Get, "/users");
        assert!(!guard.is_in_progress(Method::Get, "/users"));
        assert_eq!(guard.outstanding(), 0);
        assert!(guard.outstanding.lock().is_empty());
    }

    #[test]
    fn test_counts_concurrent_requests() {
        let guard = RequestGuard::new();

        guard.register_start(Method::Get, "/users");
        guard.register_start(Method::Get, "/users");
        assert_eq!(guard.outstanding(), 2);

        guard.register_end(Method::Get, "/users");
        assert!(guard.is_in_progress(Method::Get, "/users"));

        guard.register_end(Method::Get, "/users");
        assert!(!guard.is_in_progress(Method::Get, "/users"));
    }

    #[test]
    fn test_unmatched_end_is_ignored() {
        let guard = RequestGuard::new();
        guard.register_end(Method::Delete, "/users/1");
        assert_eq!(guard.outstanding(), 0);
    }

    #[test]
    fn test_try_start_suppresses_unless_forced() {
        let guard = RequestGuard::new();

        assert!(guard.try_start(Method::Get, "/users", false));
        assert!(!guard.try_start(Method::Get, "/users", false));
        assert!(guard.try_start(Method::Get, "/users", true));
        assert_eq!(guard.outstanding(), 2);
    }
}
