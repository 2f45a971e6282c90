//! Fan-out policy: which bus endpoints receive gateway traffic.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// Destination selection for inbound traffic.
#[derive(Debug)]
pub enum FanOut {
    /// Every message goes to one fixed endpoint.
    Unicast(String),
    /// Every frame goes to all subscribers; HTTP requests go to the first one.
    Broadcast(ArcSwap<Vec<String>>),
}

impl FanOut {
    pub fn unicast(dst: impl Into<String>) -> Self {
        FanOut::Unicast(dst.into())
    }

    /// Broadcast with no subscribers yet.
    pub fn broadcast() -> Self {
        FanOut::Broadcast(ArcSwap::from_pointee(Vec::new()))
    }

    /// Destinations for one inbound WebSocket frame.
    pub fn destinations(&self) -> Arc<Vec<String>> {
        match self {
            FanOut::Unicast(dst) => Arc::new(vec![dst.clone()]),
            FanOut::Broadcast(subscribers) => subscribers.load_full(),
        }
    }

    /// Destination for one HTTP request, if any.
    pub fn request_target(&self) -> Option<String> {
        match self {
            FanOut::Unicast(dst) => Some(dst.clone()),
            FanOut::Broadcast(subscribers) => subscribers.load().first().cloned(),
        }
    }

    /// Add a subscriber. Returns `false` for unicast or an existing subscriber.
    pub fn subscribe(&self, name: &str) -> bool {
        let FanOut::Broadcast(subscribers) = self else {
            return false;
        };
        let mut added = false;
        subscribers.rcu(|current| {
            added = !current.iter().any(|s| s == name);
            let mut next = Vec::clone(current);
            if added {
                next.push(name.to_string());
            }
            next
        });
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unicast_targets_fixed_destination() {
        let fanout = FanOut::unicast("worker");
        assert_eq!(*fanout.destinations(), vec!["worker".to_string()]);
        assert_eq!(fanout.request_target().as_deref(), Some("worker"));
        assert!(!fanout.subscribe("other"));
        assert_eq!(fanout.destinations().len(), 1);
    }

    #[test]
    fn broadcast_collects_subscribers_in_order() {
        let fanout = FanOut::broadcast();
        assert!(fanout.destinations().is_empty());
        assert_eq!(fanout.request_target(), None);

        assert!(fanout.subscribe("a"));
        assert!(fanout.subscribe("b"));
        assert!(!fanout.subscribe("a"));

        assert_eq!(*fanout.destinations(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(fanout.request_target().as_deref(), Some("a"));
    }
}
