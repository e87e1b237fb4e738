//! Named, in-process event bus with ordered listeners.
//!
//! Listeners run synchronously in registration order. A failing listener
//! stops the fan-out and its error is returned to the dispatcher's caller.

use crate::error::{CampaignError, CampaignResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type Listener<E> = Arc<dyn Fn(&mut E) -> anyhow::Result<()> + Send + Sync>;

/// Dispatch seam for lifecycle events of type `E`.
pub trait EventDispatcher<E>: Send + Sync {
    fn has_listeners(&self, name: &str) -> bool;

    fn dispatch(&self, name: &str, event: &mut E) -> CampaignResult<()>;
}

pub struct EventBus<E> {
    listeners: RwLock<HashMap<String, Vec<Listener<E>>>>,
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Append a listener for `name`. Listeners for one name run in the order
    /// they were added.
    pub fn add_listener<F>(&self, name: impl Into<String>, listener: F)
    where
        F: Fn(&mut E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .entry(name.into())
            .or_default()
            .push(Arc::new(listener));
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.read().get(name).map_or(0, Vec::len)
    }

    pub fn remove_listeners(&self, name: &str) -> usize {
        self.listeners.write().remove(name).map_or(0, |l| l.len())
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventDispatcher<E> for EventBus<E> {
    fn has_listeners(&self, name: &str) -> bool {
        self.listener_count(name) > 0
    }

    fn dispatch(&self, name: &str, event: &mut E) -> CampaignResult<()> {
        // Snapshot so a listener may register further listeners without deadlocking.
        let listeners: Vec<Listener<E>> = match self.listeners.read().get(name) {
            Some(listeners) => listeners.clone(),
            None => return Ok(()),
        };

        debug!(event = name, listeners = listeners.len(), "dispatching event");

        for listener in listeners {
            listener(event).map_err(|e| CampaignError::Listener {
                event: name.to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Convenience: create a shared bus.
pub fn event_bus<E>() -> Arc<EventBus<E>> {
    Arc::new(EventBus::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_listeners_run_in_registration_order() {
        let bus: EventBus<Vec<&'static str>> = EventBus::new();
        bus.add_listener("saved", |log: &mut Vec<&'static str>| {
            log.push("first");
            Ok(())
        });
        bus.add_listener("saved", |log: &mut Vec<&'static str>| {
            log.push("second");
            Ok(())
        });

        let mut log = Vec::new();
        bus.dispatch("saved", &mut log).unwrap();
        assert_eq!(log, vec!["first", "second"]);
    }

    #[test]
    fn test_failing_listener_aborts_remaining() {
        let bus: EventBus<Vec<&'static str>> = EventBus::new();
        bus.add_listener("saved", |_: &mut Vec<&'static str>| {
            Err(anyhow::anyhow!("rejected"))
        });
        bus.add_listener("saved", |log: &mut Vec<&'static str>| {
            log.push("never");
            Ok(())
        });

        let mut log = Vec::new();
        let err = bus.dispatch("saved", &mut log).unwrap_err();
        assert!(matches!(err, CampaignError::Listener { ref event, .. } if event == "saved"));
        assert!(log.is_empty());
    }

    #[test]
    fn test_has_listeners_per_name() {
        let bus: EventBus<u32> = EventBus::new();
        assert!(!bus.has_listeners("saved"));
        bus.add_listener("saved", |n: &mut u32| {
            *n += 1;
            Ok(())
        });
        assert!(bus.has_listeners("saved"));
        assert!(!bus.has_listeners("deleted"));

        let mut n = 0;
        bus.dispatch("deleted", &mut n).unwrap();
        assert_eq!(n, 0);

        assert_eq!(bus.remove_listeners("saved"), 1);
        assert!(!bus.has_listeners("saved"));
    }

    #[test]
    fn test_listener_can_register_during_dispatch() {
        let bus: Arc<EventBus<u32>> = event_bus();
        let inner = Arc::clone(&bus);
        bus.add_listener("saved", move |_: &mut u32| {
            inner.add_listener("later", |_: &mut u32| Ok(()));
            Ok(())
        });

        let mut n = 0;
        bus.dispatch("saved", &mut n).unwrap();
        assert!(bus.has_listeners("later"));
    }
}
