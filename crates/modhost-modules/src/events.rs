use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Loaded { name: String },
    Unloaded { name: String },
    AllLoaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Box<dyn Fn(&LifecycleEvent) -> anyhow::Result<()> + Send + Sync>;

/// Lifecycle listeners, invoked in registration order.
#[derive(Default)]
pub struct LifecycleHandlers {
    next_id: u64,
    handlers: Vec<(HandlerId, Handler)>,
}

impl LifecycleHandlers {
    pub fn add<F>(&mut self, handler: F) -> HandlerId
    where
        F: Fn(&LifecycleEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn remove(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        before != self.handlers.len()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// A failing handler is logged; the rest still run.
    pub fn dispatch(&self, event: &LifecycleEvent) {
        for (id, handler) in &self.handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {},
                Ok(Err(e)) => warn!(handler = id.0, ?event, "lifecycle handler failed: {e:#}"),
                Err(_) => warn!(handler = id.0, ?event, "lifecycle handler panicked"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;

    use super::*;

    #[test]
    fn handlers_run_in_order_and_failures_are_isolated() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut handlers = LifecycleHandlers::default();

        let log = seen.clone();
        handlers.add(move |event| {
            log.lock().expect("seen").push(format!("first {event:?}"));
            Err(anyhow!("first handler failed"))
        });
        handlers.add(|_| panic!("second handler exploded"));
        let log = seen.clone();
        handlers.add(move |event| {
            log.lock().expect("seen").push(format!("third {event:?}"));
            Ok(())
        });

        handlers.dispatch(&LifecycleEvent::AllLoaded);

        assert_eq!(
            *seen.lock().expect("seen"),
            vec!["first AllLoaded".to_string(), "third AllLoaded".to_string()]
        );
    }

    #[test]
    fn removed_handler_is_not_invoked() {
        let seen = Arc::new(Mutex::new(0_u32));
        let mut handlers = LifecycleHandlers::default();
        let count = seen.clone();
        let id = handlers.add(move |_| {
            *count.lock().expect("count") += 1;
            Ok(())
        });

        assert!(handlers.remove(id));
        assert!(!handlers.remove(id));
        assert!(handlers.is_empty());
        handlers.dispatch(&LifecycleEvent::Loaded {
            name: "alpha".to_string(),
        });
        assert_eq!(*seen.lock().expect("count"), 0);
    }
}
