//! # Observer
//!
//! Live feed of the protocol events of a [`crate::Client`]

use std::sync::{Arc, Weak};

/// Receives the replies and the errors of a client.
///
/// Observers are owned by the caller: the client only keeps a weak reference to them,
/// so dropping the observer is enough to stop receiving events.
pub trait EventObserver: Send + Sync {
    /// Called with the text of every reply read on the control channel and with every listing
    fn on_reply(&self, _reply: &str) {}

    /// Called with the description of every error
    fn on_error(&self, _error: &str) {}
}

/// Non-owning, ordered list of observers
#[derive(Default)]
pub(crate) struct Observers {
    observers: Vec<Weak<dyn EventObserver>>,
}

impl Observers {
    /// Add `observer` at the end of the list, unless it's already subscribed
    pub fn subscribe(&mut self, observer: Weak<dyn EventObserver>) {
        self.prune();
        if !self.contains(&observer) {
            self.observers.push(observer);
        }
    }

    /// Remove `observer` from the list, if subscribed
    pub fn unsubscribe(&mut self, observer: &Weak<dyn EventObserver>) {
        self.observers.retain(|x| !same_observer(x, observer));
        self.prune();
    }

    pub fn len(&self) -> usize {
        self.observers
            .iter()
            .filter(|x| x.strong_count() > 0)
            .count()
    }

    pub fn reply(&self, reply: &str) {
        self.snapshot().iter().for_each(|x| x.on_reply(reply));
    }

    pub fn error(&self, error: &str) {
        self.snapshot().iter().for_each(|x| x.on_error(error));
    }

    /// Observers alive at the time of the call, in subscription order
    fn snapshot(&self) -> Vec<Arc<dyn EventObserver>> {
        self.observers.iter().filter_map(Weak::upgrade).collect()
    }

    fn contains(&self, observer: &Weak<dyn EventObserver>) -> bool {
        self.observers.iter().any(|x| same_observer(x, observer))
    }

    fn prune(&mut self) {
        self.observers.retain(|x| x.strong_count() > 0);
    }
}

fn same_observer(a: &Weak<dyn EventObserver>, b: &Weak<dyn EventObserver>) -> bool {
    std::ptr::addr_eq(a.as_ptr(), b.as_ptr())
}
