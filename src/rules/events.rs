//! commit event bus
//!
//! every store commit emits one [`CommitEvent`], synchronously, before the
//! triggering `use_value`/`apply` call returns. this replaces a raw
//! commit callback with a subscribable seam for a surrounding
//! presentation layer.

use std::cell::RefCell;
use std::rc::Rc;

use crate::store::DisplayState;

/// a resolved `(value, display)` pair committed for one field
///
/// `None` parts were null-marked: the store entry was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEvent {
    pub key: String,
    pub value: Option<String>,
    pub display: Option<DisplayState>,
}

type Subscriber = Box<dyn Fn(&CommitEvent)>;

/// shared handle to a [`CommitBus`]
pub type SharedCommitBus = Rc<CommitBus>;

/// subscriber list shared between the manager and its evaluators
#[derive(Default)]
pub struct CommitBus {
    subscribers: RefCell<Vec<Subscriber>>,
}

impl CommitBus {
    pub fn new() -> SharedCommitBus {
        Rc::new(Self::default())
    }

    /// register a subscriber; invoked synchronously on every commit
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&CommitEvent) + 'static,
    {
        self.subscribers.borrow_mut().push(Box::new(subscriber));
    }

    /// notify all subscribers of one commit
    ///
    /// subscribers may re-enter the engine, but must not subscribe from
    /// inside a notification.
    pub fn emit(&self, event: &CommitEvent) {
        for subscriber in self.subscribers.borrow().iter() {
            subscriber(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_emit_reaches_every_subscriber() {
        let bus = CommitBus::new();
        let seen = Rc::new(Cell::new(0));

        for _ in 0..3 {
            let seen = Rc::clone(&seen);
            bus.subscribe(move |_| seen.set(seen.get() + 1));
        }

        bus.emit(&CommitEvent {
            key: "a".into(),
            value: Some("1".into()),
            display: None,
        });
        assert_eq!(seen.get(), 3);
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = CommitBus::new();
        bus.emit(&CommitEvent {
            key: "a".into(),
            value: None,
            display: None,
        });
    }
}
