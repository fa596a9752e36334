//! Synchronous viewport change notification.
//!
//! Callbacks run inline, in subscription order, once per mutation. The list
//! is snapshotted before delivery and each entry is re-checked right before
//! its callback runs, so a callback may unsubscribe itself or any other
//! subscriber and that subscriber receives nothing further, including later
//! in the same delivery pass. Subscribers added during a pass start receiving
//! on the next mutation.

#[cfg(test)]
#[path = "subscribe_test.rs"]
mod subscribe_test;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::camera::Viewport;

type Callback = Rc<dyn Fn(&Viewport)>;

#[derive(Default)]
struct SubscriberList {
    next_id: u64,
    entries: Vec<(u64, Callback)>,
}

impl SubscriberList {
    fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }
}

/// Set of viewport subscribers shared by an engine and its handles.
#[derive(Clone, Default)]
pub struct Subscribers {
    inner: Rc<RefCell<SubscriberList>>,
}

impl Subscribers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`; it runs on every subsequent viewport change.
    pub fn subscribe(&self, callback: impl Fn(&Viewport) + 'static) -> Subscription {
        let mut list = self.inner.borrow_mut();
        let id = list.next_id;
        list.next_id += 1;
        list.entries.push((id, Rc::new(callback)));
        Subscription { list: Rc::downgrade(&self.inner), id }
    }

    /// Deliver `viewport` to every live subscriber.
    pub fn notify(&self, viewport: &Viewport) {
        let snapshot = self.inner.borrow().entries.clone();
        for (id, callback) in snapshot {
            if self.inner.borrow().contains(id) {
                callback(viewport);
            }
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by [`Subscribers::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Clone)]
pub struct Subscription {
    list: Weak<RefCell<SubscriberList>>,
    id: u64,
}

impl Subscription {
    /// Stop delivery to this subscriber. Idempotent.
    pub fn unsubscribe(&self) {
        if let Some(list) = self.list.upgrade() {
            list.borrow_mut().entries.retain(|(id, _)| *id != self.id);
        }
    }

    /// Whether the subscriber is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.list.upgrade().is_some_and(|list| list.borrow().contains(self.id))
    }
}
