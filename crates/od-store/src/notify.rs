//! Change notifications.
//!
//! Collaborators (selection, views, exporters) subscribe with a callback
//! and receive the batched events of each committed transaction, undo, or
//! redo — synchronously, on the mutating control flow. There is no
//! implicit reactivity: reacting is the subscriber's job.

use od_core::ObjectId;

/// One observable graph change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A subtree was inserted; `object` is its root.
    Added { object: ObjectId },
    /// A subtree was removed; `object` is its (former) root.
    Removed { object: ObjectId },
    /// A plain property value changed on `object`. Assignments that swap
    /// an owned child report `Added`/`Removed` of the child instead.
    Updated { object: ObjectId, property: String },
    /// `object` moved within its owning array.
    Moved { object: ObjectId },
}

impl ChangeEvent {
    pub fn object(&self) -> ObjectId {
        match self {
            ChangeEvent::Added { object }
            | ChangeEvent::Removed { object }
            | ChangeEvent::Updated { object, .. }
            | ChangeEvent::Moved { object } => *object,
        }
    }
}

/// Handle for removing a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback = Box<dyn FnMut(&[ChangeEvent])>;

/// Registered observers, notified in subscription order.
#[derive(Default)]
pub struct ObserverList {
    observers: Vec<(ObserverId, Callback)>,
    next: u64,
}

impl ObserverList {
    pub fn subscribe(&mut self, callback: impl FnMut(&[ChangeEvent]) + 'static) -> ObserverId {
        let id = ObserverId(self.next);
        self.next += 1;
        self.observers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscription. Unknown IDs are ignored.
    pub fn unsubscribe(&mut self, id: ObserverId) {
        self.observers.retain(|(o, _)| *o != id);
    }

    pub fn notify(&mut self, events: &[ChangeEvent]) {
        if events.is_empty() {
            return;
        }
        for (_, callback) in &mut self.observers {
            callback(events);
        }
    }
}
