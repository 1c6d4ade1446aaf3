//! Fan-out of parsed events to the presenter and the counters.

use std::sync::Arc;

use storedesk_shared::Event;

use crate::alerts::AlertPresenter;
use crate::stores::CounterStore;

/// Receives every well-formed event, in channel order.
///
/// Called with the manager's lock held: implementations must not call back
/// into the [`StreamManager`](super::StreamManager).
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: Event);
}

/// Alerts the operator, then bumps the matching counter.
#[derive(Clone)]
pub struct Notifier {
    presenter: Arc<dyn AlertPresenter>,
    counters: CounterStore,
}

impl Notifier {
    pub fn new(presenter: Arc<dyn AlertPresenter>, counters: CounterStore) -> Self {
        Self {
            presenter,
            counters,
        }
    }
}

impl EventSink for Notifier {
    fn deliver(&self, event: Event) {
        self.presenter.present(&event);
        self.counters.record(&event);
    }
}
