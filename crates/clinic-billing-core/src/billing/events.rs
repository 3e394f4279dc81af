//! Outbound visit events, published only after a transaction commits.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::BillingResult;
use crate::db::Database;
use crate::models::Visit;

/// What happened to the visit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VisitEventType {
    Created,
    Updated,
    Deleted,
}

impl VisitEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitEventType::Created => "created",
            VisitEventType::Updated => "updated",
            VisitEventType::Deleted => "deleted",
        }
    }
}

/// A visit with its patient and doctor resolved, as listeners want to display it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitView {
    #[serde(flatten)]
    pub visit: Visit,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
}

impl VisitView {
    /// Resolve relations for a visit.
    pub fn load(db: &Database, visit: Visit) -> BillingResult<Self> {
        let patient_name = db.get_patient(&visit.patient_id)?.map(|p| p.name);
        let doctor_name = match &visit.doctor_id {
            Some(id) => db.get_doctor(id)?.map(|d| d.name),
            None => None,
        };
        Ok(Self {
            visit,
            patient_name,
            doctor_name,
        })
    }
}

/// Event delivered to real-time listeners.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitEvent {
    #[serde(rename = "type")]
    pub event_type: VisitEventType,
    pub visit: VisitView,
}

impl VisitEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Publish an event for a visit whose change has already been committed.
///
/// Relation lookup failures only cost the resolved names; the event still goes out.
pub(crate) fn publish_committed(
    db: &Database,
    publisher: &dyn EventPublisher,
    event_type: VisitEventType,
    visit: Visit,
) {
    let view = match VisitView::load(db, visit.clone()) {
        Ok(view) => view,
        Err(e) => {
            tracing::warn!(visit_id = %visit.id, error = %e, "Could not resolve visit relations for event");
            VisitView {
                visit,
                patient_name: None,
                doctor_name: None,
            }
        }
    };
    publisher.publish(VisitEvent {
        event_type,
        visit: view,
    });
}

/// Sink for committed visit changes.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: VisitEvent);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: VisitEvent) {}
}

/// Events an `Outbox` keeps by default before dropping the oldest.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 1024;

/// In-memory queue the host drains and forwards to its notification channel.
///
/// Bounded: once `capacity` events are waiting, each new event evicts the oldest.
#[derive(Debug)]
pub struct Outbox {
    events: Mutex<VecDeque<VisitEvent>>,
    capacity: usize,
}

impl Default for Outbox {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_OUTBOX_CAPACITY)
    }
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// An outbox holding at most `capacity` undrained events (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove and return everything queued so far, oldest first.
    pub fn take(&self) -> Vec<VisitEvent> {
        let drained = match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        drained.into()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, events: &mut VecDeque<VisitEvent>, event: VisitEvent) {
        while events.len() >= self.capacity {
            if let Some(dropped) = events.pop_front() {
                tracing::warn!(
                    visit_id = %dropped.visit.visit.id,
                    event_type = dropped.event_type.as_str(),
                    capacity = self.capacity,
                    "Event queue full, dropped oldest undrained event"
                );
            }
        }
        events.push_back(event);
    }
}

impl EventPublisher for Outbox {
    fn publish(&self, event: VisitEvent) {
        tracing::debug!(
            visit_id = %event.visit.visit.id,
            event_type = event.event_type.as_str(),
            "Queued visit event"
        );
        match self.events.lock() {
            Ok(mut events) => self.push(&mut events, event),
            Err(poisoned) => self.push(&mut poisoned.into_inner(), event),
        }
    }
}
