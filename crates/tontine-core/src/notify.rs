//! Notification boundary.
//!
//! Operations collect notifications while their transaction runs and hand
//! them to the [`Notifier`] only after the commit succeeded. Delivery is
//! fire-and-forget: a notifier cannot fail the operation that produced the
//! event.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::models::{CycleId, InvitationId, UserId};

/// Who should hear about an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", content = "to", rename_all = "snake_case")]
pub enum Recipient {
    User(UserId),
    Email(String),
    Phone(String),
}

/// Events the core reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    InvitationSent {
        invitation: InvitationId,
        invited_by: UserId,
    },
    /// Contribution expected; `overdue` marks reminders for late payments.
    PaymentDue {
        cycle: CycleId,
        amount: Decimal,
        due_at: DateTime<Utc>,
        overdue: bool,
    },
    PaymentReceived {
        cycle: CycleId,
        from: UserId,
        amount: Decimal,
    },
    CycleCompleted {
        cycle: CycleId,
        recipient: Option<UserId>,
        pot: Decimal,
    },
}

/// Delivery channel for events (email, SMS, push...).
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &Event, recipients: &[Recipient]);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, event: &Event, recipients: &[Recipient]) {
        (**self).notify(event, recipients)
    }
}

/// Logs every event at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: &Event, recipients: &[Recipient]) {
        info!(?event, recipients = recipients.len(), "notification");
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: &Event, _recipients: &[Recipient]) {}
}

/// Notifications staged by one transaction attempt.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    pending: Vec<(Event, Vec<Recipient>)>,
}

impl Outbox {
    pub(crate) fn push(&mut self, event: Event, recipients: Vec<Recipient>) {
        if !recipients.is_empty() {
            self.pending.push((event, recipients));
        }
    }

    pub(crate) fn deliver(self, notifier: &impl Notifier) {
        for (event, recipients) in self.pending {
            notifier.notify(&event, &recipients);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GroupId;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Event>>);

    impl Notifier for Collect {
        fn notify(&self, event: &Event, _recipients: &[Recipient]) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn outbox_skips_events_without_recipients() {
        let cycle = CycleId::new(GroupId::new("g"), 1);
        let mut outbox = Outbox::default();
        outbox.push(
            Event::CycleCompleted {
                cycle: cycle.clone(),
                recipient: None,
                pot: Decimal::ZERO,
            },
            vec![],
        );
        outbox.push(
            Event::PaymentReceived {
                cycle,
                from: UserId::new("bo"),
                amount: Decimal::ONE,
            },
            vec![Recipient::User(UserId::new("ada"))],
        );

        let sink = Arc::new(Collect::default());
        outbox.deliver(&sink);
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = Event::InvitationSent {
            invitation: InvitationId::new(GroupId::new("g"), "t"),
            invited_by: UserId::new("ada"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "invitation_sent");
    }
}
