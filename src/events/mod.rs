//! Outbox for secondary effects.
//!
//! Handlers publish a [`DomainEvent`] after their primary write succeeded and
//! return immediately. The [`EventWorker`] consumes the queue and hands each
//! event to a [`Deliver`] target, retrying with backoff. Delivery failures
//! never reach the request that produced the event.

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::web::UserRole;

mod dispatcher;
pub use dispatcher::Dispatcher;

mod mailer;
pub use mailer::{LogMailer, Mailer, SmtpMailer};

mod template;
pub use template::{EmailTemplate, RenderedEmail, TemplateContext};

mod worker;
pub use worker::{Deliver, DeliveryError, EventWorker};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mailbox: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("unable to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("mail task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    UserRegistered {
        user_id: Uuid,
        name: String,
        email: String,
    },
    Enrolled {
        user_id: Uuid,
        course_id: Uuid,
        course_title: String,
    },
    QuizPassed {
        user_id: Uuid,
        quiz_id: Uuid,
        quiz_title: String,
        score: f64,
    },
    CourseCompleted {
        user_id: Uuid,
        course_id: Uuid,
        course_title: String,
    },
    AssignmentSubmitted {
        instructor_id: Uuid,
        assignment_id: Uuid,
        assignment_title: String,
        student_name: String,
    },
    SubmissionGraded {
        user_id: Uuid,
        submission_id: Uuid,
        assignment_title: String,
        score: i32,
        max_score: i32,
    },
    CoursePendingReview {
        course_id: Uuid,
        course_title: String,
    },
    CourseReviewed {
        instructor_id: Uuid,
        course_id: Uuid,
        course_title: String,
        approved: bool,
        reason: Option<String>,
    },
    CourseAnnouncement {
        course_id: Uuid,
        course_title: String,
        title: String,
        message: String,
    },
    SystemAnnouncement {
        title: String,
        message: String,
        role: Option<UserRole>,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserRegistered { .. } => "user_registered",
            Self::Enrolled { .. } => "enrolled",
            Self::QuizPassed { .. } => "quiz_passed",
            Self::CourseCompleted { .. } => "course_completed",
            Self::AssignmentSubmitted { .. } => "assignment_submitted",
            Self::SubmissionGraded { .. } => "submission_graded",
            Self::CoursePendingReview { .. } => "course_pending_review",
            Self::CourseReviewed { .. } => "course_reviewed",
            Self::CourseAnnouncement { .. } => "course_announcement",
            Self::SystemAnnouncement { .. } => "system_announcement",
        }
    }
}

/// Producer side of the outbox. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl EventBus {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueues the event. Never fails the caller: a closed queue is only logged.
    pub fn publish(&self, event: DomainEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            tracing::warn!(event = name, "event queue is closed, dropping event");
        } else {
            tracing::debug!(event = name, "event published");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_enqueues_in_order() {
        let (bus, mut rx) = EventBus::new();
        let first = DomainEvent::CoursePendingReview {
            course_id: Uuid::new_v4(),
            course_title: String::from("Rust"),
        };
        let second = DomainEvent::SystemAnnouncement {
            title: String::from("maintenance"),
            message: String::from("tonight"),
            role: None,
        };

        bus.publish(first.clone());
        bus.publish(second.clone());

        assert_eq!(rx.recv().await, Some(first));
        assert_eq!(rx.recv().await, Some(second));
    }

    #[test]
    fn publish_after_close_does_not_panic() {
        let (bus, rx) = EventBus::new();
        drop(rx);
        bus.publish(DomainEvent::CoursePendingReview {
            course_id: Uuid::new_v4(),
            course_title: String::from("gone"),
        });
    }
}
