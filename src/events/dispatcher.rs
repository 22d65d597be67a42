use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::events::{
    Deliver, DeliveryError, DomainEvent, EmailTemplate, Mailer, TemplateContext,
};
use crate::model::{
    CrudRepository, ModelManager,
    entity::{Enrollment, Notification, NotificationCreate, NotificationType, UserEntity},
};
use crate::web::UserRole;

/// Production delivery target: notification rows plus templated mail.
///
/// Notification rows are the durable part of a delivery; a failed insert is
/// returned so the worker retries it. Mail is sent last and a failure there is
/// only logged, so a retry never duplicates notifications.
pub struct Dispatcher {
    mm: ModelManager,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
}

impl Dispatcher {
    pub fn new(mm: ModelManager, mailer: Arc<dyn Mailer>, frontend_url: impl Into<String>) -> Self {
        Self {
            mm,
            mailer,
            frontend_url: frontend_url.into(),
        }
    }

    async fn notify(
        &self,
        recipients: &[Uuid],
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        related_id: Option<Uuid>,
    ) -> Result<(), DeliveryError> {
        let data = NotificationCreate {
            kind,
            title: title.into(),
            message: message.into(),
            related_id,
        };
        let created = Notification::create_for_users(&self.mm, recipients, &data).await?;
        tracing::debug!(kind = kind.as_str(), created, "notifications written");
        Ok(())
    }

    /// Mails a registered user. Unknown users and mail failures are logged only.
    async fn mail_user(&self, user_id: Uuid, template: EmailTemplate, mut context: TemplateContext) {
        let user = match UserEntity::find_by_id(&self.mm, user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "unable to load mail recipient");
                return;
            }
        };
        context.insert("name", user.name().to_string());
        self.mail(user.email(), template, context).await;
    }

    async fn mail(&self, to: &str, template: EmailTemplate, mut context: TemplateContext) {
        context.insert("frontend_url", self.frontend_url.clone());
        let email = template.render(&context);
        if let Err(e) = self.mailer.send(to, email).await {
            tracing::warn!(?template, error = %e, "unable to send mail");
        }
    }
}

#[async_trait]
impl Deliver for Dispatcher {
    async fn deliver(&self, event: &DomainEvent) -> Result<(), DeliveryError> {
        match event {
            DomainEvent::UserRegistered { name, email, .. } => {
                let context = TemplateContext::from([("name", name.clone())]);
                self.mail(email, EmailTemplate::Welcome, context).await;
            }
            DomainEvent::Enrolled {
                user_id,
                course_id,
                course_title,
            } => {
                self.notify(
                    &[*user_id],
                    NotificationType::Enrollment,
                    "Enrollment confirmed",
                    format!("You are now enrolled in \"{course_title}\"."),
                    Some(*course_id),
                )
                .await?;
                let context = TemplateContext::from([
                    ("course_title", course_title.clone()),
                    ("course_id", course_id.to_string()),
                ]);
                self.mail_user(*user_id, EmailTemplate::EnrollmentConfirmation, context)
                    .await;
            }
            DomainEvent::QuizPassed {
                user_id,
                quiz_id,
                quiz_title,
                score,
            } => {
                self.notify(
                    &[*user_id],
                    NotificationType::QuizPassed,
                    "Quiz passed",
                    format!("You passed \"{quiz_title}\" with {score:.0}%."),
                    Some(*quiz_id),
                )
                .await?;
            }
            DomainEvent::CourseCompleted {
                user_id,
                course_id,
                course_title,
            } => {
                self.notify(
                    &[*user_id],
                    NotificationType::CourseCompleted,
                    "Course completed",
                    format!("Congratulations! You completed \"{course_title}\"."),
                    Some(*course_id),
                )
                .await?;
                let context = TemplateContext::from([("course_title", course_title.clone())]);
                self.mail_user(*user_id, EmailTemplate::CourseCompleted, context)
                    .await;
            }
            DomainEvent::AssignmentSubmitted {
                instructor_id,
                assignment_id,
                assignment_title,
                student_name,
            } => {
                self.notify(
                    &[*instructor_id],
                    NotificationType::AssignmentSubmitted,
                    "New submission",
                    format!("{student_name} submitted \"{assignment_title}\"."),
                    Some(*assignment_id),
                )
                .await?;
            }
            DomainEvent::SubmissionGraded {
                user_id,
                submission_id,
                assignment_title,
                score,
                max_score,
            } => {
                self.notify(
                    &[*user_id],
                    NotificationType::AssignmentGraded,
                    "Assignment graded",
                    format!("\"{assignment_title}\" was graded: {score}/{max_score}."),
                    Some(*submission_id),
                )
                .await?;
                let context = TemplateContext::from([
                    ("assignment_title", assignment_title.clone()),
                    ("score", score.to_string()),
                    ("max_score", max_score.to_string()),
                ]);
                self.mail_user(*user_id, EmailTemplate::AssignmentGraded, context)
                    .await;
            }
            DomainEvent::CoursePendingReview {
                course_id,
                course_title,
            } => {
                let admins = UserEntity::ids_by_role(&self.mm, Some(UserRole::Admin)).await?;
                self.notify(
                    &admins,
                    NotificationType::CourseApproval,
                    "Course awaiting review",
                    format!("\"{course_title}\" was submitted for review."),
                    Some(*course_id),
                )
                .await?;
            }
            DomainEvent::CourseReviewed {
                instructor_id,
                course_id,
                course_title,
                approved,
                reason,
            } => {
                let (title, message, template) = if *approved {
                    (
                        "Course approved",
                        format!("\"{course_title}\" was approved and published."),
                        EmailTemplate::CourseApproved,
                    )
                } else {
                    (
                        "Course rejected",
                        format!(
                            "\"{course_title}\" was rejected: {}",
                            reason.as_deref().unwrap_or("no reason given")
                        ),
                        EmailTemplate::CourseRejected,
                    )
                };
                self.notify(
                    &[*instructor_id],
                    NotificationType::CourseApproval,
                    title,
                    message,
                    Some(*course_id),
                )
                .await?;
                let context = TemplateContext::from([
                    ("course_title", course_title.clone()),
                    (
                        "reason",
                        reason.clone().unwrap_or_else(|| String::from("no reason given")),
                    ),
                ]);
                self.mail_user(*instructor_id, template, context).await;
            }
            DomainEvent::CourseAnnouncement {
                course_id,
                course_title,
                title,
                message,
            } => {
                let students = Enrollment::student_ids(&self.mm, *course_id).await?;
                self.notify(
                    &students,
                    NotificationType::CourseAnnouncement,
                    format!("{course_title}: {title}"),
                    message.clone(),
                    Some(*course_id),
                )
                .await?;
            }
            DomainEvent::SystemAnnouncement {
                title,
                message,
                role,
            } => {
                let recipients = UserEntity::ids_by_role(&self.mm, *role).await?;
                self.notify(
                    &recipients,
                    NotificationType::System,
                    title.clone(),
                    message.clone(),
                    None,
                )
                .await?;
            }
        }
        Ok(())
    }
}
