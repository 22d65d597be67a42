use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::access::HasOwner;
use crate::model::{ModelManager, Page, error::DatabaseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Enrollment,
    QuizPassed,
    CourseCompleted,
    AssignmentSubmitted,
    AssignmentGraded,
    CourseApproval,
    CourseAnnouncement,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enrollment => "enrollment",
            Self::QuizPassed => "quiz_passed",
            Self::CourseCompleted => "course_completed",
            Self::AssignmentSubmitted => "assignment_submitted",
            Self::AssignmentGraded => "assignment_graded",
            Self::CourseApproval => "course_approval",
            Self::CourseAnnouncement => "course_announcement",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Notification {
    id: Uuid,
    user_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    kind: String,
    title: String,
    message: String,
    related_id: Option<Uuid>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

/// One notification fanned out to many recipients.
#[derive(Debug, Clone)]
pub struct NotificationCreate {
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub related_id: Option<Uuid>,
}

impl Notification {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_read(&self) -> bool {
        self.is_read
    }

    pub fn related_id(&self) -> Option<Uuid> {
        self.related_id
    }

    /// Inserts the same notification for every user in `user_ids` in one statement.
    pub async fn create_for_users(
        mm: &ModelManager,
        user_ids: &[Uuid],
        data: &NotificationCreate,
    ) -> DatabaseResult<u64> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, type, title, message, related_id)
            SELECT gen_random_uuid(), recipient, $2, $3, $4, $5
            FROM UNNEST($1::uuid[]) AS recipient
            "#,
        )
        .bind(user_ids)
        .bind(data.kind.as_str())
        .bind(&data.title)
        .bind(&data.message)
        .bind(data.related_id)
        .execute(mm.executor())
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let notification = sqlx::query_as("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(notification)
    }

    pub async fn list(
        mm: &ModelManager,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Page<Self>> {
        let items = sqlx::query_as(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;

        let total = Self::count(mm, user_id, unread_only).await?;
        Ok(Page::new(items, total, limit, offset))
    }

    pub async fn count(mm: &ModelManager, user_id: Uuid, unread_only: bool) -> DatabaseResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR NOT is_read)",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(mm.executor())
        .await?;
        Ok(total)
    }

    pub async fn mark_read(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let notification =
            sqlx::query_as("UPDATE notifications SET is_read = TRUE WHERE id = $1 RETURNING *")
                .bind(id)
                .fetch_optional(mm.executor())
                .await?;
        Ok(notification)
    }

    pub async fn mark_all_read(mm: &ModelManager, user_id: Uuid) -> DatabaseResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
                .bind(user_id)
                .execute(mm.executor())
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let notification = sqlx::query_as("DELETE FROM notifications WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(notification)
    }

    pub async fn delete_all(mm: &ModelManager, user_id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(mm.executor())
            .await?;
        Ok(result.rows_affected())
    }
}

impl HasOwner for Notification {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_match_serde() {
        for kind in [
            NotificationType::Enrollment,
            NotificationType::QuizPassed,
            NotificationType::CourseCompleted,
            NotificationType::AssignmentSubmitted,
            NotificationType::AssignmentGraded,
            NotificationType::CourseApproval,
            NotificationType::CourseAnnouncement,
            NotificationType::System,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::from(kind.as_str()));
        }
    }
}
