use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::access::HasOwner;
use crate::model::progress::CourseProgress;
use crate::model::{
    ModelManager,
    error::{DatabaseError, DatabaseResult},
    repo::CrudRepository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl From<&str> for EnrollmentStatus {
    fn from(value: &str) -> Self {
        match value {
            "completed" => Self::Completed,
            _ => Self::Active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Enrollment {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    status: String,
    progress: i32,
    enrolled_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    instructor_id: Uuid,
    course_title: String,
}

#[derive(Debug)]
pub struct EnrollmentCreate {
    pub user_id: Uuid,
    pub course_id: Uuid,
}

/// Manual correction of an enrollment; regular progress flows in through the cascade.
#[derive(Debug, Default)]
pub struct EnrollmentUpdate {
    pub status: Option<EnrollmentStatus>,
    pub progress: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct EnrollmentWithStudent {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub student_name: String,
    pub student_email: String,
}

#[derive(Debug, FromRow)]
struct ProgressUpdateRow {
    #[sqlx(flatten)]
    enrollment: Enrollment,
    previous_status: String,
}

impl Enrollment {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn course_title(&self) -> &str {
        &self.course_title
    }

    pub fn status(&self) -> EnrollmentStatus {
        EnrollmentStatus::from(self.status.as_str())
    }

    pub fn progress(&self) -> i32 {
        self.progress
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

/// Owned by the course instructor; the enrolled student is the subject.
impl HasOwner for Enrollment {
    fn owner_id(&self) -> Uuid {
        self.instructor_id
    }
}

static SELECT_ENROLLMENT: &str = r#"
    SELECT e.*, c.instructor_id, c.title AS course_title
    FROM enrollments e
    JOIN courses c ON c.id = e.course_id
"#;

#[async_trait]
impl CrudRepository for Enrollment {
    type Id = Uuid;
    type Create = EnrollmentCreate;
    type Update = EnrollmentUpdate;

    async fn create(mm: &ModelManager, data: EnrollmentCreate) -> DatabaseResult<Self> {
        let id = Uuid::new_v4();
        let inserted = sqlx::query(
            r#"
            INSERT INTO enrollments (id, user_id, course_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, course_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(data.user_id)
        .bind(data.course_id)
        .execute(mm.executor())
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(DatabaseError::Conflict("already enrolled in this course"));
        }

        Self::find_by_id(mm, id).await?.ok_or(DatabaseError::NotFound)
    }

    async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let enrollment = sqlx::query_as(&format!("{SELECT_ENROLLMENT} WHERE e.id = $1"))
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(enrollment)
    }

    async fn update(mm: &ModelManager, id: Uuid, data: EnrollmentUpdate) -> DatabaseResult<Option<Self>> {
        let updated = sqlx::query(
            r#"
            UPDATE enrollments SET
                status = COALESCE($2, status),
                progress = COALESCE($3, progress),
                completed_at = CASE WHEN $2 = 'completed' THEN COALESCE(completed_at, now()) ELSE completed_at END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(data.status.map(|s| s.as_str()))
        .bind(data.progress.map(|p| p.clamp(0, 100)))
        .execute(mm.executor())
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        Self::find_by_id(mm, id).await
    }

    async fn delete(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let Some(enrollment) = Self::find_by_id(mm, id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM enrollments WHERE id = $1")
            .bind(id)
            .execute(mm.executor())
            .await?;
        Ok(Some(enrollment))
    }
}

impl Enrollment {
    pub async fn find_for(
        mm: &ModelManager,
        user_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let enrollment = sqlx::query_as(&format!(
            "{SELECT_ENROLLMENT} WHERE e.user_id = $1 AND e.course_id = $2"
        ))
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(mm.executor())
        .await?;
        Ok(enrollment)
    }

    /// Both active and completed enrollments grant access to course content.
    pub async fn is_enrolled(mm: &ModelManager, user_id: Uuid, course_id: Uuid) -> DatabaseResult<bool> {
        let enrolled: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2 AND status IN ('active', 'completed'))",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(enrolled)
    }

    pub async fn by_user(mm: &ModelManager, user_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let enrollments = sqlx::query_as(&format!(
            "{SELECT_ENROLLMENT} WHERE e.user_id = $1 ORDER BY e.enrolled_at DESC"
        ))
        .bind(user_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(enrollments)
    }

    pub async fn by_course(
        mm: &ModelManager,
        course_id: Uuid,
    ) -> DatabaseResult<Vec<EnrollmentWithStudent>> {
        let enrollments = sqlx::query_as(
            r#"
            SELECT e.*, c.instructor_id, c.title AS course_title,
                u.name AS student_name, u.email AS student_email
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            JOIN users u ON u.id = e.user_id
            WHERE e.course_id = $1
            ORDER BY e.enrolled_at DESC
            "#,
        )
        .bind(course_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(enrollments)
    }

    pub async fn student_ids(mm: &ModelManager, course_id: Uuid) -> DatabaseResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar("SELECT user_id FROM enrollments WHERE course_id = $1")
            .bind(course_id)
            .fetch_all(mm.executor())
            .await?;
        Ok(ids)
    }

    /// Writes recomputed progress. Returns the updated enrollment and whether
    /// this write moved it into `completed`, or `None` if the user is not enrolled.
    pub async fn apply_progress(
        mm: &ModelManager,
        user_id: Uuid,
        course_id: Uuid,
        progress: &CourseProgress,
    ) -> DatabaseResult<Option<(Self, bool)>> {
        let row: Option<ProgressUpdateRow> = sqlx::query_as(
            r#"
            WITH prev AS (
                SELECT id, status FROM enrollments
                WHERE user_id = $1 AND course_id = $2
                FOR UPDATE
            ), updated AS (
                UPDATE enrollments e SET
                    progress = $3,
                    status = CASE WHEN $4 THEN 'completed' ELSE e.status END,
                    completed_at = CASE WHEN $4 THEN COALESCE(e.completed_at, now()) ELSE e.completed_at END
                FROM prev
                WHERE e.id = prev.id
                RETURNING e.*, prev.status AS previous_status
            )
            SELECT updated.*, c.instructor_id, c.title AS course_title
            FROM updated
            JOIN courses c ON c.id = updated.course_id
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(progress.percentage)
        .bind(progress.is_complete())
        .fetch_optional(mm.executor())
        .await?;

        Ok(row.map(|row| {
            let became_completed = row.previous_status != EnrollmentStatus::Completed.as_str()
                && row.enrollment.status() == EnrollmentStatus::Completed;
            (row.enrollment, became_completed)
        }))
    }
}
