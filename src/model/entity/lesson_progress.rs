use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::{ModelManager, error::DatabaseResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct LessonProgress {
    id: Uuid,
    user_id: Uuid,
    lesson_id: Uuid,
    is_completed: bool,
    completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    pub fn lesson_id(&self) -> Uuid {
        self.lesson_id
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Upserts the completion row. Completing twice keeps the first `completed_at`.
    pub async fn mark_completed(
        mm: &ModelManager,
        user_id: Uuid,
        lesson_id: Uuid,
    ) -> DatabaseResult<Self> {
        let progress = sqlx::query_as(
            r#"
            INSERT INTO lesson_progress (id, user_id, lesson_id, is_completed, completed_at)
            VALUES ($1, $2, $3, TRUE, now())
            ON CONFLICT (user_id, lesson_id) DO UPDATE SET
                is_completed = TRUE,
                completed_at = COALESCE(lesson_progress.completed_at, EXCLUDED.completed_at)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(lesson_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(progress)
    }

    /// `(completed, total)` lessons of a course for one user.
    pub async fn counts_for_course(
        mm: &ModelManager,
        user_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<(i64, i64)> {
        let counts: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(lp.id) FILTER (WHERE lp.is_completed) AS completed,
                COUNT(l.id) AS total
            FROM lessons l
            JOIN modules m ON m.id = l.module_id
            LEFT JOIN lesson_progress lp ON lp.lesson_id = l.id AND lp.user_id = $1
            WHERE m.course_id = $2
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(counts)
    }

    pub async fn completed_in_course(
        mm: &ModelManager,
        user_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT lp.lesson_id
            FROM lesson_progress lp
            JOIN lessons l ON l.id = lp.lesson_id
            JOIN modules m ON m.id = l.module_id
            WHERE lp.user_id = $1 AND m.course_id = $2 AND lp.is_completed
            ORDER BY lp.completed_at
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(ids)
    }
}
