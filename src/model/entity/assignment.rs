use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::access::HasOwner;
use crate::model::{
    ModelManager,
    error::{DatabaseError, DatabaseResult},
    repo::CrudRepository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionType {
    Text,
    File,
}

impl SubmissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
        }
    }
}

impl From<&str> for SubmissionType {
    fn from(value: &str) -> Self {
        match value {
            "file" => Self::File,
            _ => Self::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Assignment {
    id: Uuid,
    lesson_id: Uuid,
    title: String,
    description: String,
    instructions: String,
    due_date: Option<DateTime<Utc>>,
    max_score: i32,
    submission_type: String,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    course_id: Uuid,
    instructor_id: Uuid,
}

#[derive(Debug)]
pub struct AssignmentCreate {
    pub lesson_id: Uuid,
    pub title: String,
    pub description: String,
    pub instructions: String,
    pub due_date: Option<DateTime<Utc>>,
    pub max_score: Option<i32>,
    pub submission_type: SubmissionType,
}

#[derive(Debug, Default)]
pub struct AssignmentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub max_score: Option<i32>,
    pub submission_type: Option<SubmissionType>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct AssignmentStatistics {
    pub total_submissions: i64,
    pub graded_submissions: i64,
    pub late_submissions: i64,
    pub average_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UpcomingAssignment {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub assignment: Assignment,
    pub course_title: String,
    pub submitted: bool,
}

impl Assignment {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn lesson_id(&self) -> Uuid {
        self.lesson_id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn instructor_id(&self) -> Uuid {
        self.instructor_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn max_score(&self) -> i32 {
        self.max_score
    }

    pub fn submission_type(&self) -> SubmissionType {
        SubmissionType::from(self.submission_type.as_str())
    }

    pub fn is_published(&self) -> bool {
        self.is_published
    }

    /// A submission made at `at` is late when it comes after the due date.
    pub fn is_late_at(&self, at: DateTime<Utc>) -> bool {
        self.due_date.is_some_and(|due| at > due)
    }

    pub fn accepts_score(&self, score: i32) -> bool {
        (0..=self.max_score).contains(&score)
    }
}

impl HasOwner for Assignment {
    fn owner_id(&self) -> Uuid {
        self.instructor_id
    }
}

static SELECT_ASSIGNMENT: &str = r#"
    SELECT a.*, m.course_id, c.instructor_id
    FROM assignments a
    JOIN lessons l ON l.id = a.lesson_id
    JOIN modules m ON m.id = l.module_id
    JOIN courses c ON c.id = m.course_id
"#;

#[async_trait]
impl CrudRepository for Assignment {
    type Id = Uuid;
    type Create = AssignmentCreate;
    type Update = AssignmentUpdate;

    async fn create(mm: &ModelManager, data: AssignmentCreate) -> DatabaseResult<Self> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO assignments (id, lesson_id, title, description, instructions, due_date, max_score, submission_type)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 100), $8)
            "#,
        )
        .bind(id)
        .bind(data.lesson_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.instructions)
        .bind(data.due_date)
        .bind(data.max_score)
        .bind(data.submission_type.as_str())
        .execute(mm.executor())
        .await?;

        Self::find_by_id(mm, id).await?.ok_or(DatabaseError::NotFound)
    }

    async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let assignment = sqlx::query_as(&format!("{SELECT_ASSIGNMENT} WHERE a.id = $1"))
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(assignment)
    }

    async fn update(
        mm: &ModelManager,
        id: Uuid,
        data: AssignmentUpdate,
    ) -> DatabaseResult<Option<Self>> {
        let updated = sqlx::query(
            r#"
            UPDATE assignments SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                instructions = COALESCE($4, instructions),
                due_date = COALESCE($5, due_date),
                max_score = COALESCE($6, max_score),
                submission_type = COALESCE($7, submission_type),
                is_published = COALESCE($8, is_published),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.instructions)
        .bind(data.due_date)
        .bind(data.max_score)
        .bind(data.submission_type.map(|s| s.as_str()))
        .bind(data.is_published)
        .execute(mm.executor())
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        Self::find_by_id(mm, id).await
    }

    async fn delete(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let Some(assignment) = Self::find_by_id(mm, id).await? else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(id)
            .execute(mm.executor())
            .await?;
        Ok(Some(assignment))
    }
}

impl Assignment {
    pub async fn by_lesson(
        mm: &ModelManager,
        lesson_id: Uuid,
        published_only: bool,
    ) -> DatabaseResult<Vec<Self>> {
        let assignments = sqlx::query_as(&format!(
            "{SELECT_ASSIGNMENT} WHERE a.lesson_id = $1 AND (NOT $2 OR a.is_published) ORDER BY a.due_date NULLS LAST, a.created_at"
        ))
        .bind(lesson_id)
        .bind(published_only)
        .fetch_all(mm.executor())
        .await?;
        Ok(assignments)
    }

    /// Published assignments of the user's courses due within `days`.
    pub async fn upcoming_for(
        mm: &ModelManager,
        user_id: Uuid,
        days: i64,
    ) -> DatabaseResult<Vec<UpcomingAssignment>> {
        let assignments = sqlx::query_as(
            r#"
            SELECT a.*, m.course_id, c.instructor_id, c.title AS course_title,
                EXISTS (
                    SELECT 1 FROM assignment_submissions s
                    WHERE s.assignment_id = a.id AND s.user_id = $1
                ) AS submitted
            FROM assignments a
            JOIN lessons l ON l.id = a.lesson_id
            JOIN modules m ON m.id = l.module_id
            JOIN courses c ON c.id = m.course_id
            JOIN enrollments e ON e.course_id = c.id AND e.user_id = $1
            WHERE a.is_published
              AND a.due_date BETWEEN now() AND now() + make_interval(days => $2::int)
            ORDER BY a.due_date
            "#,
        )
        .bind(user_id)
        .bind(i32::try_from(days).unwrap_or(i32::MAX))
        .fetch_all(mm.executor())
        .await?;
        Ok(assignments)
    }

    pub async fn statistics(mm: &ModelManager, id: Uuid) -> DatabaseResult<AssignmentStatistics> {
        let stats = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total_submissions,
                COUNT(*) FILTER (WHERE status = 'graded') AS graded_submissions,
                COUNT(*) FILTER (WHERE is_late) AS late_submissions,
                AVG(score)::float8 AS average_score
            FROM assignment_submissions
            WHERE assignment_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(mm.executor())
        .await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn assignment(due_date: Option<DateTime<Utc>>) -> Assignment {
        let now = Utc::now();
        Assignment {
            id: Uuid::new_v4(),
            lesson_id: Uuid::new_v4(),
            title: String::from("essay"),
            description: String::new(),
            instructions: String::new(),
            due_date,
            max_score: 100,
            submission_type: String::from("text"),
            is_published: true,
            created_at: now,
            updated_at: now,
            course_id: Uuid::new_v4(),
            instructor_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn lateness_follows_due_date() {
        let now = Utc::now();
        assert!(assignment(Some(now - Duration::hours(1))).is_late_at(now));
        assert!(!assignment(Some(now + Duration::hours(1))).is_late_at(now));
        assert!(!assignment(None).is_late_at(now));
    }

    #[test]
    fn score_must_fit_max_score() {
        let a = assignment(None);
        assert!(a.accepts_score(0));
        assert!(a.accepts_score(100));
        assert!(!a.accepts_score(101));
        assert!(!a.accepts_score(-1));
    }
}
