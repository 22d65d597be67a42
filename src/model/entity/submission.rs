use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::access::HasOwner;
use crate::model::{ModelManager, error::DatabaseResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Submission {
    id: Uuid,
    assignment_id: Uuid,
    user_id: Uuid,
    content: Option<String>,
    file_url: Option<String>,
    status: String,
    is_late: bool,
    score: Option<i32>,
    feedback: Option<String>,
    graded_by: Option<Uuid>,
    graded_at: Option<DateTime<Utc>>,
    submitted_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SubmissionUpsert {
    pub assignment_id: Uuid,
    pub user_id: Uuid,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub is_late: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct SubmissionWithStudent {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub submission: Submission,
    pub student_name: String,
    pub student_email: String,
}

#[derive(Debug, FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    submission: Submission,
    inserted: bool,
}

impl Submission {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn assignment_id(&self) -> Uuid {
        self.assignment_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn is_late(&self) -> bool {
        self.is_late
    }

    pub fn score(&self) -> Option<i32> {
        self.score
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Stores the single submission of a user for an assignment. A resubmission
    /// overwrites the previous one and clears its grading.
    /// Returns the row and whether it was newly created.
    pub async fn upsert(mm: &ModelManager, data: SubmissionUpsert) -> DatabaseResult<(Self, bool)> {
        let row: UpsertRow = sqlx::query_as(
            r#"
            INSERT INTO assignment_submissions (id, assignment_id, user_id, content, file_url, is_late)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (assignment_id, user_id) DO UPDATE SET
                content = EXCLUDED.content,
                file_url = EXCLUDED.file_url,
                is_late = EXCLUDED.is_late,
                status = 'submitted',
                score = NULL,
                feedback = NULL,
                graded_by = NULL,
                graded_at = NULL,
                submitted_at = now()
            RETURNING *, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.assignment_id)
        .bind(data.user_id)
        .bind(&data.content)
        .bind(&data.file_url)
        .bind(data.is_late)
        .fetch_one(mm.executor())
        .await?;

        Ok((row.submission, row.inserted))
    }

    pub async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let submission = sqlx::query_as("SELECT * FROM assignment_submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(submission)
    }

    pub async fn find_for(
        mm: &ModelManager,
        assignment_id: Uuid,
        user_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let submission = sqlx::query_as(
            "SELECT * FROM assignment_submissions WHERE assignment_id = $1 AND user_id = $2",
        )
        .bind(assignment_id)
        .bind(user_id)
        .fetch_optional(mm.executor())
        .await?;
        Ok(submission)
    }

    pub async fn by_assignment(
        mm: &ModelManager,
        assignment_id: Uuid,
    ) -> DatabaseResult<Vec<SubmissionWithStudent>> {
        let submissions = sqlx::query_as(
            r#"
            SELECT s.*, u.name AS student_name, u.email AS student_email
            FROM assignment_submissions s
            JOIN users u ON u.id = s.user_id
            WHERE s.assignment_id = $1
            ORDER BY s.submitted_at DESC
            "#,
        )
        .bind(assignment_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(submissions)
    }

    pub async fn grade(
        mm: &ModelManager,
        id: Uuid,
        score: i32,
        feedback: Option<&str>,
        graded_by: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let submission = sqlx::query_as(
            r#"
            UPDATE assignment_submissions SET
                score = $2,
                feedback = $3,
                graded_by = $4,
                graded_at = now(),
                status = 'graded'
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(score)
        .bind(feedback)
        .bind(graded_by)
        .fetch_optional(mm.executor())
        .await?;
        Ok(submission)
    }
}

/// The submitting student owns their submission; graders go through the assignment.
impl HasOwner for Submission {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}
