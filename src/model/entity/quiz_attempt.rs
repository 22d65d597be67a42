use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::grading::{GradeReport, SubmittedAnswer};
use crate::model::{ModelManager, error::DatabaseResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct QuizAttempt {
    id: Uuid,
    quiz_id: Uuid,
    user_id: Uuid,
    score: f64,
    earned_points: i32,
    total_points: i32,
    passed: bool,
    #[schema(value_type = Vec<SubmittedAnswer>)]
    answers: serde_json::Value,
    completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct QuizAttemptWithStudent {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub attempt: QuizAttempt,
    pub student_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct QuizStatistics {
    pub total_attempts: i64,
    pub unique_users: i64,
    pub average_score: f64,
    pub pass_rate: f64,
    pub best_score: Option<f64>,
}

impl QuizAttempt {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Attempts are append-only: every submission is recorded, passed or not.
    pub async fn record(
        mm: &ModelManager,
        quiz_id: Uuid,
        user_id: Uuid,
        report: &GradeReport,
        answers: &[SubmittedAnswer],
    ) -> DatabaseResult<Self> {
        let attempt = sqlx::query_as(
            r#"
            INSERT INTO quiz_attempts (id, quiz_id, user_id, score, earned_points, total_points, passed, answers)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(quiz_id)
        .bind(user_id)
        .bind(report.percentage)
        .bind(report.earned_points)
        .bind(report.total_points)
        .bind(report.passed)
        .bind(serde_json::to_value(answers)?)
        .fetch_one(mm.executor())
        .await?;
        Ok(attempt)
    }

    pub async fn by_user(mm: &ModelManager, quiz_id: Uuid, user_id: Uuid) -> DatabaseResult<Vec<Self>> {
        let attempts = sqlx::query_as(
            "SELECT * FROM quiz_attempts WHERE quiz_id = $1 AND user_id = $2 ORDER BY completed_at DESC",
        )
        .bind(quiz_id)
        .bind(user_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(attempts)
    }

    pub async fn by_quiz(mm: &ModelManager, quiz_id: Uuid) -> DatabaseResult<Vec<QuizAttemptWithStudent>> {
        let attempts = sqlx::query_as(
            r#"
            SELECT qa.*, u.name AS student_name
            FROM quiz_attempts qa
            JOIN users u ON u.id = qa.user_id
            WHERE qa.quiz_id = $1
            ORDER BY qa.completed_at DESC
            "#,
        )
        .bind(quiz_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(attempts)
    }

    pub async fn statistics(mm: &ModelManager, quiz_id: Uuid) -> DatabaseResult<QuizStatistics> {
        let stats = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total_attempts,
                COUNT(DISTINCT user_id) AS unique_users,
                COALESCE(AVG(score), 0)::float8 AS average_score,
                COALESCE(AVG(CASE WHEN passed THEN 100.0 ELSE 0.0 END), 0)::float8 AS pass_rate,
                MAX(score) AS best_score
            FROM quiz_attempts
            WHERE quiz_id = $1
            "#,
        )
        .bind(quiz_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(stats)
    }
}
