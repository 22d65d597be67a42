use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::access::HasOwner;
use crate::model::grading::{GradableQuestion, QuestionType};
use crate::model::{
    ModelManager,
    error::{DatabaseError, DatabaseResult},
    repo::CrudRepository,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Quiz {
    id: Uuid,
    lesson_id: Uuid,
    title: String,
    description: String,
    passing_score: i32,
    time_limit_minutes: Option<i32>,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    course_id: Uuid,
    instructor_id: Uuid,
}

#[derive(Debug)]
pub struct QuizCreate {
    pub lesson_id: Uuid,
    pub title: String,
    pub description: String,
    pub passing_score: Option<i32>,
    pub time_limit_minutes: Option<i32>,
}

#[derive(Debug, Default)]
pub struct QuizUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub passing_score: Option<i32>,
    pub time_limit_minutes: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
pub struct QuestionRemoval {
    pub quiz_unpublished: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct QuizQuestion {
    id: Uuid,
    quiz_id: Uuid,
    question_text: String,
    question_type: String,
    points: i32,
    order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct QuizOption {
    id: Uuid,
    question_id: Uuid,
    option_text: String,
    is_correct: bool,
    order_index: i32,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct OptionCreate {
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug)]
pub struct QuestionCreate {
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: i32,
    pub order_index: Option<i32>,
    pub options: Vec<OptionCreate>,
}

#[derive(Debug, Default)]
pub struct QuestionUpdate {
    pub question_text: Option<String>,
    pub question_type: Option<QuestionType>,
    pub points: Option<i32>,
    pub order_index: Option<i32>,
    /// Replaces every option of the question when present.
    pub options: Option<Vec<OptionCreate>>,
}

/// A question as shown to a client. `is_correct` is only filled for authors.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct QuestionView {
    pub id: Uuid,
    pub question_text: String,
    pub question_type: String,
    pub points: i32,
    pub order_index: i32,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct OptionView {
    pub id: Uuid,
    pub option_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct QuizView {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionView>,
}

/// Checks the option set of a question before it is stored.
pub fn validate_options(question_type: QuestionType, options: &[OptionCreate]) -> Result<(), String> {
    let correct = options.iter().filter(|o| o.is_correct).count();
    if options.iter().any(|o| o.option_text.trim().is_empty()) {
        return Err(String::from("option text must not be empty"));
    }

    match question_type {
        QuestionType::MultipleChoice => {
            if options.len() < 2 {
                return Err(String::from("multiple choice questions need at least two options"));
            }
            if correct == 0 {
                return Err(String::from("at least one option must be correct"));
            }
        }
        QuestionType::TrueFalse => {
            if options.len() != 2 {
                return Err(String::from("true/false questions need exactly two options"));
            }
            if correct != 1 {
                return Err(String::from("exactly one option must be correct"));
            }
        }
    }

    Ok(())
}

impl Quiz {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn lesson_id(&self) -> Uuid {
        self.lesson_id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn passing_score(&self) -> i32 {
        self.passing_score
    }

    pub fn is_published(&self) -> bool {
        self.is_published
    }
}

impl QuizQuestion {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn quiz_id(&self) -> Uuid {
        self.quiz_id
    }

    pub fn question_type(&self) -> Result<QuestionType, String> {
        QuestionType::try_from(self.question_type.as_str())
    }
}

impl HasOwner for Quiz {
    fn owner_id(&self) -> Uuid {
        self.instructor_id
    }
}

impl HasOwner for QuizView {
    fn owner_id(&self) -> Uuid {
        self.quiz.instructor_id
    }
}

static SELECT_QUIZ: &str = r#"
    SELECT q.*, m.course_id, c.instructor_id
    FROM quizzes q
    JOIN lessons l ON l.id = q.lesson_id
    JOIN modules m ON m.id = l.module_id
    JOIN courses c ON c.id = m.course_id
"#;

#[async_trait]
impl CrudRepository for Quiz {
    type Id = Uuid;
    type Create = QuizCreate;
    type Update = QuizUpdate;

    async fn create(mm: &ModelManager, data: QuizCreate) -> DatabaseResult<Self> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO quizzes (id, lesson_id, title, description, passing_score, time_limit_minutes)
            VALUES ($1, $2, $3, $4, COALESCE($5, 70), $6)
            "#,
        )
        .bind(id)
        .bind(data.lesson_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.passing_score)
        .bind(data.time_limit_minutes)
        .execute(mm.executor())
        .await?;

        Self::find_by_id(mm, id).await?.ok_or(DatabaseError::NotFound)
    }

    async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let quiz = sqlx::query_as(&format!("{SELECT_QUIZ} WHERE q.id = $1"))
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(quiz)
    }

    async fn update(mm: &ModelManager, id: Uuid, data: QuizUpdate) -> DatabaseResult<Option<Self>> {
        let updated = sqlx::query(
            r#"
            UPDATE quizzes SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                passing_score = COALESCE($4, passing_score),
                time_limit_minutes = COALESCE($5, time_limit_minutes),
                is_published = COALESCE($6, is_published),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.passing_score)
        .bind(data.time_limit_minutes)
        .bind(data.is_published)
        .execute(mm.executor())
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        Self::find_by_id(mm, id).await
    }

    async fn delete(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let Some(quiz) = Self::find_by_id(mm, id).await? else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(mm.executor())
            .await?;
        Ok(Some(quiz))
    }
}

impl Quiz {
    pub async fn by_lesson(
        mm: &ModelManager,
        lesson_id: Uuid,
        published_only: bool,
    ) -> DatabaseResult<Vec<Self>> {
        let quizzes = sqlx::query_as(&format!(
            "{SELECT_QUIZ} WHERE q.lesson_id = $1 AND (NOT $2 OR q.is_published) ORDER BY q.created_at"
        ))
        .bind(lesson_id)
        .bind(published_only)
        .fetch_all(mm.executor())
        .await?;
        Ok(quizzes)
    }

    async fn questions_with_options(
        mm: &ModelManager,
        quiz_id: Uuid,
    ) -> DatabaseResult<Vec<(QuizQuestion, Vec<QuizOption>)>> {
        let questions: Vec<QuizQuestion> = sqlx::query_as(
            "SELECT * FROM quiz_questions WHERE quiz_id = $1 ORDER BY order_index, created_at",
        )
        .bind(quiz_id)
        .fetch_all(mm.executor())
        .await?;

        let options: Vec<QuizOption> = sqlx::query_as(
            r#"
            SELECT o.* FROM quiz_options o
            JOIN quiz_questions qq ON qq.id = o.question_id
            WHERE qq.quiz_id = $1
            ORDER BY o.order_index
            "#,
        )
        .bind(quiz_id)
        .fetch_all(mm.executor())
        .await?;

        let mut by_question: HashMap<Uuid, Vec<QuizOption>> = HashMap::new();
        for option in options {
            by_question.entry(option.question_id).or_default().push(option);
        }

        Ok(questions
            .into_iter()
            .map(|q| {
                let options = by_question.remove(&q.id).unwrap_or_default();
                (q, options)
            })
            .collect())
    }

    /// Full quiz for display. Correct flags are included only when `reveal_answers` is set.
    pub async fn view(&self, mm: &ModelManager, reveal_answers: bool) -> DatabaseResult<QuizView> {
        let questions = Self::questions_with_options(mm, self.id)
            .await?
            .into_iter()
            .map(|(q, options)| QuestionView {
                id: q.id,
                question_text: q.question_text,
                question_type: q.question_type,
                points: q.points,
                order_index: q.order_index,
                options: options
                    .into_iter()
                    .map(|o| OptionView {
                        id: o.id,
                        option_text: o.option_text,
                        is_correct: reveal_answers.then_some(o.is_correct),
                    })
                    .collect(),
            })
            .collect();

        Ok(QuizView {
            quiz: self.clone(),
            questions,
        })
    }

    pub async fn gradable_questions(&self, mm: &ModelManager) -> DatabaseResult<Vec<GradableQuestion>> {
        Self::questions_with_options(mm, self.id)
            .await?
            .into_iter()
            .map(|(q, options)| {
                let question_type = q.question_type().map_err(DatabaseError::Invalid)?;
                let correct_options: HashSet<Uuid> =
                    options.iter().filter(|o| o.is_correct).map(|o| o.id).collect();
                Ok(GradableQuestion {
                    id: q.id,
                    question_type,
                    points: q.points,
                    correct_options,
                })
            })
            .collect()
    }

    pub async fn add_question(
        mm: &ModelManager,
        quiz_id: Uuid,
        data: QuestionCreate,
    ) -> DatabaseResult<QuizQuestion> {
        validate_options(data.question_type, &data.options).map_err(DatabaseError::Invalid)?;

        let mut tx = mm.executor().begin().await?;
        let order_index = match data.order_index {
            Some(index) => index,
            None => {
                sqlx::query_scalar(
                    "SELECT COALESCE(MAX(order_index) + 1, 0) FROM quiz_questions WHERE quiz_id = $1",
                )
                .bind(quiz_id)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let question: QuizQuestion = sqlx::query_as(
            r#"
            INSERT INTO quiz_questions (id, quiz_id, question_text, question_type, points, order_index)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, quiz_id, question_text, question_type, points, order_index
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(quiz_id)
        .bind(&data.question_text)
        .bind(data.question_type.as_str())
        .bind(data.points)
        .bind(order_index)
        .fetch_one(&mut *tx)
        .await?;

        insert_options(&mut tx, question.id, &data.options).await?;
        tx.commit().await?;

        Ok(question)
    }

    pub async fn find_question(
        mm: &ModelManager,
        question_id: Uuid,
    ) -> DatabaseResult<Option<QuizQuestion>> {
        let question = sqlx::query_as(
            "SELECT id, quiz_id, question_text, question_type, points, order_index FROM quiz_questions WHERE id = $1",
        )
        .bind(question_id)
        .fetch_optional(mm.executor())
        .await?;
        Ok(question)
    }

    pub async fn update_question(
        mm: &ModelManager,
        question: &QuizQuestion,
        data: QuestionUpdate,
    ) -> DatabaseResult<QuizQuestion> {
        let question_type = match data.question_type {
            Some(t) => t,
            None => question.question_type().map_err(DatabaseError::Invalid)?,
        };
        if let Some(options) = &data.options {
            validate_options(question_type, options).map_err(DatabaseError::Invalid)?;
        } else if data.question_type.is_some() {
            return Err(DatabaseError::invalid(
                "changing the question type requires a new option set",
            ));
        }

        let mut tx = mm.executor().begin().await?;
        let updated: QuizQuestion = sqlx::query_as(
            r#"
            UPDATE quiz_questions SET
                question_text = COALESCE($2, question_text),
                question_type = $3,
                points = COALESCE($4, points),
                order_index = COALESCE($5, order_index)
            WHERE id = $1
            RETURNING id, quiz_id, question_text, question_type, points, order_index
            "#,
        )
        .bind(question.id)
        .bind(&data.question_text)
        .bind(question_type.as_str())
        .bind(data.points)
        .bind(data.order_index)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(options) = &data.options {
            sqlx::query("DELETE FROM quiz_options WHERE question_id = $1")
                .bind(question.id)
                .execute(&mut *tx)
                .await?;
            insert_options(&mut tx, question.id, options).await?;
        }
        tx.commit().await?;

        Ok(updated)
    }

    pub async fn question_count(mm: &ModelManager, quiz_id: Uuid) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_questions WHERE quiz_id = $1")
            .bind(quiz_id)
            .fetch_one(mm.executor())
            .await?;
        Ok(count)
    }

    /// Removes a question. A published quiz left without questions is unpublished
    /// in the same transaction, so students never see an ungradable quiz.
    pub async fn delete_question(
        mm: &ModelManager,
        question: &QuizQuestion,
    ) -> DatabaseResult<QuestionRemoval> {
        let mut tx = mm.executor().begin().await?;
        let deleted = sqlx::query("DELETE FROM quiz_questions WHERE id = $1")
            .bind(question.id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(DatabaseError::NotFound);
        }

        let unpublished = sqlx::query(
            r#"
            UPDATE quizzes SET is_published = FALSE, updated_at = now()
            WHERE id = $1 AND is_published
              AND NOT EXISTS (SELECT 1 FROM quiz_questions WHERE quiz_id = $1)
            "#,
        )
        .bind(question.quiz_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(QuestionRemoval {
            quiz_unpublished: unpublished.rows_affected() > 0,
        })
    }
}

async fn insert_options(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    question_id: Uuid,
    options: &[OptionCreate],
) -> DatabaseResult<()> {
    for (index, option) in options.iter().enumerate() {
        sqlx::query(
            "INSERT INTO quiz_options (id, question_id, option_text, is_correct, order_index) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(question_id)
        .bind(&option.option_text)
        .bind(option.is_correct)
        .bind(i32::try_from(index).unwrap_or(i32::MAX))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(flags: &[bool]) -> Vec<OptionCreate> {
        flags
            .iter()
            .enumerate()
            .map(|(i, &is_correct)| OptionCreate {
                option_text: format!("option {i}"),
                is_correct,
            })
            .collect()
    }

    #[test]
    fn multiple_choice_option_rules() {
        assert!(validate_options(QuestionType::MultipleChoice, &options(&[true, false])).is_ok());
        assert!(validate_options(QuestionType::MultipleChoice, &options(&[true, true, false])).is_ok());
        assert!(validate_options(QuestionType::MultipleChoice, &options(&[true])).is_err());
        assert!(validate_options(QuestionType::MultipleChoice, &options(&[false, false])).is_err());
    }

    #[test]
    fn true_false_option_rules() {
        assert!(validate_options(QuestionType::TrueFalse, &options(&[true, false])).is_ok());
        assert!(validate_options(QuestionType::TrueFalse, &options(&[true, true])).is_err());
        assert!(validate_options(QuestionType::TrueFalse, &options(&[true, false, false])).is_err());
    }

    #[test]
    fn blank_option_text_is_rejected() {
        let mut opts = options(&[true, false]);
        opts[1].option_text = String::from("  ");
        assert!(validate_options(QuestionType::MultipleChoice, &opts).is_err());
    }
}
