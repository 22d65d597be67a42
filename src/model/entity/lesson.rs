use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::access::HasOwner;
use crate::model::ordering::LESSONS;
use crate::model::{
    ModelManager,
    error::{DatabaseError, DatabaseResult},
    repo::CrudRepository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Video,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Lesson {
    id: Uuid,
    module_id: Uuid,
    title: String,
    content: String,
    content_type: String,
    video_url: Option<String>,
    duration_minutes: Option<i32>,
    order_index: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    course_id: Uuid,
    instructor_id: Uuid,
}

#[derive(Debug)]
pub struct LessonCreate {
    pub module_id: Uuid,
    pub title: String,
    pub content: String,
    pub content_type: ContentType,
    pub video_url: Option<String>,
    pub duration_minutes: Option<i32>,
    pub order_index: Option<i32>,
}

#[derive(Debug, Default)]
pub struct LessonUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub content_type: Option<ContentType>,
    pub video_url: Option<String>,
    pub duration_minutes: Option<i32>,
}

/// Lesson listing entry carrying the requester's completion flag.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct LessonWithStatus {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub lesson: Lesson,
    pub completed: bool,
}

impl Lesson {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn module_id(&self) -> Uuid {
        self.module_id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn order_index(&self) -> i32 {
        self.order_index
    }

    pub fn is_video(&self) -> bool {
        self.content_type == ContentType::Video.as_str()
    }

    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }
}

impl HasOwner for Lesson {
    fn owner_id(&self) -> Uuid {
        self.instructor_id
    }
}

static SELECT_LESSON: &str = r#"
    SELECT l.*, m.course_id, c.instructor_id
    FROM lessons l
    JOIN modules m ON m.id = l.module_id
    JOIN courses c ON c.id = m.course_id
"#;

#[async_trait]
impl CrudRepository for Lesson {
    type Id = Uuid;
    type Create = LessonCreate;
    type Update = LessonUpdate;

    async fn create(mm: &ModelManager, data: LessonCreate) -> DatabaseResult<Self> {
        let mut tx = mm.executor().begin().await?;
        let index = LESSONS.open_slot(&mut tx, data.module_id, data.order_index).await?;

        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO lessons (id, module_id, title, content, content_type, video_url, duration_minutes, order_index)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(data.module_id)
        .bind(&data.title)
        .bind(&data.content)
        .bind(data.content_type.as_str())
        .bind(&data.video_url)
        .bind(data.duration_minutes)
        .bind(index)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Self::find_by_id(mm, id).await?.ok_or(DatabaseError::NotFound)
    }

    async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let lesson = sqlx::query_as(&format!("{SELECT_LESSON} WHERE l.id = $1"))
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(lesson)
    }

    async fn update(mm: &ModelManager, id: Uuid, data: LessonUpdate) -> DatabaseResult<Option<Self>> {
        let updated = sqlx::query(
            r#"
            UPDATE lessons SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                content_type = COALESCE($4, content_type),
                video_url = COALESCE($5, video_url),
                duration_minutes = COALESCE($6, duration_minutes),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.content)
        .bind(data.content_type.map(|c| c.as_str()))
        .bind(&data.video_url)
        .bind(data.duration_minutes)
        .execute(mm.executor())
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        Self::find_by_id(mm, id).await
    }

    async fn delete(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let Some(lesson) = Self::find_by_id(mm, id).await? else {
            return Ok(None);
        };

        let mut tx = mm.executor().begin().await?;
        LESSONS.lock_parent(&mut tx, lesson.module_id).await?;
        let removed: Option<i32> =
            sqlx::query_scalar("DELETE FROM lessons WHERE id = $1 RETURNING order_index")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(removed) = removed else {
            return Ok(None);
        };
        LESSONS.close_gap(&mut tx, lesson.module_id, removed).await?;
        tx.commit().await?;

        Ok(Some(lesson))
    }
}

impl Lesson {
    pub async fn by_module(
        mm: &ModelManager,
        module_id: Uuid,
        user_id: Uuid,
    ) -> DatabaseResult<Vec<LessonWithStatus>> {
        let lessons = sqlx::query_as(
            r#"
            SELECT l.*, m.course_id, c.instructor_id,
                COALESCE(lp.is_completed, FALSE) AS completed
            FROM lessons l
            JOIN modules m ON m.id = l.module_id
            JOIN courses c ON c.id = m.course_id
            LEFT JOIN lesson_progress lp ON lp.lesson_id = l.id AND lp.user_id = $2
            WHERE l.module_id = $1
            ORDER BY l.order_index
            "#,
        )
        .bind(module_id)
        .bind(user_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(lessons)
    }

    pub async fn reorder(mm: &ModelManager, id: Uuid, new_index: i32) -> DatabaseResult<Self> {
        let lesson = Self::find_by_id(mm, id).await?.ok_or(DatabaseError::NotFound)?;

        let mut tx = mm.executor().begin().await?;
        LESSONS.move_item(&mut tx, lesson.module_id, id, new_index).await?;
        tx.commit().await?;

        Self::find_by_id(mm, id).await?.ok_or(DatabaseError::NotFound)
    }
}
