use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::access::HasOwner;
use crate::model::{
    ModelManager, Page,
    error::{DatabaseError, DatabaseResult},
    repo::CrudRepository,
};

/// A live review. Soft deleted rows are filtered out by every query.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Review {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    rating: i16,
    review_text: String,
    helpful_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ReviewCreate {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub rating: i16,
    pub review_text: String,
}

#[derive(Debug, Default)]
pub struct ReviewUpdate {
    pub rating: Option<i16>,
    pub review_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct ReviewWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: Review,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CourseReviews {
    pub reviews: Page<ReviewWithAuthor>,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HelpfulToggle {
    Marked,
    Unmarked,
}

impl Review {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn rating(&self) -> i16 {
        self.rating
    }

    pub fn helpful_count(&self) -> i32 {
        self.helpful_count
    }
}

impl HasOwner for Review {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

#[async_trait]
impl CrudRepository for Review {
    type Id = Uuid;
    type Create = ReviewCreate;
    type Update = ReviewUpdate;

    /// One live review per user and course; a second one is a conflict.
    async fn create(mm: &ModelManager, data: ReviewCreate) -> DatabaseResult<Self> {
        let review = sqlx::query_as(
            r#"
            INSERT INTO reviews (id, user_id, course_id, rating, review_text)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.user_id)
        .bind(data.course_id)
        .bind(data.rating)
        .bind(&data.review_text)
        .fetch_one(mm.executor())
        .await
        .map_err(DatabaseError::from)
        .map_err(|e| {
            if e.is_unique_violation() {
                DatabaseError::Conflict("You have already reviewed this course")
            } else {
                e
            }
        })?;
        Ok(review)
    }

    async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let review =
            sqlx::query_as("SELECT * FROM reviews WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(mm.executor())
                .await?;
        Ok(review)
    }

    async fn update(mm: &ModelManager, id: Uuid, data: ReviewUpdate) -> DatabaseResult<Option<Self>> {
        let review = sqlx::query_as(
            r#"
            UPDATE reviews SET
                rating = COALESCE($2, rating),
                review_text = COALESCE($3, review_text),
                updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.rating)
        .bind(&data.review_text)
        .fetch_optional(mm.executor())
        .await?;
        Ok(review)
    }

    async fn delete(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let review = sqlx::query_as(
            "UPDATE reviews SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .fetch_optional(mm.executor())
        .await?;
        Ok(review)
    }
}

impl Review {
    pub async fn find_live(
        mm: &ModelManager,
        user_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let review = sqlx::query_as(
            "SELECT * FROM reviews WHERE user_id = $1 AND course_id = $2 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(mm.executor())
        .await?;
        Ok(review)
    }

    pub async fn average_for_course(mm: &ModelManager, course_id: Uuid) -> DatabaseResult<Option<f64>> {
        let average = sqlx::query_scalar(
            "SELECT AVG(rating)::float8 FROM reviews WHERE course_id = $1 AND deleted_at IS NULL",
        )
        .bind(course_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(average)
    }

    pub async fn by_course(
        mm: &ModelManager,
        course_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<CourseReviews> {
        let items = sqlx::query_as(
            r#"
            SELECT r.*, u.name AS author_name, u.avatar_url AS author_avatar_url
            FROM reviews r
            JOIN users u ON u.id = r.user_id
            WHERE r.course_id = $1 AND r.deleted_at IS NULL
            ORDER BY r.helpful_count DESC, r.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(course_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reviews WHERE course_id = $1 AND deleted_at IS NULL",
        )
        .bind(course_id)
        .fetch_one(mm.executor())
        .await?;

        Ok(CourseReviews {
            reviews: Page::new(items, total, limit, offset),
            average_rating: Self::average_for_course(mm, course_id).await?,
        })
    }

    /// Flips the helpful mark of `user_id` on the review and keeps
    /// `helpful_count` in step with the marks table.
    pub async fn toggle_helpful(
        mm: &ModelManager,
        review_id: Uuid,
        user_id: Uuid,
    ) -> DatabaseResult<(Self, HelpfulToggle)> {
        let mut tx = mm.executor().begin().await?;

        let live: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM reviews WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
                .bind(review_id)
                .fetch_optional(&mut *tx)
                .await?;
        if live.is_none() {
            tx.rollback().await?;
            return Err(DatabaseError::NotFound);
        }

        let removed = sqlx::query("DELETE FROM review_helpful WHERE review_id = $1 AND user_id = $2")
            .bind(review_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let (delta, toggle) = if removed > 0 {
            (-1, HelpfulToggle::Unmarked)
        } else {
            sqlx::query("INSERT INTO review_helpful (review_id, user_id) VALUES ($1, $2)")
                .bind(review_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            (1, HelpfulToggle::Marked)
        };

        let review: Self = sqlx::query_as(
            "UPDATE reviews SET helpful_count = GREATEST(helpful_count + $2, 0) WHERE id = $1 RETURNING *",
        )
        .bind(review_id)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((review, toggle))
    }
}
