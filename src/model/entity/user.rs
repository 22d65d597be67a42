use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::access::HasOwner;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::UserRole;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UserEntity {
    id: Uuid,
    name: String,
    email: String,
    #[serde(skip)]
    password_hash: Option<String>,
    role: String,
    #[serde(skip)]
    google_id: Option<String>,
    avatar_url: Option<String>,
    bio: Option<String>,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct UserCreate {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub google_id: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserEntity {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// `None` for accounts created through an OAuth provider.
    pub fn hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    pub fn role(&self) -> UserRole {
        UserRole::from(self.role.as_str())
    }

    pub fn google_id(&self) -> Option<&str> {
        self.google_id.as_deref()
    }

    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.last_login
    }
}

static SELECT_LIVE_USER: &str = "SELECT * FROM users WHERE deleted_at IS NULL";

#[async_trait]
impl CrudRepository for UserEntity {
    type Id = Uuid;
    type Create = UserCreate;
    type Update = UserUpdate;

    async fn create(mm: &ModelManager, data: UserCreate) -> DatabaseResult<Self> {
        let user = sqlx::query_as(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, google_id, avatar_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.name)
        .bind(data.email.to_lowercase())
        .bind(&data.password_hash)
        .bind(data.role.as_str())
        .bind(&data.google_id)
        .bind(&data.avatar_url)
        .fetch_one(mm.executor())
        .await?;

        Ok(user)
    }

    async fn find_by_id(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let user = sqlx::query_as(&format!("{SELECT_LIVE_USER} AND id = $1"))
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(user)
    }

    async fn update(mm: &ModelManager, id: Uuid, data: UserUpdate) -> DatabaseResult<Option<Self>> {
        let user = sqlx::query_as(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                bio = COALESCE($3, bio),
                avatar_url = COALESCE($4, avatar_url),
                updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.bio)
        .bind(&data.avatar_url)
        .fetch_optional(mm.executor())
        .await?;
        Ok(user)
    }

    /// Soft delete: the row stays for referential history but can no longer authenticate.
    async fn delete(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let user = sqlx::query_as(
            "UPDATE users SET deleted_at = now(), updated_at = now() WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .fetch_optional(mm.executor())
        .await?;
        Ok(user)
    }
}

impl HasOwner for UserEntity {
    fn owner_id(&self) -> Uuid {
        self.id // owners of users are themselves
    }
}

impl UserEntity {
    pub async fn find_by_email(mm: &ModelManager, email: &str) -> DatabaseResult<Option<Self>> {
        let user = sqlx::query_as(&format!("{SELECT_LIVE_USER} AND email = $1"))
            .bind(email.to_lowercase())
            .fetch_optional(mm.executor())
            .await?;
        Ok(user)
    }

    /// Includes soft-deleted accounts, since emails stay reserved.
    pub async fn email_taken(mm: &ModelManager, email: &str) -> DatabaseResult<bool> {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
            .bind(email.to_lowercase())
            .fetch_one(mm.executor())
            .await?;
        Ok(taken)
    }

    pub async fn find_by_google_id(
        mm: &ModelManager,
        google_id: &str,
    ) -> DatabaseResult<Option<Self>> {
        let user = sqlx::query_as(&format!("{SELECT_LIVE_USER} AND google_id = $1"))
            .bind(google_id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(user)
    }

    pub async fn link_google(
        mm: &ModelManager,
        id: Uuid,
        google_id: &str,
        avatar_url: Option<&str>,
    ) -> DatabaseResult<Self> {
        let user = sqlx::query_as(
            r#"
            UPDATE users SET
                google_id = $2,
                avatar_url = COALESCE(avatar_url, $3),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(google_id)
        .bind(avatar_url)
        .fetch_one(mm.executor())
        .await?;
        Ok(user)
    }

    pub async fn set_password(mm: &ModelManager, id: Uuid, hash: &str) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    pub async fn set_role(
        mm: &ModelManager,
        id: Uuid,
        role: UserRole,
    ) -> DatabaseResult<Option<Self>> {
        let user = sqlx::query_as(
            "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(mm.executor())
        .await?;
        Ok(user)
    }

    pub async fn touch_last_login(mm: &ModelManager, id: Uuid) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET last_login = now() WHERE id = $1")
            .bind(id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    pub async fn list(
        mm: &ModelManager,
        role: Option<UserRole>,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let users = sqlx::query_as(&format!(
            "{SELECT_LIVE_USER} AND ($1::text IS NULL OR role = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(role.map(|r| r.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;
        Ok(users)
    }

    pub async fn count(mm: &ModelManager, role: Option<UserRole>) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE deleted_at IS NULL AND ($1::text IS NULL OR role = $1)",
        )
        .bind(role.map(|r| r.as_str()))
        .fetch_one(mm.executor())
        .await?;
        Ok(count)
    }

    /// Ids of live users, optionally restricted to one role.
    pub async fn ids_by_role(mm: &ModelManager, role: Option<UserRole>) -> DatabaseResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            "SELECT id FROM users WHERE deleted_at IS NULL AND ($1::text IS NULL OR role = $1)",
        )
        .bind(role.map(|r| r.as_str()))
        .fetch_all(mm.executor())
        .await?;
        Ok(ids)
    }
}
