use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::access::HasOwner;
use crate::model::{ModelManager, error::DatabaseResult};

/// Bookkeeping row for a file put into object storage.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UploadRecord {
    public_id: String,
    owner_id: Uuid,
    url: String,
    content_type: String,
    size: i64,
    created_at: DateTime<Utc>,
}

impl UploadRecord {
    pub fn public_id(&self) -> &str {
        &self.public_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub async fn insert(
        mm: &ModelManager,
        public_id: &str,
        owner_id: Uuid,
        url: &str,
        content_type: &str,
        size: i64,
    ) -> DatabaseResult<Self> {
        let record = sqlx::query_as(
            r#"
            INSERT INTO uploads (public_id, owner_id, url, content_type, size)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(public_id)
        .bind(owner_id)
        .bind(url)
        .bind(content_type)
        .bind(size)
        .fetch_one(mm.executor())
        .await?;
        Ok(record)
    }

    pub async fn find(mm: &ModelManager, public_id: &str) -> DatabaseResult<Option<Self>> {
        let record = sqlx::query_as("SELECT * FROM uploads WHERE public_id = $1")
            .bind(public_id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(record)
    }

    pub async fn remove(mm: &ModelManager, public_id: &str) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM uploads WHERE public_id = $1")
            .bind(public_id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }
}

impl HasOwner for UploadRecord {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}
